//! Time-bucketed counter updates.
//!
//! A [`StatsRequest`] names a stats field, a moment in time, a target
//! predicate and one or more counter increments. [`StatsRequest::build_plan`]
//! expands each increment into five nested paths (all-time, year, month, day,
//! hour) carrying the same value, ready to be applied as a single `$inc`
//! update.

use crate::errors::QueryError;
use bson::{Bson, Document};
use chrono::{DateTime, Datelike, Timelike, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Increment {
    pub field: String,
    pub value: f64,
}

impl Increment {
    pub fn new(field: impl Into<String>, value: f64) -> Self {
        Self { field: field.into(), value }
    }
}

/// One increment or a sequence of them; request payloads may send either.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Increments {
    One(Increment),
    Many(Vec<Increment>),
}

impl Increments {
    #[must_use]
    pub fn as_slice(&self) -> &[Increment] {
        match self {
            Increments::One(inc) => std::slice::from_ref(inc),
            Increments::Many(incs) => incs,
        }
    }
}

/// A counter-update request, usually deserialized straight from a JSON body.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatsRequest {
    pub stats_field: Option<String>,
    pub date: Option<DateTime<Utc>>,
    pub query: Option<Document>,
    pub increments: Option<Increments>,
}

impl StatsRequest {
    pub fn new(
        stats_field: impl Into<String>,
        date: DateTime<Utc>,
        query: Document,
        increments: Increments,
    ) -> Self {
        Self {
            stats_field: Some(stats_field.into()),
            date: Some(date),
            query: Some(query),
            increments: Some(increments),
        }
    }

    /// Validates the request and expands it into the bucketed update plan.
    ///
    /// Buckets come from the UTC view of `date`: 4-digit year, then
    /// zero-padded month (1-12), day and hour (0-23), nested in that order
    /// under the stats field.
    pub fn build_plan(&self) -> Result<StatsUpdatePlan, QueryError> {
        let stats_field = match self.stats_field.as_deref() {
            Some(s) if !s.is_empty() => s,
            _ => return Err(QueryError::MissingRequiredField("stats field")),
        };
        let increments = self
            .increments
            .as_ref()
            .ok_or(QueryError::MissingRequiredField("increments field"))?;
        let date = self.date.ok_or(QueryError::MissingRequiredField("date field"))?;
        let query = self.query.as_ref().ok_or(QueryError::MissingRequiredField("query"))?;

        let increments = increments.as_slice();
        if increments.is_empty() {
            return Err(QueryError::InvalidIncrements);
        }

        let base = format!("{stats_field}.");
        let year_path = format!("{base}{}", date.year());
        let month_path = format!("{year_path}.{:02}", date.month());
        let day_path = format!("{month_path}.{:02}", date.day());
        let hour_path = format!("{day_path}.{:02}", date.hour());

        let mut paths = Document::new();
        for increment in increments {
            let value = Bson::Double(increment.value);
            paths.insert(format!("{base}{}", increment.field), value.clone());
            paths.insert(format!("{year_path}.{}", increment.field), value.clone());
            paths.insert(format!("{month_path}.{}", increment.field), value.clone());
            paths.insert(format!("{day_path}.{}", increment.field), value.clone());
            paths.insert(format!("{hour_path}.{}", increment.field), value);
        }

        Ok(StatsUpdatePlan { query: query.clone(), increments: paths })
    }
}

/// The expanded update: the predicate selecting the document and the
/// path-to-value increments to apply to it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatsUpdatePlan {
    pub query: Document,
    pub increments: Document,
}

impl StatsUpdatePlan {
    /// The store-facing update document, `{"$inc": {path: value, ...}}`.
    #[must_use]
    pub fn update_document(&self) -> Document {
        let mut doc = Document::new();
        doc.insert("$inc", self.increments.clone());
        doc
    }
}
