//! Filter expression tree and its lowering into store predicates.
//!
//! The tree itself comes from a [`FilterGrammar`] front-end (the crate ships
//! [`crate::query::ODataGrammar`]); the compiler here only checks structural
//! shape and emits the `$lt`/`$gt`/`$gte`/`$lte`/`$ne`/`$and`/`$or` wire form.

use crate::errors::QueryError;
use crate::query::types::MAX_FILTER_DEPTH;
use bson::{Bson, Document};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    Eq,
    Ne,
    Gt,
    Ge,
    Lt,
    Le,
}

impl CompareOp {
    /// Wire operator token; `None` for plain equality, which is expressed as
    /// `{field: literal}` with no operator wrapper.
    #[must_use]
    pub fn token(self) -> Option<&'static str> {
        match self {
            CompareOp::Eq => None,
            CompareOp::Ne => Some("$ne"),
            CompareOp::Gt => Some("$gt"),
            CompareOp::Ge => Some("$gte"),
            CompareOp::Lt => Some("$lt"),
            CompareOp::Le => Some("$lte"),
        }
    }
}

/// One side of a comparison or one function-call argument.
#[derive(Debug, Clone, PartialEq)]
pub enum Operand {
    Property(String),
    Literal(Bson),
}

/// Parsed `$filter` expression.
#[derive(Debug, Clone, PartialEq)]
pub enum FilterExpr {
    Compare { op: CompareOp, left: Operand, right: Operand },
    And(Box<FilterExpr>, Box<FilterExpr>),
    Or(Box<FilterExpr>, Box<FilterExpr>),
    Call { function: String, args: Vec<Operand> },
}

/// Front-end turning a `$filter` string into a [`FilterExpr`]. Kept as a
/// trait so embedders can swap the dialect without touching the compiler.
pub trait FilterGrammar {
    fn parse_filter(&self, input: &str) -> Result<FilterExpr, QueryError>;
}

/// Lowers a filter tree into the predicate document.
pub fn compile_filter(expr: &FilterExpr) -> Result<Document, QueryError> {
    compile_node(expr, 0)
}

fn compile_node(expr: &FilterExpr, depth: usize) -> Result<Document, QueryError> {
    if depth > MAX_FILTER_DEPTH {
        return Err(QueryError::InvalidFilterExpression("filter nesting too deep".into()));
    }
    match expr {
        FilterExpr::Compare { op, left, right } => compile_compare(*op, left, right),
        FilterExpr::And(left, right) => {
            Ok(logical("$and", compile_node(left, depth + 1)?, compile_node(right, depth + 1)?))
        }
        FilterExpr::Or(left, right) => {
            Ok(logical("$or", compile_node(left, depth + 1)?, compile_node(right, depth + 1)?))
        }
        FilterExpr::Call { function, args } => compile_call(function, args),
    }
}

fn compile_compare(op: CompareOp, left: &Operand, right: &Operand) -> Result<Document, QueryError> {
    let Operand::Property(name) = left else {
        return Err(QueryError::InvalidFilterExpression(
            "left side of a comparison must be a property".into(),
        ));
    };
    let Operand::Literal(value) = right else {
        return Err(QueryError::InvalidFilterExpression(
            "right side of a comparison must be a literal".into(),
        ));
    };

    let field = normalize_path(name);
    let mut doc = Document::new();
    match op.token() {
        None => {
            doc.insert(field, value.clone());
        }
        Some(token) => {
            let mut inner = Document::new();
            inner.insert(token, value.clone());
            doc.insert(field, inner);
        }
    }
    Ok(doc)
}

fn compile_call(function: &str, args: &[Operand]) -> Result<Document, QueryError> {
    if function != "substringof" {
        return Err(QueryError::UnsupportedFunction(function.to_string()));
    }
    if args.len() != 2 {
        return Err(QueryError::InvalidFilterExpression(
            "substringof takes a property and a pattern".into(),
        ));
    }
    // Arguments may appear in either order.
    let mut property = None;
    let mut literal = None;
    for arg in args {
        match arg {
            Operand::Property(name) => property = Some(name),
            Operand::Literal(value) => literal = Some(value),
        }
    }
    let (Some(name), Some(value)) = (property, literal) else {
        return Err(QueryError::InvalidFilterExpression(
            "substringof takes a property and a pattern".into(),
        ));
    };
    let Bson::String(pattern) = value else {
        return Err(QueryError::InvalidFilterExpression(
            "substringof pattern must be a string".into(),
        ));
    };

    // BSON regex patterns are cstrings; a pattern with an interior NUL is unrepresentable.
    let pattern = bson::raw::CString::try_from(pattern.clone()).map_err(|_| {
        QueryError::InvalidFilterExpression("substringof pattern must not contain a NUL byte".into())
    })?;

    let mut doc = Document::new();
    doc.insert(
        normalize_path(name),
        Bson::RegularExpression(bson::Regex { pattern, options: bson::raw::cstr!("").into() }),
    );
    Ok(doc)
}

fn logical(token: &str, left: Document, right: Document) -> Document {
    let mut doc = Document::new();
    doc.insert(token, Bson::Array(vec![Bson::Document(left), Bson::Document(right)]));
    doc
}

/// `/`-separated property paths become dotted paths.
fn normalize_path(name: &str) -> String {
    name.replace('/', ".")
}
