//! Object-id helpers for identifiers arriving as request strings.

use bson::oid::ObjectId;

#[must_use]
pub fn generate_id() -> ObjectId {
    ObjectId::new()
}

/// A usable identifier is exactly 24 characters of valid hex.
#[must_use]
pub fn is_valid_id(id: &str) -> bool {
    if id.len() != 24 {
        return false;
    }
    ObjectId::parse_str(id).is_ok()
}

#[must_use]
pub fn parse_id(id: &str) -> Option<ObjectId> {
    if is_valid_id(id) { ObjectId::parse_str(id).ok() } else { None }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_ids_round_trip() {
        let id = generate_id();
        let hex = id.to_hex();
        assert!(is_valid_id(&hex));
        assert_eq!(parse_id(&hex), Some(id));
    }

    #[test]
    fn bad_ids_are_rejected() {
        assert!(!is_valid_id(""));
        assert!(!is_valid_id("123"));
        assert!(!is_valid_id("zzzzzzzzzzzzzzzzzzzzzzzz"));
        assert!(parse_id("not-an-id").is_none());
    }
}
