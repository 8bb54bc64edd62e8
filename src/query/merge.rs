use bson::{Bson, Document};

/// Recursively merges `source` over `target`. Nested documents merge
/// key-by-key; any other collision, arrays included, is resolved by taking
/// the `source` value wholesale.
pub fn deep_merge(target: &mut Document, source: Document) {
    for (key, value) in source {
        match value {
            Bson::Document(incoming) => {
                if let Some(Bson::Document(existing)) = target.get_mut(&key) {
                    deep_merge(existing, incoming);
                } else {
                    target.insert(key, incoming);
                }
            }
            other => {
                target.insert(key, other);
            }
        }
    }
}
