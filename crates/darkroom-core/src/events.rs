//! Notification payload decoding.
//!
//! Two payload shapes are accepted:
//!
//! ```text
//! {"Records": [{"s3": {"bucket": {"name": "b"}, "object": {"key": "incoming/a+b.jpg"}}}]}
//! [{"store": "b", "namespace": "incoming", "key": "a b.jpg"}]
//! ```
//!
//! Bucket-style keys arrive form-encoded (`+` for space, `%XX` escapes) and
//! carry the namespace as their first path segment.

use serde::Deserialize;

use crate::error::DarkroomError;
use crate::types::{ObjectEvent, ObjectRef};

#[derive(Deserialize)]
#[serde(untagged)]
enum Payload {
    Records {
        #[serde(rename = "Records")]
        records: Vec<BucketRecord>,
    },
    Native(Vec<ObjectEvent>),
}

#[derive(Deserialize)]
struct BucketRecord {
    s3: BucketEntity,
}

#[derive(Deserialize)]
struct BucketEntity {
    bucket: BucketName,
    object: BucketObject,
}

#[derive(Deserialize)]
struct BucketName {
    name: String,
}

#[derive(Deserialize)]
struct BucketObject {
    key: String,
}

/// Decoded notifications plus the raw keys that named no known namespace.
#[derive(Debug, Default)]
pub struct EventBatch {
    pub events: Vec<ObjectEvent>,
    pub unroutable: Vec<String>,
}

/// Decode a form-encoded object key.
pub fn decode_key(raw: &str) -> String {
    let spaced = raw.replace('+', " ");
    match urlencoding::decode(&spaced) {
        Ok(decoded) => decoded.into_owned(),
        Err(_) => spaced,
    }
}

/// Parse a notification payload.
pub fn parse_events(json: &str) -> Result<EventBatch, DarkroomError> {
    let payload: Payload = serde_json::from_str(json)?;
    let mut batch = EventBatch::default();

    match payload {
        Payload::Native(events) => batch.events = events,
        Payload::Records { records } => {
            for record in records {
                let key = decode_key(&record.s3.object.key);
                match ObjectRef::parse(&key) {
                    Some(object) => batch
                        .events
                        .push(ObjectEvent::new(record.s3.bucket.name, &object)),
                    None => {
                        tracing::warn!("Ignoring notification for {} (unknown namespace)", key);
                        batch.unroutable.push(key);
                    }
                }
            }
        }
    }

    Ok(batch)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Namespace;

    #[test]
    fn test_decode_key_plus_and_percent() {
        assert_eq!(decode_key("incoming/my+photo%281%29.jpg"), "incoming/my photo(1).jpg");
        assert_eq!(decode_key("incoming/plain.png"), "incoming/plain.png");
    }

    #[test]
    fn test_parse_bucket_records() {
        let json = r#"{"Records": [
            {"s3": {"bucket": {"name": "photos"}, "object": {"key": "incoming/a+b.jpg"}}},
            {"s3": {"bucket": {"name": "photos"}, "object": {"key": "sources/legacy.jpg"}}}
        ]}"#;
        let batch = parse_events(json).unwrap();
        assert_eq!(batch.events.len(), 1);
        assert_eq!(batch.events[0].store, "photos");
        assert_eq!(batch.events[0].namespace, Namespace::Incoming);
        assert_eq!(batch.events[0].key, "a b.jpg");
        assert_eq!(batch.unroutable, vec!["sources/legacy.jpg"]);
    }

    #[test]
    fn test_parse_native() {
        let json = r#"[{"store": "photos", "namespace": "derived-mono", "key": "x_mono.png"}]"#;
        let batch = parse_events(json).unwrap();
        assert_eq!(batch.events[0].namespace, Namespace::DerivedMono);
    }

    #[test]
    fn test_parse_garbage() {
        assert!(parse_events("{\"nope\": 1}").is_err());
    }
}
