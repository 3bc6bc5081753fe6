//! Message contracts exchanged through the background queue.

use serde::{de::DeserializeOwned, Deserialize, Serialize};
use uuid::Uuid;

/// A payload published on a named queue topic.
pub trait MessageContract: Serialize + DeserializeOwned + Send + Sync {
    const TOPIC: &'static str;
}

/// Outgoing email rendered by the producer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmailMessage {
    pub to: String,
    pub subject: String,
    pub body_text: String,
    pub body_html: Option<String>,
}

impl MessageContract for EmailMessage {
    const TOPIC: &'static str = "email.send";
}

/// A file landed in temporary storage and waits for the antivirus scan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileUploaded {
    pub media_id: Uuid,
    pub firm_id: Uuid,
    pub uploaded_by: Uuid,
    pub temp_key: String,
    pub final_key: String,
    pub content_type: String,
}

impl MessageContract for FileUploaded {
    const TOPIC: &'static str = "media.file_uploaded";
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_topics_are_distinct() {
        assert_ne!(EmailMessage::TOPIC, FileUploaded::TOPIC);
    }

    #[test]
    fn test_file_uploaded_payload_shape() {
        let msg = FileUploaded {
            media_id: Uuid::nil(),
            firm_id: Uuid::nil(),
            uploaded_by: Uuid::nil(),
            temp_key: "temp/a/b.png".to_string(),
            final_key: "media/a/b.png".to_string(),
            content_type: "image/png".to_string(),
        };
        let value = serde_json::to_value(&msg).unwrap();
        assert_eq!(value["temp_key"], "temp/a/b.png");
        assert_eq!(value["final_key"], "media/a/b.png");
    }
}
