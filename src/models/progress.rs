use mongodb::bson::{oid::ObjectId, Bson, DateTime};
use serde::{Deserialize, Serialize};
use rocket_okapi::okapi::schemars::JsonSchema;

use crate::utils::timestamp::normalize_timestamp;

/// One document per (user, video, course). `last_timestamp` is stored in
/// seconds; legacy documents hold `hh:mm:ss` text, so deserialization goes
/// through the normalization routine.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct UserProgress {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    pub user_id: ObjectId,
    pub video_id: String,
    pub playlist_id: ObjectId,
    #[serde(deserialize_with = "deserialize_seconds")]
    pub last_timestamp: i64,
    #[serde(default)]
    pub completed_tasks: Vec<String>,
    pub updated_at: DateTime,
}

fn deserialize_seconds<'de, D>(deserializer: D) -> Result<i64, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let raw = Bson::deserialize(deserializer)?;
    Ok(normalize_timestamp(&raw))
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct SaveProgressDto {
    pub video_id: String,
    pub playlist_id: String,
    /// Seconds, or legacy "hh:mm:ss" text.
    pub last_timestamp: String,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct CompleteTaskDto {
    pub video_id: String,
    pub playlist_id: String,
    pub task_id: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use mongodb::bson::doc;

    #[test]
    fn legacy_text_timestamp_normalizes_on_read() {
        let doc = doc! {
            "_id": ObjectId::new(),
            "user_id": ObjectId::new(),
            "video_id": "v1",
            "playlist_id": ObjectId::new(),
            "last_timestamp": "01:02:03",
            "completed_tasks": ["t1"],
            "updated_at": DateTime::now(),
        };

        let progress: UserProgress = mongodb::bson::from_document(doc).unwrap();
        assert_eq!(progress.last_timestamp, 3723);
    }

    #[test]
    fn numeric_timestamp_reads_unchanged() {
        let doc = doc! {
            "_id": ObjectId::new(),
            "user_id": ObjectId::new(),
            "video_id": "v1",
            "playlist_id": ObjectId::new(),
            "last_timestamp": 3723_i64,
            "updated_at": DateTime::now(),
        };

        let progress: UserProgress = mongodb::bson::from_document(doc).unwrap();
        assert_eq!(progress.last_timestamp, 3723);
        assert!(progress.completed_tasks.is_empty());
    }
}
