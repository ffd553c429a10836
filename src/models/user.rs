use mongodb::bson::oid::ObjectId;
use serde::{Deserialize, Serialize};

/// User aggregate lives outside this core; these are the fields the
/// scoring and unlock paths read or write (placement outcome bookkeeping,
/// email for notifications, role for the admin guard).
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct User {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    pub name: Option<String>,
    pub email: Option<String>,
    #[serde(default = "default_role")]
    pub role: String,
    pub placement_score: Option<f64>,
    pub placement_level: Option<String>, // "advanced" | "beginner"
    #[serde(default)]
    pub test_taken: bool,
}

fn default_role() -> String {
    "user".to_string()
}
