use mongodb::bson::{oid::ObjectId, DateTime};
use serde::{Deserialize, Serialize};

/// One document per (user, course) a user may access. Append-only and
/// guarded by a unique index on the pair; quota is recomputed from the
/// count of these rows rather than kept as a counter.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct CourseUnlock {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    pub user_id: ObjectId,
    pub course_id: ObjectId,
    pub unlock_reason: String, // "subscription" | "placement-pass"
    pub placement_score: Option<f64>,
    pub unlocked_at: DateTime,
}

pub const UNLOCK_REASON_SUBSCRIPTION: &str = "subscription";
pub const UNLOCK_REASON_PLACEMENT: &str = "placement-pass";
