use mongodb::bson::oid::ObjectId;
use serde::{Deserialize, Serialize};

/// Course catalog entry. The catalog itself is managed elsewhere; this
/// core only reads the fields the unlock gate and placement engine need.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Course {
    #[serde(rename = "_id")]
    pub id: ObjectId,
    pub title: String,
    pub year: i32,
    pub semester: i32,
    pub subject: String,
    pub is_free: bool,
    pub price: Option<i64>,
}
