use mongodb::bson::{oid::ObjectId, DateTime};
use serde::{Deserialize, Serialize};
use rocket_okapi::okapi::schemars::JsonSchema;

/// A placement test is scoped to one course and that course's
/// (year, semester, subject) triple, so it can be located either way.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct PlacementTest {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    pub course_id: ObjectId,
    pub year: i32,
    pub semester: i32,
    pub subject: String,
    pub title: String,
    pub description: Option<String>,
}

/// Result row appended once per placement submission.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct PlacementResult {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    pub user_id: ObjectId,
    pub test_id: ObjectId,
    pub score: i64,
    pub total_questions: i64,
    pub percentage: f64,
    pub test_type: String, // "placement"
    pub created_at: DateTime,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct StartPlacementTestDto {
    pub course_id: String,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct PlacementAnswerDto {
    pub question_id: String,
    pub answer: String,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct SubmitPlacementTestDto {
    pub test_id: String,
    pub answers: Vec<PlacementAnswerDto>,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct CheckPlacementCompletionDto {
    pub course_id: String,
}
