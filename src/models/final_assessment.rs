use mongodb::bson::{oid::ObjectId, DateTime};
use serde::{Deserialize, Serialize};
use rocket_okapi::okapi::schemars::JsonSchema;
use std::collections::HashMap;

/// Final test and final project share one document shape; each is 1:1
/// with a course (unique index on course_id).
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct FinalAssessment {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    pub course_id: ObjectId,
    pub title: String,
    pub description: Option<String>,
    pub created_at: DateTime,
}

/// The two assessment variants. They differ only in the owning collection
/// names and in whether questions carry explicit marks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssessmentVariant {
    Test,
    Project,
}

impl AssessmentVariant {
    pub fn collection(&self) -> &'static str {
        match self {
            AssessmentVariant::Test => "final_tests",
            AssessmentVariant::Project => "final_projects",
        }
    }

    pub fn question_collection(&self) -> &'static str {
        match self {
            AssessmentVariant::Test => "final_test_questions",
            AssessmentVariant::Project => "final_project_questions",
        }
    }

    pub fn submission_collection(&self) -> &'static str {
        match self {
            AssessmentVariant::Test => "final_test_submissions",
            AssessmentVariant::Project => "final_project_submissions",
        }
    }

    /// Field linking a submission back to its parent; part of the unique
    /// (progress, assessment) submission index.
    pub fn submission_parent_field(&self) -> &'static str {
        match self {
            AssessmentVariant::Test => "final_test_id",
            AssessmentVariant::Project => "final_project_id",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            AssessmentVariant::Test => "final test",
            AssessmentVariant::Project => "final project",
        }
    }

    /// Project questions carry an explicit mark in [0.5, 10]; test
    /// questions weigh 1.0 implicitly.
    pub fn requires_mark(&self) -> bool {
        matches!(self, AssessmentVariant::Project)
    }
}

/// Stored submission: raw answers plus the four derived marks and the
/// grade, written once and never updated.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct FinalSubmission {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    pub user_progress_id: ObjectId,
    #[serde(flatten)]
    pub parent: HashMap<String, ObjectId>,
    pub mcq_answers: HashMap<String, String>,
    pub tf_answers: HashMap<String, String>,
    pub code_solutions: HashMap<String, String>,
    pub coding_marks: f64,
    pub mcq_marks: f64,
    pub tf_marks: f64,
    pub final_mark: f64,
    pub grade: String,
    pub rating: Option<i32>,
    pub feedback: Option<String>,
    pub created_at: DateTime,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct SubmitFinalAssessmentDto {
    pub course_id: String,
    #[serde(default)]
    pub mcq_answers: HashMap<String, String>,
    #[serde(default)]
    pub tf_answers: HashMap<String, String>,
    #[serde(default)]
    pub code_solutions: HashMap<String, String>,
    pub rating: Option<i32>,
    pub feedback: Option<String>,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct CreateFinalAssessmentDto {
    pub course_id: String,
    pub title: String,
    pub description: Option<String>,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct CreateFinalQuestionDto {
    pub question: String,
    pub difficulty: Option<String>,
    #[serde(rename = "type")]
    pub question_type: String, // "mcq" | "true_false" | "code"
    pub options: Option<Vec<String>>,
    pub correct_answer: Option<String>,
    pub code_template: Option<String>,
    pub test_cases: Option<Vec<crate::models::question::TestCase>>,
    pub mark: Option<f64>,
}
