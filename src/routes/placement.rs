use mongodb::bson::{doc, oid::ObjectId, DateTime};
use rocket::serde::json::Json;
use rocket::State;
use rocket::futures::TryStreamExt;
use rocket_okapi::openapi;

use crate::db::DbConn;
use crate::guards::AuthGuard;
use crate::models::{
    CheckPlacementCompletionDto, PlacementResult, PlacementTest, Question, QuestionKind,
    QuestionView, StartPlacementTestDto, SubmitPlacementTestDto, User,
    UNLOCK_REASON_PLACEMENT,
};
use crate::services::code_eval::CodeEval;
use crate::services::scoring::{placement_answer_correct, score_placement, AnswerResult};
use crate::services::UnlockGate;
use crate::utils::{ApiError, ApiResponse};

async fn load_questions(db: &DbConn, test_id: ObjectId) -> Result<Vec<Question>, ApiError> {
    let questions: Vec<Question> = db
        .collection::<Question>("placement_questions")
        .find(doc! { "parent_id": test_id }, None)
        .await
        .map_err(|e| ApiError::internal_error(format!("Database error: {}", e)))?
        .try_collect()
        .await
        .map_err(|e| ApiError::internal_error(format!("Collection error: {}", e)))?;

    Ok(questions)
}

fn test_payload(test: &PlacementTest, questions: &[Question]) -> serde_json::Value {
    let views: Vec<QuestionView> = questions.iter().map(QuestionView::from).collect();

    serde_json::json!({
        "test_id": test.id.map(|id| id.to_hex()),
        "title": test.title,
        "description": test.description,
        "questions": views,
    })
}

#[openapi(tag = "Placement")]
#[post("/placement-test/start", data = "<dto>")]
pub async fn start_placement_test(
    db: &State<DbConn>,
    _auth: AuthGuard,
    dto: Json<StartPlacementTestDto>,
) -> Result<Json<ApiResponse<serde_json::Value>>, ApiError> {
    let course_id = ObjectId::parse_str(&dto.course_id)
        .map_err(|_| ApiError::bad_request("Invalid course ID"))?;

    let test = db
        .collection::<PlacementTest>("placement_tests")
        .find_one(doc! { "course_id": course_id }, None)
        .await
        .map_err(|e| ApiError::internal_error(format!("Database error: {}", e)))?
        .ok_or_else(|| ApiError::not_found("No placement test found for this course"))?;

    let test_id = test
        .id
        .ok_or_else(|| ApiError::internal_error("Placement test missing id"))?;
    let questions = load_questions(db, test_id).await?;

    if questions.is_empty() {
        return Err(ApiError::not_found("This placement test has no questions"));
    }

    Ok(Json(ApiResponse::success(test_payload(&test, &questions))))
}

/// Locate a placement test by its scope instead of a course id.
#[openapi(tag = "Placement")]
#[get("/placement-test?<year>&<semester>&<subject>")]
pub async fn get_placement_test_by_scope(
    db: &State<DbConn>,
    _auth: AuthGuard,
    year: i32,
    semester: i32,
    subject: String,
) -> Result<Json<ApiResponse<serde_json::Value>>, ApiError> {
    let test = db
        .collection::<PlacementTest>("placement_tests")
        .find_one(
            doc! { "year": year, "semester": semester, "subject": &subject },
            None,
        )
        .await
        .map_err(|e| ApiError::internal_error(format!("Database error: {}", e)))?
        .ok_or_else(|| ApiError::not_found("No placement test found for this scope"))?;

    let test_id = test
        .id
        .ok_or_else(|| ApiError::internal_error("Placement test missing id"))?;
    let questions = load_questions(db, test_id).await?;

    if questions.is_empty() {
        return Err(ApiError::not_found("This placement test has no questions"));
    }

    Ok(Json(ApiResponse::success(test_payload(&test, &questions))))
}

#[openapi(tag = "Placement")]
#[post("/placement-test/check-completion", data = "<dto>")]
pub async fn check_placement_completion(
    db: &State<DbConn>,
    auth: AuthGuard,
    dto: Json<CheckPlacementCompletionDto>,
) -> Result<Json<ApiResponse<serde_json::Value>>, ApiError> {
    ObjectId::parse_str(&dto.course_id).map_err(|_| ApiError::bad_request("Invalid course ID"))?;

    let user = db
        .collection::<User>("users")
        .find_one(doc! { "_id": auth.user_id }, None)
        .await
        .map_err(|e| ApiError::internal_error(format!("Database error: {}", e)))?;

    let (completed, score) = user
        .map(|u| (u.test_taken, u.placement_score))
        .unwrap_or((false, None));

    Ok(Json(ApiResponse::success(serde_json::json!({
        "completed": completed,
        "placement_score": score,
    }))))
}

#[openapi(tag = "Placement")]
#[post("/placement-test/submit", data = "<dto>")]
pub async fn submit_placement_test(
    db: &State<DbConn>,
    auth: AuthGuard,
    evaluator: &State<CodeEval>,
    dto: Json<SubmitPlacementTestDto>,
) -> Result<Json<ApiResponse<serde_json::Value>>, ApiError> {
    let test_id = ObjectId::parse_str(&dto.test_id)
        .map_err(|_| ApiError::bad_request("Invalid test ID"))?;

    let test = db
        .collection::<PlacementTest>("placement_tests")
        .find_one(doc! { "_id": test_id }, None)
        .await
        .map_err(|e| ApiError::internal_error(format!("Database error: {}", e)))?
        .ok_or_else(|| ApiError::not_found("Placement test not found"))?;

    if dto.answers.is_empty() {
        return Err(ApiError::bad_request("No answers submitted"));
    }

    let questions = load_questions(db, test_id).await?;

    let mut results = Vec::with_capacity(dto.answers.len());
    for answer in &dto.answers {
        let question_id = ObjectId::parse_str(&answer.question_id)
            .map_err(|_| ApiError::bad_request("Invalid question ID"))?;
        let question = questions
            .iter()
            .find(|q| q.id == Some(question_id))
            .ok_or_else(|| {
                ApiError::bad_request(format!(
                    "Question {} does not belong to this test",
                    answer.question_id
                ))
            })?;

        // One point per question; code questions pass only when every
        // test case passes.
        let is_correct = match &question.kind {
            QuestionKind::Code { test_cases, .. } => {
                evaluator.evaluate(&answer.answer, test_cases).await >= 1.0
            }
            kind => placement_answer_correct(kind, &answer.answer),
        };

        results.push(AnswerResult {
            question_id: answer.question_id.clone(),
            is_correct,
        });
    }

    let threshold = crate::config::Config::placement_pass_percentage();
    let outcome = score_placement(&results, threshold);

    let result_row = PlacementResult {
        id: None,
        user_id: auth.user_id,
        test_id,
        score: outcome.score,
        total_questions: outcome.total_questions,
        percentage: outcome.percentage,
        test_type: "placement".to_string(),
        created_at: DateTime::now(),
    };

    db.collection::<PlacementResult>("results")
        .insert_one(&result_row, None)
        .await
        .map_err(|e| ApiError::internal_error(format!("Failed to store result: {}", e)))?;

    let placement_level = if outcome.passed { "advanced" } else { "beginner" };
    db.collection::<User>("users")
        .update_one(
            doc! { "_id": auth.user_id },
            doc! {
                "$set": {
                    "placement_score": outcome.percentage,
                    "placement_level": placement_level,
                    "test_taken": true
                }
            },
            None,
        )
        .await
        .map_err(|e| ApiError::internal_error(format!("Failed to record outcome: {}", e)))?;

    let mut course_unlocked = false;
    if outcome.passed {
        let (_, _created) = UnlockGate::unlock(
            db,
            auth.user_id,
            test.course_id,
            UNLOCK_REASON_PLACEMENT,
            Some(outcome.percentage),
        )
        .await?;
        course_unlocked = true;

        info!(
            "User {} passed placement test {} with {:.2}%",
            auth.user_id, test_id, outcome.percentage
        );
    }

    Ok(Json(ApiResponse::success_with_message(
        "Test submitted successfully!".to_string(),
        serde_json::json!({
            "score": outcome.score,
            "total_questions": outcome.total_questions,
            "percentage": outcome.percentage,
            "passed": outcome.passed,
            "results": results,
            "course_unlocked": course_unlocked,
        }),
    )))
}
