use mongodb::bson::{doc, oid::ObjectId, DateTime};
use mongodb::options::FindOptions;
use rocket::serde::json::Json;
use rocket::State;
use rocket::futures::TryStreamExt;
use rocket_okapi::openapi;
use chrono::Datelike;

use crate::db::{is_duplicate_key_error, DbConn};
use crate::guards::AdminGuard;
use crate::models::{
    plan_details, AssessmentVariant, CreateFinalAssessmentDto, CreateFinalQuestionDto,
    Difficulty, FinalAssessment, Question, QuestionKind, Subscription, UpdateSubscriptionDto,
    User,
};
use crate::utils::validation::validate_question_mark;
use crate::utils::{ApiError, ApiResponse};

/* ------------------------- Subscription admin ------------------------- */

async fn subscription_json(db: &DbConn, sub: &Subscription) -> serde_json::Value {
    let user = db
        .collection::<User>("users")
        .find_one(doc! { "_id": sub.user_id }, None)
        .await
        .ok()
        .flatten();

    let (user_name, user_email) = match user {
        Some(u) => (
            u.name.unwrap_or_else(|| "Unknown User".to_string()),
            u.email.unwrap_or_else(|| "No Email".to_string()),
        ),
        None => ("Unknown User".to_string(), "No Email".to_string()),
    };

    let (allowed, plan_name) = plan_details(&sub.plan_id).unwrap_or((0, "Unknown Plan"));

    serde_json::json!({
        "id": sub.id.map(|id| id.to_hex()),
        "user_id": sub.user_id.to_hex(),
        "user_name": user_name,
        "user_email": user_email,
        "plan_name": plan_name,
        "plan_details": format!("Access to {} course{}", allowed, if allowed == 1 { "" } else { "s" }),
        "amount": sub.amount,
        "status": sub.status.as_str(),
        "start_date": sub.start_date,
        "end_date": sub.end_date,
        "created_at": sub.created_at,
        "updated_at": sub.updated_at,
        "notes": sub.notes,
    })
}

#[openapi(tag = "Admin")]
#[get("/admin/subscriptions")]
pub async fn list_subscriptions(
    db: &State<DbConn>,
    _admin: AdminGuard,
) -> Result<Json<serde_json::Value>, ApiError> {
    let find_options = FindOptions::builder()
        .sort(doc! { "created_at": -1 })
        .build();

    let subscriptions: Vec<Subscription> = db
        .collection::<Subscription>("subscriptions")
        .find(None, find_options)
        .await
        .map_err(|e| ApiError::internal_error(format!("Failed to fetch subscriptions: {}", e)))?
        .try_collect()
        .await
        .map_err(|e| ApiError::internal_error(format!("Collection error: {}", e)))?;

    let mut rows = Vec::with_capacity(subscriptions.len());
    for sub in &subscriptions {
        rows.push(subscription_json(db, sub).await);
    }

    Ok(Json(serde_json::json!({
        "success": true,
        "subscriptions": rows
    })))
}

#[openapi(tag = "Admin")]
#[get("/admin/subscriptions/statistics")]
pub async fn subscription_statistics(
    db: &State<DbConn>,
    _admin: AdminGuard,
) -> Result<Json<serde_json::Value>, ApiError> {
    let collection = db.collection::<Subscription>("subscriptions");

    let mut stats = serde_json::Map::new();
    let total = collection
        .count_documents(None, None)
        .await
        .map_err(|e| ApiError::internal_error(format!("Count error: {}", e)))?;
    stats.insert("total_subscriptions".into(), total.into());

    for status in ["active", "expired", "cancelled", "pending"] {
        let count = collection
            .count_documents(doc! { "status": status }, None)
            .await
            .map_err(|e| ApiError::internal_error(format!("Count error: {}", e)))?;
        stats.insert(format!("{}_subscriptions", status), count.into());
    }

    // Revenue comes from active subscriptions only.
    let now = chrono::Utc::now();
    let month_start = now
        .date_naive()
        .with_day(1)
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|dt| DateTime::from_millis(dt.and_utc().timestamp_millis()))
        .unwrap_or_else(DateTime::now);

    let mut total_revenue = 0i64;
    let mut monthly_revenue = 0i64;
    let mut cursor = collection
        .find(doc! { "status": "active" }, None)
        .await
        .map_err(|e| ApiError::internal_error(format!("Database error: {}", e)))?;
    while cursor
        .advance()
        .await
        .map_err(|e| ApiError::internal_error(format!("Cursor error: {}", e)))?
    {
        let sub = cursor
            .deserialize_current()
            .map_err(|e| ApiError::internal_error(format!("Deserialization error: {}", e)))?;
        total_revenue += sub.amount;
        if sub.created_at >= month_start {
            monthly_revenue += sub.amount;
        }
    }

    stats.insert("total_revenue".into(), total_revenue.into());
    stats.insert("monthly_revenue".into(), monthly_revenue.into());

    Ok(Json(serde_json::json!({
        "success": true,
        "statistics": stats
    })))
}

#[openapi(tag = "Admin")]
#[get("/admin/subscriptions/<id>")]
pub async fn get_subscription(
    db: &State<DbConn>,
    _admin: AdminGuard,
    id: String,
) -> Result<Json<serde_json::Value>, ApiError> {
    let sub_id =
        ObjectId::parse_str(&id).map_err(|_| ApiError::bad_request("Invalid subscription ID"))?;

    let sub = db
        .collection::<Subscription>("subscriptions")
        .find_one(doc! { "_id": sub_id }, None)
        .await
        .map_err(|e| ApiError::internal_error(format!("Database error: {}", e)))?
        .ok_or_else(|| ApiError::not_found("Subscription not found"))?;

    Ok(Json(serde_json::json!({
        "success": true,
        "subscription": subscription_json(db, &sub).await
    })))
}

#[openapi(tag = "Admin")]
#[put("/admin/subscriptions/<id>", data = "<dto>")]
pub async fn update_subscription(
    db: &State<DbConn>,
    _admin: AdminGuard,
    id: String,
    dto: Json<UpdateSubscriptionDto>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let sub_id =
        ObjectId::parse_str(&id).map_err(|_| ApiError::bad_request("Invalid subscription ID"))?;

    if !["active", "expired", "cancelled", "pending"].contains(&dto.status.as_str()) {
        return Err(ApiError::bad_request(
            "Status must be one of: active, expired, cancelled, pending",
        ));
    }
    if dto.amount < 0 {
        return Err(ApiError::bad_request("Amount must not be negative"));
    }

    let start = chrono::DateTime::parse_from_rfc3339(&dto.start_date)
        .map_err(|_| ApiError::bad_request("Invalid start_date: expected RFC 3339"))?;
    let end = chrono::DateTime::parse_from_rfc3339(&dto.end_date)
        .map_err(|_| ApiError::bad_request("Invalid end_date: expected RFC 3339"))?;
    if end <= start {
        return Err(ApiError::bad_request("end_date must be after start_date"));
    }

    let result = db
        .collection::<Subscription>("subscriptions")
        .update_one(
            doc! { "_id": sub_id },
            doc! {
                "$set": {
                    "status": &dto.status,
                    "start_date": DateTime::from_millis(start.timestamp_millis()),
                    "end_date": DateTime::from_millis(end.timestamp_millis()),
                    "amount": dto.amount,
                    "notes": dto.notes.as_deref(),
                    "updated_at": DateTime::now(),
                }
            },
            None,
        )
        .await
        .map_err(|e| ApiError::internal_error(format!("Failed to update subscription: {}", e)))?;

    if result.matched_count == 0 {
        return Err(ApiError::not_found("Subscription not found"));
    }

    let updated = db
        .collection::<Subscription>("subscriptions")
        .find_one(doc! { "_id": sub_id }, None)
        .await
        .map_err(|e| ApiError::internal_error(format!("Database error: {}", e)))?
        .ok_or_else(|| ApiError::not_found("Subscription not found"))?;

    Ok(Json(serde_json::json!({
        "success": true,
        "message": "Subscription updated successfully",
        "subscription": subscription_json(db, &updated).await
    })))
}

#[openapi(tag = "Admin")]
#[delete("/admin/subscriptions/<id>")]
pub async fn delete_subscription(
    db: &State<DbConn>,
    _admin: AdminGuard,
    id: String,
) -> Result<Json<serde_json::Value>, ApiError> {
    let sub_id =
        ObjectId::parse_str(&id).map_err(|_| ApiError::bad_request("Invalid subscription ID"))?;

    let result = db
        .collection::<Subscription>("subscriptions")
        .delete_one(doc! { "_id": sub_id }, None)
        .await
        .map_err(|e| ApiError::internal_error(format!("Failed to delete subscription: {}", e)))?;

    if result.deleted_count == 0 {
        return Err(ApiError::not_found("Subscription not found"));
    }

    Ok(Json(serde_json::json!({
        "success": true,
        "message": "Subscription deleted successfully"
    })))
}

/// The scheduled expiry check, exposed as an admin action: flips active
/// subscriptions past their end date to expired.
#[openapi(tag = "Admin")]
#[post("/admin/subscriptions/expire-overdue")]
pub async fn expire_overdue_subscriptions(
    db: &State<DbConn>,
    _admin: AdminGuard,
) -> Result<Json<serde_json::Value>, ApiError> {
    let result = db
        .collection::<Subscription>("subscriptions")
        .update_many(
            doc! { "status": "active", "end_date": { "$lt": DateTime::now() } },
            doc! { "$set": { "status": "expired", "updated_at": DateTime::now() } },
            None,
        )
        .await
        .map_err(|e| ApiError::internal_error(format!("Failed to expire subscriptions: {}", e)))?;

    info!("Expired {} overdue subscriptions", result.modified_count);

    Ok(Json(serde_json::json!({
        "success": true,
        "expired_count": result.modified_count
    })))
}

/* ------------------------ Final assessment admin ------------------------ */

async fn create_assessment(
    db: &DbConn,
    variant: AssessmentVariant,
    dto: &CreateFinalAssessmentDto,
) -> Result<Json<ApiResponse<serde_json::Value>>, ApiError> {
    let course_id = ObjectId::parse_str(&dto.course_id)
        .map_err(|_| ApiError::bad_request("Invalid course ID"))?;

    if dto.title.trim().is_empty() {
        return Err(ApiError::bad_request("Title is required"));
    }

    // One final test/project per course. The unique index on course_id
    // backs this up under concurrent creates.
    let existing = db
        .collection::<FinalAssessment>(variant.collection())
        .find_one(doc! { "course_id": course_id }, None)
        .await
        .map_err(|e| ApiError::internal_error(format!("Database error: {}", e)))?;
    if existing.is_some() {
        return Err(ApiError::unprocessable(format!(
            "A {} already exists for this course",
            variant.label()
        )));
    }

    let assessment = FinalAssessment {
        id: None,
        course_id,
        title: dto.title.clone(),
        description: dto.description.clone(),
        created_at: DateTime::now(),
    };

    let result = match db
        .collection::<FinalAssessment>(variant.collection())
        .insert_one(&assessment, None)
        .await
    {
        Ok(r) => r,
        Err(e) if is_duplicate_key_error(&e) => {
            return Err(ApiError::unprocessable(format!(
                "A {} already exists for this course",
                variant.label()
            )));
        }
        Err(e) => {
            return Err(ApiError::internal_error(format!(
                "Failed to create {}: {}",
                variant.label(),
                e
            )));
        }
    };

    Ok(Json(ApiResponse::success(serde_json::json!({
        "id": result.inserted_id.as_object_id().map(|id| id.to_hex()),
        "course_id": dto.course_id,
        "title": dto.title,
        "description": dto.description,
    }))))
}

fn build_question(
    variant: AssessmentVariant,
    parent_id: ObjectId,
    dto: &CreateFinalQuestionDto,
) -> Result<Question, ApiError> {
    let kind = match dto.question_type.as_str() {
        "mcq" => {
            let options = dto
                .options
                .clone()
                .filter(|o| !o.is_empty())
                .ok_or_else(|| ApiError::bad_request("MCQ questions require options"))?;
            let correct = dto
                .correct_answer
                .clone()
                .ok_or_else(|| ApiError::bad_request("MCQ questions require a correct answer"))?;
            if !options.contains(&correct) {
                return Err(ApiError::bad_request("Correct answer must be one of the options"));
            }
            QuestionKind::Mcq {
                options,
                correct_answer: correct,
            }
        }
        "true_false" => {
            let correct = dto
                .correct_answer
                .as_deref()
                .map(str::trim)
                .ok_or_else(|| {
                    ApiError::bad_request("True/false questions require a correct answer")
                })?;
            let correct_answer = match correct.to_ascii_lowercase().as_str() {
                "true" => true,
                "false" => false,
                _ => {
                    return Err(ApiError::bad_request(
                        "True/false answer must be 'true' or 'false'",
                    ))
                }
            };
            QuestionKind::TrueFalse { correct_answer }
        }
        "code" => {
            let test_cases = dto
                .test_cases
                .clone()
                .filter(|t| !t.is_empty())
                .ok_or_else(|| ApiError::bad_request("Code questions require test cases"))?;
            QuestionKind::Code {
                code_template: dto.code_template.clone(),
                test_cases,
            }
        }
        other => {
            return Err(ApiError::bad_request(format!(
                "Unknown question type '{}'",
                other
            )));
        }
    };

    let mark = if variant.requires_mark() {
        let mark = dto
            .mark
            .ok_or_else(|| ApiError::bad_request("Project questions require a mark"))?;
        if !validate_question_mark(mark) {
            return Err(ApiError::bad_request("Mark must be between 0.5 and 10"));
        }
        Some(mark)
    } else {
        None
    };

    let difficulty = match dto.difficulty.as_deref().unwrap_or("medium") {
        "easy" => Difficulty::Easy,
        "medium" => Difficulty::Medium,
        "hard" => Difficulty::Hard,
        other => {
            return Err(ApiError::bad_request(format!(
                "Unknown difficulty '{}'",
                other
            )));
        }
    };

    Ok(Question {
        id: None,
        parent_id,
        question: dto.question.clone(),
        difficulty,
        kind,
        mark,
    })
}

/// Admin-facing question JSON, answers included.
fn question_json(q: &Question) -> serde_json::Value {
    let mut value = serde_json::json!({
        "id": q.id.map(|id| id.to_hex()),
        "parent_id": q.parent_id.to_hex(),
        "question": q.question,
        "difficulty": q.difficulty,
        "type": q.kind.type_name(),
        "mark": q.mark,
    });

    match &q.kind {
        QuestionKind::Mcq {
            options,
            correct_answer,
        } => {
            value["options"] = serde_json::json!(options);
            value["correct_answer"] = serde_json::json!(correct_answer);
        }
        QuestionKind::TrueFalse { correct_answer } => {
            value["correct_answer"] = serde_json::json!(correct_answer);
        }
        QuestionKind::Code {
            code_template,
            test_cases,
        } => {
            value["code_template"] = serde_json::json!(code_template);
            value["test_cases"] = serde_json::json!(test_cases);
        }
    }

    value
}

async fn create_question(
    db: &DbConn,
    variant: AssessmentVariant,
    assessment_id: String,
    dto: &CreateFinalQuestionDto,
) -> Result<Json<ApiResponse<serde_json::Value>>, ApiError> {
    let parent_id = ObjectId::parse_str(&assessment_id)
        .map_err(|_| ApiError::bad_request("Invalid assessment ID"))?;

    db.collection::<FinalAssessment>(variant.collection())
        .find_one(doc! { "_id": parent_id }, None)
        .await
        .map_err(|e| ApiError::internal_error(format!("Database error: {}", e)))?
        .ok_or_else(|| ApiError::not_found(format!("{} not found", variant.label())))?;

    let mut question = build_question(variant, parent_id, dto)?;

    let result = db
        .collection::<Question>(variant.question_collection())
        .insert_one(&question, None)
        .await
        .map_err(|e| ApiError::internal_error(format!("Failed to create question: {}", e)))?;
    question.id = result.inserted_id.as_object_id();

    Ok(Json(ApiResponse::success(question_json(&question))))
}

async fn list_questions(
    db: &DbConn,
    variant: AssessmentVariant,
    assessment_id: String,
) -> Result<Json<ApiResponse<serde_json::Value>>, ApiError> {
    let parent_id = ObjectId::parse_str(&assessment_id)
        .map_err(|_| ApiError::bad_request("Invalid assessment ID"))?;

    let questions: Vec<Question> = db
        .collection::<Question>(variant.question_collection())
        .find(doc! { "parent_id": parent_id }, None)
        .await
        .map_err(|e| ApiError::internal_error(format!("Database error: {}", e)))?
        .try_collect()
        .await
        .map_err(|e| ApiError::internal_error(format!("Collection error: {}", e)))?;

    let rows: Vec<serde_json::Value> = questions.iter().map(question_json).collect();

    Ok(Json(ApiResponse::success(serde_json::json!(rows))))
}

async fn delete_question(
    db: &DbConn,
    variant: AssessmentVariant,
    question_id: String,
) -> Result<Json<ApiResponse<serde_json::Value>>, ApiError> {
    let qid = ObjectId::parse_str(&question_id)
        .map_err(|_| ApiError::bad_request("Invalid question ID"))?;

    let result = db
        .collection::<Question>(variant.question_collection())
        .delete_one(doc! { "_id": qid }, None)
        .await
        .map_err(|e| ApiError::internal_error(format!("Failed to delete question: {}", e)))?;

    if result.deleted_count == 0 {
        return Err(ApiError::not_found("Question not found"));
    }

    Ok(Json(ApiResponse::success(serde_json::json!({ "deleted": true }))))
}

#[openapi(tag = "Admin")]
#[post("/admin/final-tests", data = "<dto>")]
pub async fn create_final_test(
    db: &State<DbConn>,
    _admin: AdminGuard,
    dto: Json<CreateFinalAssessmentDto>,
) -> Result<Json<ApiResponse<serde_json::Value>>, ApiError> {
    create_assessment(db, AssessmentVariant::Test, &dto).await
}

#[openapi(tag = "Admin")]
#[post("/admin/final-tests/<assessment_id>/questions", data = "<dto>")]
pub async fn create_final_test_question(
    db: &State<DbConn>,
    _admin: AdminGuard,
    assessment_id: String,
    dto: Json<CreateFinalQuestionDto>,
) -> Result<Json<ApiResponse<serde_json::Value>>, ApiError> {
    create_question(db, AssessmentVariant::Test, assessment_id, &dto).await
}

#[openapi(tag = "Admin")]
#[get("/admin/final-tests/<assessment_id>/questions")]
pub async fn list_final_test_questions(
    db: &State<DbConn>,
    _admin: AdminGuard,
    assessment_id: String,
) -> Result<Json<ApiResponse<serde_json::Value>>, ApiError> {
    list_questions(db, AssessmentVariant::Test, assessment_id).await
}

#[openapi(tag = "Admin")]
#[delete("/admin/final-tests/questions/<question_id>")]
pub async fn delete_final_test_question(
    db: &State<DbConn>,
    _admin: AdminGuard,
    question_id: String,
) -> Result<Json<ApiResponse<serde_json::Value>>, ApiError> {
    delete_question(db, AssessmentVariant::Test, question_id).await
}

#[openapi(tag = "Admin")]
#[post("/admin/final-projects", data = "<dto>")]
pub async fn create_final_project(
    db: &State<DbConn>,
    _admin: AdminGuard,
    dto: Json<CreateFinalAssessmentDto>,
) -> Result<Json<ApiResponse<serde_json::Value>>, ApiError> {
    create_assessment(db, AssessmentVariant::Project, &dto).await
}

#[openapi(tag = "Admin")]
#[post("/admin/final-projects/<assessment_id>/questions", data = "<dto>")]
pub async fn create_final_project_question(
    db: &State<DbConn>,
    _admin: AdminGuard,
    assessment_id: String,
    dto: Json<CreateFinalQuestionDto>,
) -> Result<Json<ApiResponse<serde_json::Value>>, ApiError> {
    create_question(db, AssessmentVariant::Project, assessment_id, &dto).await
}

#[openapi(tag = "Admin")]
#[get("/admin/final-projects/<assessment_id>/questions")]
pub async fn list_final_project_questions(
    db: &State<DbConn>,
    _admin: AdminGuard,
    assessment_id: String,
) -> Result<Json<ApiResponse<serde_json::Value>>, ApiError> {
    list_questions(db, AssessmentVariant::Project, assessment_id).await
}

#[openapi(tag = "Admin")]
#[delete("/admin/final-projects/questions/<question_id>")]
pub async fn delete_final_project_question(
    db: &State<DbConn>,
    _admin: AdminGuard,
    question_id: String,
) -> Result<Json<ApiResponse<serde_json::Value>>, ApiError> {
    delete_question(db, AssessmentVariant::Project, question_id).await
}
