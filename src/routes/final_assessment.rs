use std::collections::HashMap;

use mongodb::bson::{doc, oid::ObjectId, DateTime};
use rocket::serde::json::Json;
use rocket::State;
use rocket::futures::TryStreamExt;
use rocket_okapi::openapi;

use crate::db::{is_duplicate_key_error, DbConn};
use crate::guards::AuthGuard;
use crate::models::{
    AssessmentVariant, FinalAssessment, FinalSubmission, Notification, Question, QuestionKind,
    QuestionView, SubmitFinalAssessmentDto, User, UserProgress,
};
use crate::services::code_eval::CodeEval;
use crate::services::scoring::{
    final_answer_correct, score_final, GradeScale, GradedQuestion, Section, SectionWeights,
};
use crate::services::EmailService;
use crate::utils::{ApiError, ApiResponse};

async fn load_assessment(
    db: &DbConn,
    variant: AssessmentVariant,
    course_id: ObjectId,
) -> Result<FinalAssessment, ApiError> {
    db.collection::<FinalAssessment>(variant.collection())
        .find_one(doc! { "course_id": course_id }, None)
        .await
        .map_err(|e| ApiError::internal_error(format!("Database error: {}", e)))?
        .ok_or_else(|| {
            ApiError::not_found(format!("No {} found for this course", variant.label()))
        })
}

async fn load_questions(
    db: &DbConn,
    variant: AssessmentVariant,
    assessment_id: ObjectId,
) -> Result<Vec<Question>, ApiError> {
    let questions: Vec<Question> = db
        .collection::<Question>(variant.question_collection())
        .find(doc! { "parent_id": assessment_id }, None)
        .await
        .map_err(|e| ApiError::internal_error(format!("Database error: {}", e)))?
        .try_collect()
        .await
        .map_err(|e| ApiError::internal_error(format!("Collection error: {}", e)))?;

    Ok(questions)
}

async fn check_assessment(
    db: &DbConn,
    variant: AssessmentVariant,
    course_id: String,
) -> Result<Json<ApiResponse<serde_json::Value>>, ApiError> {
    let course_id = ObjectId::parse_str(&course_id)
        .map_err(|_| ApiError::bad_request("Invalid course ID"))?;

    let assessment = db
        .collection::<FinalAssessment>(variant.collection())
        .find_one(doc! { "course_id": course_id }, None)
        .await
        .map_err(|e| ApiError::internal_error(format!("Database error: {}", e)))?;

    match assessment {
        Some(a) => Ok(Json(ApiResponse::success(serde_json::json!({
            "exists": true,
            "assessment": {
                "id": a.id.map(|id| id.to_hex()),
                "title": a.title,
                "description": a.description,
            }
        })))),
        None => Ok(Json(ApiResponse::success(
            serde_json::json!({ "exists": false }),
        ))),
    }
}

async fn get_assessment_data(
    db: &DbConn,
    variant: AssessmentVariant,
    course_id: String,
) -> Result<Json<ApiResponse<serde_json::Value>>, ApiError> {
    let course_id = ObjectId::parse_str(&course_id)
        .map_err(|_| ApiError::bad_request("Invalid course ID"))?;

    let assessment = load_assessment(db, variant, course_id).await?;
    let assessment_id = assessment
        .id
        .ok_or_else(|| ApiError::internal_error("Assessment missing id"))?;
    let questions = load_questions(db, variant, assessment_id).await?;

    let views: Vec<QuestionView> = questions.iter().map(QuestionView::from).collect();

    Ok(Json(ApiResponse::success(serde_json::json!({
        "assessment": {
            "id": assessment_id.to_hex(),
            "title": assessment.title,
            "description": assessment.description,
        },
        "questions": views,
    }))))
}

/// Shared scoring path for both variants. Grades every question, persists
/// the append-only submission, then fires the result notification.
async fn submit_assessment(
    db: &DbConn,
    auth: &AuthGuard,
    evaluator: &CodeEval,
    variant: AssessmentVariant,
    dto: &SubmitFinalAssessmentDto,
) -> Result<Json<ApiResponse<serde_json::Value>>, ApiError> {
    let course_id = ObjectId::parse_str(&dto.course_id)
        .map_err(|_| ApiError::bad_request("Invalid course ID"))?;

    if let Some(rating) = dto.rating {
        if !(0..=5).contains(&rating) {
            return Err(ApiError::bad_request("Rating must be between 0 and 5"));
        }
    }

    let assessment = load_assessment(db, variant, course_id).await?;
    let assessment_id = assessment
        .id
        .ok_or_else(|| ApiError::internal_error("Assessment missing id"))?;

    let questions = load_questions(db, variant, assessment_id).await?;
    if questions.is_empty() {
        return Err(ApiError::not_found(format!(
            "No questions found for this {}",
            variant.label()
        )));
    }

    // The course must have been started: the submission hangs off the
    // caller's progress row.
    let progress = db
        .collection::<UserProgress>("user_progress")
        .find_one(
            doc! { "user_id": auth.user_id, "playlist_id": course_id },
            None,
        )
        .await
        .map_err(|e| ApiError::internal_error(format!("Database error: {}", e)))?
        .ok_or_else(|| ApiError::not_found("User progress record not found"))?;
    let progress_id = progress
        .id
        .ok_or_else(|| ApiError::internal_error("Progress row missing id"))?;

    let known_ids: Vec<String> = questions
        .iter()
        .filter_map(|q| q.id.map(|id| id.to_hex()))
        .collect();
    for submitted_id in dto
        .mcq_answers
        .keys()
        .chain(dto.tf_answers.keys())
        .chain(dto.code_solutions.keys())
    {
        if !known_ids.iter().any(|id| id == submitted_id) {
            return Err(ApiError::bad_request(format!(
                "Answer references unknown question {}",
                submitted_id
            )));
        }
    }

    let mut graded = Vec::with_capacity(questions.len());
    let mut correct_mcq = HashMap::new();
    let mut correct_tf = HashMap::new();
    let mut ideal_code = HashMap::new();

    for question in &questions {
        let qid = question
            .id
            .ok_or_else(|| ApiError::internal_error("Question missing id"))?
            .to_hex();
        let weight = question.weight();

        match &question.kind {
            QuestionKind::Mcq { correct_answer, .. } => {
                correct_mcq.insert(qid.clone(), correct_answer.clone());
                let answer = dto.mcq_answers.get(&qid).map(String::as_str).unwrap_or("");
                let earned = if final_answer_correct(&question.kind, answer) {
                    weight
                } else {
                    0.0
                };
                graded.push(GradedQuestion {
                    section: Section::Mcq,
                    weight,
                    earned,
                });
            }
            QuestionKind::TrueFalse { correct_answer } => {
                correct_tf.insert(qid.clone(), correct_answer.to_string());
                let answer = dto.tf_answers.get(&qid).map(String::as_str).unwrap_or("");
                let earned = if final_answer_correct(&question.kind, answer) {
                    weight
                } else {
                    0.0
                };
                graded.push(GradedQuestion {
                    section: Section::Tf,
                    weight,
                    earned,
                });
            }
            QuestionKind::Code {
                code_template,
                test_cases,
            } => {
                ideal_code.insert(
                    qid.clone(),
                    code_template
                        .clone()
                        .unwrap_or_else(|| "// Ideal solution not provided".to_string()),
                );

                let Some(code) = dto.code_solutions.get(&qid) else {
                    return Err(ApiError::bad_request(format!(
                        "Missing code solution for question {}",
                        qid
                    )));
                };

                let fraction = evaluator.evaluate(code, test_cases).await;
                graded.push(GradedQuestion {
                    section: Section::Coding,
                    weight,
                    earned: fraction * weight,
                });
            }
        }
    }

    let score = score_final(&graded, &SectionWeights::from_config(), &GradeScale::from_config());

    let submission = FinalSubmission {
        id: None,
        user_progress_id: progress_id,
        parent: HashMap::from([(variant.submission_parent_field().to_string(), assessment_id)]),
        mcq_answers: dto.mcq_answers.clone(),
        tf_answers: dto.tf_answers.clone(),
        code_solutions: dto.code_solutions.clone(),
        coding_marks: score.coding_marks,
        mcq_marks: score.mcq_marks,
        tf_marks: score.tf_marks,
        final_mark: score.final_mark,
        grade: score.grade.clone(),
        rating: dto.rating,
        feedback: dto.feedback.clone(),
        created_at: DateTime::now(),
    };

    let submission_id = match db
        .collection::<FinalSubmission>(variant.submission_collection())
        .insert_one(&submission, None)
        .await
    {
        Ok(result) => result
            .inserted_id
            .as_object_id()
            .ok_or_else(|| ApiError::internal_error("Invalid submission ID"))?,
        Err(e) if is_duplicate_key_error(&e) => {
            return Err(ApiError::unprocessable(format!(
                "A submission already exists for this {}",
                variant.label()
            )));
        }
        Err(e) => {
            error!("Error storing {} submission: {}", variant.label(), e);
            return Err(ApiError::internal_error("Error storing submission"));
        }
    };

    notify_result(db, auth.user_id, &assessment.title, &score.grade, score.final_mark).await;

    Ok(Json(ApiResponse::success_with_message(
        format!(
            "{} submitted and evaluated successfully",
            capitalize(variant.label())
        ),
        serde_json::json!({
            "final_mark": score.final_mark,
            "grade": score.grade,
            "coding_marks": score.coding_marks,
            "mcq_marks": score.mcq_marks,
            "tf_marks": score.tf_marks,
            "total_questions": {
                "mcq": score.total_mcq,
                "tf": score.total_tf,
                "coding": score.total_coding,
            },
            "correct_answers": {
                "mcq": correct_mcq,
                "tf": correct_tf,
            },
            "ideal_code_solutions": ideal_code,
            "submission_id": submission_id.to_hex(),
            "user_progress_id": progress_id.to_hex(),
        }),
    )))
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
        None => String::new(),
    }
}

/// Best-effort result notification: an in-app document plus an email.
/// Neither failure surfaces to the submitter.
async fn notify_result(db: &DbConn, user_id: ObjectId, title: &str, grade: &str, mark: f64) {
    let notification = Notification {
        id: None,
        user_id,
        title: format!("{} graded", title),
        body: format!("You scored {:.2}/100 ({})", mark, grade),
        read: false,
        created_at: DateTime::now(),
    };

    if let Err(e) = db
        .collection::<Notification>("notifications")
        .insert_one(&notification, None)
        .await
    {
        warn!("Failed to store result notification: {}", e);
    }

    let user = db
        .collection::<User>("users")
        .find_one(doc! { "_id": user_id }, None)
        .await
        .ok()
        .flatten();

    if let Some(user) = user {
        if let Some(email) = user.email {
            let name = user.name.unwrap_or_default();
            let title = title.to_string();
            let grade = grade.to_string();
            tokio::spawn(async move {
                EmailService::send_result_email(&email, &name, &title, mark, &grade).await;
            });
        }
    }
}

/* ----------------------------- Final test ----------------------------- */

#[openapi(tag = "FinalTest")]
#[get("/final-test/<course_id>/check")]
pub async fn check_final_test(
    db: &State<DbConn>,
    course_id: String,
) -> Result<Json<ApiResponse<serde_json::Value>>, ApiError> {
    check_assessment(db, AssessmentVariant::Test, course_id).await
}

#[openapi(tag = "FinalTest")]
#[get("/final-test/<course_id>")]
pub async fn get_final_test(
    db: &State<DbConn>,
    course_id: String,
) -> Result<Json<ApiResponse<serde_json::Value>>, ApiError> {
    get_assessment_data(db, AssessmentVariant::Test, course_id).await
}

#[openapi(tag = "FinalTest")]
#[post("/final-test/submit", data = "<dto>")]
pub async fn submit_final_test(
    db: &State<DbConn>,
    auth: AuthGuard,
    evaluator: &State<CodeEval>,
    dto: Json<SubmitFinalAssessmentDto>,
) -> Result<Json<ApiResponse<serde_json::Value>>, ApiError> {
    submit_assessment(db, &auth, evaluator, AssessmentVariant::Test, &dto).await
}

/* ---------------------------- Final project ---------------------------- */

#[openapi(tag = "FinalProject")]
#[get("/final-project/<course_id>/check")]
pub async fn check_final_project(
    db: &State<DbConn>,
    course_id: String,
) -> Result<Json<ApiResponse<serde_json::Value>>, ApiError> {
    check_assessment(db, AssessmentVariant::Project, course_id).await
}

#[openapi(tag = "FinalProject")]
#[get("/final-project/<course_id>")]
pub async fn get_final_project(
    db: &State<DbConn>,
    course_id: String,
) -> Result<Json<ApiResponse<serde_json::Value>>, ApiError> {
    get_assessment_data(db, AssessmentVariant::Project, course_id).await
}

#[openapi(tag = "FinalProject")]
#[post("/final-project/submit", data = "<dto>")]
pub async fn submit_final_project(
    db: &State<DbConn>,
    auth: AuthGuard,
    evaluator: &State<CodeEval>,
    dto: Json<SubmitFinalAssessmentDto>,
) -> Result<Json<ApiResponse<serde_json::Value>>, ApiError> {
    submit_assessment(db, &auth, evaluator, AssessmentVariant::Project, &dto).await
}
