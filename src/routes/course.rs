use mongodb::bson::{doc, oid::ObjectId};
use rocket::serde::json::Json;
use rocket::State;
use rocket_okapi::openapi;
use rocket_okapi::okapi::schemars::JsonSchema;
use serde::Deserialize;

use crate::db::DbConn;
use crate::guards::AuthGuard;
use crate::models::Course;
use crate::services::unlock::{best_score_for_scope, UnlockEligibility, UnlockGate};
use crate::utils::{ApiError, ApiResponse};

#[derive(Debug, Deserialize, JsonSchema)]
pub struct UnlockCourseDto {
    pub course_id: String,
}

async fn load_course(db: &DbConn, course_id: &str) -> Result<Course, ApiError> {
    let id = ObjectId::parse_str(course_id)
        .map_err(|_| ApiError::bad_request("Invalid course ID"))?;

    db.collection::<Course>("courses")
        .find_one(doc! { "_id": id }, None)
        .await
        .map_err(|e| ApiError::internal_error(format!("Database error: {}", e)))?
        .ok_or_else(|| ApiError::not_found("Course not found"))
}

/// Unlock a course for the caller. Rejected outright when no eligibility
/// path (free course, subscription quota, placement pass) applies; a
/// repeat call for an already-unlocked course returns the existing row.
#[openapi(tag = "Course")]
#[post("/course/unlock", data = "<dto>")]
pub async fn unlock_course(
    db: &State<DbConn>,
    auth: AuthGuard,
    dto: Json<UnlockCourseDto>,
) -> Result<Json<ApiResponse<serde_json::Value>>, ApiError> {
    let course = load_course(db, &dto.course_id).await?;
    let course_id = course.id;

    // An existing unlock short-circuits the eligibility check: the gate is
    // idempotent and quota was already spent when the row was created.
    if let Some(existing) = UnlockGate::existing_unlock(db, auth.user_id, course_id).await? {
        return Ok(Json(ApiResponse::success(serde_json::json!({
            "unlocked": true,
            "already_unlocked": true,
            "unlock_reason": existing.unlock_reason,
            "unlocked_at": existing.unlocked_at,
        }))));
    }

    let eligibility = UnlockGate::can_unlock(db, auth.user_id, &course)
        .await?
        .ok_or_else(|| {
            ApiError::forbidden("Course quota exceeded and no placement pass on record")
        })?;

    let placement_score = match eligibility {
        UnlockEligibility::PlacementPass => {
            let passes = UnlockGate::placement_passes(db, auth.user_id).await?;
            best_score_for_scope(&passes, course.year, course.semester, &course.subject)
        }
        _ => None,
    };

    let (unlock, created) = UnlockGate::unlock(
        db,
        auth.user_id,
        course_id,
        eligibility.reason(),
        placement_score,
    )
    .await?;

    info!(
        "Course {} unlocked for user {} ({}, created: {})",
        course_id, auth.user_id, unlock.unlock_reason, created
    );

    Ok(Json(ApiResponse::success(serde_json::json!({
        "unlocked": true,
        "already_unlocked": !created,
        "unlock_reason": unlock.unlock_reason,
        "unlocked_at": unlock.unlocked_at,
    }))))
}

#[openapi(tag = "Course")]
#[get("/course/<course_id>/access")]
pub async fn get_course_access(
    db: &State<DbConn>,
    auth: AuthGuard,
    course_id: String,
) -> Result<Json<ApiResponse<serde_json::Value>>, ApiError> {
    let course = load_course(db, &course_id).await?;

    if let Some(existing) = UnlockGate::existing_unlock(db, auth.user_id, course.id).await? {
        return Ok(Json(ApiResponse::success(serde_json::json!({
            "has_access": true,
            "can_unlock": true,
            "unlock_reason": existing.unlock_reason,
        }))));
    }

    let eligibility = UnlockGate::can_unlock(db, auth.user_id, &course).await?;

    Ok(Json(ApiResponse::success(serde_json::json!({
        "has_access": false,
        "can_unlock": eligibility.is_some(),
    }))))
}
