use mongodb::bson::{doc, oid::ObjectId, DateTime};
use rocket::serde::json::Json;
use rocket::State;
use rocket_okapi::openapi;

use crate::db::DbConn;
use crate::guards::AuthGuard;
use crate::models::{CompleteTaskDto, SaveProgressDto, UserProgress};
use crate::utils::timestamp::parse_timestamp_str;
use crate::utils::{ApiError, ApiResponse};

fn progress_json(p: &UserProgress) -> serde_json::Value {
    serde_json::json!({
        "id": p.id.map(|id| id.to_hex()),
        "user_id": p.user_id.to_hex(),
        "video_id": p.video_id,
        "playlist_id": p.playlist_id.to_hex(),
        "last_timestamp": p.last_timestamp,
        "completed_tasks": p.completed_tasks,
    })
}

/// Save or update watch progress. The timestamp arrives as seconds or as
/// legacy "hh:mm:ss" text; it is stored normalized to seconds.
#[openapi(tag = "Progress")]
#[post("/user-progress", data = "<dto>")]
pub async fn save_progress(
    db: &State<DbConn>,
    auth: AuthGuard,
    dto: Json<SaveProgressDto>,
) -> Result<Json<ApiResponse<serde_json::Value>>, ApiError> {
    let playlist_id = ObjectId::parse_str(&dto.playlist_id)
        .map_err(|_| ApiError::bad_request("Invalid playlist ID"))?;

    let seconds = parse_timestamp_str(&dto.last_timestamp);

    db.collection::<UserProgress>("user_progress")
        .update_one(
            doc! {
                "user_id": auth.user_id,
                "video_id": &dto.video_id,
                "playlist_id": playlist_id,
            },
            doc! {
                "$set": { "last_timestamp": seconds, "updated_at": DateTime::now() },
                "$setOnInsert": { "completed_tasks": [] },
            },
            mongodb::options::UpdateOptions::builder().upsert(true).build(),
        )
        .await
        .map_err(|e| ApiError::internal_error(format!("Error saving progress: {}", e)))?;

    let progress = db
        .collection::<UserProgress>("user_progress")
        .find_one(
            doc! {
                "user_id": auth.user_id,
                "video_id": &dto.video_id,
                "playlist_id": playlist_id,
            },
            None,
        )
        .await
        .map_err(|e| ApiError::internal_error(format!("Database error: {}", e)))?
        .ok_or_else(|| ApiError::internal_error("Progress row vanished after upsert"))?;

    Ok(Json(ApiResponse::success_with_message(
        "Progress saved".to_string(),
        progress_json(&progress),
    )))
}

#[openapi(tag = "Progress")]
#[get("/user-progress?<video_id>&<playlist_id>")]
pub async fn get_progress(
    db: &State<DbConn>,
    auth: AuthGuard,
    video_id: String,
    playlist_id: String,
) -> Result<Json<ApiResponse<serde_json::Value>>, ApiError> {
    let playlist_oid = ObjectId::parse_str(&playlist_id)
        .map_err(|_| ApiError::bad_request("Invalid playlist ID"))?;

    let progress = db
        .collection::<UserProgress>("user_progress")
        .find_one(
            doc! {
                "user_id": auth.user_id,
                "video_id": &video_id,
                "playlist_id": playlist_oid,
            },
            None,
        )
        .await
        .map_err(|e| ApiError::internal_error(format!("Database error: {}", e)))?;

    match progress {
        Some(p) => Ok(Json(ApiResponse::success(progress_json(&p)))),
        None => Ok(Json(ApiResponse::success_with_message(
            "No progress found".to_string(),
            serde_json::json!({
                "id": null,
                "user_id": auth.user_id.to_hex(),
                "video_id": video_id,
                "playlist_id": playlist_id,
                "last_timestamp": 0,
                "completed_tasks": [],
            }),
        ))),
    }
}

/// Idempotent: marking an already-completed task changes nothing.
#[openapi(tag = "Progress")]
#[post("/user-progress/tasks", data = "<dto>")]
pub async fn complete_task(
    db: &State<DbConn>,
    auth: AuthGuard,
    dto: Json<CompleteTaskDto>,
) -> Result<Json<ApiResponse<serde_json::Value>>, ApiError> {
    let playlist_id = ObjectId::parse_str(&dto.playlist_id)
        .map_err(|_| ApiError::bad_request("Invalid playlist ID"))?;

    db.collection::<UserProgress>("user_progress")
        .update_one(
            doc! {
                "user_id": auth.user_id,
                "video_id": &dto.video_id,
                "playlist_id": playlist_id,
            },
            doc! {
                "$addToSet": { "completed_tasks": &dto.task_id },
                "$set": { "updated_at": DateTime::now() },
                "$setOnInsert": { "last_timestamp": 0_i64 },
            },
            mongodb::options::UpdateOptions::builder().upsert(true).build(),
        )
        .await
        .map_err(|e| ApiError::internal_error(format!("Error marking task: {}", e)))?;

    let progress = db
        .collection::<UserProgress>("user_progress")
        .find_one(
            doc! {
                "user_id": auth.user_id,
                "video_id": &dto.video_id,
                "playlist_id": playlist_id,
            },
            None,
        )
        .await
        .map_err(|e| ApiError::internal_error(format!("Database error: {}", e)))?
        .ok_or_else(|| ApiError::internal_error("Progress row vanished after upsert"))?;

    Ok(Json(ApiResponse::success_with_message(
        "Task marked as completed".to_string(),
        progress_json(&progress),
    )))
}
