use hmac::{Hmac, Mac};
use mongodb::bson::{doc, oid::ObjectId, DateTime};
use mongodb::options::FindOptions;
use rocket::serde::json::Json;
use rocket::State;
use rocket::futures::TryStreamExt;
use rocket_okapi::openapi;
use sha2::Sha256;

use crate::db::DbConn;
use crate::guards::AuthGuard;
use crate::models::{
    plan_details, ActivateSubscriptionDto, CancelSubscriptionDto, CreateSubscriptionDto,
    Subscription, SubscriptionStatus,
};
use crate::services::UnlockGate;
use crate::utils::{ApiError, ApiResponse};

fn parse_rfc3339(raw: &str, field: &str) -> Result<DateTime, ApiError> {
    chrono::DateTime::parse_from_rfc3339(raw)
        .map(|dt| DateTime::from_millis(dt.timestamp_millis()))
        .map_err(|_| ApiError::bad_request(format!("Invalid {}: expected RFC 3339", field)))
}

#[openapi(tag = "Subscription")]
#[post("/subscription/create", data = "<dto>")]
pub async fn create_subscription(
    db: &State<DbConn>,
    auth: AuthGuard,
    dto: Json<CreateSubscriptionDto>,
) -> Result<Json<ApiResponse<serde_json::Value>>, ApiError> {
    let (allowed_courses, plan_name) = plan_details(&dto.plan_id)
        .ok_or_else(|| ApiError::bad_request("Invalid plan. Choose '1', '3' or '10'"))?;

    if dto.amount < 0 {
        return Err(ApiError::bad_request("Amount must not be negative"));
    }

    let start_date = match &dto.start_date {
        Some(raw) => parse_rfc3339(raw, "start_date")?,
        None => DateTime::now(),
    };
    let end_date = match &dto.end_date {
        Some(raw) => parse_rfc3339(raw, "end_date")?,
        None => DateTime::from_millis(start_date.timestamp_millis() + 30 * 24 * 60 * 60 * 1000),
    };

    if end_date <= start_date {
        return Err(ApiError::bad_request("end_date must be after start_date"));
    }

    let now = DateTime::now();
    let subscription = Subscription {
        id: None,
        user_id: auth.user_id,
        plan_id: dto.plan_id.clone(),
        plan_name: plan_name.to_string(),
        amount: dto.amount,
        currency: "USD".to_string(),
        status: SubscriptionStatus::Pending,
        allowed_courses,
        start_date,
        end_date,
        payment_id: None,
        cancelled_at: None,
        cancellation_reason: None,
        notes: None,
        created_at: now,
        updated_at: now,
    };

    let result = db
        .collection::<Subscription>("subscriptions")
        .insert_one(&subscription, None)
        .await
        .map_err(|e| ApiError::internal_error(format!("Failed to create subscription: {}", e)))?;

    let subscription_id = result
        .inserted_id
        .as_object_id()
        .ok_or_else(|| ApiError::internal_error("Invalid subscription ID"))?
        .to_hex();

    info!(
        "Subscription {} created (plan {}, user {})",
        subscription_id, dto.plan_id, auth.user_id
    );

    Ok(Json(ApiResponse::success(serde_json::json!({
        "subscription_id": subscription_id,
        "plan_id": dto.plan_id,
        "plan_name": plan_name,
        "allowed_courses": allowed_courses,
        "status": "pending"
    }))))
}

/// Payment confirmation webhook. The gateway signs
/// "subscription_id|payment_id" with the shared secret; a valid signature
/// flips the subscription from pending to active.
#[openapi(tag = "Subscription")]
#[post("/subscription/activate", data = "<dto>")]
pub async fn activate_subscription(
    db: &State<DbConn>,
    auth: AuthGuard,
    dto: Json<ActivateSubscriptionDto>,
) -> Result<Json<ApiResponse<serde_json::Value>>, ApiError> {
    let secret = crate::config::Config::payment_webhook_secret();
    if secret.is_empty() {
        return Err(ApiError::internal_error("Payment webhook secret not configured"));
    }

    let payload = format!("{}|{}", dto.subscription_id, dto.payment_id);

    let mut mac = Hmac::<Sha256>::new_from_slice(secret.as_bytes())
        .map_err(|_| ApiError::internal_error("Invalid HMAC key"))?;
    mac.update(payload.as_bytes());
    let expected_signature = hex::encode(mac.finalize().into_bytes());

    if expected_signature != dto.signature {
        return Err(ApiError::bad_request("Invalid payment signature"));
    }

    let sub_id = ObjectId::parse_str(&dto.subscription_id)
        .map_err(|_| ApiError::bad_request("Invalid subscription ID"))?;

    let subscription = db
        .collection::<Subscription>("subscriptions")
        .find_one(doc! { "_id": sub_id, "user_id": auth.user_id }, None)
        .await
        .map_err(|e| ApiError::internal_error(e.to_string()))?
        .ok_or_else(|| ApiError::not_found("Subscription not found"))?;

    if !subscription.can_activate() {
        return Err(ApiError::unprocessable(format!(
            "Subscription is {} and cannot be activated",
            subscription.status.as_str()
        )));
    }

    // The filter repeats the pending check so a concurrent cancel cannot
    // be overwritten between the read and this write.
    let result = db
        .collection::<Subscription>("subscriptions")
        .update_one(
            doc! { "_id": sub_id, "user_id": auth.user_id, "status": "pending" },
            doc! {
                "$set": {
                    "status": "active",
                    "payment_id": &dto.payment_id,
                    "updated_at": DateTime::now()
                }
            },
            None,
        )
        .await
        .map_err(|e| ApiError::internal_error(e.to_string()))?;

    if result.matched_count == 0 {
        return Err(ApiError::unprocessable(
            "Subscription is no longer pending and cannot be activated",
        ));
    }

    Ok(Json(ApiResponse::success_with_message(
        "Payment verified successfully".to_string(),
        serde_json::json!({
            "subscription_id": dto.subscription_id,
            "status": "active"
        }),
    )))
}

#[openapi(tag = "Subscription")]
#[post("/subscription/<id>/cancel", data = "<dto>")]
pub async fn cancel_subscription(
    db: &State<DbConn>,
    auth: AuthGuard,
    id: String,
    dto: Json<CancelSubscriptionDto>,
) -> Result<Json<ApiResponse<serde_json::Value>>, ApiError> {
    let sub_id =
        ObjectId::parse_str(&id).map_err(|_| ApiError::bad_request("Invalid subscription ID"))?;

    let result = db
        .collection::<Subscription>("subscriptions")
        .update_one(
            doc! { "_id": sub_id, "user_id": auth.user_id },
            doc! {
                "$set": {
                    "status": "cancelled",
                    "cancelled_at": DateTime::now(),
                    "cancellation_reason": dto.reason.as_deref().unwrap_or("user-requested"),
                    "updated_at": DateTime::now()
                }
            },
            None,
        )
        .await
        .map_err(|e| ApiError::internal_error(e.to_string()))?;

    if result.matched_count == 0 {
        return Err(ApiError::not_found("Subscription not found"));
    }

    Ok(Json(ApiResponse::success_with_message(
        "Subscription cancelled".to_string(),
        serde_json::json!({ "subscription_id": id, "status": "cancelled" }),
    )))
}

#[openapi(tag = "Subscription")]
#[get("/subscription/status")]
pub async fn get_subscription_status(
    db: &State<DbConn>,
    auth: AuthGuard,
) -> Result<Json<ApiResponse<serde_json::Value>>, ApiError> {
    let subscription = UnlockGate::active_subscription(db, auth.user_id).await?;

    let Some(sub) = subscription else {
        return Ok(Json(ApiResponse::success(serde_json::json!({
            "has_active_subscription": false,
            "subscription": null,
            "remaining_courses": 0,
            "used_courses": 0,
            "total_allowed_courses": 0
        }))));
    };

    let used = UnlockGate::unlocked_count(db, auth.user_id).await?;
    let remaining = (sub.allowed_courses - used).max(0);

    Ok(Json(ApiResponse::success(serde_json::json!({
        "has_active_subscription": true,
        "subscription": {
            "id": sub.id.map(|id| id.to_hex()),
            "plan_id": sub.plan_id,
            "plan_name": sub.plan_name,
            "amount": sub.amount,
            "currency": sub.currency,
            "status": sub.status.as_str(),
            "start_date": sub.start_date,
            "end_date": sub.end_date,
            "allowed_courses": sub.allowed_courses,
        },
        "remaining_courses": remaining,
        "used_courses": used,
        "total_allowed_courses": sub.allowed_courses
    }))))
}

#[openapi(tag = "Subscription")]
#[get("/subscription/history")]
pub async fn get_subscription_history(
    db: &State<DbConn>,
    auth: AuthGuard,
) -> Result<Json<ApiResponse<serde_json::Value>>, ApiError> {
    let find_options = FindOptions::builder()
        .sort(doc! { "created_at": -1 })
        .build();

    let subscriptions: Vec<Subscription> = db
        .collection::<Subscription>("subscriptions")
        .find(doc! { "user_id": auth.user_id }, find_options)
        .await
        .map_err(|e| ApiError::internal_error(format!("Database error: {}", e)))?
        .try_collect()
        .await
        .map_err(|e| ApiError::internal_error(format!("Collection error: {}", e)))?;

    let history: Vec<serde_json::Value> = subscriptions
        .iter()
        .map(|sub| {
            serde_json::json!({
                "id": sub.id.map(|id| id.to_hex()),
                "plan_id": sub.plan_id,
                "plan_name": sub.plan_name,
                "amount": sub.amount,
                "currency": sub.currency,
                "status": sub.status.as_str(),
                "start_date": sub.start_date,
                "end_date": sub.end_date,
                "created_at": sub.created_at,
            })
        })
        .collect();

    Ok(Json(ApiResponse::success(serde_json::json!({
        "subscriptions": history
    }))))
}
