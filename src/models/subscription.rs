use mongodb::bson::{oid::ObjectId, DateTime};
use serde::{Deserialize, Serialize};
use rocket_okapi::okapi::schemars::JsonSchema;

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum SubscriptionStatus {
    Pending,
    Active,
    Cancelled,
    Expired,
}

impl SubscriptionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SubscriptionStatus::Pending => "pending",
            SubscriptionStatus::Active => "active",
            SubscriptionStatus::Cancelled => "cancelled",
            SubscriptionStatus::Expired => "expired",
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Subscription {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    pub user_id: ObjectId,
    pub plan_id: String, // "1", "3", "10"
    pub plan_name: String,
    /// Integer minor units (cents).
    pub amount: i64,
    pub currency: String,
    pub status: SubscriptionStatus,
    pub allowed_courses: i64,
    pub start_date: DateTime,
    pub end_date: DateTime,
    pub payment_id: Option<String>,
    pub cancelled_at: Option<DateTime>,
    pub cancellation_reason: Option<String>,
    pub notes: Option<String>,
    pub created_at: DateTime,
    pub updated_at: DateTime,
}

impl Subscription {
    /// "Active" is always derived, never solely trusted from storage: the
    /// stored status must be Active and the end date still in the future.
    pub fn is_active_at(&self, now: DateTime) -> bool {
        self.status == SubscriptionStatus::Active && now < self.end_date
    }

    pub fn is_active(&self) -> bool {
        self.is_active_at(DateTime::now())
    }

    /// The lifecycle only moves pending -> active. A cancelled or expired
    /// subscription stays that way even if its payment is confirmed again.
    pub fn can_activate(&self) -> bool {
        self.status == SubscriptionStatus::Pending
    }
}

/// Plan catalog: plan id -> (allowed course count, display name).
pub fn plan_details(plan_id: &str) -> Option<(i64, &'static str)> {
    match plan_id {
        "1" => Some((1, "Single Course Plan")),
        "3" => Some((3, "Three Courses Plan")),
        "10" => Some((10, "Ten Courses Plan")),
        _ => None,
    }
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct CreateSubscriptionDto {
    pub plan_id: String,
    pub amount: i64,
    /// RFC 3339; defaults to now.
    pub start_date: Option<String>,
    /// RFC 3339; defaults to start + 30 days.
    pub end_date: Option<String>,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct ActivateSubscriptionDto {
    pub subscription_id: String,
    pub payment_id: String,
    /// HMAC-SHA256 of "subscription_id|payment_id", hex-encoded.
    pub signature: String,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct CancelSubscriptionDto {
    pub reason: Option<String>,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct UpdateSubscriptionDto {
    pub status: String,
    pub start_date: String,
    pub end_date: String,
    pub amount: i64,
    pub notes: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn subscription(status: SubscriptionStatus, end_millis: i64) -> Subscription {
        Subscription {
            id: Some(ObjectId::new()),
            user_id: ObjectId::new(),
            plan_id: "3".into(),
            plan_name: "Three Courses Plan".into(),
            amount: 2999,
            currency: "USD".into(),
            status,
            allowed_courses: 3,
            start_date: DateTime::from_millis(0),
            end_date: DateTime::from_millis(end_millis),
            payment_id: None,
            cancelled_at: None,
            cancellation_reason: None,
            notes: None,
            created_at: DateTime::from_millis(0),
            updated_at: DateTime::from_millis(0),
        }
    }

    #[test]
    fn active_requires_status_and_future_end_date() {
        let sub = subscription(SubscriptionStatus::Active, 1_000_000);

        assert!(sub.is_active_at(DateTime::from_millis(999_999)));
        assert!(!sub.is_active_at(DateTime::from_millis(1_000_000)));
        assert!(!sub.is_active_at(DateTime::from_millis(1_000_001)));
    }

    #[test]
    fn non_active_statuses_are_never_active() {
        for status in [
            SubscriptionStatus::Pending,
            SubscriptionStatus::Cancelled,
            SubscriptionStatus::Expired,
        ] {
            let sub = subscription(status, i64::MAX);
            assert!(!sub.is_active_at(DateTime::from_millis(0)), "{:?}", status);
        }
    }

    #[test]
    fn only_pending_subscriptions_can_activate() {
        assert!(subscription(SubscriptionStatus::Pending, i64::MAX).can_activate());

        // Re-confirming payment must not resurrect a dead subscription,
        // even with the end date still in the future.
        for status in [
            SubscriptionStatus::Active,
            SubscriptionStatus::Cancelled,
            SubscriptionStatus::Expired,
        ] {
            assert!(!subscription(status, i64::MAX).can_activate(), "{:?}", status);
        }
    }

    #[test]
    fn plan_catalog_mapping() {
        assert_eq!(plan_details("1"), Some((1, "Single Course Plan")));
        assert_eq!(plan_details("3"), Some((3, "Three Courses Plan")));
        assert_eq!(plan_details("10"), Some((10, "Ten Courses Plan")));
        assert_eq!(plan_details("5"), None);
    }
}
