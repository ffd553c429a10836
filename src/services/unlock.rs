use std::collections::HashMap;

use mongodb::bson::{doc, oid::ObjectId, DateTime};
use rocket::futures::TryStreamExt;

use crate::db::{is_duplicate_key_error, DbConn};
use crate::models::{
    Course, CourseUnlock, PlacementResult, PlacementTest, Subscription,
    UNLOCK_REASON_PLACEMENT, UNLOCK_REASON_SUBSCRIPTION,
};
use crate::utils::ApiError;

/// Why a user may unlock a course. Checked in order: free courses need no
/// entitlement, then subscription quota, then a placement pass scoped to
/// the course's (year, semester, subject).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnlockEligibility {
    FreeCourse,
    SubscriptionQuota,
    PlacementPass,
}

impl UnlockEligibility {
    pub fn reason(&self) -> &'static str {
        match self {
            UnlockEligibility::FreeCourse | UnlockEligibility::SubscriptionQuota => {
                UNLOCK_REASON_SUBSCRIPTION
            }
            UnlockEligibility::PlacementPass => UNLOCK_REASON_PLACEMENT,
        }
    }
}

/// Recomputed from the unlock-row count on every check; never stored.
pub fn remaining_quota(allowed_courses: i64, unlocked_count: i64) -> i64 {
    (allowed_courses - unlocked_count).max(0)
}

/// A placement result joined to the scope of the test it was scored
/// against. The gate only honors passes whose scope matches the course.
#[derive(Debug, Clone, PartialEq)]
pub struct PlacementPass {
    pub year: i32,
    pub semester: i32,
    pub subject: String,
    pub percentage: f64,
}

/// Best percentage among the passes scored against a test with exactly
/// this (year, semester, subject). A pass for any other scope carries no
/// entitlement here.
pub fn best_score_for_scope(
    passes: &[PlacementPass],
    year: i32,
    semester: i32,
    subject: &str,
) -> Option<f64> {
    passes
        .iter()
        .filter(|p| p.year == year && p.semester == semester && p.subject == subject)
        .map(|p| p.percentage)
        .fold(None, |best: Option<f64>, s| {
            Some(best.map_or(s, |b| b.max(s)))
        })
}

/// Pure eligibility decision over already-loaded state. `placement_score`
/// must already be scope-matched to the course (see
/// [`best_score_for_scope`]); a global score is never consulted.
pub fn evaluate_eligibility(
    course_is_free: bool,
    active_subscription: Option<(i64, i64)>, // (allowed_courses, unlocked_count)
    placement_score: Option<f64>,
    pass_threshold: f64,
) -> Option<UnlockEligibility> {
    if course_is_free {
        return Some(UnlockEligibility::FreeCourse);
    }

    if let Some((allowed, used)) = active_subscription {
        if remaining_quota(allowed, used) > 0 {
            return Some(UnlockEligibility::SubscriptionQuota);
        }
    }

    if let Some(score) = placement_score {
        if score >= pass_threshold {
            return Some(UnlockEligibility::PlacementPass);
        }
    }

    None
}

/// The Course Unlock Gate. Each (user, course) pair moves Locked ->
/// Unlocked exactly once; the unique index on the pair makes the
/// check-then-insert race-safe.
pub struct UnlockGate;

impl UnlockGate {
    pub async fn active_subscription(
        db: &DbConn,
        user_id: ObjectId,
    ) -> Result<Option<Subscription>, ApiError> {
        let sub = db
            .collection::<Subscription>("subscriptions")
            .find_one(
                doc! {
                    "user_id": user_id,
                    "status": "active",
                    "end_date": { "$gt": DateTime::now() },
                },
                None,
            )
            .await
            .map_err(|e| ApiError::internal_error(format!("Database error: {}", e)))?;

        Ok(sub)
    }

    pub async fn unlocked_count(db: &DbConn, user_id: ObjectId) -> Result<i64, ApiError> {
        let count = db
            .collection::<CourseUnlock>("course_unlocks")
            .count_documents(doc! { "user_id": user_id }, None)
            .await
            .map_err(|e| ApiError::internal_error(format!("Count error: {}", e)))?;

        Ok(count as i64)
    }

    pub async fn existing_unlock(
        db: &DbConn,
        user_id: ObjectId,
        course_id: ObjectId,
    ) -> Result<Option<CourseUnlock>, ApiError> {
        db.collection::<CourseUnlock>("course_unlocks")
            .find_one(doc! { "user_id": user_id, "course_id": course_id }, None)
            .await
            .map_err(|e| ApiError::internal_error(format!("Database error: {}", e)))
    }

    /// The caller's placement results, each joined to the scope of the
    /// test it was scored against.
    pub async fn placement_passes(
        db: &DbConn,
        user_id: ObjectId,
    ) -> Result<Vec<PlacementPass>, ApiError> {
        let results: Vec<PlacementResult> = db
            .collection::<PlacementResult>("results")
            .find(doc! { "user_id": user_id, "test_type": "placement" }, None)
            .await
            .map_err(|e| ApiError::internal_error(format!("Database error: {}", e)))?
            .try_collect()
            .await
            .map_err(|e| ApiError::internal_error(format!("Collection error: {}", e)))?;

        if results.is_empty() {
            return Ok(Vec::new());
        }

        let test_ids: Vec<ObjectId> = results.iter().map(|r| r.test_id).collect();
        let tests: Vec<PlacementTest> = db
            .collection::<PlacementTest>("placement_tests")
            .find(doc! { "_id": { "$in": test_ids } }, None)
            .await
            .map_err(|e| ApiError::internal_error(format!("Database error: {}", e)))?
            .try_collect()
            .await
            .map_err(|e| ApiError::internal_error(format!("Collection error: {}", e)))?;

        let by_id: HashMap<ObjectId, &PlacementTest> =
            tests.iter().filter_map(|t| t.id.map(|id| (id, t))).collect();

        Ok(results
            .iter()
            .filter_map(|r| {
                by_id.get(&r.test_id).map(|t| PlacementPass {
                    year: t.year,
                    semester: t.semester,
                    subject: t.subject.clone(),
                    percentage: r.percentage,
                })
            })
            .collect())
    }

    /// Load everything the eligibility decision needs and evaluate it.
    /// Placement entitlement is restricted to tests scoped to this
    /// course's (year, semester, subject).
    pub async fn can_unlock(
        db: &DbConn,
        user_id: ObjectId,
        course: &Course,
    ) -> Result<Option<UnlockEligibility>, ApiError> {
        let active = match Self::active_subscription(db, user_id).await? {
            Some(sub) => {
                let used = Self::unlocked_count(db, user_id).await?;
                Some((sub.allowed_courses, used))
            }
            None => None,
        };

        let passes = Self::placement_passes(db, user_id).await?;
        let placement_score =
            best_score_for_scope(&passes, course.year, course.semester, &course.subject);

        Ok(evaluate_eligibility(
            course.is_free,
            active,
            placement_score,
            crate::config::Config::placement_pass_percentage(),
        ))
    }

    /// Idempotent unlock: an existing row for the pair is returned
    /// unchanged; a lost insert race re-reads the winner. Returns the row
    /// and whether this call created it.
    pub async fn unlock(
        db: &DbConn,
        user_id: ObjectId,
        course_id: ObjectId,
        reason: &str,
        placement_score: Option<f64>,
    ) -> Result<(CourseUnlock, bool), ApiError> {
        if let Some(existing) = Self::existing_unlock(db, user_id, course_id).await? {
            return Ok((existing, false));
        }

        let unlock = CourseUnlock {
            id: None,
            user_id,
            course_id,
            unlock_reason: reason.to_string(),
            placement_score,
            unlocked_at: DateTime::now(),
        };

        match db
            .collection::<CourseUnlock>("course_unlocks")
            .insert_one(&unlock, None)
            .await
        {
            Ok(result) => {
                let mut created = unlock;
                created.id = result.inserted_id.as_object_id();
                Ok((created, true))
            }
            Err(e) if is_duplicate_key_error(&e) => {
                let winner = Self::existing_unlock(db, user_id, course_id)
                    .await?
                    .ok_or_else(|| ApiError::internal_error("Unlock row vanished after race"))?;
                Ok((winner, false))
            }
            Err(e) => Err(ApiError::internal_error(format!(
                "Failed to create unlock: {}",
                e
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn free_course_is_always_unlockable() {
        assert_eq!(
            evaluate_eligibility(true, None, None, 70.0),
            Some(UnlockEligibility::FreeCourse)
        );
    }

    #[test]
    fn paid_course_without_entitlement_is_locked() {
        assert_eq!(evaluate_eligibility(false, None, None, 70.0), None);
    }

    #[test]
    fn subscription_quota_unlocks_until_exhausted() {
        // allowed 3, used 2 -> one left
        assert_eq!(remaining_quota(3, 2), 1);
        assert_eq!(
            evaluate_eligibility(false, Some((3, 2)), None, 70.0),
            Some(UnlockEligibility::SubscriptionQuota)
        );

        // allowed 3, used 3 -> exhausted, and never negative
        assert_eq!(remaining_quota(3, 3), 0);
        assert_eq!(remaining_quota(3, 4), 0);
        assert_eq!(evaluate_eligibility(false, Some((3, 3)), None, 70.0), None);
    }

    #[test]
    fn placement_pass_unlocks_at_threshold() {
        assert_eq!(
            evaluate_eligibility(false, None, Some(70.0), 70.0),
            Some(UnlockEligibility::PlacementPass)
        );
        assert_eq!(evaluate_eligibility(false, None, Some(69.9), 70.0), None);
    }

    #[test]
    fn exhausted_quota_falls_back_to_placement() {
        assert_eq!(
            evaluate_eligibility(false, Some((1, 1)), Some(85.0), 70.0),
            Some(UnlockEligibility::PlacementPass)
        );
    }

    #[test]
    fn eligibility_maps_to_unlock_reason() {
        assert_eq!(UnlockEligibility::FreeCourse.reason(), "subscription");
        assert_eq!(UnlockEligibility::SubscriptionQuota.reason(), "subscription");
        assert_eq!(UnlockEligibility::PlacementPass.reason(), "placement-pass");
    }

    fn pass(year: i32, semester: i32, subject: &str, percentage: f64) -> PlacementPass {
        PlacementPass {
            year,
            semester,
            subject: subject.to_string(),
            percentage,
        }
    }

    #[test]
    fn placement_pass_only_counts_for_its_scope() {
        let passes = vec![pass(2024, 1, "math", 100.0)];

        assert_eq!(best_score_for_scope(&passes, 2024, 1, "math"), Some(100.0));
        assert_eq!(best_score_for_scope(&passes, 2024, 2, "math"), None);
        assert_eq!(best_score_for_scope(&passes, 2025, 1, "math"), None);
        assert_eq!(best_score_for_scope(&passes, 2024, 1, "physics"), None);

        // A perfect pass elsewhere grants nothing for this course.
        let scoped = best_score_for_scope(&passes, 2024, 1, "physics");
        assert_eq!(evaluate_eligibility(false, None, scoped, 70.0), None);
    }

    #[test]
    fn best_scoped_score_takes_the_highest_attempt() {
        let passes = vec![
            pass(2024, 1, "math", 55.0),
            pass(2024, 1, "math", 82.5),
            pass(2024, 2, "math", 99.0),
        ];

        assert_eq!(best_score_for_scope(&passes, 2024, 1, "math"), Some(82.5));
    }

    // Needs a running MongoDB on localhost; run with `cargo test -- --ignored`.
    #[tokio::test]
    #[ignore]
    async fn repeated_unlock_returns_the_existing_row() {
        use mongodb::options::IndexOptions;
        use mongodb::IndexModel;

        let client = mongodb::Client::with_uri_str("mongodb://localhost:27017")
            .await
            .unwrap();
        let db = client.database("eduverse_test");
        db.collection::<mongodb::bson::Document>("course_unlocks")
            .drop(None)
            .await
            .unwrap();
        db.collection::<mongodb::bson::Document>("course_unlocks")
            .create_index(
                IndexModel::builder()
                    .keys(doc! { "user_id": 1, "course_id": 1 })
                    .options(IndexOptions::builder().unique(true).build())
                    .build(),
                None,
            )
            .await
            .unwrap();

        let user_id = ObjectId::new();
        let course_id = ObjectId::new();

        let (first, created) =
            UnlockGate::unlock(&db, user_id, course_id, UNLOCK_REASON_SUBSCRIPTION, None)
                .await
                .unwrap();
        assert!(created);

        let (second, created_again) =
            UnlockGate::unlock(&db, user_id, course_id, UNLOCK_REASON_PLACEMENT, Some(90.0))
                .await
                .unwrap();
        assert!(!created_again);
        assert_eq!(second.id, first.id);
        assert_eq!(second.unlock_reason, UNLOCK_REASON_SUBSCRIPTION);
    }
}
