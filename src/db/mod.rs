use mongodb::{Client, Database, IndexModel};
use mongodb::bson::doc;
use mongodb::options::IndexOptions;
use rocket::fairing::AdHoc;

pub fn init() -> AdHoc {
    AdHoc::on_ignite("MongoDB", |rocket| async {
        match connect().await {
            Ok(database) => {
                if let Err(e) = ensure_indexes(&database).await {
                    error!("✗ Failed to create indexes: {}", e);
                }
                info!("✓ MongoDB connected successfully");
                rocket.manage(database)
            }
            Err(e) => {
                error!("✗ Failed to connect to MongoDB: {}", e);
                rocket
            }
        }
    })
}

async fn connect() -> Result<Database, mongodb::error::Error> {
    let uri = crate::config::Config::mongodb_uri();
    let client = Client::with_uri_str(&uri).await?;

    // Test connection
    client
        .database("admin")
        .run_command(mongodb::bson::doc! {"ping": 1}, None)
        .await?;

    Ok(client.database("eduverse"))
}

/// Unique indexes carry the invariants the request handlers rely on:
/// one unlock per (user, course), one final test/project per course, and
/// one scored submission per (progress, test). Concurrent check-then-insert
/// races resolve to a duplicate-key error on the losing insert.
async fn ensure_indexes(db: &Database) -> Result<(), mongodb::error::Error> {
    let unique = IndexOptions::builder().unique(true).build();

    db.collection::<mongodb::bson::Document>("course_unlocks")
        .create_index(
            IndexModel::builder()
                .keys(doc! { "user_id": 1, "course_id": 1 })
                .options(unique.clone())
                .build(),
            None,
        )
        .await?;

    db.collection::<mongodb::bson::Document>("final_tests")
        .create_index(
            IndexModel::builder()
                .keys(doc! { "course_id": 1 })
                .options(unique.clone())
                .build(),
            None,
        )
        .await?;

    db.collection::<mongodb::bson::Document>("final_projects")
        .create_index(
            IndexModel::builder()
                .keys(doc! { "course_id": 1 })
                .options(unique.clone())
                .build(),
            None,
        )
        .await?;

    db.collection::<mongodb::bson::Document>("final_test_submissions")
        .create_index(
            IndexModel::builder()
                .keys(doc! { "user_progress_id": 1, "final_test_id": 1 })
                .options(unique.clone())
                .build(),
            None,
        )
        .await?;

    db.collection::<mongodb::bson::Document>("final_project_submissions")
        .create_index(
            IndexModel::builder()
                .keys(doc! { "user_progress_id": 1, "final_project_id": 1 })
                .options(unique.clone())
                .build(),
            None,
        )
        .await?;

    db.collection::<mongodb::bson::Document>("user_progress")
        .create_index(
            IndexModel::builder()
                .keys(doc! { "user_id": 1, "video_id": 1, "playlist_id": 1 })
                .options(unique)
                .build(),
            None,
        )
        .await?;

    Ok(())
}

/// True when an insert failed because a unique index already holds the key.
pub fn is_duplicate_key_error(err: &mongodb::error::Error) -> bool {
    use mongodb::error::{ErrorKind, WriteFailure};
    match err.kind.as_ref() {
        ErrorKind::Write(WriteFailure::WriteError(e)) => e.code == 11000,
        ErrorKind::Command(e) => e.code == 11000,
        _ => false,
    }
}

pub type DbConn = Database;

#[cfg(test)]
mod tests {
    use super::*;
    use mongodb::bson::oid::ObjectId;
    use mongodb::IndexModel;

    // Needs a running MongoDB on localhost; run with `cargo test -- --ignored`.
    #[tokio::test]
    #[ignore]
    async fn second_final_test_for_a_course_hits_the_unique_index() {
        let client = Client::with_uri_str("mongodb://localhost:27017")
            .await
            .unwrap();
        let db = client.database("eduverse_test");
        let coll = db.collection::<mongodb::bson::Document>("final_tests");
        coll.drop(None).await.unwrap();
        coll.create_index(
            IndexModel::builder()
                .keys(doc! { "course_id": 1 })
                .options(IndexOptions::builder().unique(true).build())
                .build(),
            None,
        )
        .await
        .unwrap();

        let course_id = ObjectId::new();
        coll.insert_one(doc! { "course_id": course_id, "title": "Final" }, None)
            .await
            .unwrap();

        let err = coll
            .insert_one(doc! { "course_id": course_id, "title": "Final again" }, None)
            .await
            .unwrap_err();
        assert!(is_duplicate_key_error(&err));
    }
}
