#[macro_use]
extern crate rocket;

mod config;
mod db;
mod guards;
mod models;
mod routes;
mod services;
mod utils;

use dotenvy::dotenv;
use rocket::fairing::{Fairing, Info, Kind};
use rocket::http::Header;
use rocket::{Build, Request, Response, Rocket};
use rocket_okapi::swagger_ui::{SwaggerUIConfig, make_swagger_ui};

/* ----------------------------- CORS ----------------------------- */

pub struct CORS;

#[rocket::async_trait]
impl Fairing for CORS {
    fn info(&self) -> Info {
        Info {
            name: "CORS",
            kind: Kind::Response,
        }
    }

    async fn on_response<'r>(&self, request: &'r Request<'_>, response: &mut Response<'r>) {
        if let Some(origin) = request.headers().get_one("Origin") {
            response.set_header(Header::new("Access-Control-Allow-Origin", origin));
        }

        response.set_header(Header::new(
            "Access-Control-Allow-Methods",
            "GET, POST, PUT, DELETE, OPTIONS",
        ));

        response.set_header(Header::new(
            "Access-Control-Allow-Headers",
            "Content-Type, Authorization",
        ));

        response.set_header(Header::new("Access-Control-Allow-Credentials", "true"));
    }
}

/* ----------------------------- OPTIONS ----------------------------- */

#[options("/<_..>")]
fn options_handler() {}

/* ----------------------------- ERRORS ----------------------------- */

#[catch(404)]
fn not_found() -> rocket::serde::json::Value {
    rocket::serde::json::json!({
        "success": false,
        "message": "Resource not found (check /api/v1 prefix)"
    })
}

#[catch(500)]
fn internal_error() -> rocket::serde::json::Value {
    rocket::serde::json::json!({
        "success": false,
        "message": "Internal server error"
    })
}

/* ----------------------------- SWAGGER ----------------------------- */

fn swagger_config() -> SwaggerUIConfig {
    SwaggerUIConfig {
        url: "/openapi.json".to_string(),
        ..Default::default()
    }
}

/* ----------------------------- LAUNCH ----------------------------- */

#[launch]
fn rocket() -> Rocket<Build> {
    dotenv().ok();
    env_logger::init();

    println!("🚀 EduVerse API running");
    println!("📚 Swagger UI → http://localhost:8000/api/docs");

    rocket::build()
        .attach(db::init())
        .attach(CORS)
        .manage(services::evaluator_from_config())
        .mount("/", routes![options_handler])
        .mount(
            "/api/v1",
            routes![
                // Subscriptions
                routes::subscription::create_subscription,
                routes::subscription::activate_subscription,
                routes::subscription::cancel_subscription,
                routes::subscription::get_subscription_status,
                routes::subscription::get_subscription_history,
                // Course access
                routes::course::unlock_course,
                routes::course::get_course_access,
                // Placement tests
                routes::placement::start_placement_test,
                routes::placement::get_placement_test_by_scope,
                routes::placement::check_placement_completion,
                routes::placement::submit_placement_test,
                // Final tests
                routes::final_assessment::check_final_test,
                routes::final_assessment::get_final_test,
                routes::final_assessment::submit_final_test,
                // Final projects
                routes::final_assessment::check_final_project,
                routes::final_assessment::get_final_project,
                routes::final_assessment::submit_final_project,
                // Video progress
                routes::progress::save_progress,
                routes::progress::get_progress,
                routes::progress::complete_task,
                // Admin Routes - Subscriptions
                routes::admin::list_subscriptions,
                routes::admin::subscription_statistics,
                routes::admin::get_subscription,
                routes::admin::update_subscription,
                routes::admin::delete_subscription,
                routes::admin::expire_overdue_subscriptions,
                // Admin Routes - Final Tests
                routes::admin::create_final_test,
                routes::admin::create_final_test_question,
                routes::admin::list_final_test_questions,
                routes::admin::delete_final_test_question,
                // Admin Routes - Final Projects
                routes::admin::create_final_project,
                routes::admin::create_final_project_question,
                routes::admin::list_final_project_questions,
                routes::admin::delete_final_project_question,
            ],
        )
        .mount("/api/docs", make_swagger_ui(&swagger_config()))
        .register("/", catchers![not_found, internal_error])
}
