use rocket::figment::{Figment, providers::{Env, Format, Toml}};
use rocket::Config as RocketConfig;
use std::env;

pub struct Config;

impl Config {
    fn figment() -> Figment {
        let profile = env::var("ROCKET_PROFILE").unwrap_or_else(|_| "development".to_string());

        Figment::from(RocketConfig::default())
            .merge(Toml::file("Rocket.toml").nested())
            .select(&profile)
            .merge(Env::prefixed("ROCKET_").split("_"))
    }

    pub fn jwt_secret() -> String {
        Self::figment()
            .extract_inner("jwt_secret")
            .unwrap_or_else(|_| "default-secret".to_string())
    }

    pub fn jwt_expiry() -> i64 {
        Self::figment()
            .extract_inner("jwt_expiry")
            .unwrap_or(900)
    }

    pub fn mongodb_uri() -> String {
        Self::figment()
            .extract_inner("mongodb_uri")
            .unwrap_or_else(|_| "mongodb://localhost:27017/eduverse".to_string())
    }

    pub fn mail_host() -> String {
        Self::figment()
            .extract_inner("mail_host")
            .unwrap_or_else(|_| "smtp.gmail.com".to_string())
    }

    pub fn mail_user() -> String {
        Self::figment()
            .extract_inner("mail_user")
            .unwrap_or_default()
    }

    pub fn mail_password() -> String {
        Self::figment()
            .extract_inner("mail_password")
            .unwrap_or_default()
    }

    pub fn mail_from() -> String {
        Self::figment()
            .extract_inner("mail_from")
            .unwrap_or_else(|_| "EduVerse <noreply@eduverse.app>".to_string())
    }

    /// Shared secret for verifying payment-confirmation webhook signatures.
    pub fn payment_webhook_secret() -> String {
        Self::figment()
            .extract_inner("payment_webhook_secret")
            .unwrap_or_default()
    }

    /// Base URL of the external code execution service. When unset, code
    /// answers fall back to the structural heuristic evaluator.
    pub fn code_runner_url() -> Option<String> {
        Self::figment()
            .extract_inner("code_runner_url")
            .ok()
    }

    /// Minimum placement-test percentage that counts as a pass.
    pub fn placement_pass_percentage() -> f64 {
        Self::figment()
            .extract_inner("placement_pass_percentage")
            .unwrap_or(70.0)
    }

    /// Section weights for final assessments. They split the 100-point
    /// scale across question types; courses with a different mix override
    /// them in Rocket.toml.
    pub fn final_mcq_weight() -> f64 {
        Self::figment()
            .extract_inner("final_mcq_weight")
            .unwrap_or(30.0)
    }

    pub fn final_tf_weight() -> f64 {
        Self::figment()
            .extract_inner("final_tf_weight")
            .unwrap_or(20.0)
    }

    pub fn final_coding_weight() -> f64 {
        Self::figment()
            .extract_inner("final_coding_weight")
            .unwrap_or(50.0)
    }

    /// Letter-grade cutoffs on the 100-point final-mark scale.
    pub fn grade_a_cutoff() -> f64 {
        Self::figment()
            .extract_inner("grade_a_cutoff")
            .unwrap_or(90.0)
    }

    pub fn grade_b_cutoff() -> f64 {
        Self::figment()
            .extract_inner("grade_b_cutoff")
            .unwrap_or(70.0)
    }

    pub fn grade_c_cutoff() -> f64 {
        Self::figment()
            .extract_inner("grade_c_cutoff")
            .unwrap_or(50.0)
    }

    pub fn is_development() -> bool {
        let profile = env::var("ROCKET_PROFILE").unwrap_or_else(|_| "development".to_string());
        profile == "development"
    }
}
