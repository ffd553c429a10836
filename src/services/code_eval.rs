use std::sync::Arc;

use log::warn;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::models::question::TestCase;

/// External code-execution collaborator. Returns the fraction of test
/// cases the submission passed, in [0, 1]. Placement scoring awards the
/// point only on 1.0 (all-or-nothing); final scoring takes the fraction.
#[rocket::async_trait]
pub trait CodeEvaluator: Send + Sync {
    async fn evaluate(&self, code: &str, test_cases: &[TestCase]) -> f64;
}

pub type CodeEval = Arc<dyn CodeEvaluator>;

/// Pick the evaluator at launch: the remote runner when one is configured,
/// the structural heuristic otherwise.
pub fn evaluator_from_config() -> CodeEval {
    match crate::config::Config::code_runner_url() {
        Some(url) => Arc::new(RemoteRunner::new(url)),
        None => {
            warn!("No code_runner_url configured; falling back to heuristic code evaluation");
            Arc::new(HeuristicEvaluator)
        }
    }
}

/// -----------------------------
/// Remote runner
/// -----------------------------

#[derive(Serialize)]
struct RunRequest<'a> {
    source: &'a str,
    stdin: &'a str,
}

#[derive(Deserialize)]
struct RunResponse {
    stdout: String,
}

pub struct RemoteRunner {
    base_url: String,
    client: reqwest::Client,
}

impl RemoteRunner {
    pub fn new(base_url: String) -> Self {
        RemoteRunner {
            base_url,
            client: reqwest::Client::new(),
        }
    }

    async fn run_case(&self, code: &str, case: &TestCase) -> bool {
        let url = format!("{}/run", self.base_url.trim_end_matches('/'));

        let response = self
            .client
            .post(&url)
            .json(&RunRequest {
                source: code,
                stdin: &case.input,
            })
            .send()
            .await;

        match response {
            Ok(resp) => match resp.json::<RunResponse>().await {
                Ok(body) => body.stdout.trim() == case.expected_output.trim(),
                Err(e) => {
                    warn!("Code runner returned malformed response: {}", e);
                    false
                }
            },
            Err(e) => {
                warn!("Code runner request failed: {}", e);
                false
            }
        }
    }
}

#[rocket::async_trait]
impl CodeEvaluator for RemoteRunner {
    async fn evaluate(&self, code: &str, test_cases: &[TestCase]) -> f64 {
        if code.trim().is_empty() || test_cases.is_empty() {
            return 0.0;
        }

        let mut passed = 0usize;
        for case in test_cases {
            if self.run_case(code, case).await {
                passed += 1;
            }
        }

        passed as f64 / test_cases.len() as f64
    }
}

/// -----------------------------
/// Heuristic fallback
/// -----------------------------

/// Structural scoring used when no runner is reachable: checks for the
/// shapes a working C++ submission carries and caps the score at 1.0.
pub struct HeuristicEvaluator;

impl HeuristicEvaluator {
    fn structural_score(code: &str) -> f64 {
        if code.trim().is_empty() {
            return 0.0;
        }

        let checks: &[(&str, f64)] = &[
            (r"\bmain\s*\(", 0.2),
            (r"#include\s*<", 0.1),
            (r"using\s+namespace\s+std", 0.1),
            (r"cout\s*<", 0.1),
            (r"return\s+0", 0.1),
            (r"\bclass\s+\w+", 0.2),
            (r"\bpublic\s*:", 0.1),
            (r"\bprivate\s*:", 0.1),
            (r"\w+\s+\w+\s*\([^)]*\)\s*\{", 0.1),
        ];

        let mut score = 0.0;
        for (pattern, weight) in checks {
            if Regex::new(pattern).unwrap().is_match(code) {
                score += weight;
            }
        }

        score.min(1.0)
    }
}

#[rocket::async_trait]
impl CodeEvaluator for HeuristicEvaluator {
    async fn evaluate(&self, code: &str, _test_cases: &[TestCase]) -> f64 {
        Self::structural_score(code)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_code_scores_zero() {
        assert_eq!(HeuristicEvaluator::structural_score(""), 0.0);
        assert_eq!(HeuristicEvaluator::structural_score("   \n  "), 0.0);
    }

    #[test]
    fn complete_program_caps_at_one() {
        let code = r#"
            #include <iostream>
            using namespace std;
            class Greeter {
            public:
                void hello() { cout << "hi"; }
            private:
                int n;
            };
            int main() {
                Greeter g;
                g.hello();
                return 0;
            }
        "#;
        assert_eq!(HeuristicEvaluator::structural_score(code), 1.0);
    }

    #[test]
    fn partial_program_scores_between() {
        let score = HeuristicEvaluator::structural_score("int main() { return 0; }");
        assert!(score > 0.0 && score < 1.0);
    }
}
