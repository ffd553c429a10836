pub mod code_eval;
pub mod email;
pub mod jwt;
pub mod scoring;
pub mod unlock;

pub use code_eval::{evaluator_from_config, CodeEval, CodeEvaluator};
pub use email::EmailService;
pub use jwt::JwtService;
pub use unlock::UnlockGate;
