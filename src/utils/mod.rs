pub mod response;
pub mod timestamp;
pub mod validation;

pub use response::{ApiError, ApiResponse};
