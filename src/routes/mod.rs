pub mod admin;
pub mod course;
pub mod final_assessment;
pub mod placement;
pub mod progress;
pub mod subscription;
