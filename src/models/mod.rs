pub mod course;
pub mod final_assessment;
pub mod notification;
pub mod placement;
pub mod progress;
pub mod question;
pub mod subscription;
pub mod unlock;
pub mod user;

pub use course::*;
pub use final_assessment::*;
pub use notification::*;
pub use placement::*;
pub use progress::*;
pub use question::*;
pub use subscription::*;
pub use unlock::*;
pub use user::*;
