pub mod error;
pub mod http;
pub mod models;
pub mod services;
pub mod utils;

pub use error::{AppError, AppResult};
pub use services::meeting_scheduler::MeetingScheduler;
