//! HTTP surface of the scheduling service.
//!
//! Handlers only translate between JSON and the scheduler; the pipeline in
//! `services::meeting_scheduler` never sees axum types.

pub mod handlers;
pub mod router;
pub mod state;

pub use router::create_router;
pub use state::AppState;
