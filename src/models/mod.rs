pub mod ai_types;
pub mod calendar;
pub mod interval;
pub mod meeting;
pub mod preference;
