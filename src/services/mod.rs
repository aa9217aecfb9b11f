pub mod ai_service;
pub mod calendar_service;
pub mod constraint_parser;
pub mod free_slots;
pub mod interval_merger;
pub mod meeting_scheduler;
pub mod prompt_templates;
pub mod request_log;
pub mod schedule_utils;
pub mod settings_service;
pub mod slot_filter;
pub mod slot_scorer;
pub mod slot_selector;
pub mod window_planner;
