pub mod logger;
pub mod redact;
