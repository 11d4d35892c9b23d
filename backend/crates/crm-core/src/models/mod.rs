pub mod field_type;
pub mod funnel;
pub mod opportunity;
pub mod required_field;
pub mod stage;
pub mod webhook_config;
