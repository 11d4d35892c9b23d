mod field_type;
mod opportunity;
mod stage;
mod webhook_config;
