pub mod capture_source;
pub mod custom_effect;
pub mod handle_release;
pub mod pipeline_backend;
