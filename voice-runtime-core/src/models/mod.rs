pub mod config;
pub mod effect;
pub mod error;
pub mod state;
pub mod stream;
