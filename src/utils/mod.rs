pub mod config;

pub use config::RecorderConfig;
