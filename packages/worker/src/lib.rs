pub mod config;
pub mod error;
pub mod handlers;
pub mod processing;

pub use config::WorkerAppConfig;
pub use error::{ErrorClass, ProcessError};
