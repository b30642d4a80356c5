pub mod health;
pub mod upload;

pub use health::{health_check, liveness, metrics_handler, readiness_check};
pub use upload::upload_statements;
