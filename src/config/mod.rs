pub mod loader;
pub mod schema;

pub use loader::{load_from_path, load_from_str, ConfigError, JobFileProblem};
pub use schema::{JobConfig, Options, Paths, ValidationError, ValidationIssue};
