use thiserror::Error;

#[derive(Error, Debug, Clone)]
pub enum RuleError {
    #[error("invalid regex pattern '{pattern}': {source}")]
    InvalidRegex {
        pattern: String,
        #[source]
        source: regex::Error,
    },

    #[error("invalid structural pattern '{pattern}': {message}")]
    InvalidStructural { pattern: String, message: String },
}
