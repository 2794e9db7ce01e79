#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("Payload '{file_name}' contains no items")]
    EmptyPayload { file_name: String },

    #[error("Validation failed: {0}")]
    Validation(String),
}
