use thiserror::Error;

/// Failure to decode an application payload received over the channel.
#[derive(Error, Debug)]
pub enum ProtocolError {
    #[error("Invalid payload JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Unknown payload type: {0}")]
    UnknownType(String),

    #[error("Payload is missing required field `{0}`")]
    MissingField(&'static str),

    #[error("Payload too large: {size} bytes (max {max})")]
    TooLarge { size: usize, max: usize },
}
