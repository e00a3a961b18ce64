use thiserror::Error;

#[derive(Error, Debug)]
pub enum ProtocolError {
    #[error("Malformed envelope: expected a JSON object with a message object")]
    MalformedEnvelope,

    #[error("Missing field: {0}")]
    MissingField(&'static str),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
