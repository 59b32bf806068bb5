use hyper::StatusCode;
use serde_json;

/// Errors that can be mapped to an http status code
pub trait Codeable {
    fn code(&self) -> StatusCode;
}

/// Errors that can attach a structured payload to the response body
pub trait PayloadCarrier {
    fn payload(&self) -> Option<serde_json::Value>;
}

/// Error message sent to the client
#[derive(Debug, Clone, Serialize)]
pub struct ErrorMessage {
    pub code: u16,
    pub description: String,
    pub payload: Option<serde_json::Value>,
}
