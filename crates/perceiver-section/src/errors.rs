use cdp_page::DriverError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PerceiverError {
    #[error("driver error: {0}")]
    Driver(#[from] DriverError),
    #[error("malformed probe payload: {0}")]
    Payload(String),
    #[error("internal error: {0}")]
    Internal(String),
}

impl PerceiverError {
    pub fn payload(msg: impl Into<String>) -> Self {
        Self::Payload(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }
}
