use cdp_page::DriverError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CaptureError {
    #[error("driver error: {0}")]
    Driver(#[from] DriverError),
    #[error("artifact i/o error: {0}")]
    Io(#[from] std::io::Error),
}
