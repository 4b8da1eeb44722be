use crate::platform::BackendError;

#[derive(Debug, thiserror::Error)]
pub enum CaptureError {
    #[error("Backend unavailable: {0}")]
    BackendUnavailable(String),
    #[error("Configuration mismatch: {0}")]
    ConfigurationMismatch(String),
    #[error("Conversion error: {0}")]
    Conversion(String),
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
    #[error("Configuration error: {0}")]
    Config(String),
    #[error("IO error: {0}")]
    Io(String),
}

impl From<BackendError> for CaptureError {
    fn from(error: BackendError) -> Self {
        CaptureError::BackendUnavailable(error.to_string())
    }
}

impl From<std::io::Error> for CaptureError {
    fn from(error: std::io::Error) -> Self {
        CaptureError::Io(error.to_string())
    }
}
