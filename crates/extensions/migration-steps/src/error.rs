//! Connector errors.

use caravan_protocols::HandlerError;
use thiserror::Error;

/// Errors raised by an [`AssetConnector`](crate::AssetConnector).
#[derive(Debug, Error)]
pub enum ConnectorError {
    #[error("System unreachable: {0}")]
    Unreachable(String),

    #[error("Project not found: {0}")]
    ProjectNotFound(String),

    #[error("Write rejected: {0}")]
    Rejected(String),
}

impl From<ConnectorError> for HandlerError {
    fn from(e: ConnectorError) -> Self {
        match e {
            ConnectorError::Unreachable(_) => HandlerError::Unavailable(e.to_string()),
            other => HandlerError::failed(other.to_string()),
        }
    }
}
