//! Crate-level error type

use crate::registry::RegistryError;

/// Result alias used across the crate
pub type Result<T> = std::result::Result<T, Error>;

/// Top-level error for the restream service
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A registry operation failed (validation, spawn, output directory)
    #[error(transparent)]
    Registry(#[from] RegistryError),

    /// Server socket or runtime I/O failure
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::UrlError;

    #[test]
    fn test_error_conversions() {
        let err: Error = RegistryError::InvalidInput(UrlError::MissingHost).into();
        assert!(matches!(err, Error::Registry(RegistryError::InvalidInput(_))));
        assert_eq!(err.to_string(), "invalid source URL: URL has no host");

        let err: Error = std::io::Error::new(std::io::ErrorKind::AddrInUse, "busy").into();
        assert!(matches!(err, Error::Io(_)));
        assert!(err.to_string().contains("busy"));
    }
}
