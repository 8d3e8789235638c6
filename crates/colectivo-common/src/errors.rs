use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("config file not found: {0}")]
    FileNotFound(PathBuf),

    #[error("config parse error: {0}")]
    ParseError(String),

    #[error("config validation error: {0}")]
    ValidationError(String),
}

/// Top-level error for the `colectivo` binary.
///
/// Library crates keep their own error enums; this one wraps whatever
/// reaches the process boundary.
#[derive(Debug, thiserror::Error)]
pub enum ColectivoError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("network error: {0}")]
    Network(String),

    #[error("authentication failed: {0}")]
    Auth(String),

    #[error("presence error: {0}")]
    Presence(String),

    #[error("invalid input: {0}")]
    InvalidInput(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_error_display() {
        let err = ConfigError::FileNotFound(PathBuf::from("/tmp/missing.toml"));
        assert_eq!(err.to_string(), "config file not found: /tmp/missing.toml");

        let err = ConfigError::ParseError("unexpected token".into());
        assert_eq!(err.to_string(), "config parse error: unexpected token");

        let err = ConfigError::ValidationError("driver.max_seats = 0".into());
        assert_eq!(
            err.to_string(),
            "config validation error: driver.max_seats = 0"
        );
    }

    #[test]
    fn colectivo_error_from_config() {
        let config_err = ConfigError::ParseError("bad toml".into());
        let err: ColectivoError = config_err.into();
        assert!(matches!(err, ColectivoError::Config(_)));
        assert!(err.to_string().contains("bad toml"));
    }

    #[test]
    fn colectivo_error_from_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::BrokenPipe, "stdin closed");
        let err: ColectivoError = io_err.into();
        assert!(matches!(err, ColectivoError::Io(_)));
        assert!(err.to_string().contains("stdin closed"));
    }

    #[test]
    fn colectivo_error_other_variants() {
        let err = ColectivoError::Network("connection refused".into());
        assert_eq!(err.to_string(), "network error: connection refused");

        let err = ColectivoError::Auth("token expired".into());
        assert_eq!(err.to_string(), "authentication failed: token expired");

        let err = ColectivoError::Presence("client already started".into());
        assert_eq!(err.to_string(), "presence error: client already started");

        let err = ColectivoError::InvalidInput("seats must be a number".into());
        assert_eq!(err.to_string(), "invalid input: seats must be a number");
    }
}
