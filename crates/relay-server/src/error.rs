//! Error types for the relay binary.

/// Top-level error for the relay binary.
///
/// Each variant wraps a subsystem error so `main` can propagate with `?`.
#[derive(Debug, thiserror::Error)]
pub enum RelayError {
    /// Configuration loading failed.
    #[error("config error: {source}")]
    Config {
        /// The underlying config error.
        #[from]
        source: crate::config::ConfigError,
    },

    /// The log filter directive could not be parsed.
    #[error("invalid log filter {directive:?}: {message}")]
    Logging {
        /// The rejected directive.
        directive: String,
        /// Parser message.
        message: String,
    },

    /// The HTTP server failed to bind or crashed while serving.
    #[error("server error: {source}")]
    Server {
        /// The underlying server error.
        #[from]
        source: relay_observer::ServerError,
    },
}
