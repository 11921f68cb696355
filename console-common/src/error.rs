//! Errors raised while preparing the adapter: validation and local files.

/// Shorthand for results carrying [`Error`].
pub type Result<T> = std::result::Result<T, Error>;

/// Startup-time failure of the console adapter.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("Invalid configuration: {0}")]
    Validation(#[from] crate::validation::ValidationError),

    /// Data directory or config file could not be read or written
    #[error("I/O failure: {0}")]
    Io(#[from] std::io::Error),

    /// An inner error with a note on what was being attempted
    #[error("{step}: {inner}")]
    Context {
        step: String,
        #[source]
        inner: Box<Error>,
    },
}

impl Error {
    /// Wrap this error with a description of the failing step.
    pub fn during(self, step: impl Into<String>) -> Self {
        Self::Context {
            step: step.into(),
            inner: Box::new(self),
        }
    }
}

/// `.context("...")` for results whose error converts into [`Error`].
pub trait ResultExt<T> {
    fn context(self, step: impl Into<String>) -> Result<T>;
}

impl<T, E> ResultExt<T> for std::result::Result<T, E>
where
    E: Into<Error>,
{
    fn context(self, step: impl Into<String>) -> Result<T> {
        self.map_err(|e| e.into().during(step))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::validation::ValidationError;

    #[test]
    fn test_during_nests_message() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        let err = Error::from(io).during("starting adapter");
        assert!(matches!(err, Error::Context { .. }));
        assert_eq!(err.to_string(), "starting adapter: I/O failure: gone");
    }

    #[test]
    fn test_context_on_io_result() {
        let res: std::result::Result<(), std::io::Error> =
            Err(std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"));
        let err = res.context("opening data directory").unwrap_err();
        assert!(err.to_string().starts_with("opening data directory: I/O failure"));
    }

    #[test]
    fn test_context_on_validation_result() {
        let res: std::result::Result<(), ValidationError> = Err(ValidationError::MissingField {
            field: "dashboard.username".into(),
        });
        let err = res.context("Invalid configuration").unwrap_err();
        assert!(err.to_string().contains("dashboard.username"));
    }
}
