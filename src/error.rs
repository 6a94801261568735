//! Error types for the locator.

use thiserror::Error;

/// Result type alias for locator operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Boxed error returned by user-supplied fetch delegates.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Main error type for the locator.
#[derive(Error, Debug)]
pub enum Error {
    /// Invalid configuration, detected at construction.
    #[error("config error: {0}")]
    Config(String),

    /// A cache fetch delegate failed.
    #[error("fetch failed: {0}")]
    Fetch(#[source] BoxError),

    /// The remote directory could not be queried.
    #[error("directory resolver error: {0}")]
    Resolver(String),

    /// Reported ranges do not tile the ring exactly once.
    #[error("ring coverage violation: {0}")]
    CoverageViolation(#[from] CoverageError),
}

/// Ways in which a set of ranges can fail to tile the ring.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CoverageError {
    /// A range claims keys already claimed by another range.
    #[error("range {range} overlaps a previously claimed range")]
    Overlap { range: String },

    /// Some keys are claimed by no range.
    #[error("{count} uncovered range(s): {uncovered}")]
    Gap { count: usize, uncovered: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::Config("ring size must be positive".into());
        assert_eq!(err.to_string(), "config error: ring size must be positive");

        let err: Error = CoverageError::Gap {
            count: 1,
            uncovered: "(10, 20]".into(),
        }
        .into();
        assert!(err.to_string().contains("1 uncovered range(s)"));
    }

    #[test]
    fn test_fetch_error_keeps_source() {
        let io = std::io::Error::new(std::io::ErrorKind::Other, "backend down");
        let err = Error::Fetch(Box::new(io));
        assert!(std::error::Error::source(&err).is_some());
        assert_eq!(err.to_string(), "fetch failed: backend down");
    }
}
