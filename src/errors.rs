//! Error types for the lease pool

use thiserror::Error;

/// Failure reported by a [`Host`](crate::Host) implementation.
///
/// The pool never wraps or rewrites these; they surface through
/// [`PoolError::Host`] exactly as the host produced them.
pub type HostError = Box<dyn std::error::Error + Send + Sync + 'static>;

#[derive(Error, Debug)]
pub enum PoolError {
    #[error("Pool key `{0}` is not a registered alias")]
    UnknownAlias(String),

    #[error("Property `{property}` listed for kind `{kind}` is missing on the instance")]
    MissingProperty { kind: String, property: String },

    #[error(transparent)]
    Host(#[from] HostError),

    #[error("Metrics export failed: {0}")]
    Metrics(String),
}

pub type PoolResult<T> = Result<T, PoolError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn host_errors_pass_through_unchanged() {
        let source: HostError = "prototype has no clone".into();
        let error = PoolError::from(source);

        assert_eq!(error.to_string(), "prototype has no clone");
        assert!(matches!(error, PoolError::Host(_)));
    }

    #[test]
    fn unknown_alias_names_the_key() {
        let error = PoolError::UnknownAlias("Bullet".to_string());
        assert!(error.to_string().contains("`Bullet`"));
    }
}
