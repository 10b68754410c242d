//! Rendezvous error types.

use std::sync::Arc;

/// A clonable trait-object inner error.
#[derive(Clone, Default)]
pub struct DynInnerError(
    pub Option<Arc<dyn std::error::Error + 'static + Send + Sync>>,
);

impl std::fmt::Debug for DynInnerError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

impl std::fmt::Display for DynInnerError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.0.as_ref() {
            None => f.write_str("None"),
            Some(s) => s.fmt(f),
        }
    }
}

impl std::error::Error for DynInnerError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.0.as_ref().map(|s| {
            let out: &(dyn std::error::Error + 'static) = &**s;
            out
        })
    }
}

impl DynInnerError {
    /// Construct a new DynInnerError from a source error.
    pub fn new<E: std::error::Error + 'static + Send + Sync>(e: E) -> Self {
        Self(Some(Arc::new(e)))
    }
}

/// The core rendezvous error type.
///
/// Absence (unknown fingerprint, expired token, vanished session) is never
/// an error. It is expressed through negative or empty results instead.
///
/// This type is required to implement `Clone` to ease the use of
/// shared futures, which require the entire `Result` to be `Clone`.
#[derive(Debug, Clone, thiserror::Error)]
pub enum RvError {
    /// Malformed or missing required input. Raised before any state
    /// is touched.
    #[error("validation: {ctx}")]
    Validation {
        /// What was wrong with the input.
        ctx: Arc<str>,
    },

    /// The request conflicts with the caller's current state, for example
    /// creating a session while already a member of one.
    #[error("conflict: {ctx}")]
    Conflict {
        /// What the conflict was.
        ctx: Arc<str>,
    },

    /// The backing key-value store could not be reached or answered
    /// with something unusable.
    #[error("store: {ctx} (src: {src})")]
    Store {
        /// Any context associated with this error.
        ctx: Arc<str>,

        /// The inner error (if any).
        #[source]
        src: DynInnerError,
    },

    /// Generic internal error.
    #[error("{ctx} (src: {src})")]
    Other {
        /// Any context associated with this error.
        ctx: Arc<str>,

        /// The inner error (if any).
        #[source]
        src: DynInnerError,
    },
}

fn ctx<C: std::fmt::Display>(ctx: C) -> Arc<str> {
    ctx.to_string().into_boxed_str().into()
}

impl RvError {
    /// Construct a validation error.
    pub fn validation<C: std::fmt::Display>(c: C) -> Self {
        Self::Validation { ctx: ctx(c) }
    }

    /// Construct a conflict error.
    pub fn conflict<C: std::fmt::Display>(c: C) -> Self {
        Self::Conflict { ctx: ctx(c) }
    }

    /// Construct a store error.
    pub fn store<C: std::fmt::Display>(c: C) -> Self {
        Self::Store {
            ctx: ctx(c),
            src: DynInnerError::default(),
        }
    }

    /// Construct a store error with an inner source error.
    pub fn store_src<
        C: std::fmt::Display,
        S: std::error::Error + 'static + Send + Sync,
    >(
        c: C,
        src: S,
    ) -> Self {
        Self::Store {
            ctx: ctx(c),
            src: DynInnerError::new(src),
        }
    }

    /// Construct an "other" error with an inner source error.
    pub fn other_src<
        C: std::fmt::Display,
        S: std::error::Error + 'static + Send + Sync,
    >(
        c: C,
        src: S,
    ) -> Self {
        Self::Other {
            ctx: ctx(c),
            src: DynInnerError::new(src),
        }
    }

    /// Construct an "other" error.
    pub fn other<C: std::fmt::Display>(c: C) -> Self {
        Self::Other {
            ctx: ctx(c),
            src: DynInnerError::default(),
        }
    }

    /// True if this is a [RvError::Validation].
    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Validation { .. })
    }

    /// True if this is a [RvError::Conflict].
    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::Conflict { .. })
    }

    /// True if this is a [RvError::Store].
    pub fn is_store(&self) -> bool {
        matches!(self, Self::Store { .. })
    }
}

/// The core rendezvous result type.
pub type RvResult<T> = Result<T, RvError>;

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn error_display() {
        assert_eq!(
            "bla (src: None)",
            RvError::other("bla").to_string().as_str(),
        );
        assert_eq!(
            "foo (src: bar)",
            RvError::other_src("foo", std::io::Error::other("bar"))
                .to_string()
                .as_str(),
        );
        assert_eq!(
            "validation: empty owner id",
            RvError::validation("empty owner id").to_string().as_str(),
        );
        assert_eq!(
            "conflict: already in a session",
            RvError::conflict("already in a session")
                .to_string()
                .as_str(),
        );
        assert_eq!(
            "store: unreachable (src: refused)",
            RvError::store_src("unreachable", std::io::Error::other("refused"))
                .to_string()
                .as_str(),
        );
    }

    #[test]
    fn error_kind_predicates() {
        assert!(RvError::conflict("x").is_conflict());
        assert!(!RvError::conflict("x").is_validation());
        assert!(RvError::validation("x").is_validation());
        assert!(RvError::store("x").is_store());
        assert!(!RvError::other("x").is_store());
    }

    #[test]
    fn ensure_rv_error_type_is_send_and_sync() {
        fn ensure<T: std::fmt::Display + Send + Sync>(_t: T) {}
        ensure(RvError::other("bla"));
    }
}
