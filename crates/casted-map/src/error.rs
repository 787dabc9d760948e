pub type CastResult<T> = Result<T, CastError>;

/// Boxed error produced by a user-supplied transform.
pub type TransformError = Box<dyn std::error::Error + Send + Sync + 'static>;

#[derive(Debug, thiserror::Error)]
pub enum CastError {
    /// A key was read again (directly or through other keys) while its own cast was still running.
    #[error("cyclic cast: `{key}` was read while it was being cast")]
    CyclicCast { key: String },

    #[error("key not found: `{key}`")]
    KeyNotFound { key: String },

    /// Failure raised by the transform itself. Returned to the reader untouched.
    #[error(transparent)]
    Transform(TransformError),
}

impl CastError {
    pub fn transform(err: impl Into<TransformError>) -> Self {
        CastError::Transform(err.into())
    }

    pub fn message(msg: impl Into<String>) -> Self {
        let msg: String = msg.into();
        CastError::Transform(msg.into())
    }

    pub fn is_cyclic(&self) -> bool {
        matches!(self, CastError::CyclicCast { .. })
    }

    /// Key named by a cycle or lookup failure.
    pub fn key(&self) -> Option<&str> {
        match self {
            CastError::CyclicCast { key } | CastError::KeyNotFound { key } => Some(key),
            CastError::Transform(_) => None,
        }
    }
}
