use std::error::Error as StdError;
use std::fmt;
use thiserror::Error;

pub type BoxError = Box<dyn StdError + Send + Sync + 'static>;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ErrorKind {
    Store,
    Credentials,
    Buffer,
    Serde,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorKind::Store => write!(f, "store"),
            ErrorKind::Credentials => write!(f, "credentials"),
            ErrorKind::Buffer => write!(f, "buffer"),
            ErrorKind::Serde => write!(f, "serde"),
        }
    }
}

pub struct ErrorInner {
    pub kind: ErrorKind,
    pub source: Option<BoxError>,
    pub message: Option<String>,
}

pub struct Error {
    pub inner: Box<ErrorInner>,
}

impl Error {
    pub fn new<E>(kind: ErrorKind, source: Option<E>) -> Error
    where
        E: Into<BoxError>,
    {
        Error {
            inner: Box::new(ErrorInner {
                kind,
                source: source.map(Into::into),
                message: None,
            }),
        }
    }

    pub fn with_message<E>(kind: ErrorKind, message: String, source: Option<E>) -> Error
    where
        E: Into<BoxError>,
    {
        Error {
            inner: Box::new(ErrorInner {
                kind,
                source: source.map(Into::into),
                message: Some(message),
            }),
        }
    }

    pub fn kind(&self) -> &ErrorKind {
        &self.inner.kind
    }

    pub fn is_store(&self) -> bool {
        matches!(self.inner.kind, ErrorKind::Store)
    }

    pub fn is_credentials(&self) -> bool {
        matches!(self.inner.kind, ErrorKind::Credentials)
    }

    pub fn is_buffer(&self) -> bool {
        matches!(self.inner.kind, ErrorKind::Buffer)
    }

    pub fn is_serde(&self) -> bool {
        matches!(self.inner.kind, ErrorKind::Serde)
    }

    pub fn is_timeout(&self) -> bool {
        if let Some(source) = &self.inner.source {
            source.to_string().to_lowercase().contains("timeout")
        } else {
            false
        }
    }

    pub fn is_connect(&self) -> bool {
        if let Some(source) = &self.inner.source {
            let msg = source.to_string().to_lowercase();
            msg.contains("connect") || msg.contains("connection")
        } else {
            false
        }
    }
}

impl fmt::Debug for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut f = f.debug_struct("quiesce::Error");
        f.field("kind", &self.inner.kind);
        if let Some(ref message) = self.inner.message {
            f.field("message", message);
        }
        if let Some(ref source) = self.inner.source {
            f.field("source", source);
        }
        f.finish()
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(ref message) = self.inner.message {
            write!(f, "{} error: {}", self.inner.kind, message)?;
        } else {
            write!(f, "{} error", self.inner.kind)?;
        }

        if let Some(ref source) = self.inner.source {
            write!(f, ": {source}")?;
        }

        Ok(())
    }
}

impl StdError for Error {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        self.inner
            .source
            .as_ref()
            .map(|e| &**e as &(dyn StdError + 'static))
    }
}

impl From<StoreError> for Error {
    fn from(err: StoreError) -> Self {
        Error::new(ErrorKind::Store, Some(err))
    }
}

impl From<CredentialError> for Error {
    fn from(err: CredentialError) -> Self {
        Error::new(ErrorKind::Credentials, Some(err))
    }
}

impl From<BufferError> for Error {
    fn from(err: BufferError) -> Self {
        Error::new(ErrorKind::Buffer, Some(err))
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::new(ErrorKind::Serde, Some(err))
    }
}

/// Failures of the underlying key-value session store.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("connection pool error: {0}")]
    Pool(String),
    #[error("redis error: {0}")]
    Redis(#[source] deadpool_redis::redis::RedisError),
    #[error("compare-and-set is not supported by this backend")]
    CasUnsupported,
}

/// Raised before an invocation starts; the store is never touched.
#[derive(Debug, Error)]
pub enum CredentialError {
    #[error("missing credential: {0}")]
    Missing(String),
    #[error("invalid credential: {0}")]
    Invalid(String),
}

#[derive(Debug, Error)]
pub enum BufferError {
    #[error("session key must not be empty")]
    EmptySessionKey,
    #[error(
        "error retrieving buffer state for key \"{0}\": nonexistent key, invalid value, or the key was deleted out of band"
    )]
    StateLost(String),
}

impl Error {
    pub fn state_lost(key: impl Into<String>) -> Self {
        Error::from(BufferError::StateLost(key.into()))
    }

    pub fn empty_session_key() -> Self {
        Error::from(BufferError::EmptySessionKey)
    }

    pub fn missing_credential(name: impl Into<String>) -> Self {
        Error::from(CredentialError::Missing(name.into()))
    }
}
