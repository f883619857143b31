use thiserror::Error;

#[derive(Debug, Error)]
#[error(transparent)]
pub struct Error(Box<ErrorKind>);

pub type StdErrorBoxed = Box<dyn std::error::Error + Send + Sync + 'static>;

impl Error {
    pub fn kind(&self) -> &ErrorKind {
        self.0.as_ref()
    }

    pub fn into_kind(self) -> ErrorKind {
        *self.0
    }

    pub fn invalid_arg(name: impl Into<String>, message: impl Into<String>) -> Error {
        Error(
            ErrorKind::InvalidArgument {
                name: name.into(),
                message: message.into(),
            }
            .into(),
        )
    }

    pub fn invalid_operation(name: impl Into<String>) -> Error {
        Error(ErrorKind::InvalidOperation { name: name.into() }.into())
    }

    pub fn rejected(reason: impl Into<String>) -> Error {
        Error(
            ErrorKind::Rejected {
                reason: reason.into(),
            }
            .into(),
        )
    }

    pub fn cancelled() -> Error {
        Error(ErrorKind::Cancelled.into())
    }

    pub fn job_failed<E>(source: E) -> Error
    where
        E: Into<StdErrorBoxed>,
    {
        Error(
            ErrorKind::JobFailed {
                source: source.into(),
            }
            .into(),
        )
    }

    pub fn job_panicked(message: impl Into<String>) -> Error {
        Error(
            ErrorKind::JobPanicked {
                message: message.into(),
            }
            .into(),
        )
    }

    pub fn io(context: impl Into<String>, source: std::io::Error) -> Error {
        Error(
            ErrorKind::Io {
                context: context.into(),
                source,
            }
            .into(),
        )
    }

    /// Returns `true` when the error marks a job that was cancelled before it
    /// produced a result.
    pub fn is_cancelled(&self) -> bool {
        matches!(self.kind(), ErrorKind::Cancelled)
    }
}

#[derive(Debug, Error)]
pub enum ErrorKind {
    #[error("invalid argument {name}: {message}")]
    InvalidArgument { name: String, message: String },

    #[error("invalid operation {name}")]
    InvalidOperation { name: String },

    #[error("task rejected: {reason}")]
    Rejected { reason: String },

    #[error("task cancelled")]
    Cancelled,

    #[error("job failed: {source}")]
    JobFailed { source: StdErrorBoxed },

    #[error("job panicked: {message}")]
    JobPanicked { message: String },

    #[error("IO error for '{context}': {source}")]
    Io {
        context: String,
        source: std::io::Error,
    },
}

impl From<ErrorKind> for Error {
    fn from(kind: ErrorKind) -> Self {
        Error(kind.into())
    }
}

/// Renders a panic payload captured by `catch_unwind` as a message.
pub fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&'static str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
