use std::borrow::Cow;
use std::fmt::{self, Display, Formatter};
use std::ops::Deref;

#[cfg(feature = "backtrace")]
use std::backtrace::Backtrace;

pub type ConvergeResult<T> = Result<T, ConvergeError>;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ErrorCode {
    Config,
    Adaptor,
    Evaluation,
    Timeout,
    Checkpoint,
    Broker,
    Io,
    Context,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrString(Cow<'static, str>);

impl AsRef<str> for ErrString {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Deref for ErrString {
    type Target = str;
    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl Display for ErrString {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl<T: Into<Cow<'static, str>>> From<T> for ErrString {
    fn from(v: T) -> Self {
        Self(v.into())
    }
}

#[derive(Debug)]
pub enum ConvergeError {
    /// Invalid or inconsistent configuration. Fatal, reported at startup.
    Config {
        message: ErrString,
    },
    /// Adaptor parameters violate their invariants. Fatal at init.
    Adaptor {
        message: ErrString,
    },
    /// The user objective failed or returned a non-finite value. Per-item;
    /// the individual stays dirty.
    Evaluation {
        message: ErrString,
        iteration: Option<u32>,
        position: Option<usize>,
    },
    /// A broker executor returned without all items. Non-fatal.
    Timeout {
        message: ErrString,
        iteration: u32,
    },
    /// A checkpoint file could not be restored in full.
    Checkpoint {
        message: ErrString,
    },
    /// Worker-side shutdown signal, terminates the client loop cleanly.
    BrokerShutdown,

    Io {
        source: std::io::Error,
        #[cfg(feature = "backtrace")]
        backtrace: Backtrace,
    },

    Context {
        context: ErrorContext,
        source: Box<ConvergeError>,
        #[cfg(feature = "backtrace")]
        backtrace: Backtrace,
    },
}

impl ConvergeError {
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::Config { .. } => ErrorCode::Config,
            Self::Adaptor { .. } => ErrorCode::Adaptor,
            Self::Evaluation { .. } => ErrorCode::Evaluation,
            Self::Timeout { .. } => ErrorCode::Timeout,
            Self::Checkpoint { .. } => ErrorCode::Checkpoint,
            Self::BrokerShutdown => ErrorCode::Broker,
            Self::Io { .. } => ErrorCode::Io,
            Self::Context { .. } => ErrorCode::Context,
        }
    }

    pub fn evaluation(message: impl Into<ErrString>) -> Self {
        ConvergeError::Evaluation {
            message: message.into(),
            iteration: None,
            position: None,
        }
    }

    /// Tags an evaluation error with the iteration and batch position it
    /// occurred at. No-op for other kinds.
    pub fn at(self, iteration: u32, position: usize) -> Self {
        match self {
            ConvergeError::Evaluation { message, .. } => ConvergeError::Evaluation {
                message,
                iteration: Some(iteration),
                position: Some(position),
            },
            other => other,
        }
    }

    pub fn with_context(self, msg: impl Into<String>) -> Self {
        ConvergeError::Context {
            context: ErrorContext::new(msg),
            source: Box::new(self),
            #[cfg(feature = "backtrace")]
            backtrace: Backtrace::capture(),
        }
    }

    /// True for error kinds an optimization run can continue through.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::Evaluation { .. } | Self::Timeout { .. } | Self::BrokerShutdown
        )
    }
}

impl Display for ConvergeError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::Config { message } => write!(f, "Invalid configuration: {}", message),
            Self::Adaptor { message } => write!(f, "Adaptor misconfigured: {}", message),
            Self::Evaluation {
                message,
                iteration,
                position,
            } => {
                write!(f, "Evaluation failed")?;
                if let Some(it) = iteration {
                    write!(f, " [iteration {}]", it)?;
                }
                if let Some(pos) = position {
                    write!(f, " [position {}]", pos)?;
                }
                write!(f, ": {}", message)
            }
            Self::Timeout { message, iteration } => {
                write!(f, "Partial return [iteration {}]: {}", iteration, message)
            }
            Self::Checkpoint { message } => write!(f, "Checkpoint corrupt: {}", message),
            Self::BrokerShutdown => write!(f, "Broker shut down"),
            Self::Io { source, .. } => write!(f, "Io error: {}", source),
            Self::Context {
                context, source, ..
            } => write!(f, "{}\nCaused by: {}", context, source),
        }
    }
}

impl std::error::Error for ConvergeError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io { source, .. } => Some(source),
            Self::Context { source, .. } => Some(source),
            _ => None,
        }
    }
}

impl From<std::io::Error> for ConvergeError {
    fn from(source: std::io::Error) -> Self {
        ConvergeError::Io {
            source,
            #[cfg(feature = "backtrace")]
            backtrace: Backtrace::capture(),
        }
    }
}

#[derive(Debug)]
pub struct ErrorContext {
    message: String,
}

impl ErrorContext {
    pub fn new(msg: impl Into<String>) -> Self {
        Self {
            message: msg.into(),
        }
    }
}

impl Display for ErrorContext {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for ErrorContext {}

// Ergonomic Result extensions (context)
pub trait ResultExt<T> {
    fn context(self, msg: impl Into<String>) -> ConvergeResult<T>;
    fn with_context<F: FnOnce() -> String>(self, f: F) -> ConvergeResult<T>;
}

impl<T, E: Into<ConvergeError>> ResultExt<T> for Result<T, E> {
    fn context(self, msg: impl Into<String>) -> ConvergeResult<T> {
        self.map_err(|e| e.into().with_context(msg))
    }

    fn with_context<F: FnOnce() -> String>(self, f: F) -> ConvergeResult<T> {
        self.map_err(|e| e.into().with_context(f()))
    }
}

// Macros: err, bail, ensure
#[doc(hidden)]
pub mod __private {
    #[inline]
    #[cold]
    #[must_use]
    pub fn must_use<E>(e: E) -> E {
        e
    }
}

#[macro_export]
macro_rules! converge_err {
    (Config: $fmt:literal $(, $arg:expr)* $(,)?) => {
        $crate::__private::must_use($crate::ConvergeError::Config { message: format!($fmt, $($arg),*).into() })
    };
    (Adaptor: $fmt:literal $(, $arg:expr)* $(,)?) => {
        $crate::__private::must_use($crate::ConvergeError::Adaptor { message: format!($fmt, $($arg),*).into() })
    };
    (Evaluation: $fmt:literal $(, $arg:expr)* $(,)?) => {
        $crate::__private::must_use($crate::ConvergeError::evaluation(format!($fmt, $($arg),*)))
    };
    (Checkpoint: $fmt:literal $(, $arg:expr)* $(,)?) => {
        $crate::__private::must_use($crate::ConvergeError::Checkpoint { message: format!($fmt, $($arg),*).into() })
    };
    (Timeout($iter:expr): $fmt:literal $(, $arg:expr)* $(,)?) => {
        $crate::__private::must_use($crate::ConvergeError::Timeout {
            message: format!($fmt, $($arg),*).into(),
            iteration: $iter,
        })
    };
}

#[macro_export]
macro_rules! converge_bail {
    ($($tt:tt)+) => { return Err($crate::converge_err!($($tt)+)) };
}

#[macro_export]
macro_rules! ensure {
    ($cond:expr, $($tt:tt)+) => {
        if !$cond { $crate::converge_bail!($($tt)+); }
    };
}
