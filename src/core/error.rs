use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Io,
    CorruptIndex,
    LockFailed,
    InvalidArgument,
    Unsupported,
    FileNotFound,
    Parse,
    InvalidState,
}

#[derive(Debug)]
pub struct Error {
    pub kind: ErrorKind,
    pub context: String,
}

impl Error {
    pub fn new(kind: ErrorKind, context: String) -> Self {
        Error { kind, context }
    }

    pub fn corrupt(context: impl Into<String>) -> Self {
        Error::new(ErrorKind::CorruptIndex, context.into())
    }

    pub fn invalid_argument(context: impl Into<String>) -> Self {
        Error::new(ErrorKind::InvalidArgument, context.into())
    }

    pub fn file_not_found(name: &str) -> Self {
        Error::new(ErrorKind::FileNotFound, format!("no such file: {}", name))
    }

    pub fn unsupported(context: impl Into<String>) -> Self {
        Error::new(ErrorKind::Unsupported, context.into())
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{:?}: {}", self.kind, self.context)
    }
}

impl std::error::Error for Error {}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        let kind = match err.kind() {
            std::io::ErrorKind::NotFound => ErrorKind::FileNotFound,
            _ => ErrorKind::Io,
        };
        Error {
            kind,
            context: err.to_string(),
        }
    }
}

impl From<std::str::Utf8Error> for Error {
    fn from(err: std::str::Utf8Error) -> Self {
        Error {
            kind: ErrorKind::CorruptIndex,
            context: format!("invalid UTF-8 in stored string: {}", err),
        }
    }
}

impl From<regex::Error> for Error {
    fn from(err: regex::Error) -> Self {
        Error {
            kind: ErrorKind::InvalidArgument,
            context: format!("bad pattern: {}", err),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
