//! Error codes and the per-thread error slot.
//!
//! Every fallible operation returns [`Result`], and additionally stamps the
//! calling thread's *last error* slot with its [`ErrorCode`] so callers that
//! only look at success/failure can query what went wrong afterwards.
//! Querying the slot clears it; a successful operation does not.

use std::cell::Cell;
use std::io;

use thiserror::Error;

/// Everything that can go wrong, as a flat code.
///
/// The codes are deliberately coarse; [`ErrorCode::message`] gives the
/// static English text for each one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum ErrorCode {
    Ok,
    Other,
    OutOfMemory,
    NotInitialized,
    IsInitialized,
    Argv0IsNull,
    Unsupported,
    PastEof,
    FilesStillOpen,
    InvalidArgument,
    NotMounted,
    NotFound,
    SymlinkForbidden,
    NoWriteDir,
    OpenForReading,
    OpenForWriting,
    NotAFile,
    ReadOnly,
    Corrupt,
    SymlinkLoop,
    Io,
    Permission,
    NoSpace,
    BadFilename,
    Busy,
    DirNotEmpty,
    OsError,
    Duplicate,
    BadPassword,
    AppCallback,
}

impl ErrorCode {
    /// Static English text for this code.
    pub fn message(self) -> &'static str {
        match self {
            ErrorCode::Ok => "no error",
            ErrorCode::Other => "unknown error",
            ErrorCode::OutOfMemory => "out of memory",
            ErrorCode::NotInitialized => "not initialized",
            ErrorCode::IsInitialized => "already initialized",
            ErrorCode::Argv0IsNull => "argv0 is NULL",
            ErrorCode::Unsupported => "operation not supported",
            ErrorCode::PastEof => "past end of file",
            ErrorCode::FilesStillOpen => "files still open",
            ErrorCode::InvalidArgument => "invalid argument",
            ErrorCode::NotMounted => "not mounted",
            ErrorCode::NotFound => "not found",
            ErrorCode::SymlinkForbidden => "symlinks are forbidden",
            ErrorCode::NoWriteDir => "write directory is not set",
            ErrorCode::OpenForReading => "file open for reading",
            ErrorCode::OpenForWriting => "file open for writing",
            ErrorCode::NotAFile => "not a file",
            ErrorCode::ReadOnly => "read-only filesystem",
            ErrorCode::Corrupt => "corrupted",
            ErrorCode::SymlinkLoop => "infinite symbolic link loop",
            ErrorCode::Io => "i/o error",
            ErrorCode::Permission => "permission denied",
            ErrorCode::NoSpace => "no space available for writing",
            ErrorCode::BadFilename => "filename is bogus",
            ErrorCode::Busy => "tried to modify a file the OS needs",
            ErrorCode::DirNotEmpty => "directory isn't empty",
            ErrorCode::OsError => "OS reported an error",
            ErrorCode::Duplicate => "duplicate resource",
            ErrorCode::BadPassword => "bad password",
            ErrorCode::AppCallback => "application callback reported error",
        }
    }
}

/// The error type returned by every fallible operation in this crate.
///
/// Carries an [`ErrorCode`]; host I/O failures keep the underlying
/// [`io::Error`] as their source.
#[derive(Debug, Error)]
#[error("{}", self.code.message())]
pub struct Error {
    code: ErrorCode,
    #[source]
    source: Option<io::Error>,
}

impl Error {
    /// Create an error and stamp the calling thread's last-error slot.
    pub fn new(code: ErrorCode) -> Self {
        set_error_code(code);
        Error { code, source: None }
    }

    /// The code this error carries.
    pub fn code(&self) -> ErrorCode {
        self.code
    }

    /// Error for a failed enumeration callback: if the callback stamped a
    /// specific code into the thread slot, that code wins; otherwise
    /// [`ErrorCode::AppCallback`].
    pub(crate) fn from_callback() -> Self {
        let stamped = LAST_ERROR.with(|c| c.get());
        if stamped != ErrorCode::Ok {
            Error::new(stamped)
        } else {
            Error::new(ErrorCode::AppCallback)
        }
    }
}

impl From<io::Error> for Error {
    fn from(err: io::Error) -> Self {
        let code = match err.kind() {
            io::ErrorKind::NotFound => ErrorCode::NotFound,
            io::ErrorKind::PermissionDenied => ErrorCode::Permission,
            io::ErrorKind::AlreadyExists => ErrorCode::Duplicate,
            io::ErrorKind::InvalidInput => ErrorCode::InvalidArgument,
            io::ErrorKind::UnexpectedEof => ErrorCode::PastEof,
            io::ErrorKind::WriteZero => ErrorCode::NoSpace,
            _ => ErrorCode::Io,
        };
        set_error_code(code);
        Error {
            code,
            source: Some(err),
        }
    }
}

impl From<Error> for io::Error {
    fn from(err: Error) -> Self {
        let kind = match err.code() {
            ErrorCode::NotFound => io::ErrorKind::NotFound,
            ErrorCode::Permission => io::ErrorKind::PermissionDenied,
            ErrorCode::InvalidArgument | ErrorCode::BadFilename => io::ErrorKind::InvalidInput,
            ErrorCode::PastEof => io::ErrorKind::UnexpectedEof,
            _ => io::ErrorKind::Other,
        };
        io::Error::new(kind, err)
    }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

thread_local! {
    static LAST_ERROR: Cell<ErrorCode> = Cell::new(ErrorCode::Ok);
}

/// Stamp the calling thread's error slot.
///
/// Applications mostly never need this; it exists so enumeration callbacks
/// can hand a specific code up through the library.
pub fn set_error_code(code: ErrorCode) {
    LAST_ERROR.with(|c| c.set(code));
}

/// Return and clear the calling thread's last error code.
pub fn last_error_code() -> ErrorCode {
    LAST_ERROR.with(|c| c.replace(ErrorCode::Ok))
}

/// Shorthand for `return Err(Error::new(code))`.
macro_rules! fail {
    ($code:expr) => {
        return Err($crate::error::Error::new($code))
    };
}

pub(crate) use fail;
