use thiserror::Error;

macro_rules! malformed_error {
    // Single string version
    ($msg:expr) => {
        crate::Error::Malformed {
            message: $msg.to_string(),
            file: file!(),
            line: line!(),
        }
    };

    // Format string with arguments version
    ($fmt:expr, $($arg:tt)*) => {
        crate::Error::Malformed {
            message: format!($fmt, $($arg)*),
            file: file!(),
            line: line!(),
        }
    };
}

/// The generic error type covering everything this library can return.
///
/// The variants fall into three groups that mirror how failures are surfaced:
///
/// - **Input validation** ([`Error::InvalidArgument`], [`Error::Empty`]) - the caller passed
///   something that can never be valid; always surfaced immediately.
/// - **Resolution failures** ([`Error::MemberNotFound`], [`Error::TokenNotAssigned`]) - a
///   reference could not be matched to a definition. Whether these surface as errors or as
///   absent results is governed by the resolver's `throw_on_not_found` configuration.
/// - **Binary parsing** ([`Error::Malformed`], [`Error::OutOfBounds`]) - the underlying bytes
///   do not form a valid structure. These carry the source location where the malformation
///   was detected.
///
/// # Examples
///
/// ```rust
/// use cilmeta::{Error, metadata::cor20::NetDirectory};
///
/// match NetDirectory::read(&[0u8; 4], None) {
///     Ok(_) => println!("parsed"),
///     Err(Error::OutOfBounds) => eprintln!("header truncated"),
///     Err(Error::Malformed { message, file, line }) => {
///         eprintln!("malformed: {} ({}:{})", message, file, line);
///     }
///     Err(e) => eprintln!("other error: {}", e),
/// }
/// ```
#[derive(Error, Debug)]
pub enum Error {
    /// The file or structure is damaged and could not be parsed.
    ///
    /// # Fields
    ///
    /// * `message` - Detailed description of what was malformed
    /// * `file` - Source file where the error was detected
    /// * `line` - Source line where the error was detected
    #[error("Malformed - {file}:{line}: {message}")]
    Malformed {
        /// The message to be printed for the Malformed error
        message: String,
        /// The source file in which this error occured
        file: &'static str,
        /// The source line in which this error occured
        line: u32,
    },

    /// An out of bound access was attempted while parsing data.
    ///
    /// This error occurs when trying to read or write data beyond the end of a
    /// buffer. It's a safety check to prevent overruns during parsing.
    #[error("Out of Bound read would have occurred!")]
    OutOfBounds,

    /// Provided input was empty.
    #[error("Provided input was empty")]
    Empty,

    /// A required argument is missing.
    ///
    /// Surfaced when an operation receives no reference at all (a `None`
    /// argument), regardless of any resolver configuration. A reference that
    /// is present but does not denote anything resolvable goes through the
    /// not-found path instead.
    #[error("Invalid argument - {0}")]
    InvalidArgument(&'static str),

    /// A reference could not be resolved to a definition.
    ///
    /// Carries the textual full name of the unresolved reference. Only raised
    /// when the resolver is configured to surface failures as errors; otherwise
    /// unresolved lookups yield an absent result instead.
    #[error("Failed to resolve member - {0}")]
    MemberNotFound(String),

    /// A referenced owner has no metadata token assigned yet.
    ///
    /// Raised during the pre-serialization update pass when a row references an
    /// element whose token has not been assigned. Tables must be updated in
    /// dependency order, owners before dependents.
    #[error("Referenced owner has no token assigned - {0}")]
    TokenNotAssigned(String),

    /// File I/O error.
    ///
    /// Wraps standard I/O errors that can occur during file operations
    /// such as reading from disk, permission issues, or filesystem errors.
    #[error("{0}")]
    FileError(#[from] std::io::Error),

    /// Failed to lock target.
    ///
    /// This error occurs when thread synchronization fails, typically
    /// when trying to acquire a mutex that is in an invalid state.
    #[error("Failed to lock target")]
    LockError,

    /// Generic error for miscellaneous failures.
    #[error("{0}")]
    Error(String),
}
