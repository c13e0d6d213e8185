//! Error types for the motion-control core.
//!
//! Mirrors the error taxonomy from the original C library (configuration,
//! resource acquisition, invalid argument, busy) as a single enum with
//! hand-written `Display`/`std::error::Error` impls, the same shape the
//! teacher crate used for its own error type.

use std::fmt;

/// Result type alias using the crate's `Error`.
pub type Result<T> = std::result::Result<T, Error>;

/// Unified error type for all motion-control operations.
#[derive(Debug, Clone, PartialEq)]
pub enum Error {
    /// Configuration parse or validation failure.
    Config(ConfigError),
    /// GPIO line or controller acquisition failure.
    Resource(ResourceError),
    /// Invalid argument (null handle, bad count, non-positive speed/steps).
    InvalidArgument(&'static str),
    /// Operation rejected because a motor is currently busy.
    Busy {
        /// Name of the motor that rejected the request.
        motor: String,
    },
}

/// Configuration-related errors, raised by the declarative config parser.
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigError {
    /// A section header (`[motor]`/`[axis]`) was opened but never closed.
    UnterminatedSection { line: usize },
    /// A key is not recognized for the current section kind.
    UnknownParam { line: usize, section: &'static str, name: String },
    /// A key's value failed validation (wrong type, out of range, etc).
    BadValue { line: usize, param: String, value: String },
    /// `step_pin`/`dir_pin` does not map to a known header pin.
    UnknownPin { line: usize, value: String },
    /// An axis's `motors` list references a name not defined earlier in the file.
    UnknownMotorRef { line: usize, name: String },
    /// A value exceeded a fixed-size buffer (name, line, or diagnostic).
    TooLong { line: usize, field: &'static str },
    /// More than 8 motors or 8 axes were declared.
    TooManyEntries { kind: &'static str },
    /// A motor is missing one or more required fields.
    IncompleteMotor { name: String },
    /// An axis is missing one or more required fields.
    IncompleteAxis { name: String },
    /// Failed to read the configuration file.
    Io(String),
}

/// GPIO / resource acquisition errors.
#[derive(Debug, Clone, PartialEq)]
pub enum ResourceError {
    /// Failed to open a GPIO controller chip.
    ControllerUnavailable { path: &'static str },
    /// A line (or bulk of lines) could not be reserved from the kernel.
    LineUnavailable { detail: String },
    /// Failed to spawn a worker thread.
    TaskCreationFailed { detail: String },
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Config(e) => write!(f, "configuration error: {e}"),
            Error::Resource(e) => write!(f, "resource error: {e}"),
            Error::InvalidArgument(msg) => write!(f, "invalid argument: {msg}"),
            Error::Busy { motor } => write!(f, "motor '{motor}' is busy"),
        }
    }
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::UnterminatedSection { line } => {
                write!(f, "line {line}: unterminated section header")
            }
            ConfigError::UnknownParam { line, section, name } => {
                write!(f, "line {line}: unknown parameter '{name}' in [{section}]")
            }
            ConfigError::BadValue { line, param, value } => {
                write!(f, "line {line}: invalid value '{value}' for '{param}'")
            }
            ConfigError::UnknownPin { line, value } => {
                write!(f, "line {line}: '{value}' is not a valid header pin")
            }
            ConfigError::UnknownMotorRef { line, name } => {
                write!(f, "line {line}: axis references undefined motor '{name}'")
            }
            ConfigError::TooLong { line, field } => {
                write!(f, "line {line}: {field} exceeds the maximum length")
            }
            ConfigError::TooManyEntries { kind } => {
                write!(f, "too many {kind} entries (maximum is 8)")
            }
            ConfigError::IncompleteMotor { name } => {
                write!(f, "motor '{name}' is missing required fields")
            }
            ConfigError::IncompleteAxis { name } => {
                write!(f, "axis '{name}' is missing required fields")
            }
            ConfigError::Io(msg) => write!(f, "I/O error: {msg}"),
        }
    }
}

impl fmt::Display for ResourceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResourceError::ControllerUnavailable { path } => {
                write!(f, "failed to open GPIO controller at {path}")
            }
            ResourceError::LineUnavailable { detail } => {
                write!(f, "GPIO line unavailable: {detail}")
            }
            ResourceError::TaskCreationFailed { detail } => {
                write!(f, "failed to create worker task: {detail}")
            }
        }
    }
}

impl From<ConfigError> for Error {
    fn from(e: ConfigError) -> Self {
        Error::Config(e)
    }
}

impl From<ResourceError> for Error {
    fn from(e: ResourceError) -> Self {
        Error::Resource(e)
    }
}

impl std::error::Error for Error {}
impl std::error::Error for ConfigError {}
impl std::error::Error for ResourceError {}
