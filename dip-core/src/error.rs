//! Status-coded error type for every dip-core operation.
//!
//! Each variant maps onto a stable numeric status code via
//! [`DipError::status_code`]; the CLI uses that code as its exit status.

use std::collections::BTreeMap;
use std::path::PathBuf;
use thiserror::Error;

/// Result alias used throughout the crate.
pub type DipResult<T> = Result<T, DipError>;

pub const DIP_SUCCESS: i32 = 0;
pub const DIP_PENDING: i32 = 1;
pub const DIP_ATTRNOTFOUND: i32 = 2;
pub const DIP_BADCMD: i32 = 64;
pub const DIP_EXISTS: i32 = 65;
pub const DIP_NOTEXISTS: i32 = 66;
pub const DIP_NODIPHERE: i32 = 67;
pub const DIP_NOFILES: i32 = 68;
pub const DIP_NOATTRIBUTES: i32 = 69;
pub const DIP_INVALIDATTR: i32 = 70;
pub const DIP_UNKNOWNATTR: i32 = 71;
pub const DIP_NODIPGIVEN: i32 = 72;
pub const DIP_NOCOLLECTION: i32 = 73;
pub const DIP_UNKNOWNCOLL: i32 = 74;
pub const DIP_NOUSERNAME: i32 = 75;
pub const DIP_NOPASSWORD: i32 = 76;
pub const DIP_DEPOSITFAIL: i32 = 77;
pub const DIP_UNKNOWNTOKEN: i32 = 78;
pub const DIP_BADIDENTIFIER: i32 = 79;
pub const DIP_OUTSIDEBASE: i32 = 80;
pub const DIP_BADFORMAT: i32 = 81;
pub const DIP_CODECERROR: i32 = 82;
pub const DIP_IOERROR: i32 = 83;

#[derive(Error, Debug)]
pub enum DipError {
    #[error("attribute not present: {term}")]
    AttributeNotFound { term: String },

    #[error("{0}")]
    BadCommand(String),

    #[error("Specified directory already exists: {}", .path.display())]
    AlreadyExists { path: PathBuf },

    #[error("Specified directory does not exist: {}", .path.display())]
    NotExists { path: PathBuf },

    #[error(
        "Specified directory does not contain a deposit information package: {}",
        .path.display()
    )]
    NotAPackage { path: PathBuf },

    #[error("No files specified for {command} to {}", .dipdir.display())]
    NoFiles { command: String, dipdir: PathBuf },

    #[error("No attributes specified for {command}")]
    NoAttributes { command: String },

    #[error("Invalid attribute format: {input}")]
    InvalidAttributeFormat { input: String },

    #[error("Unknown attribute: {term}")]
    UnknownAttribute { term: String },

    #[error("No directory specified for DIP")]
    NoDipGiven,

    #[error("No SWORD collection specified for deposit")]
    NoCollection,

    #[error("Unknown SWORD collection: {collection_uri}")]
    UnknownCollection { collection_uri: String },

    #[error("No username provided for deposit operation")]
    NoUsername,

    #[error("No password provided for deposit operation")]
    NoPassword,

    /// Transport failure (`status` is `None`) or a non-2xx response.
    #[error("SWORD deposit failed: {}", describe_failure(.status, .message))]
    DepositFailed {
        status: Option<u16>,
        headers: BTreeMap<String, String>,
        message: String,
    },

    #[error("Unknown deposit token: {token}")]
    UnknownToken { token: String },

    #[error("Cannot derive deposit token from receipt identifier {id:?}: {reason}")]
    MalformedIdentifier { id: String, reason: String },

    #[error("{} is not under base directory {}", .path.display(), .base.display())]
    PathOutsideBase { path: PathBuf, base: PathBuf },

    #[error("Unsupported package format: {format:?}")]
    UnsupportedFormat { format: String },

    #[error("archive error: {0}")]
    Archive(String),

    #[error("XML error in {}: {message}", .path.display())]
    Xml { path: PathBuf, message: String },

    #[error("JSON error in {}: {source}", .path.display())]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("I/O error on {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

fn describe_failure(status: &Option<u16>, message: &str) -> String {
    match status {
        Some(code) if message.is_empty() => code.to_string(),
        Some(code) => format!("{code} ({message})"),
        None => message.to_string(),
    }
}

impl DipError {
    /// Wraps an I/O error with the path it occurred on.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        DipError::Io {
            path: path.into(),
            source,
        }
    }

    /// Numeric status code reported to the caller (and used as the process exit status).
    pub fn status_code(&self) -> i32 {
        match self {
            DipError::AttributeNotFound { .. } => DIP_ATTRNOTFOUND,
            DipError::BadCommand(_) => DIP_BADCMD,
            DipError::AlreadyExists { .. } => DIP_EXISTS,
            DipError::NotExists { .. } => DIP_NOTEXISTS,
            DipError::NotAPackage { .. } => DIP_NODIPHERE,
            DipError::NoFiles { .. } => DIP_NOFILES,
            DipError::NoAttributes { .. } => DIP_NOATTRIBUTES,
            DipError::InvalidAttributeFormat { .. } => DIP_INVALIDATTR,
            DipError::UnknownAttribute { .. } => DIP_UNKNOWNATTR,
            DipError::NoDipGiven => DIP_NODIPGIVEN,
            DipError::NoCollection => DIP_NOCOLLECTION,
            DipError::UnknownCollection { .. } => DIP_UNKNOWNCOLL,
            DipError::NoUsername => DIP_NOUSERNAME,
            DipError::NoPassword => DIP_NOPASSWORD,
            DipError::DepositFailed { .. } => DIP_DEPOSITFAIL,
            DipError::UnknownToken { .. } => DIP_UNKNOWNTOKEN,
            DipError::MalformedIdentifier { .. } => DIP_BADIDENTIFIER,
            DipError::PathOutsideBase { .. } => DIP_OUTSIDEBASE,
            DipError::UnsupportedFormat { .. } => DIP_BADFORMAT,
            DipError::Archive(_) | DipError::Xml { .. } | DipError::Json { .. } => {
                DIP_CODECERROR
            }
            DipError::Io { source, .. } => source.raw_os_error().unwrap_or(DIP_IOERROR),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn state_errors_render_the_directory() {
        let err = DipError::AlreadyExists {
            path: PathBuf::from("/tmp/dips/testdip"),
        };
        assert_eq!(
            err.to_string(),
            "Specified directory already exists: /tmp/dips/testdip"
        );
        assert_eq!(err.status_code(), DIP_EXISTS);
    }

    #[test]
    fn io_error_reports_os_errno_when_present() {
        let raw = std::io::Error::from_raw_os_error(13);
        assert_eq!(DipError::io("/x", raw).status_code(), 13);

        let synthetic = std::io::Error::new(std::io::ErrorKind::Other, "boom");
        assert_eq!(DipError::io("/x", synthetic).status_code(), DIP_IOERROR);
    }

    #[test]
    fn deposit_failure_message_includes_status() {
        let err = DipError::DepositFailed {
            status: Some(500),
            headers: BTreeMap::new(),
            message: String::new(),
        };
        assert_eq!(err.to_string(), "SWORD deposit failed: 500");
        assert_eq!(err.status_code(), DIP_DEPOSITFAIL);
    }
}
