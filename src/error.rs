use std::fmt;

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("elevation was declined or failed for `{command}`:\n{output}")]
    ElevationDeclined { command: String, output: String },
    #[error("`{command}` failed ({status}):\n{output}")]
    ToolFailure {
        command: String,
        status: ExitInfo,
        output: String,
    },
    #[error("temporary file error: {0}")]
    TempFile(#[source] std::io::Error),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("unsupported trust settings version: {found}")]
    SchemaVersion { found: String },
    #[error("no trust entry matches the certificate subject")]
    EntryNotFound,
    #[error("failed to parse trust settings: {0}")]
    Parse(String),
    #[error("failed to serialize trust settings: {0}")]
    Encode(String),
    #[error("invalid certificate: {0}")]
    Certificate(String),
    #[error("unsupported environment: {0}")]
    UnsupportedEnvironment(String),
    #[error("configuration error: {0}")]
    Config(String),
}

impl Error {
    /// Everything except a missing trust entry aborts the install.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, Error::EntryNotFound)
    }
}

/// Exit status of a finished external command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitInfo {
    Code(i32),
    Signal,
}

impl fmt::Display for ExitInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExitInfo::Code(code) => write!(f, "exit status {}", code),
            ExitInfo::Signal => write!(f, "terminated by signal"),
        }
    }
}
