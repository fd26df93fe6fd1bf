use thiserror::Error;

#[derive(Debug, Error)]
pub enum HwError {
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
    #[error("serial port {port}: {message}")]
    Serial { port: String, message: String },
    #[error("timeout waiting for response")]
    Timeout,
    #[error("device is not open")]
    NotOpen,
    #[error("Could not parse response {response:?} to {query:?}")]
    InvalidResponse { query: String, response: String },
    #[error("connection failed: {0}")]
    Connection(String),
    #[error("unknown driver: {0}")]
    UnknownDriver(String),
    #[error("invalid args for driver {driver}: {message}")]
    InvalidArgs { driver: String, message: String },
    #[error("serial worker for {0} is not running")]
    WorkerGone(String),
    #[error("unsupported: {0}")]
    Unsupported(String),
}

impl HwError {
    /// Errors after which the link can no longer be trusted and must be reopened.
    pub fn is_link_fatal(&self) -> bool {
        matches!(self, HwError::Io(_) | HwError::Serial { .. })
    }

    /// Short variant name shown to users next to the message.
    pub fn kind_name(&self) -> &'static str {
        match self {
            HwError::Io(_) => "IoError",
            HwError::Serial { .. } => "SerialError",
            HwError::Timeout => "Timeout",
            HwError::NotOpen => "NotOpen",
            HwError::InvalidResponse { .. } => "InvalidResponse",
            HwError::Connection(_) => "ConnectionError",
            HwError::UnknownDriver(_) => "UnknownDriver",
            HwError::InvalidArgs { .. } => "InvalidArgs",
            HwError::WorkerGone(_) => "WorkerGone",
            HwError::Unsupported(_) => "Unsupported",
        }
    }
}

pub type Result<T> = std::result::Result<T, HwError>;
