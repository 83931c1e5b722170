use std::fmt;

#[derive(Debug)]
pub enum ConfigError {
    IoError(std::io::Error),
    TomlError(String),
    ServicesEmpty(String),
    BadPortsRange(String),
    DirectoryDoesNotExist(String),
    NotInRange(String),
    InvalidBanner(String),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::IoError(e) => write!(f, "IO error: {}", e),
            ConfigError::TomlError(e) => write!(f, "TOML parsing error: {}", e),
            ConfigError::ServicesEmpty(e) => write!(f, "Capabilities configuration error: {}", e),
            ConfigError::BadPortsRange(e) => write!(f, "Port range error: {}", e),
            ConfigError::DirectoryDoesNotExist(e) => write!(f, "Directory error: {}", e),
            ConfigError::NotInRange(e) => write!(f, "Value out of range: {}", e),
            ConfigError::InvalidBanner(e) => write!(f, "Banner error: {}", e),
        }
    }
}

impl std::error::Error for ConfigError {}

impl From<std::io::Error> for ConfigError {
    fn from(err: std::io::Error) -> Self {
        ConfigError::IoError(err)
    }
}

/// Transport-level failures while reading from or writing to a client.
///
/// Every variant is terminal for the session that hit it.
#[derive(Debug)]
pub enum SessionError {
    Timeout,
    LineTooLong(usize),
    IoError(std::io::Error),
}

impl fmt::Display for SessionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionError::Timeout => write!(f, "Session idle timeout expired"),
            SessionError::LineTooLong(max) => {
                write!(f, "Line exceeds the maximum length of {} bytes", max)
            }
            SessionError::IoError(e) => write!(f, "Session IO error: {}", e),
        }
    }
}

impl std::error::Error for SessionError {}

impl From<std::io::Error> for SessionError {
    fn from(err: std::io::Error) -> Self {
        SessionError::IoError(err)
    }
}

/// Grammar errors for a single tagged command line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandError {
    UnterminatedQuote,
    InvalidEscape(char),
    UnexpectedCharacter(char),
    InvalidLiteral(String),
    /// Literals above the limit; a non-synchronizing one has already been sent
    LiteralTooLarge { length: usize, synchronizing: bool },
    InvalidTag(String),
    MissingCommand,
}

impl fmt::Display for CommandError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CommandError::UnterminatedQuote => write!(f, "Unterminated quoted string"),
            CommandError::InvalidEscape(c) => write!(f, "Invalid escape sequence '\\{}'", c),
            CommandError::UnexpectedCharacter(c) => write!(f, "Unexpected character '{}'", c),
            CommandError::InvalidLiteral(e) => write!(f, "Invalid literal: {}", e),
            CommandError::LiteralTooLarge { length, .. } => {
                write!(f, "Literal of {} bytes is too large", length)
            }
            CommandError::InvalidTag(tag) => write!(f, "Invalid tag '{}'", tag),
            CommandError::MissingCommand => write!(f, "Missing command name"),
        }
    }
}

impl std::error::Error for CommandError {}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SaslError {
    InvalidBase64(String),
    InvalidUtf8,
    MalformedPayload(String),
    ExchangeComplete,
}

impl fmt::Display for SaslError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SaslError::InvalidBase64(e) => write!(f, "Invalid base64: {}", e),
            SaslError::InvalidUtf8 => write!(f, "Credential is not valid UTF-8"),
            SaslError::MalformedPayload(e) => write!(f, "Malformed SASL payload: {}", e),
            SaslError::ExchangeComplete => write!(f, "SASL exchange already complete"),
        }
    }
}

impl std::error::Error for SaslError {}

#[derive(Debug)]
pub enum NetworkError {
    BindError(std::io::Error),
    SockError(std::io::Error),
}

impl fmt::Display for NetworkError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NetworkError::BindError(e) => write!(f, "Network bind error: {}", e),
            NetworkError::SockError(e) => write!(f, "Socket error: {}", e),
        }
    }
}

impl std::error::Error for NetworkError {}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RelayError {
    AlreadyRunning,
    NotRunning,
    QueueFull,
    DispatcherFailed(String),
}

impl fmt::Display for RelayError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RelayError::AlreadyRunning => write!(f, "Reporting relay is already running"),
            RelayError::NotRunning => write!(f, "Reporting relay is not running"),
            RelayError::QueueFull => write!(f, "Reporting relay queue is full"),
            RelayError::DispatcherFailed(e) => write!(f, "Reporting dispatcher failed: {}", e),
        }
    }
}

impl std::error::Error for RelayError {}

#[derive(Debug)]
pub enum SinkError {
    IoError(std::io::Error),
    SerializationFailed(String),
}

impl fmt::Display for SinkError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SinkError::IoError(e) => write!(f, "Sink IO error: {}", e),
            SinkError::SerializationFailed(e) => write!(f, "Sink serialization failed: {}", e),
        }
    }
}

impl std::error::Error for SinkError {}

impl From<std::io::Error> for SinkError {
    fn from(err: std::io::Error) -> Self {
        SinkError::IoError(err)
    }
}

#[derive(Debug)]
pub enum ControllerError {
    ConfigurationError(ConfigError),
    NetworkError(NetworkError),
    RelayError(RelayError),
    SinkError(SinkError),
    InitializationFailed(String),
}

impl fmt::Display for ControllerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ControllerError::ConfigurationError(e) => write!(f, "Configuration error: {}", e),
            ControllerError::NetworkError(e) => write!(f, "Network error: {}", e),
            ControllerError::RelayError(e) => write!(f, "Relay error: {}", e),
            ControllerError::SinkError(e) => write!(f, "Sink error: {}", e),
            ControllerError::InitializationFailed(e) => write!(f, "Initialization failed: {}", e),
        }
    }
}

impl std::error::Error for ControllerError {}

impl From<ConfigError> for ControllerError {
    fn from(err: ConfigError) -> Self {
        ControllerError::ConfigurationError(err)
    }
}

impl From<NetworkError> for ControllerError {
    fn from(err: NetworkError) -> Self {
        ControllerError::NetworkError(err)
    }
}

impl From<RelayError> for ControllerError {
    fn from(err: RelayError) -> Self {
        ControllerError::RelayError(err)
    }
}

impl From<SinkError> for ControllerError {
    fn from(err: SinkError) -> Self {
        ControllerError::SinkError(err)
    }
}
