use std::fmt::Display;

#[derive(Debug, Clone, PartialEq)]
pub enum Error {
    /// The predicate tree failed structural or range validation.
    MalformedExpression(String),
    /// A column or sort key resolved against neither the primary entity nor
    /// any declared relation.
    UnknownColumn(String),
    Storage(String),
    Deserialize(String),
    Config(String),
}

impl Error {
    /// Client-input failures, as opposed to server-side ones.
    pub fn is_client_error(&self) -> bool {
        matches!(self, Error::MalformedExpression(_) | Error::UnknownColumn(_))
    }
}

impl Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::MalformedExpression(err) => write!(f, "Malformed expression: {}", err),
            Error::UnknownColumn(name) => write!(f, "Unknown column: {}", name),
            Error::Storage(err) => write!(f, "Storage error: {}", err),
            Error::Deserialize(err) => write!(f, "Deserialization error: {}", err),
            Error::Config(err) => write!(f, "Configuration error: {}", err),
        }
    }
}

impl std::error::Error for Error {}

impl From<config::ConfigError> for Error {
    fn from(err: config::ConfigError) -> Self {
        Error::Config(err.to_string())
    }
}
