use strum::{Display, IntoStaticStr};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, IntoStaticStr)]
pub enum ErrorKind {
    MissingCredentials,
    MalformedDocument,
    RequestRejected,
    ProtocolViolation,
    Timeout,
    EmptyStatement,
    Transport,
}

/// Terminal Flex report retrieval errors.
///
/// Messages are meant to be shown to the user, so they never include raw provider payloads, which
/// are logged instead.
#[derive(Debug, thiserror::Error)]
pub enum FlexError {
    #[error("Flex token or query ID is not configured")]
    MissingCredentials,

    #[error("Got an invalid {context}: {message}")]
    MalformedDocument {
        context: &'static str,
        message: String,
    },

    #[error("Flex request has been rejected: {message}")]
    RequestRejected {
        code: Option<String>,
        message: String,
    },

    #[error("Got an unexpected Flex Web Service response: {0}")]
    ProtocolViolation(String),

    #[error("The report hasn't been generated after {attempts} attempts")]
    Timeout {
        attempts: u32,
    },

    #[error("The report contains no statement")]
    EmptyStatement,

    #[error("Flex request has failed: {0}")]
    Transport(String),
}

impl FlexError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            FlexError::MissingCredentials => ErrorKind::MissingCredentials,
            FlexError::MalformedDocument {..} => ErrorKind::MalformedDocument,
            FlexError::RequestRejected {..} => ErrorKind::RequestRejected,
            FlexError::ProtocolViolation(_) => ErrorKind::ProtocolViolation,
            FlexError::Timeout {..} => ErrorKind::Timeout,
            FlexError::EmptyStatement => ErrorKind::EmptyStatement,
            FlexError::Transport(_) => ErrorKind::Transport,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kinds() {
        let error = FlexError::RequestRejected {code: Some(s!("1012")), message: s!("Token has expired.")};
        assert_eq!(error.kind(), ErrorKind::RequestRejected);
        assert_eq!(error.to_string(), "Flex request has been rejected: Token has expired.");

        let error = FlexError::Timeout {attempts: 20};
        assert_eq!(error.kind().to_string(), "Timeout");
        assert_eq!(error.to_string(), "The report hasn't been generated after 20 attempts");
    }
}
