use std::fmt;

use crate::util;

use super::error::FlexError;

/// Flex Web Service access token and the ID of the query to run.
#[derive(Clone)]
pub struct Credentials {
    token: String,
    query_id: String,
}

impl Credentials {
    pub fn new(token: &str, query_id: &str) -> Result<Credentials, FlexError> {
        let (token, query_id) = (token.trim(), query_id.trim());
        if token.is_empty() || query_id.is_empty() {
            return Err(FlexError::MissingCredentials);
        }

        Ok(Credentials {
            token: token.to_owned(),
            query_id: query_id.to_owned(),
        })
    }

    pub fn token(&self) -> &str {
        &self.token
    }

    pub fn masked_token(&self) -> String {
        util::mask_secret(&self.token)
    }

    pub fn query_id(&self) -> &str {
        &self.query_id
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("token", &self.masked_token())
            .field("query_id", &self.query_id)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation() {
        let credentials = Credentials::new(" 123456789 ", "987654").unwrap();
        assert_eq!(credentials.token(), "123456789");
        assert_eq!(credentials.query_id(), "987654");

        for (token, query_id) in [("", "1"), ("1", ""), (" ", "1"), ("1", "\t")] {
            assert!(matches!(Credentials::new(token, query_id), Err(FlexError::MissingCredentials)));
        }
    }

    #[test]
    fn debug_output() {
        let credentials = Credentials::new("123456789", "987654").unwrap();
        let debug = format!("{credentials:?}");
        assert!(!debug.contains("123456789"));
        assert!(debug.contains("1234..."));
    }
}
