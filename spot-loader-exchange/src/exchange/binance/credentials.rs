use crate::ClientError;
use std::str::FromStr;

/// API credentials parsed from a `"API_KEY=<key> SECRET_KEY=<secret>"` connection string.
///
/// An empty string yields no credentials; public market data endpoints still work.
#[derive(Default, Clone, PartialEq, Eq)]
pub struct Credentials {
    pub api_key: Option<String>,
    pub secret_key: Option<String>,
}

impl FromStr for Credentials {
    type Err = ClientError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut credentials = Credentials::default();

        for pair in s.split_whitespace() {
            let (key, value) = pair
                .split_once('=')
                .ok_or_else(|| ClientError::Credentials(format!("expected KEY=VALUE, got {pair:?}")))?;

            match key {
                "API_KEY" => credentials.api_key = Some(value.to_string()),
                "SECRET_KEY" => credentials.secret_key = Some(value.to_string()),
                _ => return Err(ClientError::Credentials(format!("unknown key {key:?}"))),
            }
        }

        match (&credentials.api_key, &credentials.secret_key) {
            (Some(_), None) => Err(ClientError::Credentials("missing SECRET_KEY".into())),
            (None, Some(_)) => Err(ClientError::Credentials("missing API_KEY".into())),
            _ => Ok(credentials),
        }
    }
}

// 避免在日志中输出密钥
impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("api_key", &self.api_key.as_ref().map(|_| "***"))
            .field("secret_key", &self.secret_key.as_ref().map(|_| "***"))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_credentials() -> Result<(), ClientError> {
        let credentials = "API_KEY=abc SECRET_KEY=def".parse::<Credentials>()?;

        assert_eq!(credentials.api_key.as_deref(), Some("abc"));
        assert_eq!(credentials.secret_key.as_deref(), Some("def"));
        assert!(!format!("{credentials:?}").contains("abc"));

        Ok(())
    }

    #[test]
    fn test_parse_empty_credentials() -> Result<(), ClientError> {
        assert_eq!("".parse::<Credentials>()?, Credentials::default());

        Ok(())
    }

    #[test]
    fn test_parse_invalid_credentials() {
        assert!("API_KEY".parse::<Credentials>().is_err());
        assert!("API_KEY=abc".parse::<Credentials>().is_err());
        assert!("TOKEN=abc".parse::<Credentials>().is_err());
    }
}
