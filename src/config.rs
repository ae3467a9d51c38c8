use std::env;
use std::fs;
use std::io::ErrorKind;
use std::path::Path;
use std::time::Duration;

use log::debug;
use serde::Deserialize;
use serde::de::Deserializer;

use crate::core::{EmptyResult, GenericResult};
use crate::flex::{self, Connectivity, Credentials, FlexError, PollingPolicy};
use crate::time;

pub const TOKEN_ENV_VAR: &str = "FLEX_TOKEN";
pub const QUERY_ID_ENV_VAR: &str = "FLEX_QUERY_ID";

#[derive(Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct Config {
    #[serde(default)]
    pub flex: FlexConfig,
}

impl Config {
    pub fn new(config_dir: &str) -> GenericResult<Config> {
        let config_dir = shellexpand::tilde(config_dir).to_string();
        let path = Path::new(&config_dir).join("config.yaml");

        let mut config = match fs::read(&path) {
            Ok(data) => Config::parse(&data).map_err(|e| format!(
                "Error while reading {path:?} configuration file: {e}"))?,
            Err(err) if err.kind() == ErrorKind::NotFound => {
                debug!("{path:?} doesn't exist. Using the default configuration.");
                Config::default()
            },
            Err(err) => return Err!("Unable to read {path:?}: {err}"),
        };

        config.flex.apply_environment(|name| env::var(name).ok());

        Ok(config)
    }

    fn parse(data: &[u8]) -> GenericResult<Config> {
        let config: Config = serde_yaml::from_slice(data)?;
        config.flex.validate()?;
        Ok(config)
    }
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FlexConfig {
    #[serde(skip, default = "FlexConfig::default_url")]
    pub url: String,

    #[serde(default, deserialize_with = "deserialize_identifier")]
    pub token: Option<String>,
    #[serde(default, deserialize_with = "deserialize_identifier")]
    pub query_id: Option<String>,

    #[serde(default = "FlexConfig::default_poll_interval", deserialize_with = "time::deserialize_duration")]
    pub poll_interval: Duration,
    #[serde(default = "FlexConfig::default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "FlexConfig::default_request_timeout", deserialize_with = "time::deserialize_duration")]
    pub request_timeout: Duration,
}

impl Default for FlexConfig {
    fn default() -> FlexConfig {
        FlexConfig {
            url: FlexConfig::default_url(),
            token: None,
            query_id: None,
            poll_interval: FlexConfig::default_poll_interval(),
            max_attempts: FlexConfig::default_max_attempts(),
            request_timeout: FlexConfig::default_request_timeout(),
        }
    }
}

impl FlexConfig {
    fn default_url() -> String {
        s!(flex::DEFAULT_URL)
    }

    fn default_poll_interval() -> Duration {
        PollingPolicy::default().interval
    }

    fn default_max_attempts() -> u32 {
        PollingPolicy::default().max_attempts
    }

    fn default_request_timeout() -> Duration {
        Duration::from_secs(10)
    }

    pub fn credentials(&self) -> Result<Credentials, FlexError> {
        match (self.token.as_deref(), self.query_id.as_deref()) {
            (Some(token), Some(query_id)) => Credentials::new(token, query_id),
            _ => Err(FlexError::MissingCredentials),
        }
    }

    pub fn connectivity(&self) -> Connectivity {
        flex::probe_connectivity(self.token.as_deref(), self.query_id.as_deref())
    }

    pub fn polling_policy(&self) -> PollingPolicy {
        PollingPolicy {
            interval: self.poll_interval,
            max_attempts: self.max_attempts,
        }
    }

    fn apply_environment<F: Fn(&str) -> Option<String>>(&mut self, getter: F) {
        let get = |name| getter(name).filter(|value: &String| !value.trim().is_empty());

        if self.token.is_none() {
            self.token = get(TOKEN_ENV_VAR);
        }

        if self.query_id.is_none() {
            self.query_id = get(QUERY_ID_ENV_VAR);
        }
    }

    fn validate(&self) -> EmptyResult {
        if self.max_attempts == 0 {
            return Err!("Invalid maximum number of report pickup attempts: {}", self.max_attempts);
        }
        Ok(())
    }
}

// Query IDs are numbers, so they are likely to be specified without quotes
fn deserialize_identifier<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
    where D: Deserializer<'de>
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Identifier {
        String(String),
        Number(u64),
    }

    Ok(Option::<Identifier>::deserialize(deserializer)?.map(|identifier| match identifier {
        Identifier::String(value) => value,
        Identifier::Number(value) => value.to_string(),
    }))
}

#[cfg(test)]
mod tests {
    use indoc::indoc;
    use super::*;

    #[test]
    fn parsing() {
        let config = Config::parse(indoc!("
            flex:
              token: '123456789012345678901234'
              query_id: 987654
              poll_interval: 5s
              max_attempts: 10
              request_timeout: 1m
        ").as_bytes()).unwrap();

        let flex = &config.flex;
        assert_eq!(flex.url, flex::DEFAULT_URL);
        assert_eq!(flex.token.as_deref(), Some("123456789012345678901234"));
        assert_eq!(flex.query_id.as_deref(), Some("987654"));
        assert_eq!(flex.poll_interval, Duration::from_secs(5));
        assert_eq!(flex.max_attempts, 10);
        assert_eq!(flex.request_timeout, Duration::from_secs(60));

        let credentials = flex.credentials().unwrap();
        assert_eq!(credentials.query_id(), "987654");
        assert!(flex.connectivity().connected);
    }

    #[test]
    fn defaults() {
        let config = Config::parse(indoc!("
            flex:
              query_id: '987654'
        ").as_bytes()).unwrap();

        let flex = &config.flex;
        assert_eq!(flex.token, None);
        assert_eq!(flex.poll_interval, Duration::from_secs(2));
        assert_eq!(flex.max_attempts, 20);
        assert_eq!(flex.request_timeout, Duration::from_secs(10));

        assert!(matches!(flex.credentials(), Err(FlexError::MissingCredentials)));
        assert!(!flex.connectivity().connected);
    }

    #[test]
    fn invalid() {
        for data in [
            "flex: {unknown: 1}",
            "flex: {max_attempts: 0}",
            "flex: {poll_interval: 2}",
            "flex: {poll_interval: 2d}",
            "other: {}",
        ] {
            assert!(Config::parse(data.as_bytes()).is_err(), "{data}");
        }
    }

    #[test]
    fn environment() {
        let mut config = FlexConfig::default();
        config.query_id = Some(s!("111"));

        config.apply_environment(|name| match name {
            TOKEN_ENV_VAR => Some(s!("env-token")),
            QUERY_ID_ENV_VAR => Some(s!("222")),
            _ => None,
        });

        assert_eq!(config.token.as_deref(), Some("env-token"));
        assert_eq!(config.query_id.as_deref(), Some("111"));

        let mut config = FlexConfig::default();
        config.apply_environment(|_| Some(s!(" ")));
        assert_eq!(config.token, None);
        assert_eq!(config.query_id, None);
    }

    #[test]
    fn loading() {
        let config_dir = tempfile::tempdir().unwrap();
        let config_dir_path = config_dir.path().to_str().unwrap();

        let config = Config::new(config_dir_path).unwrap();
        assert_eq!(config.flex.max_attempts, 20);

        fs::write(config_dir.path().join("config.yaml"), "flex: {max_attempts: 3}").unwrap();
        let config = Config::new(config_dir_path).unwrap();
        assert_eq!(config.flex.max_attempts, 3);

        fs::write(config_dir.path().join("config.yaml"), "flex: {max_attempts: -1}").unwrap();
        assert!(Config::new(config_dir_path).is_err());
    }
}
