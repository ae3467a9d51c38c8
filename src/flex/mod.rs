//! Interactive Brokers Flex Web Service client.
//!
//! Flex Query reports are generated asynchronously: a statement generation request returns a
//! reference code which is then used to pick up the report once it's ready. The received report is
//! normalized into a flat list of account metrics and open positions.

mod client;
mod credentials;
mod envelope;
mod error;
mod model;
mod normalizer;

use serde::Serialize;

use crate::config::FlexConfig;

pub use self::client::{
    DEFAULT_URL, USER_AGENT, FlexClient, HttpTransport, PollingPolicy, Sleeper, ThreadSleeper,
    Transport};
pub use self::credentials::Credentials;
pub use self::envelope::{Envelope, classify_poll, classify_submit};
pub use self::error::{ErrorKind, FlexError};
pub use self::model::{
    AccountMetric, AssetClass, MetricTag, MetricValue, OptionType, Position, Record, committed_capital};
pub use self::normalizer::normalize;

/// Runs the whole report retrieval protocol with the specified configuration.
pub fn fetch_report(config: &FlexConfig, credentials: &Credentials) -> Result<Vec<Record>, FlexError> {
    let client = FlexClient::new(config).map_err(|e| FlexError::Transport(e.to_string()))?;
    client.fetch_report(credentials)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Connectivity {
    pub connected: bool,
}

/// Checks whether the credentials required to run the protocol are present. Doesn't touch network.
pub fn probe_connectivity(token: Option<&str>, query_id: Option<&str>) -> Connectivity {
    let present = |value: Option<&str>| value.is_some_and(|value| !value.trim().is_empty());

    Connectivity {
        connected: present(token) && present(query_id),
    }
}
