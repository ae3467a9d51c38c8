use std::time::Duration;

use log::{debug, error, info, trace, warn};
use reqwest::blocking::Client;

use crate::config::FlexConfig;
use crate::core::GenericResult;
use crate::formats::xml::{self, Node};
use crate::http;

use super::credentials::Credentials;
use super::envelope::{self, Envelope};
use super::error::FlexError;
use super::model::Record;
use super::normalizer;

pub const DEFAULT_URL: &str = "https://www.interactivebrokers.com/Universal/servlet";

const SEND_REQUEST_ENDPOINT: &str = "FlexStatementService.SendRequest";
const GET_STATEMENT_ENDPOINT: &str = "FlexStatementService.GetStatement";
const PROTOCOL_VERSION: &str = "3";

// Flex Web Service rejects requests from some HTTP clients, so mimic the client it expects
pub const USER_AGENT: &str = "Java/1.8.0_202";

pub trait Transport {
    fn get(&self, endpoint: &str, params: &[(&str, &str)]) -> GenericResult<String>;
}

impl<T: Transport + ?Sized> Transport for &T {
    fn get(&self, endpoint: &str, params: &[(&str, &str)]) -> GenericResult<String> {
        (**self).get(endpoint, params)
    }
}

pub struct HttpTransport {
    url: String,
    client: Client,
}

impl HttpTransport {
    pub fn new(url: &str, timeout: Duration) -> GenericResult<HttpTransport> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(timeout)
            .build()?;

        Ok(HttpTransport {
            url: url.trim_end_matches('/').to_owned(),
            client,
        })
    }
}

impl Transport for HttpTransport {
    fn get(&self, endpoint: &str, params: &[(&str, &str)]) -> GenericResult<String> {
        let url = format!("{}/{}", self.url, endpoint);
        http::send_request(&self.client, &url, params)
    }
}

pub trait Sleeper {
    fn sleep(&self, duration: Duration);
}

impl<S: Sleeper + ?Sized> Sleeper for &S {
    fn sleep(&self, duration: Duration) {
        (**self).sleep(duration)
    }
}

pub struct ThreadSleeper;

impl Sleeper for ThreadSleeper {
    fn sleep(&self, duration: Duration) {
        std::thread::sleep(duration)
    }
}

#[derive(Debug, Clone, Copy)]
pub struct PollingPolicy {
    pub interval: Duration,
    pub max_attempts: u32,
}

impl Default for PollingPolicy {
    fn default() -> PollingPolicy {
        PollingPolicy {
            interval: Duration::from_secs(2),
            max_attempts: 20,
        }
    }
}

enum State {
    Submitting,
    Polling {
        reference_code: String,
        attempt: u32,
    },
    Succeeded(Node),
    Failed(FlexError),
}

/// Flex Web Service client.
///
/// Each fetch runs the whole protocol from scratch: the statement generation request, then
/// sequential pickup attempts with a fixed delay before each one until the report is ready or the
/// attempt budget is exhausted. The client holds no state between fetches.
pub struct FlexClient<T: Transport = HttpTransport, S: Sleeper = ThreadSleeper> {
    transport: T,
    sleeper: S,
    policy: PollingPolicy,
}

impl FlexClient {
    pub fn new(config: &FlexConfig) -> GenericResult<FlexClient> {
        let transport = HttpTransport::new(&config.url, config.request_timeout)?;
        Ok(FlexClient::with_transport(transport, ThreadSleeper, config.polling_policy()))
    }
}

impl<T: Transport, S: Sleeper> FlexClient<T, S> {
    pub fn with_transport(transport: T, sleeper: S, policy: PollingPolicy) -> FlexClient<T, S> {
        FlexClient {transport, sleeper, policy}
    }

    /// Runs the report retrieval protocol and normalizes the received report.
    pub fn fetch_report(&self, credentials: &Credentials) -> Result<Vec<Record>, FlexError> {
        let report = self.retrieve(credentials)?;
        normalizer::normalize(&report)
    }

    /// Runs the report retrieval protocol returning the raw report.
    pub fn retrieve(&self, credentials: &Credentials) -> Result<Node, FlexError> {
        info!("Requesting Flex report (token: {}, query ID: {})...",
              credentials.masked_token(), credentials.query_id());

        let mut state = State::Submitting;

        loop {
            state = match state {
                State::Submitting => self.submit(credentials),
                State::Polling {reference_code, attempt} => self.poll(credentials, reference_code, attempt),
                State::Succeeded(report) => return Ok(report),
                State::Failed(err) => return Err(err),
            };
        }
    }

    fn submit(&self, credentials: &Credentials) -> State {
        let response = match self.transport.get(SEND_REQUEST_ENDPOINT, &[
            ("t", credentials.token()),
            ("q", credentials.query_id()),
            ("v", PROTOCOL_VERSION),
        ]) {
            Ok(response) => response,
            Err(err) => return State::Failed(FlexError::Transport(err.to_string())),
        };

        let document = match xml::decode(&response) {
            Ok(document) => document,
            Err(err) => {
                error!("Got an invalid statement request response ({err}):\n{response}");
                return State::Failed(FlexError::MalformedDocument {
                    context: "statement request response",
                    message: err.to_string(),
                });
            },
        };

        match envelope::classify_submit(&document) {
            Ok(Envelope::InitialAck {reference_code}) => {
                debug!("The statement has been requested. Reference code: {reference_code}.");
                State::Polling {reference_code, attempt: 0}
            },
            Ok(Envelope::InitialFailure {error_code, error_message}) => {
                State::Failed(FlexError::RequestRejected {code: error_code, message: error_message})
            },
            Ok(envelope) => {
                error!("Got an unexpected statement request response:\n{}", dump(&document));
                State::Failed(FlexError::ProtocolViolation(format!(
                    "unexpected statement request response: {envelope:?}")))
            },
            Err(err) => {
                error!("Got an unexpected statement request response:\n{}", dump(&document));
                State::Failed(err)
            },
        }
    }

    fn poll(&self, credentials: &Credentials, reference_code: String, attempt: u32) -> State {
        if attempt >= self.policy.max_attempts {
            return State::Failed(FlexError::Timeout {attempts: attempt});
        }

        let attempt = attempt + 1;
        self.sleeper.sleep(self.policy.interval);

        debug!("Picking up the report (attempt {attempt}/{})...", self.policy.max_attempts);

        let response = match self.transport.get(GET_STATEMENT_ENDPOINT, &[
            ("t", credentials.token()),
            ("q", reference_code.as_str()),
            ("v", PROTOCOL_VERSION),
        ]) {
            Ok(response) => response,
            Err(err) => {
                warn!("Report pickup attempt #{attempt} has failed: {err}.");
                return State::Polling {reference_code, attempt};
            },
        };

        let document = match xml::decode(&response) {
            Ok(document) => document,
            Err(err) => {
                warn!("Got an invalid pickup response on attempt #{attempt}: {err}.");
                trace!("Pickup response:\n{response}");
                return State::Polling {reference_code, attempt};
            },
        };

        match envelope::classify_poll(&document) {
            Envelope::PollSuccess {statement_root} => {
                info!("The report has been received (attempt #{attempt}).");
                State::Succeeded(statement_root)
            },
            Envelope::PollFailure {error_code, error_message} => {
                debug!("Pickup response:\n{}", dump(&document));
                State::Failed(FlexError::RequestRejected {
                    code: Some(error_code),
                    message: error_message,
                })
            },
            _ => {
                trace!("Pickup response:\n{}", dump(&document));
                State::Polling {reference_code, attempt}
            },
        }
    }
}

fn dump(document: &Node) -> String {
    serde_json::to_string_pretty(document).unwrap_or_else(|e| format!(
        "Failed to serialize the document: {e}"))
}
