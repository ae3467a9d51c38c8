use std::time::Instant;

use log::debug;
use reqwest::blocking::Client;

use crate::core::GenericResult;
use crate::util;

/// Sends a GET request and returns the response body.
///
/// Error responses which carry a body are returned as is: the service may describe the failure in
/// its regular response format. Error responses without a body are turned into an error.
// Query parameters may carry secrets, so only the endpoint is logged
pub fn send_request(client: &Client, url: &str, params: &[(&str, &str)]) -> GenericResult<String> {
    debug!("Sending request to {url}...");
    let start = Instant::now();
    let response = client.get(url).query(params).send().map_err(util::humanize_reqwest_error)?;
    let duration = start.elapsed();
    debug!("Got response from {url} ({duration:?}).");

    let status = response.status();
    let body = response.text().map_err(util::humanize_reqwest_error)?;

    if !status.is_success() {
        if body.trim().is_empty() {
            return Err!("Server returned an error: {}", status);
        }
        debug!("Server returned an error: {status}. Passing its response body to the caller.");
    }

    Ok(body)
}
