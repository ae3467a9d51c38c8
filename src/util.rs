use std::error::Error;

use rust_decimal::RoundingStrategy;

use crate::core::GenericError;
use crate::types::Decimal;

pub fn humanize_reqwest_error(err: reqwest::Error) -> GenericError {
    if err.is_timeout() {
        return s!("Request timed out").into();
    }

    if err.is_connect() {
        let mut message = s!("Failed to connect to the server");

        // reqwest's own message for connection errors is too generic, so show the root cause
        let mut source = err.source();
        while let Some(error) = source {
            match error.source() {
                Some(inner) => source = Some(inner),
                None => {
                    message = format!("{message}: {error}");
                    break;
                },
            }
        }

        return message.into();
    }

    err.without_url().into()
}

pub fn round_to(value: Decimal, points: u32) -> Decimal {
    value.round_dp_with_strategy(points, RoundingStrategy::MidpointAwayFromZero).normalize()
}

/// Masks sensitive value leaving only a short prefix to be able to identify it in logs.
pub fn mask_secret(secret: &str) -> String {
    let prefix: String = secret.chars().take(4).collect();
    format!("{prefix}...")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rounding() {
        assert_eq!(round_to(dec!(1.25), 1), dec!(1.3));
        assert_eq!(round_to(dec!(-1.25), 1), dec!(-1.3));
        assert_eq!(round_to(dec!(1.20), 1), dec!(1.2));
    }

    #[test]
    fn secret_masking() {
        assert_eq!(mask_secret("123456789012345678901234"), "1234...");
        assert_eq!(mask_secret("12"), "12...");
        assert_eq!(mask_secret(""), "...");
    }
}
