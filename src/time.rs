use std::time::Duration;

use lazy_static::lazy_static;
use regex::Regex;
use serde::Deserialize;
use serde::de::{Deserializer, Error};

use crate::core::GenericResult;
use crate::types::Date;

/// Converts provider's `YYYYMMDD` dates to `DD.MM.YYYY`.
///
/// Anything that isn't exactly 8 characters long (already formatted dates, `N/A`, etc.) is returned
/// as is.
pub fn format_report_date(date: &str) -> String {
    if date.len() != 8 || !date.is_char_boundary(4) || !date.is_char_boundary(6) {
        return date.to_owned();
    }
    format!("{}.{}.{}", &date[6..8], &date[4..6], &date[0..4])
}

/// Parses both raw (`YYYYMMDD`) and formatted (`DD.MM.YYYY`) report dates.
pub fn parse_report_date(date: &str) -> Option<Date> {
    let format = if date.contains('.') {
        "%d.%m.%Y"
    } else if date.len() == 8 {
        "%Y%m%d"
    } else {
        return None;
    };

    Date::parse_from_str(date, format).ok()
}

pub fn parse_duration(string: &str) -> GenericResult<Duration> {
    lazy_static! {
        static ref DURATION_REGEX: Regex = Regex::new(r"^(?P<number>[1-9]\d*)(?P<unit>[smh])$").unwrap();
    }

    let seconds = DURATION_REGEX.captures(string).and_then(|captures| {
        let duration = captures.name("number").unwrap().as_str().parse::<u64>().ok()?;

        duration.checked_mul(match captures.name("unit").unwrap().as_str() {
            "s" => 1,
            "m" => 60,
            "h" => 60 * 60,
            _ => unreachable!(),
        })
    }).ok_or_else(|| format!("Invalid duration: {string}"))?;

    Ok(Duration::from_secs(seconds))
}

pub fn deserialize_duration<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where D: Deserializer<'de>
{
    let duration: String = Deserialize::deserialize(deserializer)?;
    parse_duration(&duration).map_err(D::Error::custom)
}
