use num_traits::ToPrimitive;
use separator::Separatable;

use crate::types::Decimal;
use crate::util;

pub mod table;

/// Formats a monetary amount rounded to whole units with thousands separators.
pub fn format_amount(amount: Decimal) -> String {
    let rounded = util::round_to(amount, 0);

    match rounded.to_i64() {
        Some(amount) => amount.separated_string(),
        None => rounded.to_string(),
    }
}

pub fn format_amount_with_currency(amount: Decimal, currency: Option<&str>) -> String {
    let amount = format_amount(amount);

    match currency {
        Some(currency) => format!("{amount} {currency}"),
        None => amount,
    }
}

pub fn format_ratio(ratio: Decimal) -> String {
    match ratio.checked_mul(dec!(100)) {
        Some(percent) => format!("{:.1}%", util::round_to(percent, 1)),
        None => s!("-"),
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;
    use super::*;

    #[rstest(amount, expected,
        case(dec!(0), "0"),
        case(dec!(999.4), "999"),
        case(dec!(1234567.5), "1,234,568"),
        case(dec!(-90000), "-90,000"),
    )]
    fn amount_formatting(amount: Decimal, expected: &str) {
        assert_eq!(format_amount(amount), expected);
    }

    #[rstest(ratio, expected,
        case(dec!(0), "0.0%"),
        case(dec!(0.718), "71.8%"),
        case(dec!(0.12345), "12.3%"),
        case(dec!(2), "200.0%"),
        case(Decimal::MAX, "-"),
    )]
    fn ratio_formatting(ratio: Decimal, expected: &str) {
        assert_eq!(format_ratio(ratio), expected);
    }

    #[test]
    fn currency() {
        assert_eq!(format_amount_with_currency(dec!(1000), Some("CZK")), "1,000 CZK");
        assert_eq!(format_amount_with_currency(dec!(1000), None), "1,000");
    }
}
