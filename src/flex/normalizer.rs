use log::{debug, error, trace};

use crate::formats::xml::Node;
use crate::time;
use crate::types::Decimal;

use super::envelope::STATEMENTS_KEY;
use super::error::FlexError;
use super::model::{
    AccountMetric, AssetClass, MetricTag, MetricValue, OptionType, Position, Record,
    committed_capital};

const STATEMENT_KEY: &str = "FlexStatement";

const EQUITY_SUMMARY_KEY: &str = "EquitySummaryInBase";
const EQUITY_SUMMARY_ENTRY_KEY: &str = "EquitySummaryByReportDateInBase";

const OPEN_POSITIONS_KEY: &str = "OpenPositions";
const OPEN_POSITION_KEY: &str = "OpenPosition";

const SUMMARY_LEVEL_OF_DETAIL: &str = "SUMMARY";

// Provider field name variants in order of preference
const MONETARY_METRICS: &[(MetricTag, &[&str])] = &[
    (MetricTag::AvailableFunds, &["cash", "cashBalance"]),
    (MetricTag::NetLiquidation, &["total", "totalNav"]),
    (MetricTag::StockValueLong, &["stockLong", "stock", "stockMarketValue"]),
    (MetricTag::OptionValueShort, &["optionsShort", "options", "optionMarketValue"]),
    (MetricTag::InitMarginReq, &["initMarginReq"]),
];

/// Converts the raw report into a list of account metrics followed by open positions.
///
/// The function is pure: normalizing the same report always yields the same result.
pub fn normalize(report: &Node) -> Result<Vec<Record>, FlexError> {
    let statement = report.node(STATEMENTS_KEY).and_then(|statements| statements.node(STATEMENT_KEY))
        .ok_or_else(|| {
            error!("The report contains no statement. Report keys: {:?}.", report.keys().collect::<Vec<_>>());
            FlexError::EmptyStatement
        })?;

    if let Some(account_id) = statement.non_empty_text("accountId") {
        debug!("Processing {account_id} account statement...");
    }

    let mut records = Vec::new();

    records.extend(parse_metrics(statement).into_iter().map(Record::Metric));
    records.extend(parse_positions(statement).into_iter().map(Record::Position));

    Ok(records)
}

fn parse_metrics(statement: &Node) -> Vec<AccountMetric> {
    let entries = statement.node(EQUITY_SUMMARY_KEY)
        .map(|summary| summary.nodes(EQUITY_SUMMARY_ENTRY_KEY))
        .unwrap_or_default();

    let Some(summary) = latest_summary(&entries) else {
        debug!("The statement has no equity summary. Statement sections: {:?}.",
               statement.keys().collect::<Vec<_>>());
        return Vec::new();
    };

    let currency = statement.non_empty_text("currency")
        .or_else(|| statement.node("AccountInformation").and_then(|info| info.non_empty_text("currency")))
        .or_else(|| summary.non_empty_text("currency"))
        .map(|currency| currency.into_owned());

    let mut metrics = Vec::new();

    for &(tag, fields) in MONETARY_METRICS {
        let Some(value) = fields.iter().find_map(|&field| summary.scalar(field)) else {
            continue;
        };

        metrics.push(AccountMetric {
            tag,
            value: MetricValue::Number(value.as_decimal().unwrap_or_else(|| {
                debug!("Got a non-numeric {tag} value: {value:?}.");
                Decimal::ZERO
            })),
            currency: currency.clone(),
        });
    }

    if let Some(date) = summary.non_empty_text("reportDate") {
        metrics.push(AccountMetric {
            tag: MetricTag::ReportDate,
            value: MetricValue::Text(time::format_report_date(&date)),
            currency: None,
        });
    }

    metrics
}

// Picks the entry with the latest report date (the first one wins on equal dates)
fn latest_summary<'a>(entries: &[&'a Node]) -> Option<&'a Node> {
    let mut latest: Option<(&Node, u64)> = None;

    for &entry in entries {
        let date = entry.text("reportDate")
            .and_then(|date| date.trim().parse::<u64>().ok())
            .unwrap_or(0);

        match latest {
            Some((_, latest_date)) if latest_date >= date => {},
            _ => latest = Some((entry, date)),
        }
    }

    latest.map(|(entry, _)| entry)
}

fn parse_positions(statement: &Node) -> Vec<Position> {
    let rows = statement.node(OPEN_POSITIONS_KEY)
        .map(|positions| positions.nodes(OPEN_POSITION_KEY))
        .unwrap_or_default();

    let mut positions = Vec::with_capacity(rows.len());

    for row in rows {
        if let Some(level) = row.non_empty_text("levelOfDetail") {
            if !level.trim().eq_ignore_ascii_case(SUMMARY_LEVEL_OF_DETAIL) {
                trace!("Skipping {level} level position row.");
                continue;
            }
        }
        positions.push(parse_position(row));
    }

    positions
}

fn parse_position(row: &Node) -> Position {
    let quantity = number(row, "position");
    let asset_class = AssetClass::parse(&row.text("assetCategory").unwrap_or_default());
    let option_type = row.text("putCall").and_then(|code| OptionType::parse(code.trim()));
    let strike = number(row, "strike");
    let multiplier = number_or(row, "multiplier", Decimal::ONE);
    let cost_basis_price = number(row, "costBasisPrice");

    Position {
        symbol: row.text("symbol").unwrap_or_default().into_owned(),
        underlying: row.non_empty_text("underlyingSymbol").map(|symbol| symbol.into_owned()),
        quantity,
        mark_price: number(row, "markPrice"),
        market_value: number(row, "positionValue"),
        fx_rate_to_base: number_or(row, "fxRateToBase", Decimal::ONE),
        multiplier,
        expiry: row.non_empty_text("expiry").map(|expiry| time::format_report_date(&expiry)),
        strike,
        option_type,
        committed_capital: committed_capital(&asset_class, quantity, option_type, strike, multiplier),
        asset_class,
        cost_price: if cost_basis_price.is_zero() {
            number(row, "costPrice")
        } else {
            cost_basis_price
        },
        cost_basis_price,
        fifo_pnl_unrealized: number(row, "fifoPnlUnrealized"),
        unrealized_pnl: number(row, "unrealizedPnL"),
        cost_basis_money: number(row, "costBasisMoney"),
        currency: row.text("currency").unwrap_or_default().into_owned(),
    }
}

fn number(row: &Node, key: &str) -> Decimal {
    number_or(row, key, Decimal::ZERO)
}

// Missing, empty and zero values are replaced by the default one
fn number_or(row: &Node, key: &str, default: Decimal) -> Decimal {
    match row.decimal(key) {
        Some(value) if !value.is_zero() => value,
        _ => default,
    }
}
