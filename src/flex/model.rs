use std::fmt;

use log::warn;
use serde::{Serialize, Serializer};
use serde::ser::SerializeStruct;
use strum::{AsRefStr, Display};

use crate::types::Decimal;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Display, AsRefStr)]
pub enum MetricTag {
    AvailableFunds,
    NetLiquidation,
    StockValueLong,
    OptionValueShort,
    InitMarginReq,
    ReportDate,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum MetricValue {
    Number(#[serde(with = "rust_decimal::serde::float")] Decimal),
    Text(String),
}

impl MetricValue {
    pub fn as_decimal(&self) -> Option<Decimal> {
        match self {
            MetricValue::Number(value) => Some(*value),
            MetricValue::Text(_) => None,
        }
    }
}

impl fmt::Display for MetricValue {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            MetricValue::Number(value) => value.fmt(f),
            MetricValue::Text(value) => value.fmt(f),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AccountMetric {
    pub tag: MetricTag,
    pub value: MetricValue,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub currency: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AssetClass {
    Stock,
    Option,
    Crypto,
    Future,
    Other(String),
}

impl AssetClass {
    pub fn parse(code: &str) -> AssetClass {
        match code {
            "STK" => AssetClass::Stock,
            "OPT" => AssetClass::Option,
            "CRYPTO" => AssetClass::Crypto,
            "FUT" => AssetClass::Future,
            _ => AssetClass::Other(code.to_owned()),
        }
    }

    pub fn code(&self) -> &str {
        match self {
            AssetClass::Stock => "STK",
            AssetClass::Option => "OPT",
            AssetClass::Crypto => "CRYPTO",
            AssetClass::Future => "FUT",
            AssetClass::Other(code) => code,
        }
    }
}

impl fmt::Display for AssetClass {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl Serialize for AssetClass {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.code())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Display)]
#[serde(rename_all = "UPPERCASE")]
#[strum(serialize_all = "UPPERCASE")]
pub enum OptionType {
    Call,
    Put,
}

impl OptionType {
    pub fn parse(code: &str) -> Option<OptionType> {
        match code {
            "C" => Some(OptionType::Call),
            "P" => Some(OptionType::Put),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Position {
    pub symbol: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub underlying: Option<String>,
    #[serde(with = "rust_decimal::serde::float")]
    pub quantity: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub mark_price: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub market_value: Decimal,
    pub asset_class: AssetClass,
    #[serde(with = "rust_decimal::serde::float")]
    pub fx_rate_to_base: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub multiplier: Decimal,
    pub expiry: Option<String>,
    #[serde(with = "rust_decimal::serde::float")]
    pub strike: Decimal,
    pub option_type: Option<OptionType>,
    #[serde(with = "rust_decimal::serde::float")]
    pub committed_capital: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub cost_price: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub cost_basis_price: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub fifo_pnl_unrealized: Decimal,
    #[serde(rename = "unrealizedPnL")]
    #[serde(with = "rust_decimal::serde::float")]
    pub unrealized_pnl: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub cost_basis_money: Decimal,
    #[serde(skip)]
    pub currency: String,
}

impl Position {
    pub fn base_market_value(&self) -> Decimal {
        self.to_base("market value", self.market_value)
    }

    pub fn base_committed_capital(&self) -> Decimal {
        self.to_base("committed capital", self.committed_capital)
    }

    fn to_base(&self, name: &str, value: Decimal) -> Decimal {
        value.checked_mul(self.fx_rate_to_base).unwrap_or_else(|| {
            warn!("{}: {name} in base currency is out of range ({value} * {}).",
                  self.symbol, self.fx_rate_to_base);
            Decimal::ZERO
        })
    }
}

/// Capital reserved by short put obligations (negative for short positions).
///
/// Values which don't fit into decimal range yield zero.
pub fn committed_capital(
    asset_class: &AssetClass, quantity: Decimal, option_type: Option<OptionType>, strike: Decimal,
    multiplier: Decimal,
) -> Decimal {
    if *asset_class != AssetClass::Option || !quantity.is_sign_negative() || quantity.is_zero()
        || option_type != Some(OptionType::Put) {
        return Decimal::ZERO;
    }

    strike.checked_mul(multiplier)
        .and_then(|value| value.checked_mul(quantity))
        .unwrap_or_else(|| {
            warn!("Committed capital is out of range: {strike} * {multiplier} * {quantity}.");
            Decimal::ZERO
        })
}

/// A single item of the normalized report: account metrics go first, then positions.
#[derive(Debug, Clone, PartialEq)]
pub enum Record {
    Metric(AccountMetric),
    Position(Position),
}

impl Record {
    pub fn tag(&self) -> &str {
        match self {
            Record::Metric(metric) => metric.tag.as_ref(),
            Record::Position(_) => "Position",
        }
    }
}

impl Serialize for Record {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Record::Metric(metric) => metric.serialize(serializer),
            Record::Position(position) => {
                let mut record = serializer.serialize_struct("Position", 3)?;
                record.serialize_field("tag", "Position")?;
                record.serialize_field("value", position)?;
                record.serialize_field("currency", &position.currency)?;
                record.end()
            },
        }
    }
}
