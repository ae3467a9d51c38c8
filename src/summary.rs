use std::cmp::Ordering;

use log::warn;

use crate::flex::{AssetClass, MetricTag, MetricValue, OptionType, Position, Record};
use crate::time;
use crate::types::{Date, Decimal};

/// Portfolio figures aggregated from the normalized report (all values are in base currency).
#[derive(Debug, Clone, PartialEq)]
pub struct PortfolioSummary {
    pub report_date: Option<String>,
    pub currency: Option<String>,

    pub net_liquidation: Decimal,
    pub available_funds: Decimal,
    pub option_value_short: Decimal,

    pub stock_value: Decimal,
    pub crypto_value: Decimal,
    pub futures_value: Decimal,
    pub long_option_value: Decimal,
    pub committed_capital: Decimal,
}

impl PortfolioSummary {
    pub fn calculate(records: &[Record]) -> PortfolioSummary {
        let mut summary = PortfolioSummary {
            report_date: None,
            currency: None,

            net_liquidation: Decimal::ZERO,
            available_funds: Decimal::ZERO,
            option_value_short: Decimal::ZERO,

            stock_value: Decimal::ZERO,
            crypto_value: Decimal::ZERO,
            futures_value: Decimal::ZERO,
            long_option_value: Decimal::ZERO,
            committed_capital: Decimal::ZERO,
        };

        for record in records {
            match record {
                Record::Metric(metric) => {
                    let value = metric.value.as_decimal().unwrap_or_default();

                    match metric.tag {
                        MetricTag::NetLiquidation => {
                            summary.net_liquidation = value;
                            summary.currency = metric.currency.clone();
                        },
                        MetricTag::AvailableFunds => summary.available_funds = value,
                        MetricTag::OptionValueShort => summary.option_value_short = value,
                        MetricTag::ReportDate => if let MetricValue::Text(date) = &metric.value {
                            summary.report_date = Some(date.clone());
                        },
                        MetricTag::StockValueLong | MetricTag::InitMarginReq => {},
                    }
                },

                Record::Position(position) => {
                    let value = position.base_market_value();

                    match position.asset_class {
                        AssetClass::Stock => add(&mut summary.stock_value, value),
                        AssetClass::Crypto => add(&mut summary.crypto_value, value),
                        AssetClass::Future => add(&mut summary.futures_value, value),
                        AssetClass::Option => {
                            add(&mut summary.committed_capital, position.base_committed_capital());
                            if position.option_type.is_some() && position.quantity > Decimal::ZERO {
                                add(&mut summary.long_option_value, value);
                            }
                        },
                        AssetClass::Other(_) => {},
                    }
                },
            }
        }

        summary
    }

    pub fn total_allocated(&self) -> Decimal {
        let mut total = Decimal::ZERO;

        for value in [
            self.stock_value, self.crypto_value, self.futures_value, self.committed_capital.abs(),
            self.long_option_value,
        ] {
            add(&mut total, value);
        }

        total
    }

    /// Cash which isn't allocated to any position (zero for leveraged portfolios).
    pub fn derived_cash(&self) -> Decimal {
        self.net_liquidation.checked_sub(self.total_allocated())
            .map_or(Decimal::ZERO, |cash| std::cmp::max(Decimal::ZERO, cash))
    }

    pub fn utilization(&self) -> Decimal {
        self.ratio(self.total_allocated())
    }

    pub fn stock_allocation(&self) -> Decimal {
        self.ratio(self.stock_value)
    }

    pub fn option_allocation(&self) -> Decimal {
        self.ratio(self.option_value_short.abs())
    }

    pub fn cash_allocation(&self) -> Decimal {
        self.ratio(self.available_funds)
    }

    /// Share of the position in the portfolio: committed capital for short puts and market value
    /// for everything else.
    pub fn position_share(&self, position: &Position) -> Decimal {
        let value = if position.committed_capital.is_zero() {
            position.market_value
        } else {
            position.committed_capital
        };

        value.abs().checked_mul(position.fx_rate_to_base)
            .map_or(Decimal::ZERO, |value| self.ratio(value))
    }

    // Zero for empty portfolios and values out of decimal range
    fn ratio(&self, value: Decimal) -> Decimal {
        value.checked_div(self.net_liquidation).unwrap_or_default()
    }
}

fn add(total: &mut Decimal, value: Decimal) {
    match total.checked_add(value) {
        Some(sum) => *total = sum,
        None => warn!("Unable to add {value} to {total}: the sum is out of range. Ignoring the value."),
    }
}

/// Option positions split by direction and type, each group is ordered by expiration date.
pub struct OptionGroups<'a> {
    pub short_puts: Vec<&'a Position>,
    pub short_calls: Vec<&'a Position>,
    pub long_puts: Vec<&'a Position>,
    pub long_calls: Vec<&'a Position>,
}

impl<'a> OptionGroups<'a> {
    pub fn new(records: &'a [Record]) -> OptionGroups<'a> {
        let mut groups = OptionGroups {
            short_puts: Vec::new(),
            short_calls: Vec::new(),
            long_puts: Vec::new(),
            long_calls: Vec::new(),
        };

        for record in records {
            let Record::Position(position) = record else {
                continue;
            };

            if position.asset_class != AssetClass::Option {
                continue;
            }

            let group = match (position.option_type, position.quantity.cmp(&Decimal::ZERO)) {
                (Some(OptionType::Put), Ordering::Less) => &mut groups.short_puts,
                (Some(OptionType::Call), Ordering::Less) => &mut groups.short_calls,
                (Some(OptionType::Put), Ordering::Greater) => &mut groups.long_puts,
                (Some(OptionType::Call), Ordering::Greater) => &mut groups.long_calls,
                _ => continue,
            };

            group.push(position);
        }

        for group in [
            &mut groups.short_puts, &mut groups.short_calls, &mut groups.long_puts, &mut groups.long_calls,
        ] {
            group.sort_by_key(|position| expiration_date(position));
        }

        groups
    }
}

pub fn non_option_positions(records: &[Record]) -> impl Iterator<Item = &Position> {
    records.iter().filter_map(|record| match record {
        Record::Position(position) if position.asset_class != AssetClass::Option => Some(position),
        _ => None,
    })
}

// Positions with unknown expiration date go first
fn expiration_date(position: &Position) -> Option<Date> {
    position.expiry.as_deref().and_then(time::parse_report_date)
}

#[cfg(test)]
mod tests {
    use crate::flex::{AccountMetric, committed_capital};
    use super::*;

    fn metric(tag: MetricTag, value: Decimal) -> Record {
        Record::Metric(AccountMetric {
            tag,
            value: MetricValue::Number(value),
            currency: Some(s!("CZK")),
        })
    }

    fn position(
        symbol: &str, asset_class: AssetClass, quantity: Decimal, market_value: Decimal,
        option: Option<(OptionType, Decimal, &str)>,
    ) -> Record {
        let (option_type, strike, expiry) = match option {
            Some((option_type, strike, expiry)) => (Some(option_type), strike, Some(s!(expiry))),
            None => (None, dec!(0), None),
        };
        let multiplier = if option.is_some() { dec!(100) } else { dec!(1) };

        Record::Position(Position {
            symbol: symbol.to_owned(),
            underlying: None,
            quantity,
            mark_price: dec!(0),
            market_value,
            fx_rate_to_base: dec!(20),
            multiplier,
            expiry,
            strike,
            option_type,
            committed_capital: committed_capital(&asset_class, quantity, option_type, strike, multiplier),
            asset_class,
            cost_price: dec!(0),
            cost_basis_price: dec!(0),
            fifo_pnl_unrealized: dec!(0),
            unrealized_pnl: dec!(0),
            cost_basis_money: dec!(0),
            currency: s!("USD"),
        })
    }

    fn records() -> Vec<Record> {
        vec![
            metric(MetricTag::AvailableFunds, dec!(100000)),
            metric(MetricTag::NetLiquidation, dec!(1000000)),
            metric(MetricTag::OptionValueShort, dec!(-5000)),
            Record::Metric(AccountMetric {
                tag: MetricTag::ReportDate,
                value: MetricValue::Text(s!("15.01.2024")),
                currency: None,
            }),
            position("AAPL", AssetClass::Stock, dec!(100), dec!(18000), None),
            position("BTC", AssetClass::Crypto, dec!(0.1), dec!(4000), None),
            position("ES", AssetClass::Future, dec!(1), dec!(500), None),
            position("SPY P1", AssetClass::Option, dec!(-1), dec!(-100), Some((OptionType::Put, dec!(50), "16.02.2024"))),
            position("SPY P2", AssetClass::Option, dec!(-2), dec!(-200), Some((OptionType::Put, dec!(40), "19.01.2024"))),
            position("SPY C1", AssetClass::Option, dec!(-1), dec!(-50), Some((OptionType::Call, dec!(60), "19.01.2024"))),
            position("SPY C2", AssetClass::Option, dec!(2), dec!(300), Some((OptionType::Call, dec!(45), "15.03.2024"))),
            position("SPY P3", AssetClass::Option, dec!(1), dec!(100), Some((OptionType::Put, dec!(30), "N/A"))),
        ]
    }

    #[test]
    fn calculation() {
        let records = records();
        let summary = PortfolioSummary::calculate(&records);

        assert_eq!(summary.report_date.as_deref(), Some("15.01.2024"));
        assert_eq!(summary.currency.as_deref(), Some("CZK"));
        assert_eq!(summary.net_liquidation, dec!(1000000));
        assert_eq!(summary.available_funds, dec!(100000));

        assert_eq!(summary.stock_value, dec!(360000));
        assert_eq!(summary.crypto_value, dec!(80000));
        assert_eq!(summary.futures_value, dec!(10000));
        assert_eq!(summary.long_option_value, dec!(8000));

        // (50 * 100 * -1 + 40 * 100 * -2) * 20
        assert_eq!(summary.committed_capital, dec!(-260000));
        assert_eq!(summary.total_allocated(), dec!(718000));
        assert_eq!(summary.derived_cash(), dec!(282000));

        assert_eq!(summary.utilization(), dec!(0.718));
        assert_eq!(summary.stock_allocation(), dec!(0.36));
        assert_eq!(summary.option_allocation(), dec!(0.005));
        assert_eq!(summary.cash_allocation(), dec!(0.1));

        let Record::Position(stock) = &records[4] else { unreachable!() };
        assert_eq!(summary.position_share(stock), dec!(0.36));

        let Record::Position(short_put) = &records[7] else { unreachable!() };
        assert_eq!(summary.position_share(short_put), dec!(0.1));
    }

    #[test]
    fn leveraged_portfolio() {
        let records = vec![
            metric(MetricTag::NetLiquidation, dec!(1000)),
            position("AAPL", AssetClass::Stock, dec!(100), dec!(100), None),
        ];

        let summary = PortfolioSummary::calculate(&records);
        assert_eq!(summary.utilization(), dec!(2));
        assert_eq!(summary.derived_cash(), dec!(0));
    }

    #[test]
    fn out_of_range_values() {
        let records = vec![
            metric(MetricTag::NetLiquidation, dec!(0.0001)),
            position("A", AssetClass::Stock, dec!(1), dec!(2000000000000000000000000000), None),
            position("B", AssetClass::Stock, dec!(1), dec!(2000000000000000000000000000), None),
            position("C", AssetClass::Crypto, dec!(1), Decimal::MAX, None),
        ];

        // Base values are multiplied by 20
        let summary = PortfolioSummary::calculate(&records);
        assert_eq!(summary.stock_value, dec!(40000000000000000000000000000));
        assert_eq!(summary.crypto_value, dec!(0));
        assert_eq!(summary.total_allocated(), summary.stock_value);
        assert_eq!(summary.derived_cash(), dec!(0));
        assert_eq!(summary.utilization(), dec!(0));
    }

    #[test]
    fn empty_report() {
        let summary = PortfolioSummary::calculate(&[]);
        assert_eq!(summary.total_allocated(), dec!(0));
        assert_eq!(summary.utilization(), dec!(0));
        assert_eq!(summary.cash_allocation(), dec!(0));
        assert_eq!(summary.report_date, None);
    }

    #[test]
    fn option_groups() {
        let records = records();
        let groups = OptionGroups::new(&records);

        let symbols = |group: &[&Position]| -> Vec<String> {
            group.iter().map(|position| position.symbol.clone()).collect()
        };

        assert_eq!(symbols(&groups.short_puts), vec!["SPY P2", "SPY P1"]);
        assert_eq!(symbols(&groups.short_calls), vec!["SPY C1"]);
        assert_eq!(symbols(&groups.long_puts), vec!["SPY P3"]);
        assert_eq!(symbols(&groups.long_calls), vec!["SPY C2"]);

        let others: Vec<_> = non_option_positions(&records).map(|position| position.symbol.as_str()).collect();
        assert_eq!(others, vec!["AAPL", "BTC", "ES"]);
    }
}
