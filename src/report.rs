use crate::core::EmptyResult;
use crate::flex::{AssetClass, Position, Record};
use crate::formatting::{self, table::{Alignment, Cell, Row, Table, print_table}};
use crate::summary::{OptionGroups, PortfolioSummary, non_option_positions};
use crate::types::Decimal;

pub fn print_json(records: &[Record]) -> EmptyResult {
    println!("{}", serde_json::to_string_pretty(records)?);
    Ok(())
}

pub fn print(records: &[Record]) {
    let summary = PortfolioSummary::calculate(records);

    print_metrics(records);
    print_summary(&summary);

    let options = OptionGroups::new(records);
    for (name, positions) in [
        ("Short puts", &options.short_puts),
        ("Short calls", &options.short_calls),
        ("Long puts", &options.long_puts),
        ("Long calls", &options.long_calls),
    ] {
        print_options(name, positions, &summary);
    }

    for (name, asset_class) in [
        ("Stocks", AssetClass::Stock),
        ("Crypto", AssetClass::Crypto),
        ("Futures", AssetClass::Future),
    ] {
        let positions: Vec<_> = non_option_positions(records)
            .filter(|position| position.asset_class == asset_class)
            .collect();
        print_positions(name, &positions, &summary);
    }
}

fn print_metrics(records: &[Record]) {
    let mut table = Table::new();

    for record in records {
        let Record::Metric(metric) = record else {
            continue;
        };

        let value = match metric.value.as_decimal() {
            Some(value) => Cell::new_decimal(value),
            None => Cell::new(&metric.value.to_string()),
        };

        table.add_row(Row::new(&[
            Cell::new(metric.tag.as_ref()),
            value,
            Cell::new_optional(metric.currency.as_deref()),
        ]));
    }

    print_table("Account", &["Metric", "Value", "Currency"], table);
}

fn print_summary(summary: &PortfolioSummary) {
    let currency = summary.currency.as_deref();
    let mut table = Table::new();

    let mut add_row = |name: &str, value: Decimal, ratio: Option<Decimal>| {
        table.add_row(Row::new(&[
            Cell::new(name),
            Cell::new_align(&formatting::format_amount_with_currency(value, currency), Alignment::RIGHT),
            match ratio {
                Some(ratio) => Cell::new_ratio(ratio),
                None => Cell::new_empty(),
            },
        ]));
    };

    add_row("Net liquidation", summary.net_liquidation, None);
    add_row("Stocks", summary.stock_value, Some(summary.stock_allocation()));
    add_row("Crypto", summary.crypto_value, None);
    add_row("Futures", summary.futures_value, None);
    add_row("Long options", summary.long_option_value, None);
    add_row("Short options", summary.option_value_short, Some(summary.option_allocation()));
    add_row("Committed capital", summary.committed_capital, None);
    add_row("Available funds", summary.available_funds, Some(summary.cash_allocation()));
    add_row("Total allocated", summary.total_allocated(), Some(summary.utilization()));
    add_row("Free cash", summary.derived_cash(), None);

    let name = match summary.report_date.as_deref() {
        Some(date) => format!("Portfolio summary ({date})"),
        None => s!("Portfolio summary"),
    };

    print_table(&name, &["", "Value", "%"], table);
}

fn print_options(name: &str, positions: &[&Position], summary: &PortfolioSummary) {
    if positions.is_empty() {
        return;
    }

    let mut table = Table::new();

    for position in positions {
        let committed_capital = if position.committed_capital.is_zero() {
            Cell::new_optional(None)
        } else {
            Cell::new_amount(position.base_committed_capital())
        };

        table.add_row(Row::new(&[
            Cell::new(position.underlying.as_deref().unwrap_or(&position.symbol)),
            Cell::new_optional(position.expiry.as_deref()),
            Cell::new_decimal(position.strike),
            Cell::new_optional(position.option_type.map(|option_type| option_type.to_string()).as_deref()),
            Cell::new_decimal(position.quantity),
            Cell::new_decimal(position.cost_price),
            Cell::new_decimal(position.mark_price),
            Cell::new_amount(position.fifo_pnl_unrealized),
            Cell::new_amount(position.base_market_value()),
            committed_capital,
            Cell::new_ratio(summary.position_share(position)),
        ]));
    }

    print_table(name, &[
        "Symbol", "Expiry", "Strike", "Type", "Quantity", "Cost price", "Price", "P/L", "Value",
        "Committed", "%",
    ], table);
}

fn print_positions(name: &str, positions: &[&Position], summary: &PortfolioSummary) {
    if positions.is_empty() {
        return;
    }

    let mut table = Table::new();

    for position in positions {
        table.add_row(Row::new(&[
            Cell::new(&position.symbol),
            Cell::new_decimal(position.quantity),
            Cell::new_decimal(position.cost_price),
            Cell::new_decimal(position.mark_price),
            Cell::new_amount(position.fifo_pnl_unrealized),
            Cell::new_amount(position.market_value),
            Cell::new(&position.currency),
            Cell::new_amount(position.base_market_value()),
            Cell::new_ratio(summary.position_share(position)),
        ]));
    }

    print_table(name, &[
        "Symbol", "Quantity", "Cost price", "Price", "P/L", "Value", "Currency", "Base value", "%",
    ], table);
}
