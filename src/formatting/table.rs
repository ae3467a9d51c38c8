//! A thin wrapper around prettytable which renders the report tables.

use prettytable::{Row as RawRow, Cell as RawCell};
use prettytable::format::{FormatBuilder, LinePosition, LineSeparator};

use crate::types::Decimal;

use super::{format_amount, format_ratio};

pub use prettytable::{Table, format::Alignment};

#[derive(Clone)]
pub struct Cell {
    text: String,
    align: Alignment,
}

impl Cell {
    pub fn new(text: &str) -> Cell {
        Cell::new_align(text, Alignment::LEFT)
    }

    pub fn new_empty() -> Cell {
        Cell::new("")
    }

    pub fn new_align(text: &str, align: Alignment) -> Cell {
        Cell {
            text: text.to_owned(),
            align: align,
        }
    }

    pub fn new_optional(text: Option<&str>) -> Cell {
        match text {
            Some(text) => Cell::new_align(text, Alignment::CENTER),
            None => Cell::new_align("-", Alignment::CENTER),
        }
    }

    pub fn new_decimal(value: Decimal) -> Cell {
        Cell::new_align(&value.normalize().to_string(), Alignment::RIGHT)
    }

    pub fn new_amount(value: Decimal) -> Cell {
        Cell::new_align(&format_amount(value), Alignment::RIGHT)
    }

    pub fn new_ratio(ratio: Decimal) -> Cell {
        Cell::new_align(&format_ratio(ratio), Alignment::RIGHT)
    }
}

pub struct Row {
}

impl Row {
    pub fn new(row: &[Cell]) -> RawRow {
        let mut cells = Vec::with_capacity(row.len());

        for cell in row {
            cells.push(RawCell::new_align(&cell.text, cell.align));
        }

        RawRow::new(cells)
    }
}

pub fn print_table(name: &str, titles: &[&str], mut table: Table) {
    table.set_format(FormatBuilder::new().padding(1, 1).build());
    table.set_titles(RawRow::new(
        titles.iter().map(|name| RawCell::new_align(name, Alignment::CENTER)).collect()));

    let mut wrapping_table = Table::new();

    wrapping_table.set_format(FormatBuilder::new()
        .separator(LinePosition::Title, LineSeparator::new(' ', ' ', ' ', ' '))
        .build());

    wrapping_table.set_titles(RawRow::new(vec![
        RawCell::new_align(&("\n".to_owned() + name), Alignment::CENTER),
    ]));

    wrapping_table.add_row(RawRow::new(vec![RawCell::new(&table.to_string())]));
    wrapping_table.printstd();
}
