use std::io::Read;

use super::mapping::{ColumnField, ColumnLayout};
use super::normalizer::{clean_text, parse_number};
use super::ElementSheetError;

/// One non-blank sheet row with defaults applied.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct SheetRow {
    pub(crate) category: String,
    pub(crate) item_name: String,
    pub(crate) vendor_name: Option<String>,
    pub(crate) rate: f64,
    pub(crate) quantity: f64,
    pub(crate) unit: String,
    pub(crate) days: f64,
    pub(crate) gst_percentage: f64,
}

pub(crate) fn parse_rows<R: Read>(reader: R) -> Result<Vec<SheetRow>, ElementSheetError> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .flexible(true)
        .from_reader(reader);
    let layout = ColumnLayout::resolve(csv_reader.headers()?)?;
    let mut rows = Vec::new();

    for (index, record) in csv_reader.records().enumerate() {
        let record = record?;
        // Header is line 1.
        let line = record
            .position()
            .map(|position| position.line())
            .unwrap_or(index as u64 + 2);
        if let Some(row) = parse_row(&layout, &record, line)? {
            rows.push(row);
        }
    }

    Ok(rows)
}

fn parse_row(
    layout: &ColumnLayout,
    record: &csv::StringRecord,
    line: u64,
) -> Result<Option<SheetRow>, ElementSheetError> {
    let item_name = clean_text(layout.cell(record, ColumnField::Item));
    if item_name.is_empty() {
        return Ok(None);
    }

    let category = non_empty_or(layout.cell(record, ColumnField::Category), "General");
    let unit = non_empty_or(layout.cell(record, ColumnField::Unit), "unit");
    let vendor_name = Some(clean_text(layout.cell(record, ColumnField::Vendor)))
        .filter(|name| !name.is_empty());

    let number = |field: ColumnField| {
        let value = layout.cell(record, field);
        parse_number(value).ok_or_else(|| ElementSheetError::InvalidNumber {
            line,
            column: field.aliases()[0],
            value: value.trim().to_string(),
        })
    };

    Ok(Some(SheetRow {
        category,
        item_name,
        vendor_name,
        rate: number(ColumnField::Rate)?,
        quantity: one_if_zero(number(ColumnField::Quantity)?),
        unit,
        days: one_if_zero(number(ColumnField::Days)?),
        gst_percentage: number(ColumnField::Gst)?,
    }))
}

fn non_empty_or(value: &str, fallback: &str) -> String {
    let cleaned = clean_text(value);
    if cleaned.is_empty() {
        fallback.to_string()
    } else {
        cleaned
    }
}

fn one_if_zero(value: f64) -> f64 {
    if value == 0.0 {
        1.0
    } else {
        value
    }
}
