//! Element-sheet importer: turns a planner's CSV cost sheet into costed line items,
//! matching rows against approved vendors and their rate cards.

mod mapping;
mod normalizer;
mod parser;

use std::io::Read;
use std::path::Path;

use serde::Serialize;

use crate::workflows::budgets::{compute_totals, LineItem};
use crate::workflows::vendors::{Vendor, VendorRate};
use normalizer::contains_ignore_case;
use parser::SheetRow;

#[derive(Debug)]
pub enum ElementSheetError {
    Io(std::io::Error),
    Csv(csv::Error),
    MissingColumn(&'static str),
    InvalidNumber {
        line: u64,
        column: &'static str,
        value: String,
    },
}

impl std::fmt::Display for ElementSheetError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ElementSheetError::Io(err) => write!(f, "failed to read element sheet: {}", err),
            ElementSheetError::Csv(err) => write!(f, "invalid element sheet data: {}", err),
            ElementSheetError::MissingColumn(column) => write!(f, "Missing column {}", column),
            ElementSheetError::InvalidNumber {
                line,
                column,
                value,
            } => write!(f, "Line {line}: '{value}' in column {column} is not a number"),
        }
    }
}

impl std::error::Error for ElementSheetError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ElementSheetError::Io(err) => Some(err),
            ElementSheetError::Csv(err) => Some(err),
            ElementSheetError::MissingColumn(_) | ElementSheetError::InvalidNumber { .. } => None,
        }
    }
}

impl From<std::io::Error> for ElementSheetError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err)
    }
}

impl From<csv::Error> for ElementSheetError {
    fn from(err: csv::Error) -> Self {
        Self::Csv(err)
    }
}

/// Costed row ready to be reviewed and copied into a budget.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ImportedItem {
    #[serde(flatten)]
    pub line: LineItem,
    pub subtotal: f64,
    pub total: f64,
}

pub struct ElementSheetImporter;

impl ElementSheetImporter {
    pub fn from_path<P: AsRef<Path>>(
        path: P,
        vendors: &[Vendor],
    ) -> Result<Vec<ImportedItem>, ElementSheetError> {
        let path = path.as_ref();
        let source_name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        let file = std::fs::File::open(path)?;
        Self::from_reader(file, &source_name, vendors)
    }

    /// `source_name` is echoed into each item's notes.
    pub fn from_reader<R: Read>(
        reader: R,
        source_name: &str,
        vendors: &[Vendor],
    ) -> Result<Vec<ImportedItem>, ElementSheetError> {
        let items = parser::parse_rows(reader)?
            .into_iter()
            .map(|row| cost_row(row, source_name, vendors))
            .collect();
        Ok(items)
    }
}

fn cost_row(row: SheetRow, source_name: &str, vendors: &[Vendor]) -> ImportedItem {
    let mut rate = row.rate;
    let mut unit = row.unit;
    let vendor = resolve_vendor(vendors, &row.category, &row.item_name, row.vendor_name.as_deref());

    if let Some(vendor) = vendor {
        if rate == 0.0 {
            if let Some(card) = matching_rate_card(vendor, &row.item_name) {
                rate = card.rate;
                unit = card.unit.clone();
            }
        }
    }

    let totals = compute_totals(rate, row.quantity, row.days, row.gst_percentage);
    ImportedItem {
        line: LineItem {
            category: row.category,
            item_name: row.item_name,
            vendor_id: vendor.map(|vendor| vendor.id),
            rate,
            quantity: row.quantity,
            unit,
            days: row.days,
            gst_percentage: row.gst_percentage,
            notes: Some(format!("Auto-imported from {source_name}")),
            is_override: false,
        },
        subtotal: totals.subtotal,
        total: totals.total,
    }
}

/// Named vendor first, then any approved vendor quoting the item under the row's category.
fn resolve_vendor<'v>(
    vendors: &'v [Vendor],
    category: &str,
    item_name: &str,
    vendor_name: Option<&str>,
) -> Option<&'v Vendor> {
    let approved = || vendors.iter().filter(|vendor| vendor.is_approved());

    let by_name = vendor_name.and_then(|wanted| {
        approved().find(|vendor| contains_ignore_case(&vendor.name, wanted))
    });

    by_name.or_else(|| {
        approved().find(|vendor| {
            vendor.rate_cards.iter().any(|card| {
                contains_ignore_case(&card.item_name, item_name)
                    && card
                        .category_tag
                        .as_deref()
                        .is_some_and(|tag| contains_ignore_case(tag, category))
            })
        })
    })
}

fn matching_rate_card<'v>(vendor: &'v Vendor, item_name: &str) -> Option<&'v VendorRate> {
    vendor
        .rate_cards
        .iter()
        .find(|card| contains_ignore_case(&card.item_name, item_name))
}
