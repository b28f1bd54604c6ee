use std::collections::HashMap;

use super::normalizer::normalize_header;
use super::ElementSheetError;

/// Logical columns of an element sheet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) enum ColumnField {
    Category,
    Item,
    Vendor,
    Rate,
    Quantity,
    Unit,
    Days,
    Gst,
}

impl ColumnField {
    pub(crate) const ALL: [ColumnField; 8] = [
        ColumnField::Category,
        ColumnField::Item,
        ColumnField::Vendor,
        ColumnField::Rate,
        ColumnField::Quantity,
        ColumnField::Unit,
        ColumnField::Days,
        ColumnField::Gst,
    ];

    /// Accepted headers in priority order. The first one names the column in errors.
    pub(crate) const fn aliases(self) -> &'static [&'static str] {
        match self {
            ColumnField::Category => &["Category", "Service Category"],
            ColumnField::Item => &["Item", "Element", "Item Name"],
            ColumnField::Vendor => &["Vendor", "Preferred Vendor"],
            ColumnField::Rate => &["Rate", "Unit Rate"],
            ColumnField::Quantity => &["Quantity", "Qty"],
            ColumnField::Unit => &["Unit", "UOM"],
            ColumnField::Days => &["Days", "No. of Days"],
            ColumnField::Gst => &["GST %", "GST"],
        }
    }

    pub(crate) const fn is_required(self) -> bool {
        matches!(
            self,
            ColumnField::Category
                | ColumnField::Item
                | ColumnField::Rate
                | ColumnField::Quantity
                | ColumnField::Unit
        )
    }
}

/// Header positions resolved for one sheet.
#[derive(Debug, Default)]
pub(crate) struct ColumnLayout {
    positions: HashMap<ColumnField, usize>,
}

impl ColumnLayout {
    pub(crate) fn resolve(headers: &csv::StringRecord) -> Result<Self, ElementSheetError> {
        let normalized: Vec<String> = headers.iter().map(normalize_header).collect();
        let mut positions = HashMap::new();

        for field in ColumnField::ALL {
            let position = field.aliases().iter().find_map(|alias| {
                let alias = normalize_header(alias);
                normalized.iter().position(|header| *header == alias)
            });
            match position {
                Some(index) => {
                    positions.insert(field, index);
                }
                None if field.is_required() => {
                    return Err(ElementSheetError::MissingColumn(field.aliases()[0]));
                }
                None => {}
            }
        }

        Ok(Self { positions })
    }

    /// Cell for `field`, or `""` when the column is absent or the row is short.
    pub(crate) fn cell<'r>(&self, record: &'r csv::StringRecord, field: ColumnField) -> &'r str {
        self.positions
            .get(&field)
            .and_then(|index| record.get(*index))
            .unwrap_or("")
    }

    #[cfg(test)]
    pub(crate) fn has(&self, field: ColumnField) -> bool {
        self.positions.contains_key(&field)
    }
}
