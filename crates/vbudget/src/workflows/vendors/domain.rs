use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::store::{UserId, VendorId};
use crate::workflows::history::HistoryEntry;
use crate::workflows::WorkflowError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VendorStatus {
    Draft,
    PendingApproval,
    Approved,
    Rejected,
}

impl VendorStatus {
    pub const fn label(self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::PendingApproval => "pending_approval",
            Self::Approved => "approved",
            Self::Rejected => "rejected",
        }
    }
}

/// One priced entry on a vendor's rate card.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VendorRate {
    pub item_name: String,
    pub description: Option<String>,
    pub unit: String,
    pub rate: f64,
    pub min_quantity: Option<f64>,
    pub setup_charges: Option<f64>,
    pub notes: Option<String>,
    pub category_tag: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Vendor {
    pub id: VendorId,
    pub name: String,
    pub category: String,
    pub contact_person: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub gst_number: Option<String>,
    pub region: Option<String>,
    pub status: VendorStatus,
    pub created_by: UserId,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub rate_cards: Vec<VendorRate>,
    pub history: Vec<HistoryEntry>,
}

impl Vendor {
    pub fn is_approved(&self) -> bool {
        self.status == VendorStatus::Approved
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RateCardSubmission {
    pub item_name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub unit: String,
    pub rate: f64,
    #[serde(default)]
    pub min_quantity: Option<f64>,
    #[serde(default)]
    pub setup_charges: Option<f64>,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub category_tag: Option<String>,
}

/// Vendor details as entered on the (OTP-unlocked) vendor form.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct VendorSubmission {
    pub name: String,
    pub category: String,
    #[serde(default)]
    pub contact_person: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub gst_number: Option<String>,
    #[serde(default)]
    pub region: Option<String>,
    #[serde(default)]
    pub rate_cards: Vec<RateCardSubmission>,
}

impl VendorSubmission {
    pub(crate) fn validate(&self) -> Result<(), WorkflowError> {
        if self.name.trim().is_empty() {
            return Err(WorkflowError::Validation("vendor name is required".to_string()));
        }
        if self.category.trim().is_empty() {
            return Err(WorkflowError::Validation(
                "vendor category is required".to_string(),
            ));
        }
        for card in &self.rate_cards {
            if card.item_name.trim().is_empty() {
                return Err(WorkflowError::Validation(
                    "rate card item name is required".to_string(),
                ));
            }
            if !card.rate.is_finite() || card.rate < 0.0 {
                return Err(WorkflowError::Validation(format!(
                    "rate for '{}' must be a non-negative number",
                    card.item_name.trim()
                )));
            }
        }
        Ok(())
    }

    /// Rate cards without their own category tag inherit the vendor category.
    pub(crate) fn rate_cards(&self) -> Vec<VendorRate> {
        self.rate_cards
            .iter()
            .map(|card| VendorRate {
                item_name: card.item_name.trim().to_string(),
                description: card.description.clone(),
                unit: card.unit.trim().to_string(),
                rate: card.rate,
                min_quantity: card.min_quantity,
                setup_charges: card.setup_charges,
                notes: card.notes.clone(),
                category_tag: Some(
                    card.category_tag
                        .as_deref()
                        .map(str::trim)
                        .filter(|tag| !tag.is_empty())
                        .unwrap_or(self.category.trim())
                        .to_string(),
                ),
            })
            .collect()
    }
}

/// Listing filter: exact status and case-insensitive category substring.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct VendorFilter {
    #[serde(default, alias = "status_filter")]
    pub status: Option<VendorStatus>,
    #[serde(default)]
    pub category: Option<String>,
}

impl VendorFilter {
    pub fn matches(&self, vendor: &Vendor) -> bool {
        if self.status.is_some_and(|status| vendor.status != status) {
            return false;
        }
        match self.category.as_deref().map(str::trim) {
            Some(category) if !category.is_empty() => vendor
                .category
                .to_lowercase()
                .contains(&category.to_lowercase()),
            _ => true,
        }
    }
}
