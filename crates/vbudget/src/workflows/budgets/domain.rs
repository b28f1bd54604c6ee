use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::costing::compute_totals;
use crate::store::{ApprovalId, BudgetId, BudgetItemId, DocumentId, IdSequence, UserId, VendorId};
use crate::workflows::history::HistoryEntry;
use crate::workflows::WorkflowError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BudgetStatus {
    Draft,
    UnderReview,
    Approved,
    Returned,
}

impl BudgetStatus {
    pub const fn label(self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::UnderReview => "under_review",
            Self::Approved => "approved",
            Self::Returned => "returned",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApprovalStage {
    Approver,
    Accounts,
    Finalized,
}

impl ApprovalStage {
    pub const fn label(self) -> &'static str {
        match self {
            Self::Approver => "approver",
            Self::Accounts => "accounts",
            Self::Finalized => "finalized",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApprovalStatus {
    Pending,
    Approved,
    Returned,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Approval {
    pub id: ApprovalId,
    pub stage: ApprovalStage,
    pub status: ApprovalStatus,
    pub approver: Option<UserId>,
    pub comments: Option<String>,
    pub decided_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl Approval {
    fn pending(id: ApprovalId, stage: ApprovalStage, created_at: DateTime<Utc>) -> Self {
        Self {
            id,
            stage,
            status: ApprovalStatus::Pending,
            approver: None,
            comments: None,
            decided_at: None,
            created_at,
        }
    }

    pub fn is_pending(&self) -> bool {
        self.status == ApprovalStatus::Pending
    }
}

fn default_days() -> f64 {
    1.0
}

/// Costing inputs for one line, as entered by a planner or produced by the sheet importer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineItem {
    pub category: String,
    pub item_name: String,
    #[serde(default)]
    pub vendor_id: Option<VendorId>,
    pub rate: f64,
    pub quantity: f64,
    pub unit: String,
    #[serde(default = "default_days")]
    pub days: f64,
    #[serde(default)]
    pub gst_percentage: f64,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub is_override: bool,
}

impl LineItem {
    pub(crate) fn validate(&self) -> Result<(), WorkflowError> {
        if self.item_name.trim().is_empty() {
            return Err(WorkflowError::Validation("item name is required".to_string()));
        }
        let numbers = [
            ("rate", self.rate),
            ("quantity", self.quantity),
            ("days", self.days),
            ("gst_percentage", self.gst_percentage),
        ];
        for (field, value) in numbers {
            if !value.is_finite() || value < 0.0 {
                return Err(WorkflowError::Validation(format!(
                    "{field} for '{}' must be a non-negative number",
                    self.item_name.trim()
                )));
            }
        }
        Ok(())
    }
}

/// Costed line on a budget. Totals are fixed when the item is created.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BudgetItem {
    pub id: BudgetItemId,
    pub category: String,
    pub item_name: String,
    pub vendor_id: Option<VendorId>,
    pub rate: f64,
    pub quantity: f64,
    pub unit: String,
    pub days: f64,
    pub gst_percentage: f64,
    subtotal: f64,
    total: f64,
    pub notes: Option<String>,
    pub is_override: bool,
}

impl BudgetItem {
    pub(crate) fn priced(id: BudgetItemId, line: LineItem) -> Self {
        let totals = compute_totals(line.rate, line.quantity, line.days, line.gst_percentage);
        Self {
            id,
            category: line.category,
            item_name: line.item_name,
            vendor_id: line.vendor_id,
            rate: line.rate,
            quantity: line.quantity,
            unit: line.unit,
            days: line.days,
            gst_percentage: line.gst_percentage,
            subtotal: totals.subtotal,
            total: totals.total,
            notes: line.notes,
            is_override: line.is_override,
        }
    }

    pub fn subtotal(&self) -> f64 {
        self.subtotal
    }

    pub fn total(&self) -> f64 {
        self.total
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct BudgetDraft {
    pub client_name: String,
    pub event_name: String,
    #[serde(default)]
    pub event_type: Option<String>,
    #[serde(default)]
    pub event_location: Option<String>,
    #[serde(default)]
    pub event_dates: Option<String>,
    #[serde(default)]
    pub event_days: Option<u32>,
    #[serde(default)]
    pub remarks: Option<String>,
    #[serde(default)]
    pub items: Vec<LineItem>,
}

impl BudgetDraft {
    pub(crate) fn validate(&self) -> Result<(), WorkflowError> {
        if self.client_name.trim().is_empty() {
            return Err(WorkflowError::Validation("client name is required".to_string()));
        }
        if self.event_name.trim().is_empty() {
            return Err(WorkflowError::Validation("event name is required".to_string()));
        }
        self.items.iter().try_for_each(LineItem::validate)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BudgetDocument {
    pub id: DocumentId,
    pub filename: String,
    pub path: String,
    pub document_type: String,
    pub uploaded_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Budget {
    pub id: BudgetId,
    pub client_name: String,
    pub event_name: String,
    pub event_type: Option<String>,
    pub event_location: Option<String>,
    pub event_dates: Option<String>,
    pub event_days: Option<u32>,
    pub remarks: Option<String>,
    pub status: BudgetStatus,
    pub owner: UserId,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub items: Vec<BudgetItem>,
    pub approvals: Vec<Approval>,
    pub history: Vec<HistoryEntry>,
    pub documents: Vec<BudgetDocument>,
}

impl Budget {
    /// The single outstanding approval, if any.
    pub fn pending_approval(&self) -> Option<&Approval> {
        self.approvals.iter().find(|approval| approval.is_pending())
    }

    pub fn grand_total(&self) -> f64 {
        self.items.iter().map(BudgetItem::total).sum()
    }

    /// `draft | returned → under_review`, opening a pending approver-stage approval.
    pub(crate) fn submit(
        &mut self,
        ids: &mut IdSequence,
        user: UserId,
        now: DateTime<Utc>,
    ) -> Result<(), WorkflowError> {
        match self.status {
            BudgetStatus::Draft | BudgetStatus::Returned => {}
            BudgetStatus::UnderReview | BudgetStatus::Approved => {
                return Err(WorkflowError::InvalidState {
                    entity: "budget",
                    status: self.status.label(),
                    operation: "submit",
                })
            }
        }

        self.status = BudgetStatus::UnderReview;
        self.history
            .push(HistoryEntry::new("submitted", user, now, "Submitted for approval"));
        self.approvals
            .push(Approval::pending(ids.next(), ApprovalStage::Approver, now));
        self.updated_at = now;
        Ok(())
    }

    /// Resolve the pending approval at `stage`.
    ///
    /// Approver sign-off opens the accounts stage; accounts sign-off records a finalized
    /// approval and approves the budget; a rejection at either stage returns it.
    pub(crate) fn decide(
        &mut self,
        ids: &mut IdSequence,
        stage: ApprovalStage,
        approver: UserId,
        approve: bool,
        comments: Option<String>,
        now: DateTime<Utc>,
    ) -> Result<(), WorkflowError> {
        let budget_id = self.id;
        let approval = self
            .approvals
            .iter_mut()
            .find(|approval| approval.stage == stage && approval.is_pending())
            .ok_or_else(|| {
                WorkflowError::not_found("approval", format!("{} for budget {budget_id}", stage.label()))
            })?;

        approval.status = if approve {
            ApprovalStatus::Approved
        } else {
            ApprovalStatus::Returned
        };
        approval.approver = Some(approver);
        approval.decided_at = Some(now);
        approval.comments = comments;

        match (approve, stage) {
            (false, _) => self.status = BudgetStatus::Returned,
            (true, ApprovalStage::Approver) => {
                self.approvals
                    .push(Approval::pending(ids.next(), ApprovalStage::Accounts, now));
                self.status = BudgetStatus::UnderReview;
            }
            (true, ApprovalStage::Accounts) => {
                self.approvals.push(Approval {
                    id: ids.next(),
                    stage: ApprovalStage::Finalized,
                    status: ApprovalStatus::Approved,
                    approver: Some(approver),
                    comments: None,
                    decided_at: Some(now),
                    created_at: now,
                });
                self.status = BudgetStatus::Approved;
            }
            (true, ApprovalStage::Finalized) => {}
        }
        self.updated_at = now;
        Ok(())
    }
}

/// Reviewer input for one approval stage.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ApprovalDecision {
    pub budget_id: BudgetId,
    pub stage: ApprovalStage,
    pub approve: bool,
    #[serde(default)]
    pub comments: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct DashboardMetrics {
    pub pending_approvals: usize,
    pub active_budgets: usize,
    pub upcoming_events: usize,
    pub recent_vendor_updates: usize,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 5, 12, 9, 30, 0).unwrap()
    }

    fn draft_budget() -> Budget {
        Budget {
            id: BudgetId(10),
            client_name: "Acme".to_string(),
            event_name: "Dealer Meet".to_string(),
            event_type: None,
            event_location: None,
            event_dates: None,
            event_days: Some(2),
            remarks: None,
            status: BudgetStatus::Draft,
            owner: UserId(1),
            created_at: now(),
            updated_at: now(),
            items: Vec::new(),
            approvals: Vec::new(),
            history: Vec::new(),
            documents: Vec::new(),
        }
    }

    #[test]
    fn priced_item_snapshots_totals() {
        let item = BudgetItem::priced(
            BudgetItemId(1),
            LineItem {
                category: "AV".to_string(),
                item_name: "LED wall".to_string(),
                vendor_id: None,
                rate: 100.0,
                quantity: 3.0,
                unit: "sqft".to_string(),
                days: 2.0,
                gst_percentage: 10.0,
                notes: None,
                is_override: false,
            },
        );
        assert_eq!(item.subtotal(), 600.0);
        assert!((item.total() - 660.0).abs() < 1e-9);
    }

    #[test]
    fn submit_rejected_while_under_review() {
        let mut ids = IdSequence::default();
        let mut budget = draft_budget();
        budget.submit(&mut ids, UserId(1), now()).expect("first submit");

        match budget.submit(&mut ids, UserId(1), now()) {
            Err(WorkflowError::InvalidState { status, .. }) => assert_eq!(status, "under_review"),
            other => panic!("expected invalid state, got {other:?}"),
        }
        assert_eq!(budget.approvals.len(), 1);
    }

    #[test]
    fn decide_without_pending_stage_is_not_found() {
        let mut ids = IdSequence::default();
        let mut budget = draft_budget();
        budget.submit(&mut ids, UserId(1), now()).expect("submit");

        let err = budget
            .decide(&mut ids, ApprovalStage::Accounts, UserId(2), true, None, now())
            .expect_err("accounts stage is not open yet");
        assert_eq!(err.kind(), "not_found");
        assert_eq!(budget.status, BudgetStatus::UnderReview);
    }

    #[test]
    fn accounts_approval_records_finalized_entry() {
        let mut ids = IdSequence::default();
        let mut budget = draft_budget();
        budget.submit(&mut ids, UserId(1), now()).expect("submit");
        budget
            .decide(&mut ids, ApprovalStage::Approver, UserId(2), true, None, now())
            .expect("approver");
        budget
            .decide(
                &mut ids,
                ApprovalStage::Accounts,
                UserId(3),
                true,
                Some("within limits".to_string()),
                now(),
            )
            .expect("accounts");

        assert_eq!(budget.status, BudgetStatus::Approved);
        let stages: Vec<_> = budget.approvals.iter().map(|a| a.stage).collect();
        assert_eq!(
            stages,
            vec![
                ApprovalStage::Approver,
                ApprovalStage::Accounts,
                ApprovalStage::Finalized
            ]
        );
        let finalized = &budget.approvals[2];
        assert_eq!(finalized.status, ApprovalStatus::Approved);
        assert_eq!(finalized.approver, Some(UserId(3)));
        assert!(budget.pending_approval().is_none());
    }
}
