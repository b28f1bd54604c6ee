use std::io::Cursor;
use std::sync::Arc;

use tracing::info;

use super::domain::{
    ApprovalDecision, Budget, BudgetDocument, BudgetDraft, BudgetItem, BudgetStatus,
    DashboardMetrics,
};
use crate::clock::{Clock, SystemClock};
use crate::documents::DocumentStore;
use crate::store::{BackOfficeRepository, BudgetId, UserId};
use crate::workflows::element_sheet::{ElementSheetImporter, ImportedItem};
use crate::workflows::history::{ActivityLogEntry, HistoryEntry};
use crate::workflows::onboarding::UserRole;
use crate::workflows::vendors::{Vendor, VendorStatus};
use crate::workflows::WorkflowError;

const ELEMENT_SHEET_FOLDER: &str = "element_sheets";
const BUDGET_FOLDER: &str = "budgets";

/// Budget drafting, the two-stage approval chain, attachments and sheet imports.
pub struct BudgetService<R, D> {
    repository: Arc<R>,
    documents: Arc<D>,
    clock: Arc<dyn Clock>,
}

impl<R, D> BudgetService<R, D>
where
    R: BackOfficeRepository + 'static,
    D: DocumentStore + 'static,
{
    pub fn new(repository: Arc<R>, documents: Arc<D>) -> Self {
        Self {
            repository,
            documents,
            clock: Arc::new(SystemClock),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn create(&self, owner: UserId, draft: BudgetDraft) -> Result<Budget, WorkflowError> {
        draft.validate()?;
        let now = self.clock.now();

        let budget = self.repository.transaction(|ledger| {
            if ledger.user(owner).is_none() {
                return Err(WorkflowError::not_found("user", owner));
            }
            for vendor_id in draft.items.iter().filter_map(|item| item.vendor_id) {
                if ledger.vendor(vendor_id).is_none() {
                    return Err(WorkflowError::not_found("vendor", vendor_id));
                }
            }

            let id = ledger.ids.next();
            let items = draft
                .items
                .iter()
                .cloned()
                .map(|line| BudgetItem::priced(ledger.ids.next(), line))
                .collect();
            let budget = Budget {
                id,
                client_name: draft.client_name.trim().to_string(),
                event_name: draft.event_name.trim().to_string(),
                event_type: draft.event_type.clone(),
                event_location: draft.event_location.clone(),
                event_dates: draft.event_dates.clone(),
                event_days: draft.event_days,
                remarks: draft.remarks.clone(),
                status: BudgetStatus::Draft,
                owner,
                created_at: now,
                updated_at: now,
                items,
                approvals: Vec::new(),
                history: vec![HistoryEntry::new("created", owner, now, "Budget drafted")],
                documents: Vec::new(),
            };
            ledger.budgets.insert(budget.id, budget.clone());
            Ok(budget)
        })?;

        info!(
            budget_id = %budget.id,
            owner = %owner,
            items = budget.items.len(),
            total = budget.grand_total(),
            "budget drafted"
        );
        Ok(budget)
    }

    /// Send a draft or returned budget into review.
    pub fn submit(&self, budget_id: BudgetId, user: UserId) -> Result<Budget, WorkflowError> {
        let now = self.clock.now();
        let budget = self.repository.transaction(|ledger| {
            let mut budget = ledger
                .budget(budget_id)
                .cloned()
                .ok_or_else(|| WorkflowError::not_found("budget", budget_id))?;
            budget.submit(&mut ledger.ids, user, now)?;
            ledger.budgets.insert(budget_id, budget.clone());
            Ok::<_, WorkflowError>(budget)
        })?;

        info!(budget_id = %budget_id, user_id = %user, "budget submitted for approval");
        Ok(budget)
    }

    /// Resolve the pending approval at the requested stage. Serialized by the repository,
    /// so two reviewers racing on the same approval cannot both succeed.
    pub fn decide(
        &self,
        approver: UserId,
        decision: ApprovalDecision,
    ) -> Result<Budget, WorkflowError> {
        let now = self.clock.now();
        let ApprovalDecision {
            budget_id,
            stage,
            approve,
            comments,
        } = decision;

        let budget = self.repository.transaction(|ledger| {
            if ledger.user(approver).is_none() {
                return Err(WorkflowError::not_found("user", approver));
            }
            let mut budget = ledger
                .budget(budget_id)
                .cloned()
                .ok_or_else(|| WorkflowError::not_found("budget", budget_id))?;
            budget.decide(&mut ledger.ids, stage, approver, approve, comments, now)?;
            ledger.budgets.insert(budget_id, budget.clone());
            Ok(budget)
        })?;

        info!(
            budget_id = %budget_id,
            stage = stage.label(),
            approver = %approver,
            approved = approve,
            status = budget.status.label(),
            "approval recorded"
        );
        Ok(budget)
    }

    /// Store an upload under `budgets/<id>` and record it on the budget.
    pub fn attach_document(
        &self,
        budget_id: BudgetId,
        original_name: &str,
        contents: &[u8],
        document_type: &str,
    ) -> Result<BudgetDocument, WorkflowError> {
        if document_type.trim().is_empty() {
            return Err(WorkflowError::Validation("document type is required".to_string()));
        }
        self.get(budget_id)?;

        let now = self.clock.now();
        let folder = budget_id.to_string();
        let stored = self
            .documents
            .save(&[BUDGET_FOLDER, folder.as_str()], original_name, contents, now)?;

        let document = self.repository.transaction(|ledger| {
            let document = BudgetDocument {
                id: ledger.ids.next(),
                filename: stored.filename.clone(),
                path: stored.path.clone(),
                document_type: document_type.trim().to_string(),
                uploaded_at: now,
            };
            let budget = ledger
                .budgets
                .get_mut(&budget_id)
                .ok_or_else(|| WorkflowError::not_found("budget", budget_id))?;
            budget.documents.push(document.clone());
            budget.updated_at = now;
            Ok::<_, WorkflowError>(document)
        })?;

        info!(
            budget_id = %budget_id,
            filename = %document.filename,
            document_type = %document.document_type,
            "budget document attached"
        );
        Ok(document)
    }

    /// Cost an element sheet against approved vendors. Creates no budget.
    pub fn import_sheet(
        &self,
        owner: UserId,
        original_name: &str,
        contents: &[u8],
    ) -> Result<Vec<ImportedItem>, WorkflowError> {
        let now = self.clock.now();
        let stored = self
            .documents
            .save(&[ELEMENT_SHEET_FOLDER], original_name, contents, now)?;
        let bytes = self.documents.read(&stored)?;

        let vendors: Vec<Vendor> = self.repository.read(|ledger| {
            ledger
                .vendors()
                .filter(|vendor| vendor.status == VendorStatus::Approved)
                .cloned()
                .collect()
        })?;
        let items = ElementSheetImporter::from_reader(Cursor::new(bytes), &stored.filename, &vendors)?;

        let details = format!("Imported {} items from {}", items.len(), stored.filename);
        self.repository.transaction(|ledger| {
            if ledger.user(owner).is_none() {
                return Err(WorkflowError::not_found("user", owner));
            }
            ledger.activity.push(ActivityLogEntry {
                entity: "budget_import".to_string(),
                entity_id: 0,
                action: "parsed_element_sheet".to_string(),
                performed_by: Some(owner),
                timestamp: now,
                details: Some(details.clone()),
            });
            Ok(())
        })?;

        info!(owner = %owner, file = %stored.filename, items = items.len(), "element sheet imported");
        Ok(items)
    }

    /// Administrators see every budget, everyone else their own. Most recently updated first.
    pub fn list(
        &self,
        viewer: UserId,
        status: Option<BudgetStatus>,
    ) -> Result<Vec<Budget>, WorkflowError> {
        let mut budgets = self.repository.read(|ledger| {
            let role = ledger
                .user(viewer)
                .map(|user| user.role)
                .ok_or_else(|| WorkflowError::not_found("user", viewer))?;
            Ok::<Vec<Budget>, WorkflowError>(
                ledger
                    .budgets()
                    .filter(|budget| role == UserRole::Admin || budget.owner == viewer)
                    .filter(|budget| status.map_or(true, |status| budget.status == status))
                    .cloned()
                    .collect(),
            )
        })??;
        budgets.sort_by(|a, b| b.updated_at.cmp(&a.updated_at).then(b.id.cmp(&a.id)));
        Ok(budgets)
    }

    pub fn get(&self, budget_id: BudgetId) -> Result<Budget, WorkflowError> {
        self.repository
            .read(|ledger| ledger.budget(budget_id).cloned())?
            .ok_or_else(|| WorkflowError::not_found("budget", budget_id))
    }

    pub fn dashboard(&self) -> Result<DashboardMetrics, WorkflowError> {
        Ok(self.repository.read(|ledger| {
            let mut metrics = DashboardMetrics::default();
            for budget in ledger.budgets() {
                match budget.status {
                    BudgetStatus::UnderReview => metrics.pending_approvals += 1,
                    BudgetStatus::Approved => metrics.active_budgets += 1,
                    BudgetStatus::Draft | BudgetStatus::Returned => {}
                }
                if budget.status != BudgetStatus::Approved {
                    metrics.upcoming_events += 1;
                }
            }
            metrics.recent_vendor_updates = ledger
                .vendors()
                .filter(|vendor| vendor.status == VendorStatus::PendingApproval)
                .count();
            metrics
        })?)
    }
}
