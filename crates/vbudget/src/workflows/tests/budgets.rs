use std::thread;

use super::common::*;
use crate::store::{BackOfficeRepository, BudgetId};
use crate::workflows::budgets::{
    ApprovalDecision, ApprovalStage, ApprovalStatus, BudgetStatus, DashboardMetrics,
};
use crate::workflows::onboarding::UserRole;
use crate::workflows::vendors::VendorFilter;
use crate::workflows::WorkflowError;

fn decision(budget_id: BudgetId, stage: ApprovalStage, approve: bool) -> ApprovalDecision {
    ApprovalDecision {
        budget_id,
        stage,
        approve,
        comments: None,
    }
}

#[test]
fn create_prices_items_and_records_history() {
    let h = harness();
    let planner = active_user(&h, "priya@example.com", UserRole::Employee);

    let budget = h
        .budgets
        .create(planner.id, draft(vec![line("Backdrop", 45.0, 200.0)]))
        .expect("budget drafted");

    assert_eq!(budget.status, BudgetStatus::Draft);
    assert_eq!(budget.owner, planner.id);
    assert_eq!(budget.items[0].subtotal(), 9000.0);
    assert!((budget.items[0].total() - 10620.0).abs() < 1e-6);
    assert_eq!(budget.history[0].action, "created");
    assert_eq!(budget.history[0].notes.as_deref(), Some("Budget drafted"));
    assert!(budget.approvals.is_empty());
}

#[test]
fn create_rejects_unknown_vendor_reference() {
    let h = harness();
    let planner = active_user(&h, "priya@example.com", UserRole::Employee);
    let mut item = line("Backdrop", 45.0, 200.0);
    item.vendor_id = Some(crate::store::VendorId(77));

    match h.budgets.create(planner.id, draft(vec![item])) {
        Err(WorkflowError::NotFound { entity, .. }) => assert_eq!(entity, "vendor"),
        other => panic!("expected not found, got {other:?}"),
    }
}

#[test]
fn submitting_draft_opens_single_approver_stage() {
    let h = harness();
    let planner = active_user(&h, "priya@example.com", UserRole::Employee);
    let budget = h
        .budgets
        .create(planner.id, draft(vec![line("Backdrop", 45.0, 200.0)]))
        .expect("draft");

    let submitted = h.budgets.submit(budget.id, planner.id).expect("submit");
    assert_eq!(submitted.status, BudgetStatus::UnderReview);
    assert_eq!(submitted.approvals.len(), 1);
    let pending = submitted.pending_approval().expect("pending approval");
    assert_eq!(pending.stage, ApprovalStage::Approver);
    assert_eq!(submitted.history.last().map(|entry| entry.action.as_str()), Some("submitted"));

    match h.budgets.submit(budget.id, planner.id) {
        Err(WorkflowError::InvalidState { status, .. }) => assert_eq!(status, "under_review"),
        other => panic!("expected invalid state, got {other:?}"),
    }
}

#[test]
fn two_stage_approval_yields_three_records() {
    let h = harness();
    let planner = active_user(&h, "priya@example.com", UserRole::Employee);
    let approver = active_user(&h, "ravi@example.com", UserRole::Approver);
    let accounts = active_user(&h, "meera@example.com", UserRole::Accounts);
    let budget = h
        .budgets
        .create(planner.id, draft(vec![line("Backdrop", 45.0, 200.0)]))
        .expect("draft");
    h.budgets.submit(budget.id, planner.id).expect("submit");

    let after_approver = h
        .budgets
        .decide(approver.id, decision(budget.id, ApprovalStage::Approver, true))
        .expect("approver signs off");
    assert_eq!(after_approver.status, BudgetStatus::UnderReview);
    assert_eq!(
        after_approver.pending_approval().map(|approval| approval.stage),
        Some(ApprovalStage::Accounts)
    );

    let approved = h
        .budgets
        .decide(
            accounts.id,
            ApprovalDecision {
                comments: Some("Within quarterly limit".to_string()),
                ..decision(budget.id, ApprovalStage::Accounts, true)
            },
        )
        .expect("accounts signs off");

    assert_eq!(approved.status, BudgetStatus::Approved);
    assert_eq!(approved.approvals.len(), 3);
    let finalized = &approved.approvals[2];
    assert_eq!(finalized.stage, ApprovalStage::Finalized);
    assert_eq!(finalized.status, ApprovalStatus::Approved);
    assert_eq!(finalized.approver, Some(accounts.id));
    assert_eq!(finalized.decided_at, approved.approvals[1].decided_at);
    assert_eq!(
        approved.approvals[1].comments.as_deref(),
        Some("Within quarterly limit")
    );
    assert!(approved.pending_approval().is_none());
}

#[test]
fn rejection_at_accounts_returns_budget_and_resubmission_starts_over() {
    let h = harness();
    let planner = active_user(&h, "priya@example.com", UserRole::Employee);
    let approver = active_user(&h, "ravi@example.com", UserRole::Approver);
    let accounts = active_user(&h, "meera@example.com", UserRole::Accounts);
    let budget = h
        .budgets
        .create(planner.id, draft(vec![line("Backdrop", 45.0, 200.0)]))
        .expect("draft");
    h.budgets.submit(budget.id, planner.id).expect("submit");
    h.budgets
        .decide(approver.id, decision(budget.id, ApprovalStage::Approver, true))
        .expect("approver");

    let returned = h
        .budgets
        .decide(accounts.id, decision(budget.id, ApprovalStage::Accounts, false))
        .expect("accounts returns");
    assert_eq!(returned.status, BudgetStatus::Returned);
    assert!(returned.pending_approval().is_none());
    assert_eq!(returned.approvals[1].status, ApprovalStatus::Returned);

    let resubmitted = h.budgets.submit(budget.id, planner.id).expect("resubmit");
    assert_eq!(resubmitted.status, BudgetStatus::UnderReview);
    assert_eq!(resubmitted.approvals.len(), 3);
    let pending = resubmitted.pending_approval().expect("fresh approval");
    assert_eq!(pending.stage, ApprovalStage::Approver);
    assert_ne!(pending.id, resubmitted.approvals[0].id);
}

#[test]
fn deciding_stage_without_pending_approval_is_not_found() {
    let h = harness();
    let planner = active_user(&h, "priya@example.com", UserRole::Employee);
    let approver = active_user(&h, "ravi@example.com", UserRole::Approver);
    let budget = h
        .budgets
        .create(planner.id, draft(Vec::new()))
        .expect("draft");

    match h
        .budgets
        .decide(approver.id, decision(budget.id, ApprovalStage::Approver, true))
    {
        Err(WorkflowError::NotFound { entity, .. }) => assert_eq!(entity, "approval"),
        other => panic!("expected not found, got {other:?}"),
    }
    assert_eq!(
        h.budgets.get(budget.id).expect("budget").status,
        BudgetStatus::Draft
    );
}

#[test]
fn concurrent_decisions_on_same_approval_only_one_wins() {
    let h = harness();
    let planner = active_user(&h, "priya@example.com", UserRole::Employee);
    let approver = active_user(&h, "ravi@example.com", UserRole::Approver);
    let second = active_user(&h, "meera@example.com", UserRole::Approver);
    let budget = h
        .budgets
        .create(planner.id, draft(vec![line("Backdrop", 45.0, 200.0)]))
        .expect("draft");
    h.budgets.submit(budget.id, planner.id).expect("submit");

    let outcomes: Vec<_> = thread::scope(|scope| {
        let handles: Vec<_> = [(approver.id, true), (second.id, false)]
            .into_iter()
            .map(|(reviewer, approve)| {
                let budgets = &h.budgets;
                scope.spawn(move || {
                    budgets.decide(reviewer, decision(budget.id, ApprovalStage::Approver, approve))
                })
            })
            .collect();
        handles
            .into_iter()
            .map(|handle| handle.join().expect("thread completes"))
            .collect()
    });

    let successes = outcomes.iter().filter(|outcome| outcome.is_ok()).count();
    assert_eq!(successes, 1);
    let failure = outcomes
        .iter()
        .find_map(|outcome| outcome.as_ref().err())
        .expect("one decision fails");
    assert_eq!(failure.kind(), "not_found");

    let stored = h.budgets.get(budget.id).expect("budget");
    let decided = stored
        .approvals
        .iter()
        .filter(|approval| approval.stage == ApprovalStage::Approver && !approval.is_pending())
        .count();
    assert_eq!(decided, 1);
}

#[test]
fn attach_document_stores_under_budget_folder() {
    let h = harness();
    let planner = active_user(&h, "priya@example.com", UserRole::Employee);
    let budget = h
        .budgets
        .create(planner.id, draft(Vec::new()))
        .expect("draft");

    let document = h
        .budgets
        .attach_document(budget.id, "quote.pdf", b"%PDF-1.7", "vendor_quote")
        .expect("attached");
    assert!(document.filename.ends_with("_quote.pdf"));
    assert_eq!(document.path, format!("budgets/{}/{}", budget.id, document.filename));
    assert_eq!(h.documents.paths(), vec![document.path.clone()]);

    let stored = h.budgets.get(budget.id).expect("budget");
    assert_eq!(stored.documents, vec![document]);

    match h
        .budgets
        .attach_document(BudgetId(404), "quote.pdf", b"%PDF", "vendor_quote")
    {
        Err(WorkflowError::NotFound { entity, .. }) => assert_eq!(entity, "budget"),
        other => panic!("expected not found, got {other:?}"),
    }
    assert_eq!(h.documents.paths().len(), 1);
}

#[test]
fn import_sheet_matches_approved_vendors_and_logs_activity() {
    let h = harness();
    let planner = active_user(&h, "priya@example.com", UserRole::Employee);
    let vendor = h
        .vendors
        .create_vendor(planner.id, vendor_submission("Decor House", "Fabrication"))
        .expect("vendor");
    h.vendors.decide(vendor.id, true).expect("approve");

    let sheet = "Item Name,Rate,Qty,Unit,Category\nBackdrop,0,120,,Fabrication\n,,,,\nLED Wall,900,10,sqft,AV\n";
    let items = h
        .budgets
        .import_sheet(planner.id, "dealer-meet.csv", sheet.as_bytes())
        .expect("import");

    assert_eq!(items.len(), 2);
    let backdrop = &items[0];
    assert_eq!(backdrop.line.vendor_id, Some(vendor.id));
    assert_eq!(backdrop.line.rate, 45.0);
    assert_eq!(backdrop.line.unit, "sqft");
    assert_eq!(backdrop.subtotal, 5400.0);
    assert!(items[1].line.vendor_id.is_none());

    let paths = h.documents.paths();
    assert_eq!(paths.len(), 1);
    assert!(paths[0].starts_with("element_sheets/"));
    let stored_name = paths[0].trim_start_matches("element_sheets/").to_string();
    assert_eq!(
        backdrop.line.notes.as_deref(),
        Some(format!("Auto-imported from {stored_name}").as_str())
    );

    let activity = h
        .repository
        .read(|ledger| ledger.activity().to_vec())
        .expect("activity");
    assert_eq!(activity.len(), 1);
    assert_eq!(activity[0].action, "parsed_element_sheet");
    assert_eq!(
        activity[0].details.as_deref(),
        Some(format!("Imported 2 items from {stored_name}").as_str())
    );
    assert!(h.budgets.list(planner.id, None).expect("list").is_empty());
}

#[test]
fn import_sheet_without_rate_column_fails() {
    let h = harness();
    let planner = active_user(&h, "priya@example.com", UserRole::Employee);

    let err = h
        .budgets
        .import_sheet(planner.id, "bad.csv", b"Item,Qty,Unit,Category\nBackdrop,1,sqft,Fab\n")
        .expect_err("missing rate column");
    assert_eq!(err.kind(), "validation_error");
    assert_eq!(err.to_string(), "Missing column Rate");
    let activity = h
        .repository
        .read(|ledger| ledger.activity().len())
        .expect("activity");
    assert_eq!(activity, 0);
}

#[test]
fn listing_is_scoped_to_owner_unless_admin() {
    let h = harness();
    let admin_id = admin(&h);
    let priya = active_user(&h, "priya@example.com", UserRole::Employee);
    let ravi = active_user(&h, "ravi@example.com", UserRole::Employee);

    let first = h
        .budgets
        .create(priya.id, draft(Vec::new()))
        .expect("priya draft");
    h.clock.advance(chrono::Duration::minutes(5));
    let second = h
        .budgets
        .create(ravi.id, draft(Vec::new()))
        .expect("ravi draft");
    h.budgets.submit(second.id, ravi.id).expect("submit");

    let own: Vec<_> = h
        .budgets
        .list(priya.id, None)
        .expect("list")
        .into_iter()
        .map(|budget| budget.id)
        .collect();
    assert_eq!(own, vec![first.id]);

    let everything: Vec<_> = h
        .budgets
        .list(admin_id, None)
        .expect("list")
        .into_iter()
        .map(|budget| budget.id)
        .collect();
    assert_eq!(everything, vec![second.id, first.id]);

    let under_review = h
        .budgets
        .list(admin_id, Some(BudgetStatus::UnderReview))
        .expect("list");
    assert_eq!(under_review.len(), 1);
}

#[test]
fn dashboard_counts_budgets_and_pending_vendors() {
    let h = harness();
    let planner = active_user(&h, "priya@example.com", UserRole::Employee);
    let approver = active_user(&h, "ravi@example.com", UserRole::Approver);
    let accounts = active_user(&h, "meera@example.com", UserRole::Accounts);

    let approved = h
        .budgets
        .create(planner.id, draft(Vec::new()))
        .expect("draft");
    h.budgets.submit(approved.id, planner.id).expect("submit");
    h.budgets
        .decide(approver.id, decision(approved.id, ApprovalStage::Approver, true))
        .expect("approver");
    h.budgets
        .decide(accounts.id, decision(approved.id, ApprovalStage::Accounts, true))
        .expect("accounts");

    let reviewing = h
        .budgets
        .create(planner.id, draft(Vec::new()))
        .expect("draft");
    h.budgets.submit(reviewing.id, planner.id).expect("submit");
    h.budgets
        .create(planner.id, draft(Vec::new()))
        .expect("draft");

    h.vendors
        .create_vendor(planner.id, vendor_submission("Decor House", "Fabrication"))
        .expect("vendor");
    assert_eq!(
        h.vendors.list(&VendorFilter::default()).expect("vendors").len(),
        1
    );

    assert_eq!(
        h.budgets.dashboard().expect("metrics"),
        DashboardMetrics {
            pending_approvals: 1,
            active_budgets: 1,
            upcoming_events: 2,
            recent_vendor_updates: 1,
        }
    );
}
