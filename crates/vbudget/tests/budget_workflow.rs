use std::sync::Arc;

use vbudget::config::OtpPolicy;
use vbudget::documents::{DocumentStore, LocalDocumentStore, StoredFile};
use vbudget::notify::RecordingNotifier;
use vbudget::store::MemoryRepository;
use vbudget::workflows::budgets::{
    ApprovalDecision, ApprovalStage, BudgetDraft, BudgetService, BudgetStatus, LineItem,
};
use vbudget::workflows::onboarding::{OnboardingService, UserRole};
use vbudget::workflows::otp::OtpPurpose;
use vbudget::workflows::vendors::{RateCardSubmission, VendorService, VendorSubmission};

struct Backoffice {
    onboarding: OnboardingService<MemoryRepository, RecordingNotifier>,
    vendors: VendorService<MemoryRepository, RecordingNotifier>,
    budgets: BudgetService<MemoryRepository, LocalDocumentStore>,
    store: Arc<LocalDocumentStore>,
}

fn backoffice(uploads: &std::path::Path) -> Backoffice {
    let repository = Arc::new(MemoryRepository::new());
    let notifier = Arc::new(RecordingNotifier::default());
    let store = Arc::new(LocalDocumentStore::new(uploads));
    Backoffice {
        onboarding: OnboardingService::new(
            repository.clone(),
            notifier.clone(),
            OtpPolicy::default(),
        ),
        vendors: VendorService::new(repository.clone(), notifier, OtpPolicy::default()),
        budgets: BudgetService::new(repository, store.clone()),
        store,
    }
}

fn employee(office: &Backoffice, email: &str, role: UserRole) -> vbudget::workflows::onboarding::User {
    let user = office
        .onboarding
        .register(vbudget::workflows::onboarding::Registration {
            name: email.split('@').next().unwrap_or("member").to_string(),
            email: email.to_string(),
            password: "event-ops-2025".to_string(),
            phone: None,
            designation: None,
            team: None,
            supervisor: None,
        })
        .expect("register");
    for purpose in [OtpPurpose::SelfRegistration, OtpPurpose::AdminApproval] {
        let code = office
            .onboarding
            .unconsumed_codes(Some(email), Some(purpose))
            .expect("codes")
            .first()
            .map(|view| view.code.clone())
            .expect("code issued");
        match purpose {
            OtpPurpose::SelfRegistration => {
                office.onboarding.verify_self(email, &code).expect("verify");
            }
            _ => {
                office
                    .onboarding
                    .admin_approve(user.id, &code)
                    .expect("approve");
            }
        }
    }
    office
        .onboarding
        .assign_role(user.id, role)
        .expect("assign role")
}

#[test]
fn sheet_to_approved_budget() {
    let uploads = tempfile::tempdir().expect("temp dir");
    let office = backoffice(uploads.path());
    let planner = employee(&office, "planner@example.com", UserRole::Employee);
    let approver = employee(&office, "approver@example.com", UserRole::Approver);
    let accounts = employee(&office, "accounts@example.com", UserRole::Accounts);

    office.vendors.request_otp(planner.id).expect("vendor otp");
    let code = office
        .onboarding
        .unconsumed_codes(Some("planner@example.com"), Some(OtpPurpose::VendorUnlock))
        .expect("codes")
        .first()
        .map(|view| view.code.clone())
        .expect("vendor code");
    let vendor = office
        .vendors
        .create_with_otp(
            planner.id,
            &code,
            VendorSubmission {
                name: "Brightline Lights".to_string(),
                category: "Light".to_string(),
                contact_person: None,
                phone: None,
                email: None,
                gst_number: None,
                region: Some("Mumbai".to_string()),
                rate_cards: vec![RateCardSubmission {
                    item_name: "Moving Head".to_string(),
                    description: None,
                    unit: "nos".to_string(),
                    rate: 2100.0,
                    min_quantity: None,
                    setup_charges: Some(5000.0),
                    notes: None,
                    category_tag: None,
                }],
            },
        )
        .expect("vendor created");
    office.vendors.decide(vendor.id, true).expect("vendor approved");

    let sheet = "Category,Item,Rate,Qty,Unit,Days,GST %\nLight,Moving Head,,12,,2,18\n";
    let imported = office
        .budgets
        .import_sheet(planner.id, "lights.csv", sheet.as_bytes())
        .expect("sheet imported");
    assert_eq!(imported[0].line.vendor_id, Some(vendor.id));
    assert_eq!(imported[0].line.rate, 2100.0);

    let sheets_dir = uploads.path().join("element_sheets");
    let stored_sheets: Vec<_> = std::fs::read_dir(&sheets_dir)
        .expect("element sheet folder exists")
        .collect();
    assert_eq!(stored_sheets.len(), 1);

    let budget = office
        .budgets
        .create(
            planner.id,
            BudgetDraft {
                client_name: "Orbit Telecom".to_string(),
                event_name: "Annual Kickoff".to_string(),
                event_type: Some("Corporate".to_string()),
                event_location: Some("Pune".to_string()),
                event_dates: None,
                event_days: Some(2),
                remarks: None,
                items: imported
                    .iter()
                    .map(|item| LineItem {
                        is_override: true,
                        ..item.line.clone()
                    })
                    .collect(),
            },
        )
        .expect("budget drafted");
    assert_eq!(budget.items[0].total(), imported[0].total);

    let document = office
        .budgets
        .attach_document(budget.id, "client-brief.pdf", b"%PDF-1.4 brief", "client_brief")
        .expect("document attached");
    let bytes = office
        .store
        .read(&StoredFile {
            filename: document.filename.clone(),
            path: document.path.clone(),
        })
        .expect("document readable");
    assert_eq!(bytes, b"%PDF-1.4 brief");
    assert!(document
        .path
        .contains(&format!("budgets{}{}", std::path::MAIN_SEPARATOR, budget.id)));

    office.budgets.submit(budget.id, planner.id).expect("submit");
    office
        .budgets
        .decide(
            approver.id,
            ApprovalDecision {
                budget_id: budget.id,
                stage: ApprovalStage::Approver,
                approve: true,
                comments: Some("Looks right".to_string()),
            },
        )
        .expect("approver");
    let approved = office
        .budgets
        .decide(
            accounts.id,
            ApprovalDecision {
                budget_id: budget.id,
                stage: ApprovalStage::Accounts,
                approve: true,
                comments: None,
            },
        )
        .expect("accounts");

    assert_eq!(approved.status, BudgetStatus::Approved);
    assert_eq!(approved.approvals.len(), 3);
    let metrics = office.budgets.dashboard().expect("metrics");
    assert_eq!(metrics.active_budgets, 1);
    assert_eq!(metrics.pending_approvals, 0);
}
