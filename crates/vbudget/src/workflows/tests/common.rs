use std::sync::Arc;

use chrono::{DateTime, TimeZone, Utc};

use crate::clock::ManualClock;
use crate::config::OtpPolicy;
use crate::documents::MemoryDocumentStore;
use crate::notify::{Notifier, NotifyError, RecordingNotifier};
use crate::store::{BackOfficeRepository, Ledger, MemoryRepository, RepositoryError, UserId};
use crate::workflows::budgets::{BudgetDraft, BudgetService, LineItem};
use crate::workflows::onboarding::{OnboardingService, Registration, User, UserRole};
use crate::workflows::otp::OtpPurpose;
use crate::workflows::vendors::{RateCardSubmission, VendorService, VendorSubmission};

pub(super) fn start() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 6, 2, 9, 0, 0).unwrap()
}

pub(super) struct Harness {
    pub(super) repository: Arc<MemoryRepository>,
    pub(super) notifier: Arc<RecordingNotifier>,
    pub(super) clock: Arc<ManualClock>,
    pub(super) documents: Arc<MemoryDocumentStore>,
    pub(super) onboarding: OnboardingService<MemoryRepository, RecordingNotifier>,
    pub(super) vendors: VendorService<MemoryRepository, RecordingNotifier>,
    pub(super) budgets: BudgetService<MemoryRepository, MemoryDocumentStore>,
}

pub(super) fn harness() -> Harness {
    let repository = Arc::new(MemoryRepository::new());
    let notifier = Arc::new(RecordingNotifier::default());
    let clock = Arc::new(ManualClock::starting_at(start()));
    let documents = Arc::new(MemoryDocumentStore::default());
    let policy = OtpPolicy::default();

    Harness {
        onboarding: OnboardingService::new(repository.clone(), notifier.clone(), policy)
            .with_clock(clock.clone()),
        vendors: VendorService::new(repository.clone(), notifier.clone(), policy)
            .with_clock(clock.clone()),
        budgets: BudgetService::new(repository.clone(), documents.clone())
            .with_clock(clock.clone()),
        repository,
        notifier,
        clock,
        documents,
    }
}

pub(super) fn registration(email: &str) -> Registration {
    Registration {
        name: "Priya Nair".to_string(),
        email: email.to_string(),
        password: "planner-pass".to_string(),
        phone: Some("+91 98450 12345".to_string()),
        designation: Some("Event Planner".to_string()),
        team: Some("Experiential".to_string()),
        supervisor: Some("Rahul Menon".to_string()),
    }
}

/// Newest unconsumed code for `email` and `purpose`.
pub(super) fn latest_code(harness: &Harness, email: &str, purpose: OtpPurpose) -> String {
    harness
        .onboarding
        .unconsumed_codes(Some(email), Some(purpose))
        .expect("codes readable")
        .first()
        .map(|view| view.code.clone())
        .expect("code issued")
}

/// Register and fully onboard an account, then give it `role`.
pub(super) fn active_user(harness: &Harness, email: &str, role: UserRole) -> User {
    let user = harness
        .onboarding
        .register(registration(email))
        .expect("registration succeeds");
    let code = latest_code(harness, email, OtpPurpose::SelfRegistration);
    harness
        .onboarding
        .verify_self(email, &code)
        .expect("self verification succeeds");
    let code = latest_code(harness, email, OtpPurpose::AdminApproval);
    harness
        .onboarding
        .admin_approve(user.id, &code)
        .expect("admin approval succeeds");
    harness
        .onboarding
        .assign_role(user.id, role)
        .expect("role assigned")
}

pub(super) fn vendor_submission(name: &str, category: &str) -> VendorSubmission {
    VendorSubmission {
        name: name.to_string(),
        category: category.to_string(),
        contact_person: Some("Anil".to_string()),
        phone: None,
        email: Some("sales@example.com".to_string()),
        gst_number: Some("29ABCDE1234F1Z5".to_string()),
        region: Some("Bengaluru".to_string()),
        rate_cards: vec![RateCardSubmission {
            item_name: "Backdrop".to_string(),
            description: Some("Printed flex with frame".to_string()),
            unit: "sqft".to_string(),
            rate: 45.0,
            min_quantity: Some(100.0),
            setup_charges: None,
            notes: None,
            category_tag: None,
        }],
    }
}

pub(super) fn line(item_name: &str, rate: f64, quantity: f64) -> LineItem {
    LineItem {
        category: "Fabrication".to_string(),
        item_name: item_name.to_string(),
        vendor_id: None,
        rate,
        quantity,
        unit: "sqft".to_string(),
        days: 1.0,
        gst_percentage: 18.0,
        notes: None,
        is_override: false,
    }
}

pub(super) fn draft(items: Vec<LineItem>) -> BudgetDraft {
    BudgetDraft {
        client_name: "Northwind Motors".to_string(),
        event_name: "Dealer Meet 2025".to_string(),
        event_type: Some("Conference".to_string()),
        event_location: Some("Goa".to_string()),
        event_dates: Some("2025-08-14 to 2025-08-15".to_string()),
        event_days: Some(2),
        remarks: None,
        items,
    }
}

pub(super) struct FailingNotifier;

impl Notifier for FailingNotifier {
    fn notify(&self, _subject: &str, _message: &str) -> Result<(), NotifyError> {
        Err(NotifyError::Transport("smtp relay offline".to_string()))
    }
}

pub(super) struct UnavailableRepository;

impl BackOfficeRepository for UnavailableRepository {
    fn transaction<T, E, F>(&self, _work: F) -> Result<T, E>
    where
        F: FnOnce(&mut Ledger) -> Result<T, E>,
        E: From<RepositoryError>,
    {
        Err(RepositoryError::Unavailable("database offline".to_string()).into())
    }

    fn read<T, F>(&self, _query: F) -> Result<T, RepositoryError>
    where
        F: FnOnce(&Ledger) -> T,
    {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }
}

pub(super) fn user_count(repository: &MemoryRepository) -> usize {
    repository
        .read(|ledger| ledger.users().count())
        .expect("read succeeds")
}

pub(super) fn admin(harness: &Harness) -> UserId {
    harness
        .onboarding
        .seed_admin("admin@vbudget.local", "Admin@123")
        .expect("admin seeded")
        .id
}
