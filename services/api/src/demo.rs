use crate::infra::{BackOffice, Backend};
use chrono::{Duration, Utc};
use clap::Args;
use std::path::PathBuf;
use std::sync::Arc;
use vbudget::clock::ManualClock;
use vbudget::config::{AuthConfig, OtpPolicy};
use vbudget::documents::MemoryDocumentStore;
use vbudget::error::AppError;
use vbudget::notify::{Notification, RecordingNotifier};
use vbudget::store::{MemoryRepository, UserId};
use vbudget::workflows::budgets::{ApprovalDecision, ApprovalStage, Budget, BudgetDraft};
use vbudget::workflows::onboarding::{Registration, User, UserRole};
use vbudget::workflows::vendors::{RateCardSubmission, VendorSubmission};
use vbudget::workflows::WorkflowError;

const SAMPLE_SHEET: &str = "\
Service Category,Element,Preferred Vendor,Unit Rate,Qty,UOM,No. of Days,GST %
Fabrication,Stage Backdrop,Stagecraft,0,240,sqft,2,18
Lighting,Par Can,,\"1,200\",16,nos,2,18
Hospitality,Welcome Kit,,350,120,kit,1,12
";

const DEMO_PASSWORD: &str = "demo-pass-2025";

#[derive(Args, Debug, Default)]
pub(crate) struct DemoArgs {
    /// Element sheet CSV to import. Defaults to a built-in dealer meet sheet.
    #[arg(long)]
    pub(crate) sheet: Option<PathBuf>,
    /// Have the accounts reviewer return the budget instead of finalizing it.
    #[arg(long)]
    pub(crate) return_at_accounts: bool,
}

struct DemoBackend;

impl Backend for DemoBackend {
    type Repository = MemoryRepository;
    type Notifier = RecordingNotifier;
    type Documents = MemoryDocumentStore;
}

struct Demo {
    office: BackOffice<DemoBackend>,
    notifier: Arc<RecordingNotifier>,
    clock: Arc<ManualClock>,
}

impl Demo {
    fn new() -> Self {
        let notifier = Arc::new(RecordingNotifier::default());
        let clock = Arc::new(ManualClock::starting_at(Utc::now()));
        let auth = AuthConfig {
            secret_key: "demo-only-secret".to_string(),
            access_token_minutes: 60,
            admin_email: "admin@vbudget.local".to_string(),
            admin_password: "Admin@123".to_string(),
        };
        let office = BackOffice::<DemoBackend>::new(
            Arc::new(MemoryRepository::new()),
            notifier.clone(),
            Arc::new(MemoryDocumentStore::default()),
            &auth,
            OtpPolicy::default(),
            true,
        )
        .with_clock(clock.clone());
        Self {
            office,
            notifier,
            clock,
        }
    }

    /// Echoes the newest admin notification to stdout.
    fn admin_inbox(&self) -> Result<Notification, AppError> {
        let notification = self.notifier.last().ok_or_else(|| WorkflowError::NotFound {
            entity: "notification",
            id: "latest".to_string(),
        })?;
        println!("  [admin inbox] {}: {}", notification.subject, notification.message);
        Ok(notification)
    }

    /// Code relayed by the administrator from the newest notification.
    fn relayed_code(&self) -> Result<String, AppError> {
        let notification = self.admin_inbox()?;
        match notification.message.rsplit_once(": ") {
            Some((_, code)) => Ok(code.trim().to_string()),
            None => Err(WorkflowError::NotFound {
                entity: "code",
                id: notification.subject,
            }
            .into()),
        }
    }

    fn onboard(&self, name: &str, email: &str, role: UserRole) -> Result<User, AppError> {
        let onboarding = &self.office.onboarding;
        let user = onboarding.register(Registration {
            name: name.to_string(),
            email: email.to_string(),
            password: DEMO_PASSWORD.to_string(),
            phone: None,
            designation: None,
            team: Some("Events".to_string()),
            supervisor: None,
        })?;
        let code = self.relayed_code()?;
        onboarding.verify_self(email, &code)?;
        let code = self.relayed_code()?;
        self.clock.advance(Duration::minutes(5));
        onboarding.admin_approve(user.id, &code)?;
        let user = if role == UserRole::Employee {
            onboarding.authenticate(email, DEMO_PASSWORD)?
        } else {
            onboarding.assign_role(user.id, role)?
        };
        println!("- {} <{}> active as {}", user.name, user.email, user.role.label());
        Ok(user)
    }
}

pub(crate) fn run_demo(args: DemoArgs) -> Result<(), AppError> {
    let DemoArgs {
        sheet,
        return_at_accounts,
    } = args;

    let demo = Demo::new();
    let office = &demo.office;

    println!("V-Budget back office demo");
    let admin = office
        .onboarding
        .seed_admin("admin@vbudget.local", "Admin@123")?;
    println!("- seeded {} <{}>", admin.name, admin.email);

    println!("\nOnboarding");
    let planner = demo.onboard("Priya Nair", "priya@vbudget.local", UserRole::Employee)?;
    let approver = demo.onboard("Arjun Mehta", "arjun@vbudget.local", UserRole::Approver)?;
    let accounts = demo.onboard("Kavya Rao", "kavya@vbudget.local", UserRole::Accounts)?;
    let token = office.tokens.issue(&planner.email, office.onboarding.now())?;
    println!("- bearer token issued for {} ({} chars)", planner.email, token.len());

    println!("\nVendor onboarding");
    office.vendors.request_otp(planner.id)?;
    let code = demo.relayed_code()?;
    let vendor = office.vendors.create_with_otp(
        planner.id,
        &code,
        VendorSubmission {
            name: "Stagecraft Fabricators".to_string(),
            category: "Fabrication".to_string(),
            contact_person: Some("Manoj".to_string()),
            phone: None,
            email: None,
            gst_number: Some("29ABCDE1234F1Z5".to_string()),
            region: Some("Bengaluru".to_string()),
            rate_cards: vec![rate_card("Stage Backdrop", "sqft", 85.0)],
        },
    )?;
    demo.admin_inbox()?;
    println!("- {} submitted ({})", vendor.name, vendor.status.label());
    demo.clock.advance(Duration::minutes(30));
    let vendor = office.vendors.decide(vendor.id, true)?;
    println!("- {} {}", vendor.name, vendor.status.label());

    println!("\nElement sheet import");
    let (source, contents) = match sheet {
        Some(path) => {
            let contents = std::fs::read(&path)?;
            (path.display().to_string(), contents)
        }
        None => (
            "Dealer_Meet_Elements.csv".to_string(),
            SAMPLE_SHEET.as_bytes().to_vec(),
        ),
    };
    let imported = office.budgets.import_sheet(planner.id, &source, &contents)?;
    for item in &imported {
        println!(
            "- {:<14} {:<18} {:>8.2} x {:>6} {:<5} x {} day(s) -> {:>12.2} (vendor: {})",
            item.line.category,
            item.line.item_name,
            item.line.rate,
            item.line.quantity,
            item.line.unit,
            item.line.days,
            item.total,
            item.line
                .vendor_id
                .map(|id| id.to_string())
                .unwrap_or_else(|| "-".to_string())
        );
    }

    println!("\nBudget approval");
    let budget = office.budgets.create(
        planner.id,
        BudgetDraft {
            client_name: "Acme Motors".to_string(),
            event_name: "Annual Dealer Meet".to_string(),
            event_type: Some("Conference".to_string()),
            event_location: Some("Bengaluru".to_string()),
            event_dates: None,
            event_days: Some(2),
            remarks: None,
            items: imported.into_iter().map(|item| item.line).collect(),
        },
    )?;
    print_budget("drafted", &budget);

    demo.clock.advance(Duration::hours(1));
    let budget = office.budgets.submit(budget.id, planner.id)?;
    print_budget("submitted", &budget);

    demo.clock.advance(Duration::hours(2));
    let budget = decide(office, approver.id, &budget, ApprovalStage::Approver, true, "Looks good")?;
    print_budget("approver stage", &budget);

    demo.clock.advance(Duration::hours(3));
    let budget = if return_at_accounts {
        decide(office, accounts.id, &budget, ApprovalStage::Accounts, false, "Re-quote lighting")?
    } else {
        decide(office, accounts.id, &budget, ApprovalStage::Accounts, true, "PO raised")?
    };
    print_budget("accounts stage", &budget);

    println!("\nTimeline");
    for entry in &budget.history {
        println!(
            "- {} {} by user {}{}",
            entry.timestamp.format("%Y-%m-%d %H:%M"),
            entry.action,
            entry.performed_by,
            entry
                .notes
                .as_deref()
                .map(|notes| format!(" ({notes})"))
                .unwrap_or_default()
        );
    }

    let metrics = office.budgets.dashboard()?;
    println!("\nDashboard");
    println!(
        "- {} pending approvals | {} active budgets | {} upcoming events | {} vendor updates",
        metrics.pending_approvals,
        metrics.active_budgets,
        metrics.upcoming_events,
        metrics.recent_vendor_updates
    );
    println!("- {} admin notifications sent", demo.notifier.sent().len());

    Ok(())
}

fn rate_card(item_name: &str, unit: &str, rate: f64) -> RateCardSubmission {
    RateCardSubmission {
        item_name: item_name.to_string(),
        description: None,
        unit: unit.to_string(),
        rate,
        min_quantity: None,
        setup_charges: None,
        notes: None,
        category_tag: None,
    }
}

fn decide(
    office: &BackOffice<DemoBackend>,
    reviewer: UserId,
    budget: &Budget,
    stage: ApprovalStage,
    approve: bool,
    comments: &str,
) -> Result<Budget, AppError> {
    Ok(office.budgets.decide(
        reviewer,
        ApprovalDecision {
            budget_id: budget.id,
            stage,
            approve,
            comments: Some(comments.to_string()),
        },
    )?)
}

fn print_budget(step: &str, budget: &Budget) {
    let pending = budget
        .pending_approval()
        .map(|approval| approval.stage.label())
        .unwrap_or("none");
    println!(
        "- {step}: budget {} is {} | grand total {:.2} | pending stage: {pending}",
        budget.id,
        budget.status.label(),
        budget.grand_total()
    );
}
