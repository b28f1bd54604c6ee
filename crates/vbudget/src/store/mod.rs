//! Arena-style storage for users, one-time passwords, vendors and budgets.
//!
//! Aggregates are keyed by opaque identifiers and refer to each other only through those
//! identifiers. Every workflow operation runs inside [`BackOfficeRepository::transaction`],
//! which commits the whole mutation or none of it.

mod ids;

use std::collections::BTreeMap;
use std::sync::Mutex;

pub use ids::{
    ApprovalId, BudgetId, BudgetItemId, DocumentId, IdSequence, OtpId, UserId, VendorId,
};

use crate::workflows::budgets::Budget;
use crate::workflows::history::ActivityLogEntry;
use crate::workflows::onboarding::User;
use crate::workflows::otp::OneTimePassword;
use crate::workflows::vendors::Vendor;

/// In-memory image of every aggregate the back office tracks.
#[derive(Debug, Clone, Default)]
pub struct Ledger {
    pub(crate) ids: IdSequence,
    pub(crate) users: BTreeMap<UserId, User>,
    pub(crate) otps: BTreeMap<OtpId, OneTimePassword>,
    pub(crate) vendors: BTreeMap<VendorId, Vendor>,
    pub(crate) budgets: BTreeMap<BudgetId, Budget>,
    pub(crate) activity: Vec<ActivityLogEntry>,
}

impl Ledger {
    pub fn user(&self, id: UserId) -> Option<&User> {
        self.users.get(&id)
    }

    pub fn user_by_email(&self, email: &str) -> Option<&User> {
        let email = email.trim();
        self.users
            .values()
            .find(|user| user.email.eq_ignore_ascii_case(email))
    }

    pub fn users(&self) -> impl Iterator<Item = &User> {
        self.users.values()
    }

    pub fn otps(&self) -> impl Iterator<Item = &OneTimePassword> {
        self.otps.values()
    }

    pub fn vendor(&self, id: VendorId) -> Option<&Vendor> {
        self.vendors.get(&id)
    }

    pub fn vendors(&self) -> impl Iterator<Item = &Vendor> {
        self.vendors.values()
    }

    pub fn budget(&self, id: BudgetId) -> Option<&Budget> {
        self.budgets.get(&id)
    }

    pub fn budgets(&self) -> impl Iterator<Item = &Budget> {
        self.budgets.values()
    }

    pub fn activity(&self) -> &[ActivityLogEntry] {
        &self.activity
    }
}

/// Storage abstraction so workflow services can be exercised in isolation.
pub trait BackOfficeRepository: Send + Sync {
    /// Runs `work` against a private copy of the ledger and commits it only on `Ok`.
    /// Transactions are serialized, so a check-then-mark inside `work` is atomic.
    fn transaction<T, E, F>(&self, work: F) -> Result<T, E>
    where
        F: FnOnce(&mut Ledger) -> Result<T, E>,
        E: From<RepositoryError>;

    /// Read-only view of the committed ledger.
    fn read<T, F>(&self, query: F) -> Result<T, RepositoryError>
    where
        F: FnOnce(&Ledger) -> T;
}

/// Error enumeration for repository failures.
#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    #[error("repository unavailable: {0}")]
    Unavailable(String),
}

/// Single-writer ledger guarded by a mutex.
///
/// Each transaction stages a full copy of the ledger, so write cost grows with the number of
/// stored aggregates. A panic inside `work` only loses the staged copy; the committed ledger
/// stays intact and later calls recover the poisoned lock.
#[derive(Debug, Default)]
pub struct MemoryRepository {
    ledger: Mutex<Ledger>,
}

impl MemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

impl BackOfficeRepository for MemoryRepository {
    fn transaction<T, E, F>(&self, work: F) -> Result<T, E>
    where
        F: FnOnce(&mut Ledger) -> Result<T, E>,
        E: From<RepositoryError>,
    {
        let mut guard = self
            .ledger
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let mut staged = guard.clone();
        let outcome = work(&mut staged)?;
        *guard = staged;
        Ok(outcome)
    }

    fn read<T, F>(&self, query: F) -> Result<T, RepositoryError>
    where
        F: FnOnce(&Ledger) -> T,
    {
        let guard = self
            .ledger
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        Ok(query(&guard))
    }
}
