use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{info, warn};

use super::domain::{Vendor, VendorFilter, VendorStatus, VendorSubmission};
use crate::clock::{Clock, SystemClock};
use crate::config::OtpPolicy;
use crate::notify::Notifier;
use crate::store::{BackOfficeRepository, Ledger, UserId, VendorId};
use crate::workflows::history::HistoryEntry;
use crate::workflows::otp::{OtpIssuer, OtpPurpose};
use crate::workflows::WorkflowError;

/// Vendor onboarding: OTP-unlocked submission, approval and later updates.
pub struct VendorService<R, N> {
    repository: Arc<R>,
    notifier: Arc<N>,
    issuer: OtpIssuer,
    clock: Arc<dyn Clock>,
}

impl<R, N> VendorService<R, N>
where
    R: BackOfficeRepository + 'static,
    N: Notifier + 'static,
{
    pub fn new(repository: Arc<R>, notifier: Arc<N>, policy: OtpPolicy) -> Self {
        Self {
            repository,
            notifier,
            issuer: OtpIssuer::new(policy),
            clock: Arc::new(SystemClock),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Mint a code that unlocks the vendor form for `user_id`.
    pub fn request_otp(&self, user_id: UserId) -> Result<DateTime<Utc>, WorkflowError> {
        let now = self.clock.now();
        let (email, otp) = self.repository.transaction(|ledger| {
            let email = ledger
                .user(user_id)
                .map(|user| user.email.clone())
                .ok_or_else(|| WorkflowError::not_found("user", user_id))?;
            let otp = self
                .issuer
                .mint(ledger, user_id, OtpPurpose::VendorUnlock, now);
            Ok::<_, WorkflowError>((email, otp))
        })?;

        info!(user_id = %user_id, "vendor form OTP issued");
        self.notify(
            "Vendor form unlock",
            &format!("OTP for {}: {}", email, otp.code),
        );
        Ok(otp.expires_at)
    }

    /// Consume a vendor-unlock code on its own.
    pub fn validate_otp(&self, user_id: UserId, code: &str) -> Result<(), WorkflowError> {
        let now = self.clock.now();
        self.repository.transaction(|ledger| self.redeem(ledger, user_id, code, now))
    }

    pub fn create_vendor(
        &self,
        user_id: UserId,
        submission: VendorSubmission,
    ) -> Result<Vendor, WorkflowError> {
        submission.validate()?;
        let now = self.clock.now();
        let vendor = self
            .repository
            .transaction(|ledger| insert_vendor(ledger, user_id, &submission, now))?;
        self.announce(&vendor);
        Ok(vendor)
    }

    /// Redeem the unlock code and create the vendor in one transaction.
    ///
    /// A rejected code leaves no vendor behind; a rejected submission leaves the code unspent.
    pub fn create_with_otp(
        &self,
        user_id: UserId,
        code: &str,
        submission: VendorSubmission,
    ) -> Result<Vendor, WorkflowError> {
        let now = self.clock.now();
        let vendor = self.repository.transaction(|ledger| {
            self.redeem(ledger, user_id, code, now)?;
            submission.validate()?;
            insert_vendor(ledger, user_id, &submission, now)
        })?;
        self.announce(&vendor);
        Ok(vendor)
    }

    /// Approve or reject a vendor. Only the status changes.
    pub fn decide(&self, vendor_id: VendorId, approve: bool) -> Result<Vendor, WorkflowError> {
        let now = self.clock.now();
        let vendor = self.repository.transaction(|ledger| {
            let vendor = ledger
                .vendors
                .get_mut(&vendor_id)
                .ok_or_else(|| WorkflowError::not_found("vendor", vendor_id))?;
            vendor.status = if approve {
                VendorStatus::Approved
            } else {
                VendorStatus::Rejected
            };
            vendor.updated_at = now;
            Ok::<_, WorkflowError>(vendor.clone())
        })?;

        info!(vendor_id = %vendor.id, status = vendor.status.label(), "vendor decided");
        Ok(vendor)
    }

    /// Record a change request and send the vendor back for approval.
    pub fn submit_update(
        &self,
        vendor_id: VendorId,
        user_id: UserId,
        notes: &str,
    ) -> Result<Vendor, WorkflowError> {
        let now = self.clock.now();
        let vendor = self.repository.transaction(|ledger| {
            if ledger.user(user_id).is_none() {
                return Err(WorkflowError::not_found("user", user_id));
            }
            let vendor = ledger
                .vendors
                .get_mut(&vendor_id)
                .ok_or_else(|| WorkflowError::not_found("vendor", vendor_id))?;
            vendor
                .history
                .push(HistoryEntry::new("update_submitted", user_id, now, notes));
            vendor.status = VendorStatus::PendingApproval;
            vendor.updated_at = now;
            Ok(vendor.clone())
        })?;

        info!(vendor_id = %vendor.id, user_id = %user_id, "vendor update submitted");
        Ok(vendor)
    }

    /// Vendors matching `filter`, most recently updated first.
    pub fn list(&self, filter: &VendorFilter) -> Result<Vec<Vendor>, WorkflowError> {
        let mut vendors: Vec<Vendor> = self.repository.read(|ledger| {
            ledger
                .vendors()
                .filter(|vendor| filter.matches(vendor))
                .cloned()
                .collect()
        })?;
        vendors.sort_by(|a, b| b.updated_at.cmp(&a.updated_at).then(b.id.cmp(&a.id)));
        Ok(vendors)
    }

    pub fn get(&self, vendor_id: VendorId) -> Result<Vendor, WorkflowError> {
        self.repository
            .read(|ledger| ledger.vendor(vendor_id).cloned())?
            .ok_or_else(|| WorkflowError::not_found("vendor", vendor_id))
    }

    fn redeem(
        &self,
        ledger: &mut Ledger,
        user_id: UserId,
        code: &str,
        now: DateTime<Utc>,
    ) -> Result<(), WorkflowError> {
        self.issuer
            .redeem(ledger, user_id, OtpPurpose::VendorUnlock, code, now)
            .map(|_| ())
            .ok_or(WorkflowError::InvalidOtp)
    }

    fn announce(&self, vendor: &Vendor) {
        info!(
            vendor_id = %vendor.id,
            name = %vendor.name,
            rate_cards = vendor.rate_cards.len(),
            "vendor submitted for approval"
        );
        self.notify(
            "Vendor approval",
            &format!("Vendor {} awaiting approval", vendor.name),
        );
    }

    fn notify(&self, subject: &str, message: &str) {
        if let Err(err) = self.notifier.notify(subject, message) {
            warn!(%subject, error = %err, "admin notification failed");
        }
    }
}

fn insert_vendor(
    ledger: &mut Ledger,
    user_id: UserId,
    submission: &VendorSubmission,
    now: DateTime<Utc>,
) -> Result<Vendor, WorkflowError> {
    if ledger.user(user_id).is_none() {
        return Err(WorkflowError::not_found("user", user_id));
    }
    let vendor = Vendor {
        id: ledger.ids.next(),
        name: submission.name.trim().to_string(),
        category: submission.category.trim().to_string(),
        contact_person: submission.contact_person.clone(),
        phone: submission.phone.clone(),
        email: submission.email.clone(),
        gst_number: submission.gst_number.clone(),
        region: submission.region.clone(),
        status: VendorStatus::PendingApproval,
        created_by: user_id,
        created_at: now,
        updated_at: now,
        rate_cards: submission.rate_cards(),
        history: vec![HistoryEntry::new(
            "created",
            user_id,
            now,
            "Submitted for approval",
        )],
    };
    ledger.vendors.insert(vendor.id, vendor.clone());
    Ok(vendor)
}
