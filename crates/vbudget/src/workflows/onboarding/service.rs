use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{info, warn};

use super::domain::{Registration, User, UserRole, UserStatus};
use crate::auth::password;
use crate::clock::{Clock, SystemClock};
use crate::config::OtpPolicy;
use crate::notify::Notifier;
use crate::store::{BackOfficeRepository, UserId};
use crate::workflows::otp::{self, OtpIssuer, OtpPurpose, OtpView};
use crate::workflows::WorkflowError;

/// Drives accounts through self-verification and administrator approval.
///
/// `pending_self_otp → pending_admin_approval → active`, each hop gated by a one-time code.
pub struct OnboardingService<R, N> {
    repository: Arc<R>,
    notifier: Arc<N>,
    issuer: OtpIssuer,
    clock: Arc<dyn Clock>,
}

impl<R, N> OnboardingService<R, N>
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

    /// Create an employee account awaiting its own OTP confirmation.
    pub fn register(&self, registration: Registration) -> Result<User, WorkflowError> {
        registration.validate()?;
        let password_hash = password::hash_password(&registration.password)
            .map_err(|err| WorkflowError::Credentials(err.to_string()))?;
        let now = self.clock.now();

        let (user, code) = self.repository.transaction(|ledger| {
            let email = registration.email.trim().to_string();
            if ledger.user_by_email(&email).is_some() {
                return Err(WorkflowError::Conflict("Email already registered".to_string()));
            }

            let user = User {
                id: ledger.ids.next(),
                name: registration.name.trim().to_string(),
                email,
                phone: registration.phone.clone(),
                designation: registration.designation.clone(),
                team: registration.team.clone(),
                supervisor: registration.supervisor.clone(),
                password_hash,
                role: UserRole::Employee,
                status: UserStatus::PendingSelfOtp,
                created_at: now,
                updated_at: now,
            };
            ledger.users.insert(user.id, user.clone());
            let otp = self
                .issuer
                .mint(ledger, user.id, OtpPurpose::SelfRegistration, now);
            Ok((user, otp.code))
        })?;

        info!(user_id = %user.id, email = %user.email, "employee registered");
        self.notify(
            "New employee registration",
            &format!("OTP for {}: {}", user.email, code),
        );
        Ok(user)
    }

    /// Confirm the self-registration code and hand the account to an administrator.
    pub fn verify_self(&self, email: &str, code: &str) -> Result<User, WorkflowError> {
        let now = self.clock.now();
        let (user, admin_code) = self.repository.transaction(|ledger| {
            let user_id = ledger
                .user_by_email(email)
                .map(|user| user.id)
                .ok_or_else(|| WorkflowError::not_found("user", email.trim()))?;

            self.issuer
                .redeem(ledger, user_id, OtpPurpose::SelfRegistration, code, now)
                .ok_or(WorkflowError::InvalidOrExpired)?;

            let user = ledger
                .users
                .get_mut(&user_id)
                .ok_or_else(|| WorkflowError::not_found("user", user_id))?;
            user.transition(
                UserStatus::PendingSelfOtp,
                UserStatus::PendingAdminApproval,
                "verify",
                now,
            )?;
            let user = user.clone();

            let otp = self
                .issuer
                .mint(ledger, user_id, OtpPurpose::AdminApproval, now);
            Ok::<_, WorkflowError>((user, otp.code))
        })?;

        info!(user_id = %user.id, "self verification accepted");
        self.notify(
            "Approve new employee",
            &format!("OTP for {}: {}", user.email, admin_code),
        );
        Ok(user)
    }

    /// Activate an account with the administrator's approval code. Sends no notification.
    pub fn admin_approve(&self, user_id: UserId, code: &str) -> Result<User, WorkflowError> {
        let now = self.clock.now();
        let user = self.repository.transaction(|ledger| {
            if ledger.user(user_id).is_none() {
                return Err(WorkflowError::not_found("user", user_id));
            }

            self.issuer
                .redeem(ledger, user_id, OtpPurpose::AdminApproval, code, now)
                .ok_or(WorkflowError::InvalidOrExpired)?;

            let user = ledger
                .users
                .get_mut(&user_id)
                .ok_or_else(|| WorkflowError::not_found("user", user_id))?;
            user.transition(
                UserStatus::PendingAdminApproval,
                UserStatus::Active,
                "approve",
                now,
            )?;
            Ok(user.clone())
        })?;

        info!(user_id = %user.id, "employee activated");
        Ok(user)
    }

    /// Check credentials for an active account, upgrading outdated password hashes.
    pub fn authenticate(&self, email: &str, password_attempt: &str) -> Result<User, WorkflowError> {
        let user = self
            .repository
            .read(|ledger| ledger.user_by_email(email).cloned())?
            .ok_or(WorkflowError::Unauthorized)?;

        let verified = password::verify_password(password_attempt, &user.password_hash)
            .unwrap_or(false);
        if !verified {
            return Err(WorkflowError::Unauthorized);
        }
        if !user.is_active() {
            return Err(WorkflowError::Forbidden("User not active".to_string()));
        }

        if password::needs_rehash(&user.password_hash) {
            let rehashed = password::hash_password(password_attempt)
                .map_err(|err| WorkflowError::Credentials(err.to_string()))?;
            let now = self.clock.now();
            let user_id = user.id;
            let refreshed = self.repository.transaction(|ledger| {
                let stored = ledger
                    .users
                    .get_mut(&user_id)
                    .ok_or_else(|| WorkflowError::not_found("user", user_id))?;
                stored.password_hash = rehashed;
                stored.updated_at = now;
                Ok::<_, WorkflowError>(stored.clone())
            })?;
            info!(user_id = %user_id, "password hash upgraded");
            return Ok(refreshed);
        }

        Ok(user)
    }

    /// Ensure the bootstrap administrator exists. Existing accounts are left untouched.
    pub fn seed_admin(&self, email: &str, admin_password: &str) -> Result<User, WorkflowError> {
        if let Some(existing) = self
            .repository
            .read(|ledger| ledger.user_by_email(email).cloned())?
        {
            return Ok(existing);
        }

        let password_hash = password::hash_password(admin_password)
            .map_err(|err| WorkflowError::Credentials(err.to_string()))?;
        let now = self.clock.now();
        let admin = self.repository.transaction(|ledger| {
            if let Some(existing) = ledger.user_by_email(email) {
                return Ok(existing.clone());
            }
            let admin = User {
                id: ledger.ids.next(),
                name: "System Admin".to_string(),
                email: email.trim().to_string(),
                phone: None,
                designation: None,
                team: None,
                supervisor: None,
                password_hash,
                role: UserRole::Admin,
                status: UserStatus::Active,
                created_at: now,
                updated_at: now,
            };
            ledger.users.insert(admin.id, admin.clone());
            Ok::<_, WorkflowError>(admin)
        })?;

        info!(user_id = %admin.id, email = %admin.email, "administrator seeded");
        Ok(admin)
    }

    /// Change an account's role. Only active accounts can be promoted.
    pub fn assign_role(&self, user_id: UserId, role: UserRole) -> Result<User, WorkflowError> {
        let now = self.clock.now();
        let user = self.repository.transaction(|ledger| {
            let user = ledger
                .users
                .get_mut(&user_id)
                .ok_or_else(|| WorkflowError::not_found("user", user_id))?;
            if !user.is_active() {
                return Err(WorkflowError::InvalidState {
                    entity: "user",
                    status: user.status.label(),
                    operation: "assign a role to",
                });
            }
            user.role = role;
            user.updated_at = now;
            Ok(user.clone())
        })?;

        info!(user_id = %user.id, role = role.label(), "role assigned");
        Ok(user)
    }

    pub fn user_by_email(&self, email: &str) -> Result<User, WorkflowError> {
        self.repository
            .read(|ledger| ledger.user_by_email(email).cloned())?
            .ok_or_else(|| WorkflowError::not_found("user", email.trim()))
    }

    pub fn get(&self, user_id: UserId) -> Result<User, WorkflowError> {
        self.repository
            .read(|ledger| ledger.user(user_id).cloned())?
            .ok_or_else(|| WorkflowError::not_found("user", user_id))
    }

    /// Accounts waiting on an administrator.
    pub fn pending_users(&self) -> Result<Vec<User>, WorkflowError> {
        Ok(self.repository.read(|ledger| {
            ledger
                .users()
                .filter(|user| user.status == UserStatus::PendingAdminApproval)
                .cloned()
                .collect()
        })?)
    }

    /// Outstanding codes for the debug surface.
    pub fn unconsumed_codes(
        &self,
        email: Option<&str>,
        purpose: Option<OtpPurpose>,
    ) -> Result<Vec<OtpView>, WorkflowError> {
        Ok(self
            .repository
            .read(|ledger| otp::unconsumed_codes(ledger, email, purpose))?)
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    fn notify(&self, subject: &str, message: &str) {
        if let Err(err) = self.notifier.notify(subject, message) {
            warn!(%subject, error = %err, "admin notification failed");
        }
    }
}
