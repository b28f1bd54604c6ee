//! One-time password issuance and redemption shared by onboarding and vendor creation.
//!
//! A code is redeemable only while unconsumed and unexpired, and only for the exact
//! (user, purpose) pair it was minted for. Redemption runs inside a repository transaction,
//! which makes the check-and-mark atomic.

use chrono::{DateTime, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::config::OtpPolicy;
use crate::store::{Ledger, OtpId, UserId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OtpPurpose {
    SelfRegistration,
    AdminApproval,
    VendorUnlock,
}

impl OtpPurpose {
    pub const fn label(self) -> &'static str {
        match self {
            Self::SelfRegistration => "self_registration",
            Self::AdminApproval => "admin_approval",
            Self::VendorUnlock => "vendor_unlock",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OneTimePassword {
    pub id: OtpId,
    pub user_id: UserId,
    pub code: String,
    pub purpose: OtpPurpose,
    pub expires_at: DateTime<Utc>,
    pub consumed: bool,
    pub created_at: DateTime<Utc>,
}

impl OneTimePassword {
    pub fn is_redeemable(&self, now: DateTime<Utc>) -> bool {
        !self.consumed && self.expires_at >= now
    }
}

/// Unconsumed code as exposed by the debug listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OtpView {
    pub user_id: UserId,
    pub email: Option<String>,
    pub purpose: OtpPurpose,
    pub code: String,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy)]
pub struct OtpIssuer {
    policy: OtpPolicy,
}

impl OtpIssuer {
    pub fn new(policy: OtpPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> &OtpPolicy {
        &self.policy
    }

    /// Fixed-length numeric code drawn uniformly from the thread RNG.
    pub fn generate_code(&self) -> String {
        let mut rng = rand::rng();
        (0..self.policy.code_length)
            .map(|_| char::from(b'0' + rng.random_range(0..10u8)))
            .collect()
    }

    pub(crate) fn mint(
        &self,
        ledger: &mut Ledger,
        user_id: UserId,
        purpose: OtpPurpose,
        now: DateTime<Utc>,
    ) -> OneTimePassword {
        let otp = OneTimePassword {
            id: ledger.ids.next(),
            user_id,
            code: self.generate_code(),
            purpose,
            expires_at: now
                .checked_add_signed(self.policy.validity(purpose))
                .unwrap_or(DateTime::<Utc>::MAX_UTC),
            consumed: false,
            created_at: now,
        };
        ledger.otps.insert(otp.id, otp.clone());
        otp
    }

    /// Marks the first matching redeemable code as consumed.
    pub(crate) fn redeem(
        &self,
        ledger: &mut Ledger,
        user_id: UserId,
        purpose: OtpPurpose,
        code: &str,
        now: DateTime<Utc>,
    ) -> Option<OtpId> {
        let code = code.trim();
        let otp = ledger.otps.values_mut().find(|otp| {
            otp.user_id == user_id
                && otp.purpose == purpose
                && otp.code == code
                && otp.is_redeemable(now)
        })?;
        otp.consumed = true;
        Some(otp.id)
    }
}

/// Unconsumed codes, newest first, optionally narrowed by e-mail and purpose.
pub(crate) fn unconsumed_codes(
    ledger: &Ledger,
    email: Option<&str>,
    purpose: Option<OtpPurpose>,
) -> Vec<OtpView> {
    let owner = match email {
        Some(email) => match ledger.user_by_email(email) {
            Some(user) => Some(user.id),
            None => return Vec::new(),
        },
        None => None,
    };

    let mut codes: Vec<OtpView> = ledger
        .otps()
        .filter(|otp| !otp.consumed)
        .filter(|otp| owner.map_or(true, |id| otp.user_id == id))
        .filter(|otp| purpose.map_or(true, |purpose| otp.purpose == purpose))
        .map(|otp| OtpView {
            user_id: otp.user_id,
            email: ledger.user(otp.user_id).map(|user| user.email.clone()),
            purpose: otp.purpose,
            code: otp.code.clone(),
            expires_at: otp.expires_at,
            created_at: otp.created_at,
        })
        .collect();
    codes.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    codes
}
