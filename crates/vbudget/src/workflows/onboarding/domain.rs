use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::store::UserId;
use crate::workflows::WorkflowError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UserRole {
    Employee,
    Approver,
    Accounts,
    Admin,
}

impl UserRole {
    pub const fn label(self) -> &'static str {
        match self {
            Self::Employee => "employee",
            Self::Approver => "approver",
            Self::Accounts => "accounts",
            Self::Admin => "admin",
        }
    }
}

/// Onboarding progression of an account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UserStatus {
    PendingSelfOtp,
    PendingAdminApproval,
    Active,
    Rejected,
}

impl UserStatus {
    pub const fn label(self) -> &'static str {
        match self {
            Self::PendingSelfOtp => "pending_self_otp",
            Self::PendingAdminApproval => "pending_admin_approval",
            Self::Active => "active",
            Self::Rejected => "rejected",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct User {
    pub id: UserId,
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
    pub designation: Option<String>,
    pub team: Option<String>,
    pub supervisor: Option<String>,
    #[serde(skip_serializing)]
    pub(crate) password_hash: String,
    pub role: UserRole,
    pub status: UserStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    pub fn is_active(&self) -> bool {
        self.status == UserStatus::Active
    }

    pub(crate) fn transition(
        &mut self,
        from: UserStatus,
        to: UserStatus,
        operation: &'static str,
        at: DateTime<Utc>,
    ) -> Result<(), WorkflowError> {
        if self.status != from {
            return Err(WorkflowError::InvalidState {
                entity: "user",
                status: self.status.label(),
                operation,
            });
        }
        self.status = to;
        self.updated_at = at;
        Ok(())
    }
}

/// Self-service sign-up payload.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Registration {
    pub name: String,
    pub email: String,
    pub password: String,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub designation: Option<String>,
    #[serde(default)]
    pub team: Option<String>,
    #[serde(default)]
    pub supervisor: Option<String>,
}

impl Registration {
    pub(crate) fn validate(&self) -> Result<(), WorkflowError> {
        if self.name.trim().is_empty() {
            return Err(WorkflowError::Validation("name is required".to_string()));
        }
        let email = self.email.trim();
        let valid_email = email
            .split_once('@')
            .is_some_and(|(local, domain)| !local.is_empty() && domain.contains('.'));
        if !valid_email {
            return Err(WorkflowError::Validation(format!(
                "'{email}' is not a valid e-mail address"
            )));
        }
        crate::auth::password::validate_password_strength(&self.password)
            .map_err(WorkflowError::Validation)
    }
}
