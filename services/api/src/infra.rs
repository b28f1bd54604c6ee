use axum::http::{header, HeaderMap};
use metrics_exporter_prometheus::PrometheusHandle;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use vbudget::auth::{AccessTokenIssuer, AuthError};
use vbudget::clock::Clock;
use vbudget::config::{AuthConfig, OtpPolicy};
use vbudget::documents::{DocumentStore, LocalDocumentStore};
use vbudget::error::AppError;
use vbudget::notify::{Notifier, TracingNotifier};
use vbudget::store::{BackOfficeRepository, MemoryRepository};
use vbudget::workflows::budgets::BudgetService;
use vbudget::workflows::onboarding::{OnboardingService, User, UserRole};
use vbudget::workflows::vendors::VendorService;
use vbudget::workflows::WorkflowError;

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
}

/// Picks the collaborators the HTTP layer runs against.
pub(crate) trait Backend: Send + Sync + 'static {
    type Repository: BackOfficeRepository + 'static;
    type Notifier: Notifier + 'static;
    type Documents: DocumentStore + 'static;
}

/// In-process ledger, log notifications and uploads on local disk.
pub(crate) struct LiveBackend;

impl Backend for LiveBackend {
    type Repository = MemoryRepository;
    type Notifier = TracingNotifier;
    type Documents = LocalDocumentStore;
}

/// Every workflow service plus the token issuer, shared by all handlers.
pub(crate) struct BackOffice<B: Backend> {
    pub(crate) onboarding: OnboardingService<B::Repository, B::Notifier>,
    pub(crate) vendors: VendorService<B::Repository, B::Notifier>,
    pub(crate) budgets: BudgetService<B::Repository, B::Documents>,
    pub(crate) tokens: AccessTokenIssuer,
    pub(crate) debug_mode: bool,
}

impl<B: Backend> BackOffice<B> {
    pub(crate) fn new(
        repository: Arc<B::Repository>,
        notifier: Arc<B::Notifier>,
        documents: Arc<B::Documents>,
        auth: &AuthConfig,
        otp: OtpPolicy,
        debug_mode: bool,
    ) -> Self {
        Self {
            onboarding: OnboardingService::new(repository.clone(), notifier.clone(), otp),
            vendors: VendorService::new(repository.clone(), notifier, otp),
            budgets: BudgetService::new(repository, documents),
            tokens: AccessTokenIssuer::new(auth),
            debug_mode,
        }
    }

    pub(crate) fn with_clock(self, clock: Arc<dyn Clock>) -> Self {
        Self {
            onboarding: self.onboarding.with_clock(clock.clone()),
            vendors: self.vendors.with_clock(clock.clone()),
            budgets: self.budgets.with_clock(clock),
            ..self
        }
    }

    /// Resolves the bearer token to an active account.
    pub(crate) fn current_user(&self, headers: &HeaderMap) -> Result<User, AppError> {
        let value = headers
            .get(header::AUTHORIZATION)
            .and_then(|value| value.to_str().ok());
        let token = AccessTokenIssuer::bearer(value)?;
        let email = self.tokens.verify(token)?;
        let user = match self.onboarding.user_by_email(&email) {
            Ok(user) => user,
            Err(WorkflowError::NotFound { .. }) => return Err(AuthError::UnknownSubject.into()),
            Err(err) => return Err(err.into()),
        };
        if !user.is_active() {
            return Err(WorkflowError::Forbidden("User not active".to_string()).into());
        }
        Ok(user)
    }
}

pub(crate) fn require_role(user: &User, allowed: &[UserRole]) -> Result<(), AppError> {
    if allowed.contains(&user.role) {
        Ok(())
    } else {
        Err(WorkflowError::Forbidden("Insufficient role".to_string()).into())
    }
}
