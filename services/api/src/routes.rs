use crate::infra::{require_role, AppState, BackOffice, Backend};
use axum::body::Bytes;
use axum::extract::{Path, Query, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Extension, Json, Router};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use vbudget::error::AppError;
use vbudget::store::{BudgetId, UserId, VendorId};
use vbudget::workflows::budgets::{
    ApprovalDecision, Budget, BudgetDocument, BudgetDraft, BudgetStatus, DashboardMetrics,
};
use vbudget::workflows::element_sheet::ImportedItem;
use vbudget::workflows::onboarding::{Registration, User, UserRole};
use vbudget::workflows::otp::{OtpPurpose, OtpView};
use vbudget::workflows::vendors::{Vendor, VendorFilter, VendorSubmission};
use vbudget::workflows::WorkflowError;

type Office<B> = State<Arc<BackOffice<B>>>;

#[derive(Debug, Serialize)]
pub(crate) struct Message {
    pub(crate) detail: String,
}

impl Message {
    fn new(detail: &str) -> Json<Self> {
        Json(Self {
            detail: detail.to_string(),
        })
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct SelfOtpRequest {
    pub(crate) email: String,
    pub(crate) otp: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct AdminOtpRequest {
    pub(crate) user_id: UserId,
    pub(crate) otp: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct LoginRequest {
    pub(crate) email: String,
    pub(crate) password: String,
}

#[derive(Debug, Serialize)]
pub(crate) struct TokenResponse {
    pub(crate) access_token: String,
    pub(crate) token_type: &'static str,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RoleRequest {
    pub(crate) role: UserRole,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct OtpListQuery {
    #[serde(default)]
    pub(crate) email: Option<String>,
    #[serde(default)]
    pub(crate) purpose: Option<OtpPurpose>,
}

#[derive(Debug, Serialize)]
pub(crate) struct VendorOtpResponse {
    pub(crate) detail: &'static str,
    pub(crate) expires_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct VendorCreateRequest {
    pub(crate) vendor: VendorSubmission,
    pub(crate) otp: String,
}

fn approve_by_default() -> bool {
    true
}

#[derive(Debug, Deserialize)]
pub(crate) struct VendorDecisionQuery {
    #[serde(default = "approve_by_default")]
    pub(crate) approve: bool,
}

#[derive(Debug, Deserialize)]
pub(crate) struct VendorUpdateRequest {
    #[serde(default)]
    pub(crate) notes: String,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct BudgetListQuery {
    #[serde(default, alias = "status_filter")]
    pub(crate) status: Option<BudgetStatus>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct DocumentUploadQuery {
    pub(crate) filename: String,
    pub(crate) document_type: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct SheetUploadQuery {
    pub(crate) filename: String,
}

#[derive(Debug, Serialize)]
pub(crate) struct DocumentUploaded {
    pub(crate) detail: &'static str,
    pub(crate) document: BudgetDocument,
}

/// Back-office API plus the operational endpoints.
pub(crate) fn with_backoffice_routes<B: Backend>(office: Arc<BackOffice<B>>) -> Router {
    Router::new()
        .route("/auth/register", post(register::<B>))
        .route("/auth/verify-self", post(verify_self::<B>))
        .route("/auth/admin-approve", post(admin_approve::<B>))
        .route("/auth/login", post(login::<B>))
        .route("/users/me", get(current_user::<B>))
        .route("/users/pending", get(pending_users::<B>))
        .route("/users/:id/role", post(assign_role::<B>))
        .route("/debug/otps", get(debug_otps::<B>))
        .route("/vendors/request-otp", post(request_vendor_otp::<B>))
        .route("/vendors", post(create_vendor::<B>).get(list_vendors::<B>))
        .route("/vendors/:id", get(get_vendor::<B>))
        .route("/vendors/:id/approve", post(decide_vendor::<B>))
        .route("/vendors/:id/updates", post(submit_vendor_update::<B>))
        .route("/budgets", post(create_budget::<B>).get(list_budgets::<B>))
        .route("/budgets/import", post(import_element_sheet::<B>))
        .route("/budgets/:id", get(get_budget::<B>))
        .route("/budgets/:id/submit", post(submit_budget::<B>))
        .route("/budgets/:id/documents", post(upload_document::<B>))
        .route("/approvals", post(act_on_approval::<B>))
        .route("/dashboard/metrics", get(dashboard_metrics::<B>))
        .with_state(office)
        .route("/health", get(healthcheck))
        .route("/ready", get(readiness_endpoint))
        .route("/metrics", get(metrics_endpoint))
}

pub(crate) async fn healthcheck() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

pub(crate) async fn readiness_endpoint(Extension(state): Extension<AppState>) -> impl IntoResponse {
    let ready = state.readiness.load(std::sync::atomic::Ordering::Relaxed);
    let status = if ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    let payload = if ready {
        json!({ "status": "ready" })
    } else {
        json!({ "status": "initializing" })
    };

    (status, Json(payload))
}

pub(crate) async fn metrics_endpoint(Extension(state): Extension<AppState>) -> impl IntoResponse {
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        state.metrics.render(),
    )
}

async fn register<B: Backend>(
    State(office): Office<B>,
    Json(payload): Json<Registration>,
) -> Result<(StatusCode, Json<User>), AppError> {
    let user = office.onboarding.register(payload)?;
    Ok((StatusCode::CREATED, Json(user)))
}

async fn verify_self<B: Backend>(
    State(office): Office<B>,
    Json(payload): Json<SelfOtpRequest>,
) -> Result<Json<Message>, AppError> {
    office.onboarding.verify_self(&payload.email, &payload.otp)?;
    Ok(Message::new("Email verified. Await admin approval."))
}

async fn admin_approve<B: Backend>(
    State(office): Office<B>,
    headers: HeaderMap,
    Json(payload): Json<AdminOtpRequest>,
) -> Result<Json<User>, AppError> {
    let reviewer = office.current_user(&headers)?;
    require_role(&reviewer, &[UserRole::Admin, UserRole::Approver])?;
    Ok(Json(
        office.onboarding.admin_approve(payload.user_id, &payload.otp)?,
    ))
}

async fn login<B: Backend>(
    State(office): Office<B>,
    Json(payload): Json<LoginRequest>,
) -> Result<Json<TokenResponse>, AppError> {
    let user = office
        .onboarding
        .authenticate(&payload.email, &payload.password)?;
    let access_token = office.tokens.issue(&user.email, office.onboarding.now())?;
    Ok(Json(TokenResponse {
        access_token,
        token_type: "bearer",
    }))
}

async fn current_user<B: Backend>(
    State(office): Office<B>,
    headers: HeaderMap,
) -> Result<Json<User>, AppError> {
    Ok(Json(office.current_user(&headers)?))
}

async fn pending_users<B: Backend>(
    State(office): Office<B>,
    headers: HeaderMap,
) -> Result<Json<Vec<User>>, AppError> {
    let reviewer = office.current_user(&headers)?;
    require_role(&reviewer, &[UserRole::Admin, UserRole::Approver])?;
    Ok(Json(office.onboarding.pending_users()?))
}

async fn assign_role<B: Backend>(
    State(office): Office<B>,
    headers: HeaderMap,
    Path(user_id): Path<UserId>,
    Json(payload): Json<RoleRequest>,
) -> Result<Json<User>, AppError> {
    let admin = office.current_user(&headers)?;
    require_role(&admin, &[UserRole::Admin])?;
    Ok(Json(office.onboarding.assign_role(user_id, payload.role)?))
}

async fn debug_otps<B: Backend>(
    State(office): Office<B>,
    Query(query): Query<OtpListQuery>,
) -> Result<Json<Vec<OtpView>>, AppError> {
    if !office.debug_mode {
        return Err(WorkflowError::NotFound {
            entity: "route",
            id: "/debug/otps".to_string(),
        }
        .into());
    }
    let email = query
        .email
        .as_deref()
        .map(str::trim)
        .filter(|email| !email.is_empty());
    Ok(Json(office.onboarding.unconsumed_codes(email, query.purpose)?))
}

async fn request_vendor_otp<B: Backend>(
    State(office): Office<B>,
    headers: HeaderMap,
) -> Result<Json<VendorOtpResponse>, AppError> {
    let user = office.current_user(&headers)?;
    let expires_at = office.vendors.request_otp(user.id)?;
    Ok(Json(VendorOtpResponse {
        detail: "OTP sent to admin. Provide the OTP to continue.",
        expires_at,
    }))
}

async fn create_vendor<B: Backend>(
    State(office): Office<B>,
    headers: HeaderMap,
    Json(payload): Json<VendorCreateRequest>,
) -> Result<(StatusCode, Json<Vendor>), AppError> {
    let user = office.current_user(&headers)?;
    let vendor = office
        .vendors
        .create_with_otp(user.id, &payload.otp, payload.vendor)?;
    Ok((StatusCode::CREATED, Json(vendor)))
}

async fn list_vendors<B: Backend>(
    State(office): Office<B>,
    headers: HeaderMap,
    Query(filter): Query<VendorFilter>,
) -> Result<Json<Vec<Vendor>>, AppError> {
    office.current_user(&headers)?;
    Ok(Json(office.vendors.list(&filter)?))
}

async fn get_vendor<B: Backend>(
    State(office): Office<B>,
    headers: HeaderMap,
    Path(vendor_id): Path<VendorId>,
) -> Result<Json<Vendor>, AppError> {
    office.current_user(&headers)?;
    Ok(Json(office.vendors.get(vendor_id)?))
}

async fn decide_vendor<B: Backend>(
    State(office): Office<B>,
    headers: HeaderMap,
    Path(vendor_id): Path<VendorId>,
    Query(query): Query<VendorDecisionQuery>,
) -> Result<Json<Vendor>, AppError> {
    let reviewer = office.current_user(&headers)?;
    require_role(&reviewer, &[UserRole::Admin, UserRole::Approver])?;
    Ok(Json(office.vendors.decide(vendor_id, query.approve)?))
}

async fn submit_vendor_update<B: Backend>(
    State(office): Office<B>,
    headers: HeaderMap,
    Path(vendor_id): Path<VendorId>,
    Json(payload): Json<VendorUpdateRequest>,
) -> Result<Json<Vendor>, AppError> {
    let user = office.current_user(&headers)?;
    Ok(Json(
        office
            .vendors
            .submit_update(vendor_id, user.id, &payload.notes)?,
    ))
}

async fn create_budget<B: Backend>(
    State(office): Office<B>,
    headers: HeaderMap,
    Json(draft): Json<BudgetDraft>,
) -> Result<(StatusCode, Json<Budget>), AppError> {
    let user = office.current_user(&headers)?;
    let budget = office.budgets.create(user.id, draft)?;
    Ok((StatusCode::CREATED, Json(budget)))
}

async fn list_budgets<B: Backend>(
    State(office): Office<B>,
    headers: HeaderMap,
    Query(query): Query<BudgetListQuery>,
) -> Result<Json<Vec<Budget>>, AppError> {
    let user = office.current_user(&headers)?;
    Ok(Json(office.budgets.list(user.id, query.status)?))
}

async fn get_budget<B: Backend>(
    State(office): Office<B>,
    headers: HeaderMap,
    Path(budget_id): Path<BudgetId>,
) -> Result<Json<Budget>, AppError> {
    let user = office.current_user(&headers)?;
    let budget = office.budgets.get(budget_id)?;
    if user.role != UserRole::Admin && budget.owner != user.id {
        return Err(WorkflowError::Forbidden("Unauthorized".to_string()).into());
    }
    Ok(Json(budget))
}

async fn submit_budget<B: Backend>(
    State(office): Office<B>,
    headers: HeaderMap,
    Path(budget_id): Path<BudgetId>,
) -> Result<Json<Budget>, AppError> {
    let user = office.current_user(&headers)?;
    let budget = office.budgets.get(budget_id)?;
    if budget.owner != user.id {
        return Err(WorkflowError::Forbidden("Only owner can submit budget".to_string()).into());
    }
    Ok(Json(office.budgets.submit(budget_id, user.id)?))
}

async fn upload_document<B: Backend>(
    State(office): Office<B>,
    headers: HeaderMap,
    Path(budget_id): Path<BudgetId>,
    Query(query): Query<DocumentUploadQuery>,
    body: Bytes,
) -> Result<Json<DocumentUploaded>, AppError> {
    let user = office.current_user(&headers)?;
    let budget = office.budgets.get(budget_id)?;
    let reviewer = matches!(
        user.role,
        UserRole::Admin | UserRole::Approver | UserRole::Accounts
    );
    if budget.owner != user.id && !reviewer {
        return Err(WorkflowError::Forbidden("Unauthorized".to_string()).into());
    }
    let document =
        office
            .budgets
            .attach_document(budget_id, &query.filename, &body, &query.document_type)?;
    Ok(Json(DocumentUploaded {
        detail: "Document uploaded",
        document,
    }))
}

async fn import_element_sheet<B: Backend>(
    State(office): Office<B>,
    headers: HeaderMap,
    Query(query): Query<SheetUploadQuery>,
    body: Bytes,
) -> Result<Json<Vec<ImportedItem>>, AppError> {
    let user = office.current_user(&headers)?;
    Ok(Json(
        office.budgets.import_sheet(user.id, &query.filename, &body)?,
    ))
}

async fn act_on_approval<B: Backend>(
    State(office): Office<B>,
    headers: HeaderMap,
    Json(decision): Json<ApprovalDecision>,
) -> Result<Json<Budget>, AppError> {
    let reviewer = office.current_user(&headers)?;
    require_role(
        &reviewer,
        &[UserRole::Approver, UserRole::Accounts, UserRole::Admin],
    )?;
    Ok(Json(office.budgets.decide(reviewer.id, decision)?))
}

async fn dashboard_metrics<B: Backend>(
    State(office): Office<B>,
    headers: HeaderMap,
) -> Result<Json<DashboardMetrics>, AppError> {
    office.current_user(&headers)?;
    Ok(Json(office.budgets.dashboard()?))
}
