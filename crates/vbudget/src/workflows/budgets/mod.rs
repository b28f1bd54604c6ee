pub mod costing;
pub mod domain;
pub mod service;

pub use costing::{compute_totals, LineTotals};
pub use domain::{
    Approval, ApprovalDecision, ApprovalStage, ApprovalStatus, Budget, BudgetDocument,
    BudgetDraft, BudgetItem, BudgetStatus, DashboardMetrics, LineItem,
};
pub use service::BudgetService;
