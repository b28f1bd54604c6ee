pub mod domain;
pub mod service;

pub use domain::{Registration, User, UserRole, UserStatus};
pub use service::OnboardingService;
