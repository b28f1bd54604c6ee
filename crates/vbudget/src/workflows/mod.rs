pub mod budgets;
pub mod element_sheet;
mod error;
pub mod history;
pub mod onboarding;
pub mod otp;
pub mod vendors;

#[cfg(test)]
mod tests;

pub use error::WorkflowError;
