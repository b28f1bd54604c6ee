pub mod domain;
pub mod service;

pub use domain::{RateCardSubmission, Vendor, VendorFilter, VendorRate, VendorStatus, VendorSubmission};
pub use service::VendorService;
