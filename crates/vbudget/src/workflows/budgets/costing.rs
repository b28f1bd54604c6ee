//! Line-item cost engine.

use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct LineTotals {
    pub subtotal: f64,
    pub total: f64,
}

/// `subtotal = rate * quantity * max(days, 1)`, `total = subtotal * (1 + gst / 100)`.
pub fn compute_totals(rate: f64, quantity: f64, days: f64, gst_percent: f64) -> LineTotals {
    let subtotal = rate * quantity * days.max(1.0);
    let total = subtotal * (1.0 + gst_percent / 100.0);
    LineTotals { subtotal, total }
}
