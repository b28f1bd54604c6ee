mod budgets;
mod common;
