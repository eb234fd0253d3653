//! Organization budgets and expense tracking.
//!
//! Amounts are integer minor currency units; see [`Money`].

pub mod budget;
pub mod money;

pub use budget::{Budget, BudgetAnalytics, BudgetPatch, NewBudget};
pub use money::Money;
