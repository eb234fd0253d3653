use std::sync::Arc;

use chrono::Utc;

use clubhouse_auth::{CurrentUser, Requirement};
use clubhouse_budgets::{Budget, BudgetAnalytics, BudgetPatch, Money, NewBudget};
use clubhouse_core::{BudgetId, OrganizationId};

use super::load_budget;
use crate::error::ServiceResult;
use crate::registry::MembershipRegistry;
use crate::store::{Store, Transaction};

/// Organization budgets. Mutations need LEADER or COLEADER.
pub struct BudgetService<S> {
    store: Arc<S>,
}

impl<S: Store> BudgetService<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    #[tracing::instrument(skip(self, input), fields(user = %user.id(), org = %org_id))]
    pub fn create_budget(&self, user: &CurrentUser, org_id: OrganizationId, input: NewBudget) -> ServiceResult<Budget> {
        let mut tx = self.store.begin()?;
        MembershipRegistry::new(&tx).require_org(user.id(), org_id, Requirement::Admin)?;

        let budget = Budget::create(BudgetId::new(), org_id, input, Utc::now())?;
        tx.save_budget(budget.clone())?;
        tx.commit()?;

        tracing::info!(budget = %budget.id, total = %budget.total_amount(), "budget created");
        Ok(budget)
    }

    pub fn get_budget(&self, user: &CurrentUser, budget_id: BudgetId) -> ServiceResult<Budget> {
        let tx = self.store.begin()?;
        let budget = load_budget(&tx, budget_id)?;
        MembershipRegistry::new(&tx).require_org(user.id(), budget.org_id, Requirement::Member)?;
        Ok(budget)
    }

    pub fn list_budgets(&self, user: &CurrentUser, org_id: OrganizationId) -> ServiceResult<Vec<Budget>> {
        let tx = self.store.begin()?;
        MembershipRegistry::new(&tx).require_org(user.id(), org_id, Requirement::Member)?;
        Ok(tx.budgets_of(org_id)?)
    }

    #[tracing::instrument(skip(self, patch), fields(user = %user.id(), budget = %budget_id))]
    pub fn update_budget(&self, user: &CurrentUser, budget_id: BudgetId, patch: BudgetPatch) -> ServiceResult<Budget> {
        self.mutate(user, budget_id, |budget| budget.update(patch, Utc::now()))
    }

    #[tracing::instrument(skip(self), fields(user = %user.id(), budget = %budget_id))]
    pub fn delete_budget(&self, user: &CurrentUser, budget_id: BudgetId) -> ServiceResult<()> {
        let mut tx = self.store.begin()?;
        let budget = load_budget(&tx, budget_id)?;
        MembershipRegistry::new(&tx).require_org(user.id(), budget.org_id, Requirement::Admin)?;
        tx.delete_budget(budget_id)?;
        tx.commit()?;

        tracing::info!("budget deleted");
        Ok(())
    }

    #[tracing::instrument(skip(self), fields(user = %user.id(), budget = %budget_id, amount = %amount))]
    pub fn add_expense(&self, user: &CurrentUser, budget_id: BudgetId, amount: Money) -> ServiceResult<Budget> {
        self.mutate(user, budget_id, |budget| {
            budget.add_expense(amount, Utc::now()).map(|_| ())
        })
    }

    #[tracing::instrument(skip(self), fields(user = %user.id(), budget = %budget_id, amount = %amount))]
    pub fn remove_expense(&self, user: &CurrentUser, budget_id: BudgetId, amount: Money) -> ServiceResult<Budget> {
        self.mutate(user, budget_id, |budget| {
            budget.remove_expense(amount, Utc::now()).map(|_| ())
        })
    }

    pub fn budget_analytics(&self, user: &CurrentUser, org_id: OrganizationId) -> ServiceResult<BudgetAnalytics> {
        Ok(BudgetAnalytics::from_budgets(self.list_budgets(user, org_id)?)?)
    }

    /// Load, admin-guard, change, save. A rejected change leaves the stored
    /// budget untouched.
    fn mutate(
        &self,
        user: &CurrentUser,
        budget_id: BudgetId,
        change: impl FnOnce(&mut Budget) -> clubhouse_core::DomainResult<()>,
    ) -> ServiceResult<Budget> {
        let mut tx = self.store.begin()?;
        let mut budget = load_budget(&tx, budget_id)?;
        MembershipRegistry::new(&tx).require_org(user.id(), budget.org_id, Requirement::Admin)?;

        change(&mut budget).inspect_err(|e| tracing::warn!(reason = %e, "budget change rejected"))?;
        tx.save_budget(budget.clone())?;
        tx.commit()?;

        tracing::info!(spent = %budget.spent_amount(), total = %budget.total_amount(), "budget updated");
        Ok(budget)
    }
}
