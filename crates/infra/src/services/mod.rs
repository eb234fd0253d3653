//! Application services: one method per core operation.
//!
//! Every operation runs inside a single unit of work:
//!
//! ```text
//! begin → load → guard (registry / aggregate) → decide → save → commit
//! ```
//!
//! Any error returns before `commit` and drops the transaction, so callers
//! never observe partial writes. Read-only operations open a transaction too
//! and simply never commit it.

use std::sync::Arc;

use rand::RngCore;

use clubhouse_auth::User;
use clubhouse_budgets::Budget;
use clubhouse_core::{BudgetId, DomainError, EventId, OrganizationId, TaskId, TeamId, UserId};
use clubhouse_events::Event;
use clubhouse_organizations::Organization;
use clubhouse_tasks::Task;
use clubhouse_teams::Team;

use crate::config::AppConfig;
use crate::error::ServiceResult;
use crate::store::{InMemoryStore, Store, Transaction};

pub mod budgets;
pub mod events;
pub mod organizations;
pub mod tasks;
pub mod teams;
pub mod users;

pub use budgets::BudgetService;
pub use events::EventService;
pub use organizations::{
    MemberView, MyOrganization, OrganizationOverview, OrganizationService, OrganizationStatistics,
    OrganizationView,
};
pub use tasks::TaskService;
pub use teams::{TeamMemberView, TeamService};
pub use users::{UserDirectory, UserService};

/// All services over one shared store.
pub struct Clubhouse<S> {
    pub users: UserService<S>,
    pub organizations: OrganizationService<S>,
    pub teams: TeamService<S>,
    pub tasks: TaskService<S>,
    pub events: EventService<S>,
    pub budgets: BudgetService<S>,
}

impl<S: Store> Clubhouse<S> {
    pub fn new(store: Arc<S>, config: AppConfig) -> Self {
        Self::with_organizations(OrganizationService::new(store.clone(), config), store)
    }

    /// Use `rng` for join-code generation (deterministic in tests).
    pub fn with_rng(store: Arc<S>, config: AppConfig, rng: impl RngCore + Send + 'static) -> Self {
        Self::with_organizations(OrganizationService::with_rng(store.clone(), config, rng), store)
    }

    fn with_organizations(organizations: OrganizationService<S>, store: Arc<S>) -> Self {
        Self {
            users: UserService::new(store.clone()),
            organizations,
            teams: TeamService::new(store.clone()),
            tasks: TaskService::new(store.clone()),
            events: EventService::new(store.clone()),
            budgets: BudgetService::new(store),
        }
    }
}

impl Clubhouse<InMemoryStore> {
    pub fn in_memory(config: AppConfig) -> Self {
        Self::new(Arc::new(InMemoryStore::new()), config)
    }
}

// ── loaders: missing rows become NotFound ───────────────────────────────────

pub(crate) fn load_user<T: Transaction + ?Sized>(tx: &T, id: UserId) -> ServiceResult<User> {
    Ok(tx.user(id)?.ok_or_else(|| DomainError::not_found("user"))?)
}

pub(crate) fn load_org<T: Transaction + ?Sized>(tx: &T, id: OrganizationId) -> ServiceResult<Organization> {
    Ok(tx
        .organization(id)?
        .ok_or_else(|| DomainError::not_found("organization"))?)
}

pub(crate) fn load_team<T: Transaction + ?Sized>(tx: &T, id: TeamId) -> ServiceResult<Team> {
    Ok(tx.team(id)?.ok_or_else(|| DomainError::not_found("team"))?)
}

pub(crate) fn load_task<T: Transaction + ?Sized>(tx: &T, id: TaskId) -> ServiceResult<Task> {
    Ok(tx.task(id)?.ok_or_else(|| DomainError::not_found("task"))?)
}

pub(crate) fn load_event<T: Transaction + ?Sized>(tx: &T, id: EventId) -> ServiceResult<Event> {
    Ok(tx.event(id)?.ok_or_else(|| DomainError::not_found("event"))?)
}

pub(crate) fn load_budget<T: Transaction + ?Sized>(tx: &T, id: BudgetId) -> ServiceResult<Budget> {
    Ok(tx.budget(id)?.ok_or_else(|| DomainError::not_found("budget"))?)
}
