use thiserror::Error;

use clubhouse_auth::User;
use clubhouse_budgets::Budget;
use clubhouse_core::{
    BudgetId, EventId, ExpectedVersion, OrganizationId, TaskId, TeamId, UserId,
};
use clubhouse_events::Event;
use clubhouse_organizations::{JoinCode, Organization};
use clubhouse_tasks::Task;
use clubhouse_teams::Team;

/// Store operation error.
///
/// These are **infrastructure errors** (constraints, stale writes, backend
/// faults) as opposed to domain errors (validation, authorization).
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// A unique constraint would be violated (email, join code, team name).
    #[error("unique constraint violated: {0}")]
    Unique(String),

    /// The stored row moved on since it was loaded.
    #[error("stale write: {0}")]
    Stale(String),

    /// A row referenced by the write does not exist.
    #[error("{0} not found")]
    MissingRow(String),

    /// The backend is unusable (e.g. a poisoned lock).
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Entry point of the persistence boundary: hands out units of work.
pub trait Store: Send + Sync {
    type Tx<'a>: Transaction
    where
        Self: 'a;

    /// Open a unit of work.
    ///
    /// Writes made through the transaction become visible to others only on
    /// [`Transaction::commit`]; dropping it discards them.
    fn begin(&self) -> StoreResult<Self::Tx<'_>>;
}

/// One request-scoped unit of work over the relational contract.
///
/// Implementations enforce:
/// - unique user email, unique organization join code, unique team name per
///   organization;
/// - composite membership keys (kept inside the organization/team records);
/// - cascade deletes: organization → teams, events, tasks, budgets;
///   team → tasks; event → tasks;
/// - version checks on aggregate saves.
pub trait Transaction {
    // ── users ───────────────────────────────────────────────────────────────
    fn insert_user(&mut self, user: User) -> StoreResult<()>;
    fn user(&self, id: UserId) -> StoreResult<Option<User>>;
    fn user_by_email(&self, email: &str) -> StoreResult<Option<User>>;

    // ── organizations ───────────────────────────────────────────────────────
    /// Insert or update; `expected` is the version the caller loaded.
    fn save_organization(&mut self, org: &Organization, expected: ExpectedVersion) -> StoreResult<()>;
    fn organization(&self, id: OrganizationId) -> StoreResult<Option<Organization>>;
    fn organization_by_code(&self, code: &JoinCode) -> StoreResult<Option<Organization>>;
    fn organizations(&self) -> StoreResult<Vec<Organization>>;
    fn delete_organization(&mut self, id: OrganizationId) -> StoreResult<()>;

    // ── teams ───────────────────────────────────────────────────────────────
    fn save_team(&mut self, team: &Team, expected: ExpectedVersion) -> StoreResult<()>;
    fn team(&self, id: TeamId) -> StoreResult<Option<Team>>;
    fn teams_of(&self, org_id: OrganizationId) -> StoreResult<Vec<Team>>;
    fn delete_team(&mut self, id: TeamId) -> StoreResult<()>;

    // ── tasks ───────────────────────────────────────────────────────────────
    fn save_task(&mut self, task: Task) -> StoreResult<()>;
    fn task(&self, id: TaskId) -> StoreResult<Option<Task>>;
    fn tasks_of(&self, org_id: OrganizationId) -> StoreResult<Vec<Task>>;
    fn all_tasks(&self) -> StoreResult<Vec<Task>>;
    fn delete_task(&mut self, id: TaskId) -> StoreResult<()>;

    // ── events ──────────────────────────────────────────────────────────────
    fn save_event(&mut self, event: Event) -> StoreResult<()>;
    fn event(&self, id: EventId) -> StoreResult<Option<Event>>;
    fn events_of(&self, org_id: OrganizationId) -> StoreResult<Vec<Event>>;
    fn all_events(&self) -> StoreResult<Vec<Event>>;
    fn delete_event(&mut self, id: EventId) -> StoreResult<()>;

    // ── budgets ─────────────────────────────────────────────────────────────
    fn save_budget(&mut self, budget: Budget) -> StoreResult<()>;
    fn budget(&self, id: BudgetId) -> StoreResult<Option<Budget>>;
    fn budgets_of(&self, org_id: OrganizationId) -> StoreResult<Vec<Budget>>;
    fn delete_budget(&mut self, id: BudgetId) -> StoreResult<()>;

    /// Make every write of this unit of work visible atomically.
    fn commit(self) -> StoreResult<()>
    where
        Self: Sized;
}
