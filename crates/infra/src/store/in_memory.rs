use std::collections::BTreeMap;
use std::sync::{RwLock, RwLockWriteGuard};

use clubhouse_auth::User;
use clubhouse_budgets::Budget;
use clubhouse_core::{
    AggregateRoot, BudgetId, EventId, ExpectedVersion, OrganizationId, TaskId, TeamId, UserId,
};
use clubhouse_events::Event;
use clubhouse_organizations::{JoinCode, Organization};
use clubhouse_tasks::Task;
use clubhouse_teams::Team;

use super::r#trait::{Store, StoreError, StoreResult, Transaction};

#[derive(Debug, Clone, Default)]
struct Tables {
    users: BTreeMap<UserId, User>,
    organizations: BTreeMap<OrganizationId, Organization>,
    teams: BTreeMap<TeamId, Team>,
    tasks: BTreeMap<TaskId, Task>,
    events: BTreeMap<EventId, Event>,
    budgets: BTreeMap<BudgetId, Budget>,
}

/// In-memory relational store.
///
/// Intended for tests/dev. Transactions are serialized: each one holds the
/// write lock for its lifetime and works on a private copy of the tables,
/// which replaces the shared tables on commit.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    tables: RwLock<Tables>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Store for InMemoryStore {
    type Tx<'a> = InMemoryTransaction<'a>;

    fn begin(&self) -> StoreResult<Self::Tx<'_>> {
        let guard = self
            .tables
            .write()
            .map_err(|_| StoreError::Unavailable("lock poisoned".to_string()))?;
        let work = guard.clone();
        Ok(InMemoryTransaction { guard, work })
    }
}

/// Unit of work over [`InMemoryStore`]; dropped without commit = rolled back.
#[derive(Debug)]
pub struct InMemoryTransaction<'a> {
    guard: RwLockWriteGuard<'a, Tables>,
    work: Tables,
}

impl InMemoryTransaction<'_> {
    fn ensure_org(&self, id: OrganizationId) -> StoreResult<()> {
        if !self.work.organizations.contains_key(&id) {
            return Err(StoreError::MissingRow(format!("organization {id}")));
        }
        Ok(())
    }
}

fn check_version(kind: &str, stored: Option<u64>, expected: ExpectedVersion) -> StoreResult<()> {
    let actual = stored.unwrap_or(0);
    if !expected.matches(actual) {
        return Err(StoreError::Stale(format!(
            "{kind} expected {expected:?}, found {actual}"
        )));
    }
    Ok(())
}

impl Transaction for InMemoryTransaction<'_> {
    fn insert_user(&mut self, user: User) -> StoreResult<()> {
        if self.work.users.contains_key(&user.id) {
            return Err(StoreError::Unique(format!("user id {}", user.id)));
        }
        if self.work.users.values().any(|u| u.email == user.email) {
            return Err(StoreError::Unique(format!("user email {}", user.email)));
        }
        self.work.users.insert(user.id, user);
        Ok(())
    }

    fn user(&self, id: UserId) -> StoreResult<Option<User>> {
        Ok(self.work.users.get(&id).cloned())
    }

    fn user_by_email(&self, email: &str) -> StoreResult<Option<User>> {
        let email = email.trim().to_lowercase();
        Ok(self.work.users.values().find(|u| u.email == email).cloned())
    }

    fn save_organization(&mut self, org: &Organization, expected: ExpectedVersion) -> StoreResult<()> {
        let id = org.id_typed();
        let stored = self.work.organizations.get(&id).map(AggregateRoot::version);
        check_version("organization", stored, expected)?;

        if let Some(code) = org.code() {
            let taken = self
                .work
                .organizations
                .values()
                .any(|o| o.id_typed() != id && o.code() == Some(code));
            if taken {
                return Err(StoreError::Unique(format!("organization code {code}")));
            }
        }

        self.work.organizations.insert(id, org.clone());
        Ok(())
    }

    fn organization(&self, id: OrganizationId) -> StoreResult<Option<Organization>> {
        Ok(self.work.organizations.get(&id).cloned())
    }

    fn organization_by_code(&self, code: &JoinCode) -> StoreResult<Option<Organization>> {
        Ok(self
            .work
            .organizations
            .values()
            .find(|o| o.code() == Some(code))
            .cloned())
    }

    fn organizations(&self) -> StoreResult<Vec<Organization>> {
        Ok(self.work.organizations.values().cloned().collect())
    }

    fn delete_organization(&mut self, id: OrganizationId) -> StoreResult<()> {
        if self.work.organizations.remove(&id).is_none() {
            return Err(StoreError::MissingRow(format!("organization {id}")));
        }
        self.work.teams.retain(|_, t| t.org_id().ok() != Some(id));
        self.work.tasks.retain(|_, t| t.org_id != id);
        self.work.events.retain(|_, e| e.org_id != id);
        self.work.budgets.retain(|_, b| b.org_id != id);
        Ok(())
    }

    fn save_team(&mut self, team: &Team, expected: ExpectedVersion) -> StoreResult<()> {
        let id = team.id_typed();
        let org_id = team
            .org_id()
            .map_err(|_| StoreError::MissingRow(format!("team {id} has no organization")))?;
        self.ensure_org(org_id)?;

        let stored = self.work.teams.get(&id).map(AggregateRoot::version);
        check_version("team", stored, expected)?;

        let name_taken = self.work.teams.values().any(|t| {
            t.id_typed() != id
                && t.org_id().ok() == Some(org_id)
                && t.name().eq_ignore_ascii_case(team.name())
        });
        if name_taken {
            return Err(StoreError::Unique(format!(
                "team name '{}' in organization {org_id}",
                team.name()
            )));
        }

        self.work.teams.insert(id, team.clone());
        Ok(())
    }

    fn team(&self, id: TeamId) -> StoreResult<Option<Team>> {
        Ok(self.work.teams.get(&id).cloned())
    }

    fn teams_of(&self, org_id: OrganizationId) -> StoreResult<Vec<Team>> {
        Ok(self
            .work
            .teams
            .values()
            .filter(|t| t.org_id().ok() == Some(org_id))
            .cloned()
            .collect())
    }

    fn delete_team(&mut self, id: TeamId) -> StoreResult<()> {
        if self.work.teams.remove(&id).is_none() {
            return Err(StoreError::MissingRow(format!("team {id}")));
        }
        self.work.tasks.retain(|_, t| t.team_id != Some(id));
        Ok(())
    }

    fn save_task(&mut self, task: Task) -> StoreResult<()> {
        self.ensure_org(task.org_id)?;
        if let Some(team_id) = task.team_id {
            if !self.work.teams.contains_key(&team_id) {
                return Err(StoreError::MissingRow(format!("team {team_id}")));
            }
        }
        if let Some(event_id) = task.event_id {
            if !self.work.events.contains_key(&event_id) {
                return Err(StoreError::MissingRow(format!("event {event_id}")));
            }
        }
        self.work.tasks.insert(task.id, task);
        Ok(())
    }

    fn task(&self, id: TaskId) -> StoreResult<Option<Task>> {
        Ok(self.work.tasks.get(&id).cloned())
    }

    fn tasks_of(&self, org_id: OrganizationId) -> StoreResult<Vec<Task>> {
        Ok(self
            .work
            .tasks
            .values()
            .filter(|t| t.org_id == org_id)
            .cloned()
            .collect())
    }

    fn all_tasks(&self) -> StoreResult<Vec<Task>> {
        Ok(self.work.tasks.values().cloned().collect())
    }

    fn delete_task(&mut self, id: TaskId) -> StoreResult<()> {
        self.work
            .tasks
            .remove(&id)
            .map(|_| ())
            .ok_or_else(|| StoreError::MissingRow(format!("task {id}")))
    }

    fn save_event(&mut self, event: Event) -> StoreResult<()> {
        self.ensure_org(event.org_id)?;
        self.work.events.insert(event.id, event);
        Ok(())
    }

    fn event(&self, id: EventId) -> StoreResult<Option<Event>> {
        Ok(self.work.events.get(&id).cloned())
    }

    fn events_of(&self, org_id: OrganizationId) -> StoreResult<Vec<Event>> {
        Ok(self
            .work
            .events
            .values()
            .filter(|e| e.org_id == org_id)
            .cloned()
            .collect())
    }

    fn all_events(&self) -> StoreResult<Vec<Event>> {
        Ok(self.work.events.values().cloned().collect())
    }

    fn delete_event(&mut self, id: EventId) -> StoreResult<()> {
        if self.work.events.remove(&id).is_none() {
            return Err(StoreError::MissingRow(format!("event {id}")));
        }
        self.work.tasks.retain(|_, t| t.event_id != Some(id));
        Ok(())
    }

    fn save_budget(&mut self, budget: Budget) -> StoreResult<()> {
        self.ensure_org(budget.org_id)?;
        self.work.budgets.insert(budget.id, budget);
        Ok(())
    }

    fn budget(&self, id: BudgetId) -> StoreResult<Option<Budget>> {
        Ok(self.work.budgets.get(&id).cloned())
    }

    fn budgets_of(&self, org_id: OrganizationId) -> StoreResult<Vec<Budget>> {
        Ok(self
            .work
            .budgets
            .values()
            .filter(|b| b.org_id == org_id)
            .cloned()
            .collect())
    }

    fn delete_budget(&mut self, id: BudgetId) -> StoreResult<()> {
        self.work
            .budgets
            .remove(&id)
            .map(|_| ())
            .ok_or_else(|| StoreError::MissingRow(format!("budget {id}")))
    }

    fn commit(self) -> StoreResult<()> {
        let Self { mut guard, work } = self;
        *guard = work;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    use clubhouse_auth::RegisterUser;
    use clubhouse_core::Aggregate;
    use clubhouse_organizations::{CreateOrganization, NewOrganization, OrganizationCommand};

    use super::*;

    fn user(email: &str) -> User {
        User::register(
            UserId::new(),
            RegisterUser {
                first_name: "Ada".to_string(),
                last_name: "Lovelace".to_string(),
                email: email.to_string(),
                credential_hash: "hash".to_string(),
                college: None,
            },
            Utc::now(),
        )
        .unwrap()
    }

    fn org(owner: UserId, code: &str) -> Organization {
        let id = OrganizationId::new();
        let mut org = Organization::empty(id);
        org.execute(&OrganizationCommand::Create(CreateOrganization {
            org_id: id,
            owner_id: owner,
            code: JoinCode::parse(code).unwrap(),
            input: NewOrganization {
                name: "Robotics".to_string(),
                college: "State".to_string(),
                description: None,
                contact_email: "r@example.edu".to_string(),
                contact_phone: "555".to_string(),
                website: None,
            },
            occurred_at: Utc::now(),
        }))
        .unwrap();
        org
    }

    #[test]
    fn dropped_transaction_rolls_back() {
        let store = InMemoryStore::new();
        let u = user("ada@example.com");
        {
            let mut tx = store.begin().unwrap();
            tx.insert_user(u.clone()).unwrap();
        }
        let tx = store.begin().unwrap();
        assert_eq!(tx.user(u.id).unwrap(), None);
    }

    #[test]
    fn committed_writes_are_visible() {
        let store = InMemoryStore::new();
        let u = user("ada@example.com");
        let mut tx = store.begin().unwrap();
        tx.insert_user(u.clone()).unwrap();
        tx.commit().unwrap();

        let tx = store.begin().unwrap();
        assert_eq!(tx.user_by_email(" ADA@example.com ").unwrap(), Some(u));
    }

    #[test]
    fn duplicate_email_is_unique_violation() {
        let store = InMemoryStore::new();
        let mut tx = store.begin().unwrap();
        tx.insert_user(user("ada@example.com")).unwrap();
        let err = tx.insert_user(user("ada@example.com")).unwrap_err();
        assert!(matches!(err, StoreError::Unique(_)));
    }

    #[test]
    fn duplicate_code_is_unique_violation() {
        let store = InMemoryStore::new();
        let mut tx = store.begin().unwrap();
        tx.save_organization(&org(UserId::new(), "ROB123"), ExpectedVersion::Exact(0))
            .unwrap();
        let err = tx
            .save_organization(&org(UserId::new(), "rob123"), ExpectedVersion::Exact(0))
            .unwrap_err();
        assert!(matches!(err, StoreError::Unique(_)));
    }

    #[test]
    fn stale_version_is_rejected() {
        let store = InMemoryStore::new();
        let mut tx = store.begin().unwrap();
        let o = org(UserId::new(), "ROB999");
        tx.save_organization(&o, ExpectedVersion::Exact(0)).unwrap();
        let err = tx.save_organization(&o, ExpectedVersion::Exact(0)).unwrap_err();
        assert!(matches!(err, StoreError::Stale(_)));
        tx.save_organization(&o, ExpectedVersion::Exact(o.version())).unwrap();
    }

    #[test]
    fn deleting_organization_cascades() {
        let store = InMemoryStore::new();
        let mut tx = store.begin().unwrap();
        let code = JoinCode::generate("Robotics", 6, &mut StdRng::seed_from_u64(3)).unwrap();
        let o = org(UserId::new(), code.as_str());
        tx.save_organization(&o, ExpectedVersion::Any).unwrap();
        let budget = Budget::create(
            BudgetId::new(),
            o.id_typed(),
            clubhouse_budgets::NewBudget {
                name: "Season".to_string(),
                description: None,
                total_amount: clubhouse_budgets::Money::from_cents(100),
                spent_amount: clubhouse_budgets::Money::ZERO,
            },
            Utc::now(),
        )
        .unwrap();
        tx.save_budget(budget.clone()).unwrap();

        tx.delete_organization(o.id_typed()).unwrap();
        assert_eq!(tx.budget(budget.id).unwrap(), None);
        assert!(tx.organizations().unwrap().is_empty());
    }
}
