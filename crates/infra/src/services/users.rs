use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;

use clubhouse_auth::{Claims, CurrentUser, RegisterUser, User};
use clubhouse_core::{DomainError, UserId};
use clubhouse_events::Event;
use clubhouse_organizations::Organization;
use clubhouse_tasks::Task;
use clubhouse_teams::Team;

use super::load_user;
use super::organizations::{MyOrganization, my_organizations};
use crate::error::ServiceResult;
use crate::store::{Store, Transaction};

/// Everything a user owns, leads, belongs to, or created.
#[derive(Debug, Clone, Serialize)]
pub struct UserDirectory {
    pub user: User,
    pub owned_organizations: Vec<Organization>,
    pub member_organizations: Vec<MyOrganization>,
    pub led_teams: Vec<Team>,
    pub member_teams: Vec<Team>,
    pub created_events: Vec<Event>,
    pub created_tasks: Vec<Task>,
    pub assigned_tasks: Vec<Task>,
}

/// Registration, token resolution, and the per-user directory.
pub struct UserService<S> {
    store: Arc<S>,
}

impl<S: Store> UserService<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    /// Register a new user; the email must not be taken.
    #[tracing::instrument(skip(self, cmd), fields(email = %cmd.email.trim()))]
    pub fn register_user(&self, cmd: RegisterUser) -> ServiceResult<User> {
        let user = User::register(UserId::new(), cmd, Utc::now())?;

        let mut tx = self.store.begin()?;
        if tx.user_by_email(&user.email)?.is_some() {
            tracing::warn!("email already registered");
            return Err(DomainError::conflict("email is already registered").into());
        }
        tx.insert_user(user.clone())?;
        tx.commit()?;

        tracing::info!(user = %user.id, "user registered");
        Ok(user)
    }

    /// Resolve verified token claims to the calling user.
    ///
    /// Rejects expired or malformed windows and unknown subjects before any
    /// core operation can run.
    #[tracing::instrument(skip(self, claims), fields(sub = %claims.sub))]
    pub fn authenticate(&self, claims: &Claims, now: DateTime<Utc>) -> ServiceResult<CurrentUser> {
        let tx = self.store.begin()?;
        let user = tx.user(claims.sub)?;
        CurrentUser::from_claims(claims, user.as_ref(), now).map_err(|e| {
            tracing::warn!(reason = %e, "token rejected");
            e.into()
        })
    }

    pub fn profile(&self, user: &CurrentUser) -> ServiceResult<User> {
        let tx = self.store.begin()?;
        load_user(&tx, user.id())
    }

    #[tracing::instrument(skip(self), fields(user = %user.id()))]
    pub fn directory(&self, user: &CurrentUser) -> ServiceResult<UserDirectory> {
        let tx = self.store.begin()?;
        let me = user.id();
        let profile = load_user(&tx, me)?;

        let organizations = tx.organizations()?;
        let owned_organizations = organizations
            .iter()
            .filter(|o| o.is_owner(me))
            .cloned()
            .collect();

        let mut led_teams = Vec::new();
        let mut member_teams = Vec::new();
        for org in organizations.iter().filter(|o| o.role_of(me).is_some()) {
            for team in tx.teams_of(org.id_typed())? {
                if team.is_leader(me) {
                    led_teams.push(team.clone());
                }
                if team.role_of(me).is_some() {
                    member_teams.push(team);
                }
            }
        }

        let created_events = tx
            .all_events()?
            .into_iter()
            .filter(|e| e.is_creator(me))
            .collect();

        let tasks = tx.all_tasks()?;
        let created_tasks = tasks.iter().filter(|t| t.is_creator(me)).cloned().collect();
        let assigned_tasks = tasks.into_iter().filter(|t| t.is_assigned(me)).collect();

        Ok(UserDirectory {
            user: profile,
            owned_organizations,
            member_organizations: my_organizations(&organizations, me),
            led_teams,
            member_teams,
            created_events,
            created_tasks,
            assigned_tasks,
        })
    }
}
