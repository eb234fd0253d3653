use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use rand::rngs::StdRng;
use rand::{RngCore, SeedableRng};
use serde::Serialize;

use clubhouse_auth::{CurrentUser, Requirement, Role};
use clubhouse_budgets::Budget;
use clubhouse_core::{
    Aggregate, AggregateRoot, DomainError, DomainEvent, ExpectedVersion, OrganizationId, UserId,
};
use clubhouse_events::{Event, EventStatus};
use clubhouse_organizations::{
    ChangeMemberRole, CreateOrganization, JoinCode, JoinOrganization, LeaveOrganization,
    NewOrganization, Organization, OrganizationCommand, OrganizationPatch, RemoveMember,
    TransferOwnership, UpdateOrganization,
};
use clubhouse_tasks::{Task, TaskStatus};
use clubhouse_teams::Team;

use super::load_org;
use crate::config::AppConfig;
use crate::error::{ServiceError, ServiceResult};
use crate::registry::MembershipRegistry;
use crate::store::{Store, StoreError, Transaction};

// ─────────────────────────────────────────────────────────────────────────────
// Views
// ─────────────────────────────────────────────────────────────────────────────

/// An organization as seen by a particular caller.
#[derive(Debug, Clone, Serialize)]
pub struct OrganizationView {
    pub organization: Organization,
    pub role: Option<Role>,
    pub is_member: bool,
    pub is_owner: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MemberView {
    pub user_id: UserId,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub role: Role,
    pub joined_at: DateTime<Utc>,
    pub is_owner: bool,
}

/// One entry of "my organizations".
#[derive(Debug, Clone, Serialize)]
pub struct MyOrganization {
    pub organization: Organization,
    pub role: Role,
    pub is_owner: bool,
    pub joined_at: DateTime<Utc>,
}

/// An organization with everything hanging off it.
#[derive(Debug, Clone, Serialize)]
pub struct OrganizationOverview {
    pub organization: Organization,
    pub role: Role,
    pub is_owner: bool,
    pub members: Vec<MemberView>,
    pub teams: Vec<Team>,
    pub events: Vec<Event>,
    pub tasks: Vec<Task>,
    pub budgets: Vec<Budget>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OrganizationStatistics {
    pub total_members: usize,
    pub total_events: usize,
    pub total_teams: usize,
    pub total_tasks: usize,
    pub members_by_role: BTreeMap<String, usize>,
    pub events_by_status: BTreeMap<String, usize>,
    pub tasks_by_status: BTreeMap<String, usize>,
    pub age_days: i64,
}

pub(crate) fn my_organizations(organizations: &[Organization], user: UserId) -> Vec<MyOrganization> {
    organizations
        .iter()
        .filter_map(|org| {
            let membership = org.membership(user)?;
            Some(MyOrganization {
                organization: org.clone(),
                role: membership.role,
                is_owner: org.is_owner(user),
                joined_at: membership.joined_at,
            })
        })
        .collect()
}

// ─────────────────────────────────────────────────────────────────────────────
// Service
// ─────────────────────────────────────────────────────────────────────────────

/// Organization lifecycle, membership, and ownership.
pub struct OrganizationService<S> {
    store: Arc<S>,
    config: AppConfig,
    rng: Mutex<Box<dyn RngCore + Send>>,
}

impl<S: Store> OrganizationService<S> {
    pub fn new(store: Arc<S>, config: AppConfig) -> Self {
        Self::with_rng(store, config, StdRng::from_entropy())
    }

    pub fn with_rng(store: Arc<S>, config: AppConfig, rng: impl RngCore + Send + 'static) -> Self {
        Self {
            store,
            config,
            rng: Mutex::new(Box::new(rng)),
        }
    }

    /// Create an organization owned by the caller, with a fresh join code.
    #[tracing::instrument(skip(self, input), fields(user = %user.id(), name = %input.name.trim()))]
    pub fn create_organization(
        &self,
        user: &CurrentUser,
        input: NewOrganization,
    ) -> ServiceResult<Organization> {
        let mut tx = self.store.begin()?;
        let code = self.unique_code(&tx, &input.name)?;

        let id = OrganizationId::new();
        let mut org = Organization::empty(id);
        org.execute(&OrganizationCommand::Create(CreateOrganization {
            org_id: id,
            owner_id: user.id(),
            code,
            input,
            occurred_at: Utc::now(),
        }))?;
        tx.save_organization(&org, ExpectedVersion::Exact(0))?;
        tx.commit()?;

        tracing::info!(org = %id, code = %org.code().map(JoinCode::as_str).unwrap_or_default(), "organization created");
        Ok(org)
    }

    /// Draw codes until one is free, up to the configured number of attempts.
    fn unique_code<T: Transaction + ?Sized>(&self, tx: &T, name: &str) -> ServiceResult<JoinCode> {
        let mut rng = self
            .rng
            .lock()
            .map_err(|_| StoreError::Unavailable("join code generator poisoned".to_string()))?;

        for attempt in 1..=self.config.join_code_attempts {
            let code = JoinCode::generate(name, self.config.join_code_length, &mut **rng)?;
            if tx.organization_by_code(&code)?.is_none() {
                return Ok(code);
            }
            tracing::debug!(attempt, %code, "join code collision");
        }

        tracing::warn!(attempts = self.config.join_code_attempts, "join code space exhausted");
        Err(DomainError::conflict(format!(
            "could not generate a unique organization code after {} attempts",
            self.config.join_code_attempts
        ))
        .into())
    }

    /// Any authenticated user may look an organization up.
    pub fn get_organization(
        &self,
        user: &CurrentUser,
        org_id: OrganizationId,
    ) -> ServiceResult<OrganizationView> {
        let tx = self.store.begin()?;
        let organization = load_org(&tx, org_id)?;
        let role = organization.role_of(user.id());
        Ok(OrganizationView {
            is_owner: organization.is_owner(user.id()),
            is_member: role.is_some(),
            role,
            organization,
        })
    }

    #[tracing::instrument(skip(self, patch), fields(user = %user.id(), org = %org_id))]
    pub fn update_organization(
        &self,
        user: &CurrentUser,
        org_id: OrganizationId,
        patch: OrganizationPatch,
    ) -> ServiceResult<Organization> {
        self.execute(
            org_id,
            OrganizationCommand::Update(UpdateOrganization {
                actor: user.id(),
                patch,
                occurred_at: Utc::now(),
            }),
            |_, _| Ok(()),
        )
    }

    /// Owner only; cascades to teams, events, tasks and budgets.
    #[tracing::instrument(skip(self), fields(user = %user.id(), org = %org_id))]
    pub fn delete_organization(&self, user: &CurrentUser, org_id: OrganizationId) -> ServiceResult<()> {
        let mut tx = self.store.begin()?;
        let org = load_org(&tx, org_id)?;
        org.ensure_can_delete(user.id()).inspect_err(|e| {
            tracing::warn!(reason = %e, "organization delete denied");
        })?;
        tx.delete_organization(org_id)?;
        tx.commit()?;

        tracing::info!("organization deleted");
        Ok(())
    }

    /// Join by code (trimmed, case-insensitive) as MEMBER.
    #[tracing::instrument(skip(self), fields(user = %user.id()))]
    pub fn join_organization(&self, user: &CurrentUser, code: &str) -> ServiceResult<Organization> {
        let code = JoinCode::parse(code)?;
        let mut tx = self.store.begin()?;
        let mut org = tx
            .organization_by_code(&code)?
            .ok_or_else(|| DomainError::not_found("organization"))?;
        let expected = ExpectedVersion::Exact(org.version());

        org.execute(&OrganizationCommand::Join(JoinOrganization {
            user_id: user.id(),
            occurred_at: Utc::now(),
        }))?;
        tx.save_organization(&org, expected)?;
        tx.commit()?;

        tracing::info!(org = %org.id_typed(), "joined organization");
        Ok(org)
    }

    /// Leave as a non-owner member who leads none of the organization's teams.
    #[tracing::instrument(skip(self), fields(user = %user.id(), org = %org_id))]
    pub fn leave_organization(&self, user: &CurrentUser, org_id: OrganizationId) -> ServiceResult<()> {
        let me = user.id();
        self.execute(
            org_id,
            OrganizationCommand::Leave(LeaveOrganization {
                user_id: me,
                occurred_at: Utc::now(),
            }),
            |tx, _| ensure_leads_no_team(tx, org_id, me),
        )
        .map(|_| ())
    }

    #[tracing::instrument(skip(self), fields(user = %user.id(), org = %org_id))]
    pub fn change_member_role(
        &self,
        user: &CurrentUser,
        org_id: OrganizationId,
        target: UserId,
        role: Role,
    ) -> ServiceResult<Organization> {
        self.execute(
            org_id,
            OrganizationCommand::ChangeMemberRole(ChangeMemberRole {
                actor: user.id(),
                user_id: target,
                role,
                occurred_at: Utc::now(),
            }),
            |_, _| Ok(()),
        )
    }

    #[tracing::instrument(skip(self), fields(user = %user.id(), org = %org_id))]
    pub fn remove_member(
        &self,
        user: &CurrentUser,
        org_id: OrganizationId,
        target: UserId,
    ) -> ServiceResult<Organization> {
        self.execute(
            org_id,
            OrganizationCommand::RemoveMember(RemoveMember {
                actor: user.id(),
                user_id: target,
                occurred_at: Utc::now(),
            }),
            |tx, _| ensure_leads_no_team(tx, org_id, target),
        )
    }

    /// Hand ownership to an existing member, who is promoted to LEADER. The
    /// previous owner keeps LEADER.
    #[tracing::instrument(skip(self), fields(user = %user.id(), org = %org_id))]
    pub fn transfer_ownership(
        &self,
        user: &CurrentUser,
        org_id: OrganizationId,
        new_owner: UserId,
    ) -> ServiceResult<Organization> {
        self.execute(
            org_id,
            OrganizationCommand::TransferOwnership(TransferOwnership {
                actor: user.id(),
                new_owner_id: new_owner,
                occurred_at: Utc::now(),
            }),
            |_, _| Ok(()),
        )
    }

    /// Members of the organization with their profile; members only.
    pub fn list_members(&self, user: &CurrentUser, org_id: OrganizationId) -> ServiceResult<Vec<MemberView>> {
        let tx = self.store.begin()?;
        MembershipRegistry::new(&tx).require_org(user.id(), org_id, Requirement::Member)?;
        let org = load_org(&tx, org_id)?;
        member_views(&tx, &org)
    }

    /// Organization plus members, teams, events, tasks and budgets; members only.
    pub fn organization_details(
        &self,
        user: &CurrentUser,
        org_id: OrganizationId,
    ) -> ServiceResult<OrganizationOverview> {
        let tx = self.store.begin()?;
        let role = MembershipRegistry::new(&tx).require_org(user.id(), org_id, Requirement::Member)?;
        let organization = load_org(&tx, org_id)?;

        Ok(OrganizationOverview {
            role,
            is_owner: organization.is_owner(user.id()),
            members: member_views(&tx, &organization)?,
            teams: tx.teams_of(org_id)?,
            events: tx.events_of(org_id)?,
            tasks: tx.tasks_of(org_id)?,
            budgets: tx.budgets_of(org_id)?,
            organization,
        })
    }

    pub fn my_organizations(&self, user: &CurrentUser) -> ServiceResult<Vec<MyOrganization>> {
        let tx = self.store.begin()?;
        Ok(my_organizations(&tx.organizations()?, user.id()))
    }

    /// Every organization, by name. Open to any authenticated user.
    pub fn list_organizations(&self, _user: &CurrentUser) -> ServiceResult<Vec<Organization>> {
        let tx = self.store.begin()?;
        let mut organizations = tx.organizations()?;
        organizations.sort_by_cached_key(|o| o.name().to_lowercase());
        Ok(organizations)
    }

    /// Case-insensitive name substring, or exact join code.
    pub fn search_organizations(&self, _user: &CurrentUser, query: &str) -> ServiceResult<Vec<Organization>> {
        let query = query.trim();
        if query.is_empty() {
            return Err(DomainError::validation("search query is required").into());
        }
        let needle = query.to_lowercase();
        let code = query.to_ascii_uppercase();

        let tx = self.store.begin()?;
        Ok(tx
            .organizations()?
            .into_iter()
            .filter(|o| {
                o.name().to_lowercase().contains(&needle)
                    || o.code().is_some_and(|c| c.as_str() == code)
            })
            .collect())
    }

    /// Head counts and breakdowns; members only.
    pub fn organization_statistics(
        &self,
        user: &CurrentUser,
        org_id: OrganizationId,
        now: DateTime<Utc>,
    ) -> ServiceResult<OrganizationStatistics> {
        let tx = self.store.begin()?;
        MembershipRegistry::new(&tx).require_org(user.id(), org_id, Requirement::Member)?;
        let org = load_org(&tx, org_id)?;
        let events = tx.events_of(org_id)?;
        let tasks = tx.tasks_of(org_id)?;

        let mut members_by_role: BTreeMap<String, usize> =
            Role::ALL.iter().map(|r| (r.as_str().to_string(), 0)).collect();
        for m in org.members() {
            *members_by_role.entry(m.role.as_str().to_string()).or_default() += 1;
        }
        let mut events_by_status: BTreeMap<String, usize> =
            EventStatus::ALL.iter().map(|s| (s.as_str().to_string(), 0)).collect();
        for e in &events {
            *events_by_status.entry(e.status.as_str().to_string()).or_default() += 1;
        }
        let mut tasks_by_status: BTreeMap<String, usize> =
            TaskStatus::ALL.iter().map(|s| (s.as_str().to_string(), 0)).collect();
        for t in &tasks {
            *tasks_by_status.entry(t.status.as_str().to_string()).or_default() += 1;
        }

        Ok(OrganizationStatistics {
            total_members: org.member_count(),
            total_events: events.len(),
            total_teams: tx.teams_of(org_id)?.len(),
            total_tasks: tasks.len(),
            members_by_role,
            events_by_status,
            tasks_by_status,
            age_days: org.created_at().map_or(0, |c| (now - c).num_days()),
        })
    }

    /// Load, decide, run `guard` against the decided state, then save the
    /// applied batch, all in one unit of work.
    fn execute<'s>(
        &'s self,
        org_id: OrganizationId,
        command: OrganizationCommand,
        guard: impl FnOnce(&S::Tx<'s>, &Organization) -> ServiceResult<()>,
    ) -> ServiceResult<Organization> {
        let mut tx = self.store.begin()?;
        let mut org = load_org(&tx, org_id)?;
        let expected = ExpectedVersion::Exact(org.version());

        let events = org.handle(&command).inspect_err(|e| {
            tracing::warn!(reason = %e, "organization command rejected");
        })?;
        guard(&tx, &org)?;
        if events.is_empty() {
            return Ok(org);
        }
        for event in &events {
            org.apply(event);
        }

        tx.save_organization(&org, expected)?;
        tx.commit()?;

        for event in &events {
            tracing::info!(event = event.event_type(), "organization updated");
        }
        Ok(org)
    }
}

/// Team leadership must be handed over before its holder leaves the
/// organization, so every team leader stays an organization member.
fn ensure_leads_no_team<T: Transaction + ?Sized>(
    tx: &T,
    org_id: OrganizationId,
    user: UserId,
) -> ServiceResult<()> {
    let led: Vec<String> = tx
        .teams_of(org_id)?
        .into_iter()
        .filter(|t| t.is_leader(user))
        .map(|t| t.name().to_string())
        .collect();
    if !led.is_empty() {
        return Err(ServiceError::from(DomainError::conflict(format!(
            "user leads team(s) {}; transfer team leadership first",
            led.join(", ")
        ))));
    }
    Ok(())
}

fn member_views<T: Transaction + ?Sized>(tx: &T, org: &Organization) -> ServiceResult<Vec<MemberView>> {
    org.members()
        .map(|m| {
            let user = super::load_user(tx, m.user_id)?;
            Ok(MemberView {
                user_id: m.user_id,
                first_name: user.first_name,
                last_name: user.last_name,
                email: user.email,
                role: m.role,
                joined_at: m.joined_at,
                is_owner: org.is_owner(m.user_id),
            })
        })
        .collect()
}
