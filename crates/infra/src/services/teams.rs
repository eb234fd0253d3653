use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;

use clubhouse_auth::{CurrentUser, Requirement, Role};
use clubhouse_core::{
    Aggregate, AggregateRoot, DomainEvent, ExpectedVersion, OrganizationId, TeamId, UserId,
};
use clubhouse_teams::{
    AddTeamMember, ChangeTeamMemberRole, CreateTeam, LeaveTeam, RemoveTeamMember, SetLeader, Team,
    TeamCommand, UpdateTeam,
};

use super::{load_team, load_user};
use crate::error::ServiceResult;
use crate::registry::MembershipRegistry;
use crate::store::{Store, Transaction};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TeamMemberView {
    pub user_id: UserId,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub role: Role,
    pub joined_at: DateTime<Utc>,
    pub is_leader: bool,
}

/// Teams and team membership.
pub struct TeamService<S> {
    store: Arc<S>,
}

impl<S: Store> TeamService<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    /// Any organization member may create a team and becomes its leader.
    #[tracing::instrument(skip(self, description), fields(user = %user.id(), org = %org_id))]
    pub fn create_team(
        &self,
        user: &CurrentUser,
        org_id: OrganizationId,
        name: &str,
        description: Option<&str>,
    ) -> ServiceResult<Team> {
        let mut tx = self.store.begin()?;
        let creator_org_role = MembershipRegistry::new(&tx).role_in_org(user.id(), org_id)?;
        super::load_org(&tx, org_id)?;

        let id = TeamId::new();
        let mut team = Team::empty(id);
        team.execute(&TeamCommand::Create(CreateTeam {
            team_id: id,
            org_id,
            creator: user.id(),
            creator_org_role,
            name: name.to_string(),
            description: description.map(str::to_string),
            occurred_at: Utc::now(),
        }))
        .inspect_err(|e| tracing::warn!(reason = %e, "team create rejected"))?;
        tx.save_team(&team, ExpectedVersion::Exact(0))?;
        tx.commit()?;

        tracing::info!(team = %id, "team created");
        Ok(team)
    }

    pub fn get_team(&self, user: &CurrentUser, team_id: TeamId) -> ServiceResult<Team> {
        let tx = self.store.begin()?;
        let team = load_team(&tx, team_id)?;
        MembershipRegistry::new(&tx).require_org(user.id(), team.org_id()?, Requirement::Member)?;
        Ok(team)
    }

    pub fn list_teams(&self, user: &CurrentUser, org_id: OrganizationId) -> ServiceResult<Vec<Team>> {
        let tx = self.store.begin()?;
        MembershipRegistry::new(&tx).require_org(user.id(), org_id, Requirement::Member)?;
        Ok(tx.teams_of(org_id)?)
    }

    pub fn list_members(&self, user: &CurrentUser, team_id: TeamId) -> ServiceResult<Vec<TeamMemberView>> {
        let tx = self.store.begin()?;
        let team = load_team(&tx, team_id)?;
        MembershipRegistry::new(&tx).require_org(user.id(), team.org_id()?, Requirement::Member)?;

        team.members()
            .map(|m| {
                let profile = load_user(&tx, m.user_id)?;
                Ok(TeamMemberView {
                    user_id: m.user_id,
                    first_name: profile.first_name,
                    last_name: profile.last_name,
                    email: profile.email,
                    role: m.role,
                    joined_at: m.joined_at,
                    is_leader: team.is_leader(m.user_id),
                })
            })
            .collect()
    }

    #[tracing::instrument(skip(self, name, description), fields(user = %user.id(), team = %team_id))]
    pub fn update_team(
        &self,
        user: &CurrentUser,
        team_id: TeamId,
        name: Option<&str>,
        description: Option<&str>,
    ) -> ServiceResult<Team> {
        self.execute(
            team_id,
            TeamCommand::Update(UpdateTeam {
                actor: user.id(),
                name: name.map(str::to_string),
                description: description.map(str::to_string),
                occurred_at: Utc::now(),
            }),
        )
    }

    /// Team leader only; cascades to the team's memberships and tasks.
    #[tracing::instrument(skip(self), fields(user = %user.id(), team = %team_id))]
    pub fn delete_team(&self, user: &CurrentUser, team_id: TeamId) -> ServiceResult<()> {
        let mut tx = self.store.begin()?;
        MembershipRegistry::new(&tx).require_team(user.id(), team_id, Requirement::Leader)?;
        tx.delete_team(team_id)?;
        tx.commit()?;

        tracing::info!("team deleted");
        Ok(())
    }

    /// Add an organization member as MEMBER or VOLUNTEER.
    #[tracing::instrument(skip(self), fields(user = %user.id(), team = %team_id))]
    pub fn add_member(
        &self,
        user: &CurrentUser,
        team_id: TeamId,
        target: UserId,
        role: Role,
    ) -> ServiceResult<Team> {
        let mut tx = self.store.begin()?;
        let mut team = load_team(&tx, team_id)?;
        let candidate_org_role = MembershipRegistry::new(&tx).role_in_org(target, team.org_id()?)?;

        let command = TeamCommand::AddMember(AddTeamMember {
            actor: user.id(),
            user_id: target,
            role,
            candidate_org_role,
            occurred_at: Utc::now(),
        });
        apply_and_save(&mut tx, &mut team, &command)?;
        tx.commit()?;
        Ok(team)
    }

    #[tracing::instrument(skip(self), fields(user = %user.id(), team = %team_id))]
    pub fn remove_member(&self, user: &CurrentUser, team_id: TeamId, target: UserId) -> ServiceResult<Team> {
        self.execute(
            team_id,
            TeamCommand::RemoveMember(RemoveTeamMember {
                actor: user.id(),
                user_id: target,
                occurred_at: Utc::now(),
            }),
        )
    }

    #[tracing::instrument(skip(self), fields(user = %user.id(), team = %team_id))]
    pub fn leave_team(&self, user: &CurrentUser, team_id: TeamId) -> ServiceResult<()> {
        self.execute(
            team_id,
            TeamCommand::Leave(LeaveTeam {
                user_id: user.id(),
                occurred_at: Utc::now(),
            }),
        )
        .map(|_| ())
    }

    /// Team leader only. Promoting to LEADER hands leadership over.
    #[tracing::instrument(skip(self), fields(user = %user.id(), team = %team_id))]
    pub fn change_member_role(
        &self,
        user: &CurrentUser,
        team_id: TeamId,
        target: UserId,
        role: Role,
    ) -> ServiceResult<Team> {
        self.execute(
            team_id,
            TeamCommand::ChangeMemberRole(ChangeTeamMemberRole {
                actor: user.id(),
                user_id: target,
                role,
                occurred_at: Utc::now(),
            }),
        )
    }

    /// Hand leadership to another team member; the previous leader becomes
    /// MEMBER.
    #[tracing::instrument(skip(self), fields(user = %user.id(), team = %team_id))]
    pub fn set_leader(&self, user: &CurrentUser, team_id: TeamId, new_leader: UserId) -> ServiceResult<Team> {
        self.execute(
            team_id,
            TeamCommand::SetLeader(SetLeader {
                actor: user.id(),
                new_leader_id: new_leader,
                occurred_at: Utc::now(),
            }),
        )
    }

    fn execute(&self, team_id: TeamId, command: TeamCommand) -> ServiceResult<Team> {
        let mut tx = self.store.begin()?;
        let mut team = load_team(&tx, team_id)?;
        apply_and_save(&mut tx, &mut team, &command)?;
        tx.commit()?;
        Ok(team)
    }
}

/// Decide, apply, and save one team command as a single batch.
fn apply_and_save<T: Transaction + ?Sized>(
    tx: &mut T,
    team: &mut Team,
    command: &TeamCommand,
) -> ServiceResult<()> {
    let expected = ExpectedVersion::Exact(team.version());
    let events = team
        .execute(command)
        .inspect_err(|e| tracing::warn!(reason = %e, "team command rejected"))?;
    if events.is_empty() {
        return Ok(());
    }
    tx.save_team(team, expected)?;

    for event in &events {
        tracing::info!(event = event.event_type(), "team updated");
    }
    Ok(())
}
