use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use clubhouse_auth::{Requirement, Role, Scope, authorize};
use clubhouse_core::{
    Aggregate, AggregateRoot, DomainError, DomainEvent, DomainResult, OrganizationId, TeamId,
    UserId, validate,
};

/// One row of the team membership table, keyed by (user, team).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TeamMembership {
    pub user_id: UserId,
    pub role: Role,
    pub joined_at: DateTime<Utc>,
}

// ─────────────────────────────────────────────────────────────────────────────
// Aggregate
// ─────────────────────────────────────────────────────────────────────────────

/// Aggregate root: Team.
///
/// # Invariants
/// - Exactly one membership holds LEADER, and it belongs to `leader_id`.
/// - At most one membership holds COLEADER.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Team {
    id: TeamId,
    org_id: Option<OrganizationId>,
    leader_id: Option<UserId>,
    name: String,
    description: Option<String>,
    members: BTreeMap<UserId, TeamMembership>,
    created_at: Option<DateTime<Utc>>,
    version: u64,
}

impl Team {
    pub fn empty(id: TeamId) -> Self {
        Self {
            id,
            org_id: None,
            leader_id: None,
            name: String::new(),
            description: None,
            members: BTreeMap::new(),
            created_at: None,
            version: 0,
        }
    }

    pub fn is_created(&self) -> bool {
        self.org_id.is_some()
    }

    pub fn id_typed(&self) -> TeamId {
        self.id
    }

    /// Parent organization of a created team.
    pub fn org_id(&self) -> DomainResult<OrganizationId> {
        self.org_id.ok_or_else(|| DomainError::not_found("team"))
    }

    pub fn leader_id(&self) -> DomainResult<UserId> {
        self.leader_id.ok_or_else(|| DomainError::not_found("team"))
    }

    pub fn is_leader(&self, user_id: UserId) -> bool {
        self.leader_id == Some(user_id)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    pub fn created_at(&self) -> Option<DateTime<Utc>> {
        self.created_at
    }

    pub fn role_of(&self, user_id: UserId) -> Option<Role> {
        self.members.get(&user_id).map(|m| m.role)
    }

    pub fn members(&self) -> impl Iterator<Item = &TeamMembership> {
        self.members.values()
    }

    pub fn member_count(&self) -> usize {
        self.members.len()
    }

    fn coleader(&self) -> Option<UserId> {
        self.members
            .values()
            .find(|m| m.role == Role::CoLeader)
            .map(|m| m.user_id)
    }

    /// Verify the leadership invariants hold.
    pub fn check_invariants(&self) -> DomainResult<()> {
        let leader = self.leader_id()?;
        let leaders: Vec<UserId> = self
            .members
            .values()
            .filter(|m| m.role == Role::Leader)
            .map(|m| m.user_id)
            .collect();
        if leaders != [leader] {
            return Err(DomainError::conflict(format!(
                "team {} has leader memberships {leaders:?}, expected [{leader}]",
                self.id
            )));
        }
        let coleaders = self.members.values().filter(|m| m.role == Role::CoLeader).count();
        if coleaders > 1 {
            return Err(DomainError::conflict(format!(
                "team {} has {coleaders} co-leaders",
                self.id
            )));
        }
        Ok(())
    }

    fn ensure_created(&self) -> DomainResult<()> {
        if !self.is_created() {
            return Err(DomainError::not_found("team"));
        }
        Ok(())
    }

    fn require(&self, actor: UserId, required: Requirement) -> DomainResult<Role> {
        Ok(authorize(Scope::Team, self.role_of(actor), required)?)
    }

    fn ensure_member(&self, user_id: UserId) -> DomainResult<&TeamMembership> {
        self.members
            .get(&user_id)
            .ok_or_else(|| DomainError::not_found("team membership"))
    }
}

impl AggregateRoot for Team {
    type Id = TeamId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Commands
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateTeam {
    pub team_id: TeamId,
    pub org_id: OrganizationId,
    pub creator: UserId,
    /// The creator's role in the parent organization, if any.
    pub creator_org_role: Option<Role>,
    pub name: String,
    pub description: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateTeam {
    pub actor: UserId,
    pub name: Option<String>,
    pub description: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddTeamMember {
    pub actor: UserId,
    pub user_id: UserId,
    pub role: Role,
    /// The candidate's role in the parent organization, if any.
    pub candidate_org_role: Option<Role>,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoveTeamMember {
    pub actor: UserId,
    pub user_id: UserId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeaveTeam {
    pub user_id: UserId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeTeamMemberRole {
    pub actor: UserId,
    pub user_id: UserId,
    pub role: Role,
    pub occurred_at: DateTime<Utc>,
}

/// Hand leadership to another team member.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SetLeader {
    pub actor: UserId,
    pub new_leader_id: UserId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum TeamCommand {
    Create(CreateTeam),
    Update(UpdateTeam),
    AddMember(AddTeamMember),
    RemoveMember(RemoveTeamMember),
    Leave(LeaveTeam),
    ChangeMemberRole(ChangeTeamMemberRole),
    SetLeader(SetLeader),
}

// ─────────────────────────────────────────────────────────────────────────────
// Events
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum TeamEvent {
    Created {
        team_id: TeamId,
        org_id: OrganizationId,
        leader_id: UserId,
        name: String,
        description: Option<String>,
        occurred_at: DateTime<Utc>,
    },
    DetailsUpdated {
        name: String,
        description: Option<String>,
        occurred_at: DateTime<Utc>,
    },
    MemberAdded {
        user_id: UserId,
        role: Role,
        occurred_at: DateTime<Utc>,
    },
    MemberRemoved {
        user_id: UserId,
        removed_by: UserId,
        occurred_at: DateTime<Utc>,
    },
    MemberLeft {
        user_id: UserId,
        occurred_at: DateTime<Utc>,
    },
    MemberRoleChanged {
        user_id: UserId,
        from: Role,
        to: Role,
        occurred_at: DateTime<Utc>,
    },
    LeaderChanged {
        from: UserId,
        to: UserId,
        occurred_at: DateTime<Utc>,
    },
}

impl DomainEvent for TeamEvent {
    fn event_type(&self) -> &'static str {
        match self {
            TeamEvent::Created { .. } => "team.created",
            TeamEvent::DetailsUpdated { .. } => "team.details_updated",
            TeamEvent::MemberAdded { .. } => "team.member_added",
            TeamEvent::MemberRemoved { .. } => "team.member_removed",
            TeamEvent::MemberLeft { .. } => "team.member_left",
            TeamEvent::MemberRoleChanged { .. } => "team.member_role_changed",
            TeamEvent::LeaderChanged { .. } => "team.leader_changed",
        }
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            TeamEvent::Created { occurred_at, .. }
            | TeamEvent::DetailsUpdated { occurred_at, .. }
            | TeamEvent::MemberAdded { occurred_at, .. }
            | TeamEvent::MemberRemoved { occurred_at, .. }
            | TeamEvent::MemberLeft { occurred_at, .. }
            | TeamEvent::MemberRoleChanged { occurred_at, .. }
            | TeamEvent::LeaderChanged { occurred_at, .. } => *occurred_at,
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Aggregate Implementation
// ─────────────────────────────────────────────────────────────────────────────

impl Aggregate for Team {
    type Command = TeamCommand;
    type Event = TeamEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            TeamEvent::Created {
                team_id,
                org_id,
                leader_id,
                name,
                description,
                occurred_at,
            } => {
                self.id = *team_id;
                self.org_id = Some(*org_id);
                self.leader_id = Some(*leader_id);
                self.name = name.clone();
                self.description = description.clone();
                self.created_at = Some(*occurred_at);
                self.members.insert(
                    *leader_id,
                    TeamMembership {
                        user_id: *leader_id,
                        role: Role::Leader,
                        joined_at: *occurred_at,
                    },
                );
            }
            TeamEvent::DetailsUpdated {
                name, description, ..
            } => {
                self.name = name.clone();
                self.description = description.clone();
            }
            TeamEvent::MemberAdded {
                user_id,
                role,
                occurred_at,
            } => {
                self.members.insert(
                    *user_id,
                    TeamMembership {
                        user_id: *user_id,
                        role: *role,
                        joined_at: *occurred_at,
                    },
                );
            }
            TeamEvent::MemberRemoved { user_id, .. } | TeamEvent::MemberLeft { user_id, .. } => {
                self.members.remove(user_id);
            }
            TeamEvent::MemberRoleChanged { user_id, to, .. } => {
                if let Some(m) = self.members.get_mut(user_id) {
                    m.role = *to;
                }
            }
            TeamEvent::LeaderChanged { to, .. } => {
                self.leader_id = Some(*to);
            }
        }

        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            TeamCommand::Create(cmd) => self.handle_create(cmd),
            TeamCommand::Update(cmd) => self.handle_update(cmd),
            TeamCommand::AddMember(cmd) => self.handle_add_member(cmd),
            TeamCommand::RemoveMember(cmd) => self.handle_remove_member(cmd),
            TeamCommand::Leave(cmd) => self.handle_leave(cmd),
            TeamCommand::ChangeMemberRole(cmd) => self.handle_change_role(cmd),
            TeamCommand::SetLeader(cmd) => {
                self.ensure_created()?;
                self.require(cmd.actor, Requirement::Leader)?;
                self.leadership_handover(cmd.new_leader_id, cmd.occurred_at)
            }
        }
    }
}

impl Team {
    // ─────────────────────────────────────────────────────────────────────────
    // Command Handlers
    // ─────────────────────────────────────────────────────────────────────────

    fn handle_create(&self, cmd: &CreateTeam) -> DomainResult<Vec<TeamEvent>> {
        if self.is_created() {
            return Err(DomainError::conflict("team already exists"));
        }
        authorize(Scope::Organization, cmd.creator_org_role, Requirement::Member)?;

        Ok(vec![TeamEvent::Created {
            team_id: cmd.team_id,
            org_id: cmd.org_id,
            leader_id: cmd.creator,
            name: validate::required_text("team name", &cmd.name)?,
            description: validate::optional_text(cmd.description.as_deref()),
            occurred_at: cmd.occurred_at,
        }])
    }

    fn handle_update(&self, cmd: &UpdateTeam) -> DomainResult<Vec<TeamEvent>> {
        self.ensure_created()?;
        self.require(cmd.actor, Requirement::Leader)?;

        let name = match &cmd.name {
            Some(name) => validate::required_text("team name", name)?,
            None => self.name.clone(),
        };
        let description = match &cmd.description {
            Some(d) => validate::optional_text(Some(d)),
            None => self.description.clone(),
        };
        if name == self.name && description == self.description {
            return Ok(vec![]);
        }

        Ok(vec![TeamEvent::DetailsUpdated {
            name,
            description,
            occurred_at: cmd.occurred_at,
        }])
    }

    fn handle_add_member(&self, cmd: &AddTeamMember) -> DomainResult<Vec<TeamEvent>> {
        self.ensure_created()?;
        self.require(cmd.actor, Requirement::Admin)?;

        if cmd.candidate_org_role.is_none() {
            return Err(DomainError::validation(
                "user must be a member of the organization to join its teams",
            ));
        }
        if !matches!(cmd.role, Role::Member | Role::Volunteer) {
            return Err(DomainError::validation(
                "members are added as member or volunteer; use a role change to promote",
            ));
        }
        if self.members.contains_key(&cmd.user_id) {
            return Err(DomainError::conflict("already a member of this team"));
        }

        Ok(vec![TeamEvent::MemberAdded {
            user_id: cmd.user_id,
            role: cmd.role,
            occurred_at: cmd.occurred_at,
        }])
    }

    fn handle_remove_member(&self, cmd: &RemoveTeamMember) -> DomainResult<Vec<TeamEvent>> {
        self.ensure_created()?;
        self.require(cmd.actor, Requirement::Admin)?;

        let target = self.ensure_member(cmd.user_id)?;
        if target.role == Role::Leader {
            return Err(DomainError::forbidden(
                "the team leader cannot be removed; transfer leadership first",
            ));
        }

        Ok(vec![TeamEvent::MemberRemoved {
            user_id: cmd.user_id,
            removed_by: cmd.actor,
            occurred_at: cmd.occurred_at,
        }])
    }

    fn handle_leave(&self, cmd: &LeaveTeam) -> DomainResult<Vec<TeamEvent>> {
        self.ensure_created()?;
        let membership = self.ensure_member(cmd.user_id)?;
        if membership.role == Role::Leader {
            return Err(DomainError::conflict(
                "the team leader cannot leave; transfer leadership first",
            ));
        }

        Ok(vec![TeamEvent::MemberLeft {
            user_id: cmd.user_id,
            occurred_at: cmd.occurred_at,
        }])
    }

    fn handle_change_role(&self, cmd: &ChangeTeamMemberRole) -> DomainResult<Vec<TeamEvent>> {
        self.ensure_created()?;
        self.require(cmd.actor, Requirement::Leader)?;

        let current = self.ensure_member(cmd.user_id)?.role;
        if current == cmd.role {
            return Ok(vec![]);
        }
        match (current, cmd.role) {
            (_, Role::Leader) => self.leadership_handover(cmd.user_id, cmd.occurred_at),
            (Role::Leader, _) => Err(DomainError::conflict(
                "the team leader's role changes only by handing leadership to another member",
            )),
            (_, Role::CoLeader) => {
                if let Some(existing) = self.coleader().filter(|id| *id != cmd.user_id) {
                    return Err(DomainError::conflict(format!(
                        "team already has a co-leader ({existing})"
                    )));
                }
                Ok(vec![self.role_changed(cmd.user_id, current, Role::CoLeader, cmd.occurred_at)])
            }
            (_, to) => Ok(vec![self.role_changed(cmd.user_id, current, to, cmd.occurred_at)]),
        }
    }

    /// Demote the current leader to MEMBER, promote `new_leader` to LEADER and
    /// move `leader_id`, as one batch.
    fn leadership_handover(
        &self,
        new_leader: UserId,
        occurred_at: DateTime<Utc>,
    ) -> DomainResult<Vec<TeamEvent>> {
        let previous = self.leader_id()?;
        let target = self.members.get(&new_leader).ok_or_else(|| {
            DomainError::validation("the new leader must be a member of the team")
        })?;
        if previous == new_leader {
            return Ok(vec![]);
        }

        Ok(vec![
            self.role_changed(previous, Role::Leader, Role::Member, occurred_at),
            self.role_changed(new_leader, target.role, Role::Leader, occurred_at),
            TeamEvent::LeaderChanged {
                from: previous,
                to: new_leader,
                occurred_at,
            },
        ])
    }

    fn role_changed(&self, user_id: UserId, from: Role, to: Role, occurred_at: DateTime<Utc>) -> TeamEvent {
        TeamEvent::MemberRoleChanged {
            user_id,
            from,
            to,
            occurred_at,
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn now() -> DateTime<Utc> {
        Utc::now()
    }

    fn created(leader: UserId) -> Team {
        let id = TeamId::new();
        let mut team = Team::empty(id);
        team.execute(&TeamCommand::Create(CreateTeam {
            team_id: id,
            org_id: OrganizationId::new(),
            creator: leader,
            creator_org_role: Some(Role::Member),
            name: "Drive Train".to_string(),
            description: None,
            occurred_at: now(),
        }))
        .unwrap();
        team
    }

    fn add(team: &mut Team, actor: UserId, user: UserId) -> DomainResult<Vec<TeamEvent>> {
        team.execute(&TeamCommand::AddMember(AddTeamMember {
            actor,
            user_id: user,
            role: Role::Member,
            candidate_org_role: Some(Role::Member),
            occurred_at: now(),
        }))
    }

    fn change(team: &mut Team, actor: UserId, user: UserId, role: Role) -> DomainResult<Vec<TeamEvent>> {
        team.execute(&TeamCommand::ChangeMemberRole(ChangeTeamMemberRole {
            actor,
            user_id: user,
            role,
            occurred_at: now(),
        }))
    }

    fn remove(team: &mut Team, actor: UserId, user: UserId) -> DomainResult<Vec<TeamEvent>> {
        team.execute(&TeamCommand::RemoveMember(RemoveTeamMember {
            actor,
            user_id: user,
            occurred_at: now(),
        }))
    }

    #[test]
    fn creator_leads_new_team() {
        let leader = UserId::new();
        let team = created(leader);
        assert_eq!(team.leader_id().unwrap(), leader);
        assert_eq!(team.role_of(leader), Some(Role::Leader));
        team.check_invariants().unwrap();
    }

    #[test]
    fn non_org_member_cannot_create_team() {
        let team = Team::empty(TeamId::new());
        let err = team
            .handle(&TeamCommand::Create(CreateTeam {
                team_id: TeamId::new(),
                org_id: OrganizationId::new(),
                creator: UserId::new(),
                creator_org_role: None,
                name: "Outsiders".to_string(),
                description: None,
                occurred_at: now(),
            }))
            .unwrap_err();
        assert!(matches!(err, DomainError::Forbidden(_)));
    }

    #[test]
    fn promoting_member_to_leader_demotes_previous_leader() {
        let leader = UserId::new();
        let member = UserId::new();
        let mut team = created(leader);
        add(&mut team, leader, member).unwrap();

        let events = change(&mut team, leader, member, Role::Leader).unwrap();
        assert_eq!(events.len(), 3);
        assert_eq!(team.leader_id().unwrap(), member);
        assert_eq!(team.role_of(member), Some(Role::Leader));
        assert_eq!(team.role_of(leader), Some(Role::Member));
        team.check_invariants().unwrap();
    }

    #[test]
    fn set_leader_requires_team_membership() {
        let leader = UserId::new();
        let mut team = created(leader);
        let err = team
            .execute(&TeamCommand::SetLeader(SetLeader {
                actor: leader,
                new_leader_id: UserId::new(),
                occurred_at: now(),
            }))
            .unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
        assert_eq!(team.leader_id().unwrap(), leader);
    }

    #[test]
    fn second_coleader_conflicts() {
        let leader = UserId::new();
        let a = UserId::new();
        let b = UserId::new();
        let mut team = created(leader);
        add(&mut team, leader, a).unwrap();
        add(&mut team, leader, b).unwrap();

        change(&mut team, leader, a, Role::CoLeader).unwrap();
        let err = change(&mut team, leader, b, Role::CoLeader).unwrap_err();
        assert!(matches!(err, DomainError::Conflict(_)));
        assert_eq!(team.role_of(b), Some(Role::Member));
    }

    #[test]
    fn leader_role_only_changes_by_handover() {
        let leader = UserId::new();
        let mut team = created(leader);
        let err = change(&mut team, leader, leader, Role::Member).unwrap_err();
        assert!(matches!(err, DomainError::Conflict(_)));
    }

    #[test]
    fn coleader_adds_and_removes_but_not_the_leader() {
        let leader = UserId::new();
        let co = UserId::new();
        let member = UserId::new();
        let mut team = created(leader);
        add(&mut team, leader, co).unwrap();
        change(&mut team, leader, co, Role::CoLeader).unwrap();

        add(&mut team, co, member).unwrap();
        remove(&mut team, co, member).unwrap();
        assert_eq!(team.role_of(member), None);

        let err = remove(&mut team, co, leader).unwrap_err();
        assert!(matches!(err, DomainError::Forbidden(_)));
        let err = remove(&mut team, leader, leader).unwrap_err();
        assert!(matches!(err, DomainError::Forbidden(_)));
    }

    #[test]
    fn plain_members_cannot_manage_membership() {
        let leader = UserId::new();
        let member = UserId::new();
        let mut team = created(leader);
        add(&mut team, leader, member).unwrap();

        assert!(matches!(add(&mut team, member, UserId::new()).unwrap_err(), DomainError::Forbidden(_)));
        assert!(matches!(
            change(&mut team, member, member, Role::CoLeader).unwrap_err(),
            DomainError::Forbidden(_)
        ));
    }

    #[test]
    fn add_member_rules() {
        let leader = UserId::new();
        let mut team = created(leader);
        let user = UserId::new();

        let not_in_org = team.handle(&TeamCommand::AddMember(AddTeamMember {
            actor: leader,
            user_id: user,
            role: Role::Member,
            candidate_org_role: None,
            occurred_at: now(),
        }));
        assert!(matches!(not_in_org.unwrap_err(), DomainError::Validation(_)));

        let as_coleader = team.handle(&TeamCommand::AddMember(AddTeamMember {
            actor: leader,
            user_id: user,
            role: Role::CoLeader,
            candidate_org_role: Some(Role::Member),
            occurred_at: now(),
        }));
        assert!(matches!(as_coleader.unwrap_err(), DomainError::Validation(_)));

        add(&mut team, leader, user).unwrap();
        assert!(matches!(add(&mut team, leader, user).unwrap_err(), DomainError::Conflict(_)));
    }

    #[test]
    fn leader_cannot_leave_but_member_can() {
        let leader = UserId::new();
        let member = UserId::new();
        let mut team = created(leader);
        add(&mut team, leader, member).unwrap();

        let err = team
            .handle(&TeamCommand::Leave(LeaveTeam {
                user_id: leader,
                occurred_at: now(),
            }))
            .unwrap_err();
        assert!(matches!(err, DomainError::Conflict(_)));

        team.execute(&TeamCommand::Leave(LeaveTeam {
            user_id: member,
            occurred_at: now(),
        }))
        .unwrap();
        assert_eq!(team.member_count(), 1);
    }

    #[test]
    fn only_leader_updates() {
        let leader = UserId::new();
        let co = UserId::new();
        let mut team = created(leader);
        add(&mut team, leader, co).unwrap();
        change(&mut team, leader, co, Role::CoLeader).unwrap();

        let err = team
            .handle(&TeamCommand::Update(UpdateTeam {
                actor: co,
                name: Some("Renamed".to_string()),
                description: None,
                occurred_at: now(),
            }))
            .unwrap_err();
        assert!(matches!(err, DomainError::Forbidden(_)));

        team.execute(&TeamCommand::Update(UpdateTeam {
            actor: leader,
            name: Some("  Renamed ".to_string()),
            description: Some("gearboxes".to_string()),
            occurred_at: now(),
        }))
        .unwrap();
        assert_eq!(team.name(), "Renamed");
        assert_eq!(team.description(), Some("gearboxes"));
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Properties
    // ─────────────────────────────────────────────────────────────────────────

    #[derive(Debug, Clone)]
    enum Op {
        Add { actor: usize, user: usize, volunteer: bool },
        Remove { actor: usize, user: usize },
        Leave { user: usize },
        Change { actor: usize, user: usize, role: usize },
        SetLeader { actor: usize, user: usize },
    }

    const POOL: usize = 6;

    fn op_strategy() -> impl Strategy<Value = Op> {
        let idx = 0..POOL;
        prop_oneof![
            (idx.clone(), idx.clone(), any::<bool>())
                .prop_map(|(actor, user, volunteer)| Op::Add { actor, user, volunteer }),
            (idx.clone(), idx.clone()).prop_map(|(actor, user)| Op::Remove { actor, user }),
            idx.clone().prop_map(|user| Op::Leave { user }),
            (idx.clone(), idx.clone(), 0..Role::ALL.len())
                .prop_map(|(actor, user, role)| Op::Change { actor, user, role }),
            (idx.clone(), idx).prop_map(|(actor, user)| Op::SetLeader { actor, user }),
        ]
    }

    fn to_command(op: &Op, users: &[UserId]) -> TeamCommand {
        let at = now();
        match *op {
            Op::Add { actor, user, volunteer } => TeamCommand::AddMember(AddTeamMember {
                actor: users[actor],
                user_id: users[user],
                role: if volunteer { Role::Volunteer } else { Role::Member },
                candidate_org_role: Some(Role::Member),
                occurred_at: at,
            }),
            Op::Remove { actor, user } => TeamCommand::RemoveMember(RemoveTeamMember {
                actor: users[actor],
                user_id: users[user],
                occurred_at: at,
            }),
            Op::Leave { user } => TeamCommand::Leave(LeaveTeam {
                user_id: users[user],
                occurred_at: at,
            }),
            Op::Change { actor, user, role } => TeamCommand::ChangeMemberRole(ChangeTeamMemberRole {
                actor: users[actor],
                user_id: users[user],
                role: Role::ALL[role],
                occurred_at: at,
            }),
            Op::SetLeader { actor, user } => TeamCommand::SetLeader(SetLeader {
                actor: users[actor],
                new_leader_id: users[user],
                occurred_at: at,
            }),
        }
    }

    proptest! {
        #![proptest_config(ProptestConfig {
            cases: 256,
            ..ProptestConfig::default()
        })]

        /// Property: whatever sequence of membership commands is attempted,
        /// the team keeps exactly one LEADER matching `leader_id` and at most
        /// one COLEADER, and rejected commands leave state untouched.
        #[test]
        fn leadership_invariants_hold(ops in prop::collection::vec(op_strategy(), 1..40)) {
            let users: Vec<UserId> = (0..POOL).map(|_| UserId::new()).collect();
            let mut team = created(users[0]);

            for op in &ops {
                let before = team.clone();
                let cmd = to_command(op, &users);
                if team.execute(&cmd).is_err() {
                    prop_assert_eq!(&team, &before);
                }
                prop_assert!(team.check_invariants().is_ok(), "{:?}", team);
            }
        }
    }
}
