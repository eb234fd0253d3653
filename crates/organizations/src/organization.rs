use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use clubhouse_auth::{Requirement, Role, Scope, authorize};
use clubhouse_core::{
    Aggregate, AggregateRoot, DomainError, DomainEvent, DomainResult, OrganizationId, UserId,
    validate,
};

use crate::JoinCode;

// ─────────────────────────────────────────────────────────────────────────────
// Details
// ─────────────────────────────────────────────────────────────────────────────

/// Name and contact metadata of an organization.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrganizationDetails {
    pub name: String,
    pub college: String,
    pub description: Option<String>,
    pub contact_email: String,
    pub contact_phone: String,
    pub website: Option<String>,
}

impl OrganizationDetails {
    /// Validate raw input into details.
    pub fn new(input: NewOrganization) -> DomainResult<Self> {
        Ok(Self {
            name: validate::required_text("name", &input.name)?,
            college: validate::required_text("college", &input.college)?,
            description: validate::optional_text(input.description.as_deref()),
            contact_email: validate::email("contact email", &input.contact_email)?,
            contact_phone: validate::required_text("contact phone", &input.contact_phone)?,
            website: validate::optional_text(input.website.as_deref()),
        })
    }

    /// Apply a partial update, re-validating the result.
    pub fn patched(&self, patch: &OrganizationPatch) -> DomainResult<Self> {
        Self::new(NewOrganization {
            name: patch.name.clone().unwrap_or_else(|| self.name.clone()),
            college: patch.college.clone().unwrap_or_else(|| self.college.clone()),
            description: patch.description.clone().or_else(|| self.description.clone()),
            contact_email: patch
                .contact_email
                .clone()
                .unwrap_or_else(|| self.contact_email.clone()),
            contact_phone: patch
                .contact_phone
                .clone()
                .unwrap_or_else(|| self.contact_phone.clone()),
            website: patch.website.clone().or_else(|| self.website.clone()),
        })
    }
}

/// Unvalidated input for creating an organization.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewOrganization {
    pub name: String,
    pub college: String,
    pub description: Option<String>,
    pub contact_email: String,
    pub contact_phone: String,
    pub website: Option<String>,
}

/// Partial update; `None` keeps the current value.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrganizationPatch {
    pub name: Option<String>,
    pub college: Option<String>,
    pub description: Option<String>,
    pub contact_email: Option<String>,
    pub contact_phone: Option<String>,
    pub website: Option<String>,
}

/// One row of the organization membership table, keyed by (user, org).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrgMembership {
    pub user_id: UserId,
    pub role: Role,
    pub joined_at: DateTime<Utc>,
}

// ─────────────────────────────────────────────────────────────────────────────
// Aggregate
// ─────────────────────────────────────────────────────────────────────────────

/// Aggregate root: Organization and its memberships.
///
/// # Invariants
/// - Exactly one owner, who always holds a LEADER membership.
/// - At most one membership per user.
/// - The owner is never removed, never leaves, and changes only by transfer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Organization {
    id: OrganizationId,
    owner_id: Option<UserId>,
    code: Option<JoinCode>,
    details: Option<OrganizationDetails>,
    members: BTreeMap<UserId, OrgMembership>,
    created_at: Option<DateTime<Utc>>,
    version: u64,
}

impl Organization {
    /// Create an empty, not-yet-created aggregate instance.
    pub fn empty(id: OrganizationId) -> Self {
        Self {
            id,
            owner_id: None,
            code: None,
            details: None,
            members: BTreeMap::new(),
            created_at: None,
            version: 0,
        }
    }

    pub fn is_created(&self) -> bool {
        self.owner_id.is_some()
    }

    pub fn id_typed(&self) -> OrganizationId {
        self.id
    }

    /// Owner of a created organization.
    pub fn owner_id(&self) -> DomainResult<UserId> {
        self.owner_id.ok_or_else(|| DomainError::not_found("organization"))
    }

    pub fn is_owner(&self, user_id: UserId) -> bool {
        self.owner_id == Some(user_id)
    }

    pub fn code(&self) -> Option<&JoinCode> {
        self.code.as_ref()
    }

    pub fn details(&self) -> Option<&OrganizationDetails> {
        self.details.as_ref()
    }

    pub fn name(&self) -> &str {
        self.details.as_ref().map(|d| d.name.as_str()).unwrap_or_default()
    }

    pub fn created_at(&self) -> Option<DateTime<Utc>> {
        self.created_at
    }

    pub fn role_of(&self, user_id: UserId) -> Option<Role> {
        self.members.get(&user_id).map(|m| m.role)
    }

    pub fn membership(&self, user_id: UserId) -> Option<&OrgMembership> {
        self.members.get(&user_id)
    }

    pub fn members(&self) -> impl Iterator<Item = &OrgMembership> {
        self.members.values()
    }

    pub fn member_count(&self) -> usize {
        self.members.len()
    }

    /// Verify the ownership invariants hold.
    pub fn check_invariants(&self) -> DomainResult<()> {
        let owner = self.owner_id()?;
        match self.role_of(owner) {
            Some(Role::Leader) => Ok(()),
            Some(role) => Err(DomainError::conflict(format!(
                "owner holds role {role}, expected leader"
            ))),
            None => Err(DomainError::conflict("owner has no membership")),
        }
    }

    /// Deleting an organization is reserved to its owner.
    pub fn ensure_can_delete(&self, actor: UserId) -> DomainResult<()> {
        self.ensure_created()?;
        self.ensure_owner(actor, "delete this organization")
    }

    fn ensure_created(&self) -> DomainResult<()> {
        if !self.is_created() {
            return Err(DomainError::not_found("organization"));
        }
        Ok(())
    }

    fn ensure_owner(&self, actor: UserId, action: &str) -> DomainResult<()> {
        if !self.is_owner(actor) {
            return Err(DomainError::forbidden(format!("only the owner may {action}")));
        }
        Ok(())
    }

    fn require(&self, actor: UserId, required: Requirement) -> DomainResult<Role> {
        Ok(authorize(Scope::Organization, self.role_of(actor), required)?)
    }

    fn ensure_member(&self, user_id: UserId) -> DomainResult<&OrgMembership> {
        self.members
            .get(&user_id)
            .ok_or_else(|| DomainError::not_found("organization membership"))
    }
}

impl AggregateRoot for Organization {
    type Id = OrganizationId;

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
pub struct CreateOrganization {
    pub org_id: OrganizationId,
    pub owner_id: UserId,
    pub code: JoinCode,
    pub input: NewOrganization,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateOrganization {
    pub actor: UserId,
    pub patch: OrganizationPatch,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JoinOrganization {
    pub user_id: UserId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeaveOrganization {
    pub user_id: UserId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeMemberRole {
    pub actor: UserId,
    pub user_id: UserId,
    pub role: Role,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoveMember {
    pub actor: UserId,
    pub user_id: UserId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferOwnership {
    pub actor: UserId,
    pub new_owner_id: UserId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrganizationCommand {
    Create(CreateOrganization),
    Update(UpdateOrganization),
    Join(JoinOrganization),
    Leave(LeaveOrganization),
    ChangeMemberRole(ChangeMemberRole),
    RemoveMember(RemoveMember),
    TransferOwnership(TransferOwnership),
}

// ─────────────────────────────────────────────────────────────────────────────
// Events
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrganizationEvent {
    Created {
        org_id: OrganizationId,
        owner_id: UserId,
        code: JoinCode,
        details: OrganizationDetails,
        occurred_at: DateTime<Utc>,
    },
    DetailsUpdated {
        details: OrganizationDetails,
        occurred_at: DateTime<Utc>,
    },
    MemberJoined {
        user_id: UserId,
        role: Role,
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
    MemberRemoved {
        user_id: UserId,
        removed_by: UserId,
        occurred_at: DateTime<Utc>,
    },
    OwnershipTransferred {
        from: UserId,
        to: UserId,
        occurred_at: DateTime<Utc>,
    },
}

impl DomainEvent for OrganizationEvent {
    fn event_type(&self) -> &'static str {
        match self {
            OrganizationEvent::Created { .. } => "organization.created",
            OrganizationEvent::DetailsUpdated { .. } => "organization.details_updated",
            OrganizationEvent::MemberJoined { .. } => "organization.member_joined",
            OrganizationEvent::MemberLeft { .. } => "organization.member_left",
            OrganizationEvent::MemberRoleChanged { .. } => "organization.member_role_changed",
            OrganizationEvent::MemberRemoved { .. } => "organization.member_removed",
            OrganizationEvent::OwnershipTransferred { .. } => "organization.ownership_transferred",
        }
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            OrganizationEvent::Created { occurred_at, .. }
            | OrganizationEvent::DetailsUpdated { occurred_at, .. }
            | OrganizationEvent::MemberJoined { occurred_at, .. }
            | OrganizationEvent::MemberLeft { occurred_at, .. }
            | OrganizationEvent::MemberRoleChanged { occurred_at, .. }
            | OrganizationEvent::MemberRemoved { occurred_at, .. }
            | OrganizationEvent::OwnershipTransferred { occurred_at, .. } => *occurred_at,
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Aggregate Implementation
// ─────────────────────────────────────────────────────────────────────────────

impl Aggregate for Organization {
    type Command = OrganizationCommand;
    type Event = OrganizationEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            OrganizationEvent::Created {
                org_id,
                owner_id,
                code,
                details,
                occurred_at,
            } => {
                self.id = *org_id;
                self.owner_id = Some(*owner_id);
                self.code = Some(code.clone());
                self.details = Some(details.clone());
                self.created_at = Some(*occurred_at);
                self.members.insert(
                    *owner_id,
                    OrgMembership {
                        user_id: *owner_id,
                        role: Role::Leader,
                        joined_at: *occurred_at,
                    },
                );
            }
            OrganizationEvent::DetailsUpdated { details, .. } => {
                self.details = Some(details.clone());
            }
            OrganizationEvent::MemberJoined {
                user_id,
                role,
                occurred_at,
            } => {
                self.members.insert(
                    *user_id,
                    OrgMembership {
                        user_id: *user_id,
                        role: *role,
                        joined_at: *occurred_at,
                    },
                );
            }
            OrganizationEvent::MemberLeft { user_id, .. }
            | OrganizationEvent::MemberRemoved { user_id, .. } => {
                self.members.remove(user_id);
            }
            OrganizationEvent::MemberRoleChanged { user_id, to, .. } => {
                if let Some(m) = self.members.get_mut(user_id) {
                    m.role = *to;
                }
            }
            OrganizationEvent::OwnershipTransferred { to, .. } => {
                self.owner_id = Some(*to);
            }
        }

        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            OrganizationCommand::Create(cmd) => self.handle_create(cmd),
            OrganizationCommand::Update(cmd) => self.handle_update(cmd),
            OrganizationCommand::Join(cmd) => self.handle_join(cmd),
            OrganizationCommand::Leave(cmd) => self.handle_leave(cmd),
            OrganizationCommand::ChangeMemberRole(cmd) => self.handle_change_role(cmd),
            OrganizationCommand::RemoveMember(cmd) => self.handle_remove(cmd),
            OrganizationCommand::TransferOwnership(cmd) => self.handle_transfer(cmd),
        }
    }
}

impl Organization {
    // ─────────────────────────────────────────────────────────────────────────
    // Command Handlers
    // ─────────────────────────────────────────────────────────────────────────

    fn handle_create(&self, cmd: &CreateOrganization) -> DomainResult<Vec<OrganizationEvent>> {
        if self.is_created() {
            return Err(DomainError::conflict("organization already exists"));
        }
        let details = OrganizationDetails::new(cmd.input.clone())?;

        Ok(vec![OrganizationEvent::Created {
            org_id: cmd.org_id,
            owner_id: cmd.owner_id,
            code: cmd.code.clone(),
            details,
            occurred_at: cmd.occurred_at,
        }])
    }

    fn handle_update(&self, cmd: &UpdateOrganization) -> DomainResult<Vec<OrganizationEvent>> {
        self.ensure_created()?;
        self.ensure_owner(cmd.actor, "update this organization")?;

        let current = self
            .details
            .as_ref()
            .ok_or_else(|| DomainError::not_found("organization"))?;
        let details = current.patched(&cmd.patch)?;
        if &details == current {
            return Ok(vec![]);
        }

        Ok(vec![OrganizationEvent::DetailsUpdated {
            details,
            occurred_at: cmd.occurred_at,
        }])
    }

    fn handle_join(&self, cmd: &JoinOrganization) -> DomainResult<Vec<OrganizationEvent>> {
        self.ensure_created()?;
        if self.members.contains_key(&cmd.user_id) {
            return Err(DomainError::conflict(
                "already a member of this organization",
            ));
        }

        Ok(vec![OrganizationEvent::MemberJoined {
            user_id: cmd.user_id,
            role: Role::Member,
            occurred_at: cmd.occurred_at,
        }])
    }

    fn handle_leave(&self, cmd: &LeaveOrganization) -> DomainResult<Vec<OrganizationEvent>> {
        self.ensure_created()?;
        if self.is_owner(cmd.user_id) {
            return Err(DomainError::conflict(
                "the owner cannot leave; transfer ownership or delete the organization instead",
            ));
        }
        self.ensure_member(cmd.user_id)?;

        Ok(vec![OrganizationEvent::MemberLeft {
            user_id: cmd.user_id,
            occurred_at: cmd.occurred_at,
        }])
    }

    fn handle_change_role(&self, cmd: &ChangeMemberRole) -> DomainResult<Vec<OrganizationEvent>> {
        self.ensure_created()?;
        self.require(cmd.actor, Requirement::Leader)?;

        if self.is_owner(cmd.user_id) {
            return Err(DomainError::forbidden(
                "the owner's role cannot be changed; transfer ownership first",
            ));
        }
        let current = self.ensure_member(cmd.user_id)?.role;
        if current == cmd.role {
            return Ok(vec![]);
        }

        Ok(vec![OrganizationEvent::MemberRoleChanged {
            user_id: cmd.user_id,
            from: current,
            to: cmd.role,
            occurred_at: cmd.occurred_at,
        }])
    }

    fn handle_remove(&self, cmd: &RemoveMember) -> DomainResult<Vec<OrganizationEvent>> {
        self.ensure_created()?;
        let actor_role = self.require(cmd.actor, Requirement::Admin)?;

        if self.is_owner(cmd.user_id) {
            return Err(DomainError::forbidden("the organization owner cannot be removed"));
        }
        let target = self.ensure_member(cmd.user_id)?;
        if target.role.outranks(actor_role) {
            return Err(DomainError::forbidden("co-leaders cannot remove leaders"));
        }

        Ok(vec![OrganizationEvent::MemberRemoved {
            user_id: cmd.user_id,
            removed_by: cmd.actor,
            occurred_at: cmd.occurred_at,
        }])
    }

    fn handle_transfer(&self, cmd: &TransferOwnership) -> DomainResult<Vec<OrganizationEvent>> {
        self.ensure_created()?;
        self.ensure_owner(cmd.actor, "transfer ownership")?;

        if cmd.new_owner_id == cmd.actor {
            return Err(DomainError::validation("already the owner of this organization"));
        }
        let target = self.members.get(&cmd.new_owner_id).ok_or_else(|| {
            DomainError::validation("the new owner must be a member of the organization")
        })?;

        let mut events = Vec::with_capacity(2);
        if target.role != Role::Leader {
            events.push(OrganizationEvent::MemberRoleChanged {
                user_id: cmd.new_owner_id,
                from: target.role,
                to: Role::Leader,
                occurred_at: cmd.occurred_at,
            });
        }
        events.push(OrganizationEvent::OwnershipTransferred {
            from: cmd.actor,
            to: cmd.new_owner_id,
            occurred_at: cmd.occurred_at,
        });
        Ok(events)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
