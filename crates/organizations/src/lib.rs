//! `clubhouse-organizations`: the Organization aggregate and its join codes.

pub mod join_code;
pub mod organization;

pub use join_code::{JoinCode, MIN_CODE_LEN};
pub use organization::{
    ChangeMemberRole, CreateOrganization, JoinOrganization, LeaveOrganization, NewOrganization,
    OrgMembership, Organization, OrganizationCommand, OrganizationDetails, OrganizationEvent,
    OrganizationPatch, RemoveMember, TransferOwnership, UpdateOrganization,
};
