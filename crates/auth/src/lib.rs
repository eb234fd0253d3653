//! `clubhouse-auth`: identity and the role-based authorization predicate.
//!
//! This crate is intentionally decoupled from HTTP and storage: it decides,
//! given a resolved role, whether an operation may proceed.

pub mod authorize;
pub mod claims;
pub mod principal;
pub mod roles;
pub mod user;

pub use authorize::{AuthzError, Requirement, Scope, authorize};
pub use claims::{Claims, TokenValidationError, validate_claims};
pub use principal::CurrentUser;
pub use roles::Role;
pub use user::{RegisterUser, User};
