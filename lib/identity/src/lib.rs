//! Identity model and provider plugin contract for warden.
//!
//! This crate provides:
//! - Typed outcomes (`IdentityAction`) and the request/response types for
//!   authenticate, revoke and callback flows
//! - Anonymous and authenticated sessions (`Session`)
//! - Resources, security profiles and assignments, with the pattern rules
//!   used to match them
//! - The `IdentityProvider` trait implemented by authentication plugins and
//!   the `ProviderFactory` used to construct them
//!
//! # Example
//!
//! ```
//! use warden_identity::{IdentityAssignment, SecurityProfile};
//!
//! let profile = SecurityProfile::new("dashboards")
//!     .with_provider("corp-sso")
//!     .with_priority(10)
//!     .with_assignment(
//!         IdentityAssignment::new("dash-admins", "app:dashboard:*")
//!             .with_roles(["admin*"])
//!             .with_permissions(["read", "write"]),
//!     );
//!
//! let assignment = profile.assignment("dash-admins").unwrap();
//! assert!(assignment.applies_to("app:dashboard:home"));
//! assert!(assignment.grants_role("admin:plant-1"));
//! ```

pub mod action;
pub mod error;
pub mod profile;
pub mod provider;
pub mod request;
pub mod resource;
pub mod response;
pub mod role;
pub mod session;
pub mod user;
pub mod volume;

pub use action::{ActionType, IdentityAction};
pub use error::ProviderError;
pub use profile::{IdentityAssignment, SecurityProfile};
pub use provider::{
    IDENTITY_CATEGORY, IdentityProvider, ProviderConfiguration, ProviderFactory, SecurityContext,
};
pub use request::{
    AuthenticationRequest, CallbackRequest, Parameters, RequestConnection, SessionCloseRequest,
};
pub use resource::{IdentityResource, ResourceType, resource_matches};
pub use response::{AuthenticationResponse, CallbackResponse, SessionCloseResponse};
pub use role::{RoleSet, WILDCARD, role_matches};
pub use session::{AnonymousSession, AuthenticatedSession, Session, SessionId};
pub use user::IdentityUser;
pub use volume::{DirectoryVolume, Volume};
pub use warden_core::RequestId;
