//! Users module
//!
//! Registration, admin-facing user management and refresh-token bookkeeping
//! on top of the credential store.

pub mod api;
pub mod service;

pub use api::{UserApiState, user_api_router};
pub use service::{CreateUser, RegisterUser, UserError, UserService};
