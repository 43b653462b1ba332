//! Route handlers, one module per resource.

pub mod admin;
pub mod applications;
pub mod associations;
pub mod donations;
pub mod messages;
pub mod notifications;
pub mod offers;
pub mod reviews;
pub mod session;
pub mod users;

use alms_core::{
  authz::{Action, Target, authorize},
  session::Principal,
};

use crate::error::ApiError;

/// Reject anyone who is not an administrator.
pub(crate) fn require_admin(principal: &Principal) -> Result<(), ApiError> {
  authorize(Some(principal), Action::Administer, Target::System).into_result()?;
  Ok(())
}
