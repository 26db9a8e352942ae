//! Access policy.
//!
//! Every role decision in the service goes through one of these functions so
//! that handlers and engines never test role membership on their own.

use crate::{auth::Role, models::leave::RequestStatus};

/// Which leave requests a caller may see.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListScope {
    All,
    Own,
}

/// Whether `role` may move a request from `from` to `to`. `is_self` is true when
/// the reviewer is also the requester.
pub fn can_transition(role: Role, from: RequestStatus, to: RequestStatus, is_self: bool) -> bool {
    let legal = matches!(
        (from, to),
        (RequestStatus::Pending, RequestStatus::Approved)
            | (RequestStatus::Pending, RequestStatus::Rejected)
    );
    if !legal {
        return false;
    }
    match role {
        Role::Admin => true,
        Role::Manager => !is_self,
        Role::Specialist | Role::Viewer => false,
    }
}

pub fn can_list(role: Role) -> ListScope {
    if role.is_reviewer() {
        ListScope::All
    } else {
        ListScope::Own
    }
}

pub fn can_delete(role: Role) -> bool {
    role.is_admin()
}

pub fn can_award(role: Role) -> bool {
    matches!(role, Role::Admin | Role::Manager | Role::Specialist)
}

pub fn can_revoke(role: Role) -> bool {
    role.is_reviewer()
}

pub fn can_view_department(role: Role, own_department: &str, department: &str) -> bool {
    role.is_reviewer() || own_department == department
}

pub fn can_manage_users(role: Role) -> bool {
    role.is_admin()
}

pub fn can_view_users(role: Role) -> bool {
    role.is_reviewer()
}
