//! Declarative access rules for engagement and deletion.
//!
//! The engagement core trusts its callers; request handlers consult an
//! [`AccessPolicy`] before calling it.

use std::collections::HashSet;
use std::fmt;

use serde::Serialize;

/// An action a caller wants to perform on a content item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Operation {
    Engage,
    Disengage,
    Delete,
    Reconcile,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Operation::Engage => "engage",
            Operation::Disengage => "disengage",
            Operation::Delete => "delete",
            Operation::Reconcile => "reconcile",
        };
        f.write_str(name)
    }
}

pub trait AccessPolicy: Send + Sync {
    /// Whether `user_id` may perform `operation` on content owned by `content_owner_id`.
    fn allows(&self, operation: Operation, user_id: &str, content_owner_id: Option<&str>) -> bool;
}

/// Any caller may engage; owners and admins may delete; admins may reconcile.
#[derive(Debug, Clone, Default)]
pub struct OwnerOrAdminPolicy {
    admins: HashSet<String>,
}

impl OwnerOrAdminPolicy {
    pub fn new(admins: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            admins: admins.into_iter().map(Into::into).collect(),
        }
    }

    pub fn is_admin(&self, user_id: &str) -> bool {
        self.admins.contains(user_id)
    }
}

impl AccessPolicy for OwnerOrAdminPolicy {
    fn allows(&self, operation: Operation, user_id: &str, content_owner_id: Option<&str>) -> bool {
        match operation {
            Operation::Engage | Operation::Disengage => true,
            Operation::Delete => content_owner_id == Some(user_id) || self.is_admin(user_id),
            Operation::Reconcile => self.is_admin(user_id),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_anyone_may_engage() {
        let policy = OwnerOrAdminPolicy::default();
        assert!(policy.allows(Operation::Engage, "alice", Some("bob")));
        assert!(policy.allows(Operation::Disengage, "alice", None));
    }

    #[test]
    fn test_delete_requires_owner_or_admin() {
        let policy = OwnerOrAdminPolicy::new(["root"]);
        assert!(policy.allows(Operation::Delete, "bob", Some("bob")));
        assert!(policy.allows(Operation::Delete, "root", Some("bob")));
        assert!(!policy.allows(Operation::Delete, "alice", Some("bob")));
        assert!(!policy.allows(Operation::Delete, "alice", None));
    }

    #[test]
    fn test_reconcile_is_admin_only() {
        let policy = OwnerOrAdminPolicy::new(["root"]);
        assert!(policy.allows(Operation::Reconcile, "root", None));
        assert!(!policy.allows(Operation::Reconcile, "bob", Some("bob")));
    }
}
