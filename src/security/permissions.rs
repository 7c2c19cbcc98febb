use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Permission {
    #[serde(rename = "finance.view")]
    FinanceView,
    #[serde(rename = "finance.manage")]
    FinanceManage,
    #[serde(rename = "payments.approve")]
    PaymentsApprove,
    #[serde(rename = "accounts.approve")]
    AccountsApprove,
    #[serde(rename = "jobs.view")]
    JobsView,
    #[serde(rename = "jobs.manage")]
    JobsManage,
    #[serde(rename = "projects.manage")]
    ProjectsManage,
    #[serde(rename = "tasks.manage")]
    TasksManage,
    #[serde(rename = "announcements.post")]
    AnnouncementsPost,
    #[serde(rename = "users.manage")]
    UsersManage,
    #[serde(rename = "roles.manage")]
    RolesManage,
    #[serde(rename = "messaging.use")]
    MessagingUse,
}

impl Permission {
    pub const ALL: [Permission; 12] = [
        Self::FinanceView,
        Self::FinanceManage,
        Self::PaymentsApprove,
        Self::AccountsApprove,
        Self::JobsView,
        Self::JobsManage,
        Self::ProjectsManage,
        Self::TasksManage,
        Self::AnnouncementsPost,
        Self::UsersManage,
        Self::RolesManage,
        Self::MessagingUse,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::FinanceView => "finance.view",
            Self::FinanceManage => "finance.manage",
            Self::PaymentsApprove => "payments.approve",
            Self::AccountsApprove => "accounts.approve",
            Self::JobsView => "jobs.view",
            Self::JobsManage => "jobs.manage",
            Self::ProjectsManage => "projects.manage",
            Self::TasksManage => "tasks.manage",
            Self::AnnouncementsPost => "announcements.post",
            Self::UsersManage => "users.manage",
            Self::RolesManage => "roles.manage",
            Self::MessagingUse => "messaging.use",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::FinanceView => "View finance records",
            Self::FinanceManage => "Create and edit finance records",
            Self::PaymentsApprove => "Approve or reject payment instructions",
            Self::AccountsApprove => "Approve or reject account heads",
            Self::JobsView => "View service jobs",
            Self::JobsManage => "Create and edit service jobs",
            Self::ProjectsManage => "Create and edit projects",
            Self::TasksManage => "Manage every task",
            Self::AnnouncementsPost => "Post announcements",
            Self::UsersManage => "Manage users",
            Self::RolesManage => "Manage roles",
            Self::MessagingUse => "Use messaging",
        }
    }
}

impl fmt::Display for Permission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Unknown permission '{0}'")]
pub struct UnknownPermission(pub String);

impl FromStr for Permission {
    type Err = UnknownPermission;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .copied()
            .find(|p| p.as_str() == s.trim())
            .ok_or_else(|| UnknownPermission(s.to_string()))
    }
}

/// Flat set of granted permissions.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PermissionSet(HashSet<Permission>);

impl PermissionSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn all() -> Self {
        Self(Permission::ALL.into_iter().collect())
    }

    /// Parses stored permission strings. Unknown entries are skipped so a
    /// role saved by a newer build does not lock users out.
    pub fn from_stored(values: &[String]) -> Self {
        Self(
            values
                .iter()
                .filter_map(|v| match v.parse::<Permission>() {
                    Ok(p) => Some(p),
                    Err(e) => {
                        log::warn!("Ignoring stored permission: {}", e);
                        None
                    }
                })
                .collect(),
        )
    }

    /// Strict parse used when saving a role.
    pub fn parse_strict(values: &[String]) -> Result<Self, UnknownPermission> {
        values
            .iter()
            .map(|v| v.parse::<Permission>())
            .collect::<Result<HashSet<_>, _>>()
            .map(Self)
    }

    pub fn contains(&self, permission: Permission) -> bool {
        self.0.contains(&permission)
    }

    pub fn insert(&mut self, permission: Permission) {
        self.0.insert(permission);
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Sorted string form, as stored in `roles.permissions`.
    pub fn to_strings(&self) -> Vec<String> {
        let mut perms: Vec<Permission> = self.0.iter().copied().collect();
        perms.sort();
        perms.into_iter().map(|p| p.as_str().to_string()).collect()
    }
}

impl FromIterator<Permission> for PermissionSet {
    fn from_iter<I: IntoIterator<Item = Permission>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// Roles created by `pulse seed`.
pub struct SystemRole {
    pub name: &'static str,
    pub description: &'static str,
    pub permissions: &'static [Permission],
}

pub const ADMIN_ROLE: &str = "Administrator";

pub fn system_roles() -> Vec<SystemRole> {
    use Permission::*;
    vec![
        SystemRole {
            name: ADMIN_ROLE,
            description: "Full access to every module",
            permissions: &Permission::ALL,
        },
        SystemRole {
            name: "Finance Manager",
            description: "Finance records, payment and account approvals",
            permissions: &[
                FinanceView,
                FinanceManage,
                PaymentsApprove,
                AccountsApprove,
                JobsView,
                MessagingUse,
            ],
        },
        SystemRole {
            name: "Operations",
            description: "Projects, service jobs and team tasks",
            permissions: &[
                JobsView,
                JobsManage,
                ProjectsManage,
                TasksManage,
                AnnouncementsPost,
                MessagingUse,
            ],
        },
        SystemRole {
            name: "Staff",
            description: "Own tasks, assigned jobs and messaging",
            permissions: &[JobsView, MessagingUse],
        },
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_trip_strings() {
        for p in Permission::ALL {
            assert_eq!(p.as_str().parse::<Permission>().unwrap(), p);
        }
        assert!("finance.delete".parse::<Permission>().is_err());
    }

    #[test]
    fn test_serde_uses_dotted_names() {
        let json = serde_json::to_string(&Permission::PaymentsApprove).unwrap();
        assert_eq!(json, "\"payments.approve\"");
        let p: Permission = serde_json::from_str("\"messaging.use\"").unwrap();
        assert_eq!(p, Permission::MessagingUse);
    }

    #[test]
    fn test_from_stored_skips_unknown() {
        let set = PermissionSet::from_stored(&[
            "jobs.view".to_string(),
            "legacy.thing".to_string(),
        ]);
        assert_eq!(set.len(), 1);
        assert!(set.contains(Permission::JobsView));
    }

    #[test]
    fn test_parse_strict_rejects_unknown() {
        let err = PermissionSet::parse_strict(&["jobs.view".into(), "nope".into()]).unwrap_err();
        assert_eq!(err.0, "nope");
    }

    #[test]
    fn test_to_strings_sorted_and_deduplicated() {
        let set: PermissionSet = [
            Permission::MessagingUse,
            Permission::FinanceView,
            Permission::FinanceView,
        ]
        .into_iter()
        .collect();
        assert_eq!(set.to_strings(), vec!["finance.view", "messaging.use"]);
    }

    #[test]
    fn test_admin_role_has_everything() {
        let roles = system_roles();
        let admin = roles.iter().find(|r| r.name == ADMIN_ROLE).unwrap();
        assert_eq!(admin.permissions.len(), Permission::ALL.len());
        assert!(roles.iter().all(|r| r
            .permissions
            .contains(&Permission::MessagingUse)));
    }
}
