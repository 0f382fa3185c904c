//! Worker roles and how they are assigned to threads.

use crate::target::Operation;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Workload a single worker thread generates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum WorkerRole {
    /// One uniquely keyed write per iteration
    #[default]
    Store,
    /// Reads of a partner thread's keys after a warm-up delay
    Retrieve,
    /// Read-only queries over a fixed vocabulary
    Search,
    /// Store, retrieve and search in rotation
    Mixed,
}

impl WorkerRole {
    /// Every role, in report order
    pub const ALL: [Self; 4] = [Self::Store, Self::Retrieve, Self::Search, Self::Mixed];

    /// Operation issued on a given iteration
    #[must_use]
    pub const fn operation_for(self, iteration: u64) -> Operation {
        match self {
            Self::Store => Operation::Store,
            Self::Retrieve => Operation::Retrieve,
            Self::Search => Operation::Search,
            Self::Mixed => match iteration % 3 {
                0 => Operation::Store,
                1 => Operation::Retrieve,
                _ => Operation::Search,
            },
        }
    }

    /// Whether workers of this role sleep before their first operation
    #[must_use]
    pub const fn needs_warmup(self) -> bool {
        matches!(self, Self::Retrieve)
    }

    /// Position in [`WorkerRole::ALL`]
    #[must_use]
    pub const fn index(self) -> usize {
        self as usize
    }
}

impl fmt::Display for WorkerRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Store => write!(f, "store"),
            Self::Retrieve => write!(f, "retrieve"),
            Self::Search => write!(f, "search"),
            Self::Mixed => write!(f, "mixed"),
        }
    }
}

impl std::str::FromStr for WorkerRole {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "store" | "write" => Ok(Self::Store),
            "retrieve" | "read" => Ok(Self::Retrieve),
            "search" | "query" => Ok(Self::Search),
            "mixed" => Ok(Self::Mixed),
            _ => Err(format!("Unknown worker role: {}", s)),
        }
    }
}

/// Maps worker indices to roles
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "policy", rename_all = "snake_case")]
pub enum RoleAssignment {
    /// Every worker runs the same role
    Uniform {
        /// Role for all workers
        role: WorkerRole,
    },
    /// Worker `i` runs `roles[i % roles.len()]`
    Distributed {
        /// Roles cycled over worker indices
        roles: Vec<WorkerRole>,
    },
}

impl Default for RoleAssignment {
    fn default() -> Self {
        Self::uniform(WorkerRole::Store)
    }
}

impl RoleAssignment {
    /// All workers run `role`
    #[must_use]
    pub const fn uniform(role: WorkerRole) -> Self {
        Self::Uniform { role }
    }

    /// Workers cycle through `roles`
    #[must_use]
    pub fn distributed(roles: impl Into<Vec<WorkerRole>>) -> Self {
        Self::Distributed {
            roles: roles.into(),
        }
    }

    /// Role for worker `index`. An empty distribution falls back to store.
    #[must_use]
    pub fn role_for(&self, index: usize) -> WorkerRole {
        match self {
            Self::Uniform { role } => *role,
            Self::Distributed { roles } if roles.is_empty() => WorkerRole::Store,
            Self::Distributed { roles } => roles[index % roles.len()],
        }
    }

    /// Build from a role list: one role is uniform, several are distributed
    #[must_use]
    pub fn from_roles(roles: Vec<WorkerRole>) -> Self {
        match roles.as_slice() {
            [single] => Self::uniform(*single),
            _ => Self::Distributed { roles },
        }
    }

    /// Distinct roles that `threads` workers will run, in [`WorkerRole::ALL`] order
    #[must_use]
    pub fn roles_in_use(&self, threads: usize) -> Vec<WorkerRole> {
        let mut used = [false; 4];
        for index in 0..threads {
            used[self.role_for(index).index()] = true;
        }
        WorkerRole::ALL
            .into_iter()
            .filter(|role| used[role.index()])
            .collect()
    }
}

impl fmt::Display for RoleAssignment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Uniform { role } => write!(f, "{} (uniform)", role),
            Self::Distributed { roles } => {
                let names: Vec<String> = roles.iter().map(ToString::to_string).collect();
                write!(f, "[{}]", names.join(", "))
            }
        }
    }
}
