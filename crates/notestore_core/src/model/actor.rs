//! Caller identity passed through to repositories.
//!
//! Core never interprets an `Actor`; repositories may record it for audit.

use serde::{Deserialize, Serialize};

const ANONYMOUS_USER: &str = "anonymous";

/// Identity of the caller issuing a mutation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    pub user: String,
    pub roles: Vec<String>,
}

impl Actor {
    /// Identity used when no authenticated principal exists.
    pub fn anonymous() -> Self {
        Self::user(ANONYMOUS_USER)
    }

    pub fn user(name: impl Into<String>) -> Self {
        Self {
            user: name.into(),
            roles: Vec::new(),
        }
    }

    pub fn with_roles(mut self, roles: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.roles = roles.into_iter().map(Into::into).collect();
        self
    }

    pub fn is_anonymous(&self) -> bool {
        self.user == ANONYMOUS_USER
    }
}

impl Default for Actor {
    fn default() -> Self {
        Self::anonymous()
    }
}
