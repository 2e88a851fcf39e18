use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

/// The role an identity provider has assigned to a user.
///
/// Roles are first-class: a user with no recognized profile carries
/// [`Role::None`] rather than being represented by a missing record.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Creates work orders; sees only their own.
    Requester,
    /// Moves orders from pending into progress.
    Approver,
    /// Closes orders out (completed or cancelled).
    Executor,
    /// No recognized profile; every privileged operation is denied.
    #[default]
    None,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Requester => "requester",
            Self::Approver => "approver",
            Self::Executor => "executor",
            Self::None => "none",
        })
    }
}

impl FromStr for Role {
    type Err = UnknownRoleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "requester" => Ok(Self::Requester),
            "approver" => Ok(Self::Approver),
            "executor" => Ok(Self::Executor),
            "none" => Ok(Self::None),
            other => Err(UnknownRoleError(other.to_string())),
        }
    }
}

/// Error returned when a role string is not recognized.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
#[error("unknown role '{0}': expected one of requester, approver, executor, none")]
pub struct UnknownRoleError(String);

/// A user acting on the system: an identifier plus their assigned role.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Actor {
    /// Opaque user identifier owned by the identity provider.
    pub id: String,
    /// The role the identity provider resolved for this user.
    pub role: Role,
}

impl Actor {
    /// Construct an actor from an identifier and role.
    pub fn new(id: impl Into<String>, role: Role) -> Self {
        Self {
            id: id.into(),
            role,
        }
    }
}

/// Resolves a user identifier to an [`Actor`].
///
/// The tracker never stores role data itself; it consults an implementation
/// of this trait once per call. Unknown users must resolve to [`Role::None`],
/// not an error.
pub trait IdentityProvider {
    /// Resolve the actor for the given user identifier.
    fn resolve(&self, user: &str) -> Actor;
}
