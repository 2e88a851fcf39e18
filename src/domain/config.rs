use std::{collections::BTreeMap, path::Path};

use serde::{Deserialize, Serialize};

use crate::domain::{Actor, IdentityProvider, Role};

/// Configuration for a work-order store.
///
/// Holds the user registry that backs the CLI's identity provider: a mapping
/// from user identifier to assigned role. Stored as TOML with a `_version`
/// tag so the format can evolve without breaking existing stores.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Versions", into = "Versions")]
pub struct Config {
    /// Registered users keyed by identifier.
    users: BTreeMap<String, Role>,
}

impl Config {
    /// Loads the configuration from a TOML file at the given path.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or if the TOML content is
    /// invalid.
    pub fn load(path: &Path) -> Result<Self, String> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| format!("Failed to read config file: {e}"))?;
        toml::from_str(&content).map_err(|e| format!("Failed to parse config file: {e}"))
    }

    /// Saves the configuration to a TOML file at the given path.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration cannot be serialized to TOML or
    /// if the file cannot be written.
    pub fn save(&self, path: &Path) -> Result<(), String> {
        let content =
            toml::to_string_pretty(self).map_err(|e| format!("Failed to serialize config: {e}"))?;
        std::fs::write(path, content).map_err(|e| format!("Failed to write config file: {e}"))
    }

    /// The role registered for `user`, or [`Role::None`] if unregistered.
    #[must_use]
    pub fn role_of(&self, user: &str) -> Role {
        self.users.get(user).copied().unwrap_or(Role::None)
    }

    /// Register `user` with `role`, replacing any previous assignment.
    ///
    /// Returns the previous role, if the user was already registered.
    pub fn set_role(&mut self, user: String, role: Role) -> Option<Role> {
        self.users.insert(user, role)
    }

    /// Remove `user` from the registry.
    ///
    /// Returns `true` if the user was registered.
    pub fn remove_user(&mut self, user: &str) -> bool {
        self.users.remove(user).is_some()
    }

    /// Iterate over registered users and their roles.
    pub fn users(&self) -> impl Iterator<Item = (&str, Role)> {
        self.users.iter().map(|(name, &role)| (name.as_str(), role))
    }
}

impl IdentityProvider for Config {
    fn resolve(&self, user: &str) -> Actor {
        Actor::new(user, self.role_of(user))
    }
}

/// The serialized versions of the configuration.
/// This allows for future changes to the configuration format and to the
/// domain type without breaking compatibility.
#[derive(Debug, Serialize, Deserialize)]
#[serde(tag = "_version")]
enum Versions {
    #[serde(rename = "1")]
    V1 {
        #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
        users: BTreeMap<String, Role>,
    },
}

impl From<Versions> for Config {
    fn from(versions: Versions) -> Self {
        match versions {
            Versions::V1 { users } => Self { users },
        }
    }
}

impl From<Config> for Versions {
    fn from(config: Config) -> Self {
        Self::V1 {
            users: config.users,
        }
    }
}
