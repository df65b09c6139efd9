use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// A scope string outside the known set
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid scope: {0}")]
pub struct InvalidScope(pub String);

/// Logical access class of a record
///
/// Unknown scope strings are rejected when parsing or deserializing, so a
///  `Scope` value is always routable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Scope {
    Private,
    Public,
    Machine,
    User,
}

/// The two backend instances scopes are routed to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendClass {
    Local,
    Public,
}

impl Scope {
    pub const ALL: [Scope; 4] = [Scope::Private, Scope::Public, Scope::Machine, Scope::User];

    pub fn as_str(&self) -> &'static str {
        match self {
            Scope::Private => "private",
            Scope::Public => "public",
            Scope::Machine => "machine",
            Scope::User => "user",
        }
    }

    /// Backend class this scope is stored in
    pub fn class(&self) -> BackendClass {
        match self {
            Scope::Private | Scope::Machine => BackendClass::Local,
            Scope::Public | Scope::User => BackendClass::Public,
        }
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Scope {
    type Err = InvalidScope;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Scope::ALL
            .into_iter()
            .find(|scope| scope.as_str() == s)
            .ok_or_else(|| InvalidScope(s.to_string()))
    }
}

impl fmt::Display for BackendClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BackendClass::Local => f.write_str("local"),
            BackendClass::Public => f.write_str("public"),
        }
    }
}
