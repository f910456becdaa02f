use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::domain::{CompanyId, StudentId};
use crate::config::AdminConfig;

/// The two institutional review tiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AdminTier {
    /// Recommends or declines applications.
    Tier1,
    /// Approves applications that tier 1 recommended.
    Tier2,
}

impl AdminTier {
    pub const fn label(self) -> &'static str {
        match self {
            AdminTier::Tier1 => "tier-1",
            AdminTier::Tier2 => "tier-2",
        }
    }
}

impl fmt::Display for AdminTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Student,
    Company,
    Tier1Admin,
    Tier2Admin,
}

impl Role {
    pub const fn label(self) -> &'static str {
        match self {
            Role::Student => "student",
            Role::Company => "company",
            Role::Tier1Admin => "tier1_admin",
            Role::Tier2Admin => "tier2_admin",
        }
    }
}

impl FromStr for Role {
    type Err = IdentityError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "student" => Ok(Role::Student),
            "company" => Ok(Role::Company),
            "tier1_admin" | "tier1" => Ok(Role::Tier1Admin),
            "tier2_admin" | "tier2" => Ok(Role::Tier2Admin),
            other => Err(IdentityError::UnknownRole(other.to_string())),
        }
    }
}

/// Authenticated caller of a workflow operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "role", content = "identity", rename_all = "snake_case")]
pub enum Actor {
    Student(StudentId),
    Company(CompanyId),
    Admin(AdminTier),
}

impl Actor {
    pub fn role(&self) -> Role {
        match self {
            Actor::Student(_) => Role::Student,
            Actor::Company(_) => Role::Company,
            Actor::Admin(AdminTier::Tier1) => Role::Tier1Admin,
            Actor::Admin(AdminTier::Tier2) => Role::Tier2Admin,
        }
    }
}

impl fmt::Display for Actor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Actor::Student(id) => write!(f, "student {id}"),
            Actor::Company(id) => write!(f, "company {id}"),
            Actor::Admin(tier) => write!(f, "{tier} admin"),
        }
    }
}

/// Unverified identity presented by the presentation layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdentityClaim {
    pub role: Role,
    pub identity: String,
    pub secret: Option<String>,
}

/// Resolves claims into actors before any workflow call is made.
pub trait IdentityProvider: Send + Sync {
    fn resolve(&self, claim: &IdentityClaim) -> Result<Actor, IdentityError>;
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum IdentityError {
    #[error("caller identity is missing")]
    MissingIdentity,
    #[error("unknown role '{0}'")]
    UnknownRole(String),
    #[error("no {0} admin account is configured")]
    TierNotConfigured(AdminTier),
    #[error("invalid admin credentials")]
    InvalidCredentials,
}

#[derive(Clone, PartialEq, Eq)]
pub struct AdminAccount {
    pub tier: AdminTier,
    pub username: String,
    pub secret: String,
}

impl fmt::Debug for AdminAccount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AdminAccount")
            .field("tier", &self.tier)
            .field("username", &self.username)
            .field("secret", &"<redacted>")
            .finish()
    }
}

/// Trusts student and company claims as supplied and checks admin claims
/// against the configured accounts.
#[derive(Debug, Clone, Default)]
pub struct ConfiguredIdentityProvider {
    admins: Vec<AdminAccount>,
}

impl ConfiguredIdentityProvider {
    pub fn new(admins: Vec<AdminAccount>) -> Self {
        Self { admins }
    }

    pub fn from_config(config: &AdminConfig) -> Self {
        Self::new(config.accounts())
    }

    fn admin(&self, tier: AdminTier, claim: &IdentityClaim) -> Result<Actor, IdentityError> {
        let mut accounts = self
            .admins
            .iter()
            .filter(|account| account.tier == tier)
            .peekable();
        if accounts.peek().is_none() {
            return Err(IdentityError::TierNotConfigured(tier));
        }

        let secret = claim.secret.as_deref().unwrap_or_default();
        accounts
            .find(|account| account.username == claim.identity && account.secret == secret)
            .map(|_| Actor::Admin(tier))
            .ok_or(IdentityError::InvalidCredentials)
    }
}

impl IdentityProvider for ConfiguredIdentityProvider {
    fn resolve(&self, claim: &IdentityClaim) -> Result<Actor, IdentityError> {
        if claim.identity.trim().is_empty() {
            return Err(IdentityError::MissingIdentity);
        }

        match claim.role {
            Role::Student => Ok(Actor::Student(StudentId::from_email(&claim.identity))),
            Role::Company => Ok(Actor::Company(CompanyId::from_email(&claim.identity))),
            Role::Tier1Admin => self.admin(AdminTier::Tier1, claim),
            Role::Tier2Admin => self.admin(AdminTier::Tier2, claim),
        }
    }
}
