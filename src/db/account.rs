/// Account database models
use crate::error::BankError;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// How long an activation code stays usable
pub const ACTIVATION_TOKEN_TTL_MINUTES: i64 = 20;

/// Banking roles
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Role {
    #[serde(rename = "ROLE_USER")]
    User,
    #[serde(rename = "ROLE_TELLER")]
    Teller,
    #[serde(rename = "ROLE_MANAGER")]
    Manager,
    #[serde(rename = "ROLE_ADMIN")]
    Admin,
    #[serde(rename = "ROLE_AUDITOR")]
    Auditor,
    #[serde(rename = "ROLE_API_USER")]
    ApiUser,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "ROLE_USER",
            Role::Teller => "ROLE_TELLER",
            Role::Manager => "ROLE_MANAGER",
            Role::Admin => "ROLE_ADMIN",
            Role::Auditor => "ROLE_AUDITOR",
            Role::ApiUser => "ROLE_API_USER",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = BankError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ROLE_USER" => Ok(Role::User),
            "ROLE_TELLER" => Ok(Role::Teller),
            "ROLE_MANAGER" => Ok(Role::Manager),
            "ROLE_ADMIN" => Ok(Role::Admin),
            "ROLE_AUDITOR" => Ok(Role::Auditor),
            "ROLE_API_USER" => Ok(Role::ApiUser),
            _ => Err(BankError::Internal(format!("Unknown role: {}", s))),
        }
    }
}

/// Postal address captured at registration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Address {
    pub street: String,
    pub city: String,
    pub county: String,
    pub postal_code: String,
    pub country: String,
}

/// User record in the database
#[derive(Debug, Clone)]
pub struct User {
    pub id: i64,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub password_hash: String,
    pub pin_hash: String,
    pub enabled: bool,
    pub account_locked: bool,
    pub address: Address,
    pub roles: Vec<Role>,
    pub created_at: DateTime<Utc>,
}

impl User {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }

    pub fn role_names(&self) -> Vec<String> {
        self.roles.iter().map(|r| r.as_str().to_string()).collect()
    }
}

/// Values for a user about to be inserted. Secrets are already hashed.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub password_hash: String,
    pub pin_hash: String,
    pub address: Address,
    pub created_at: DateTime<Utc>,
}

/// Activation token record
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActivationToken {
    pub id: i64,
    pub token: String,
    pub user_id: i64,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub validated_at: Option<DateTime<Utc>>,
}

impl ActivationToken {
    /// Expired once `now` is strictly after the expiry instant
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now > self.expires_at
    }

    pub fn is_consumed(&self) -> bool {
        self.validated_at.is_some()
    }
}

/// Activation token about to be stored
#[derive(Debug, Clone)]
pub struct NewActivationToken {
    pub token: String,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl NewActivationToken {
    /// A code valid for the standard window starting at `now`
    pub fn new(token: String, now: DateTime<Utc>) -> Self {
        Self {
            token,
            created_at: now,
            expires_at: now + Duration::minutes(ACTIVATION_TOKEN_TTL_MINUTES),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_round_trip_names() {
        for role in [
            Role::User,
            Role::Teller,
            Role::Manager,
            Role::Admin,
            Role::Auditor,
            Role::ApiUser,
        ] {
            assert_eq!(role.as_str().parse::<Role>().unwrap(), role);
        }
        assert!("ROLE_ROOT".parse::<Role>().is_err());
        assert!("role_user".parse::<Role>().is_err());
    }

    #[test]
    fn test_new_token_expires_after_twenty_minutes() {
        let now = Utc::now();
        let token = NewActivationToken::new("Ab12Cd".to_string(), now);
        assert_eq!(token.expires_at - token.created_at, Duration::minutes(20));
    }

    #[test]
    fn test_expiry_is_strict() {
        let now = Utc::now();
        let token = ActivationToken {
            id: 1,
            token: "Ab12Cd".to_string(),
            user_id: 1,
            created_at: now - Duration::minutes(20),
            expires_at: now,
            validated_at: None,
        };

        assert!(!token.is_expired_at(now));
        assert!(token.is_expired_at(now + Duration::milliseconds(1)));
        assert!(!token.is_consumed());
    }
}
