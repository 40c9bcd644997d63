//! Account domain models.

use chrono::{DateTime, Utc};
use serde::Serialize;

/// Numeric account identifier (primary key of the `login` table).
pub type AccountId = i64;

/// A persisted, activated account.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Account {
    pub id: AccountId,
    pub login: String,
    pub email: String,
    /// bcrypt hash of the current password.
    #[serde(skip)]
    pub password_hash: String,
    /// Linked Steam id, immutable once set.
    pub steam_id: Option<String>,
    /// Network address the last change was made from.
    pub recent_ip: Option<String>,
}

impl Account {
    /// Whether a Steam identity is already bound to this account.
    pub fn has_steam_link(&self) -> bool {
        self.steam_id.as_deref().is_some_and(|id| !id.is_empty())
    }
}

/// Values needed to insert an account at activation time.
#[derive(Debug, Clone)]
pub struct NewAccount {
    pub login: String,
    pub email: String,
    pub password_hash: String,
    pub recent_ip: String,
}

/// A login previously held by an account.
#[derive(Debug, Clone, PartialEq)]
pub struct NameRecord {
    pub account_id: AccountId,
    pub previous_name: String,
    pub changed_at: DateTime<Utc>,
}

/// Rating ladders that get a row per account on activation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RatingLadder {
    Global,
    Ladder1v1,
}

/// Initial rating values written at activation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RatingDefaults {
    pub mean: f64,
    pub deviation: f64,
}

impl Default for RatingDefaults {
    fn default() -> Self {
        Self {
            mean: 1500.0,
            deviation: 500.0,
        }
    }
}

/// A rating row owned by the rating subsystem after creation.
#[derive(Debug, Clone, PartialEq)]
pub struct RatingRecord {
    pub account_id: AccountId,
    pub ladder: RatingLadder,
    pub mean: f64,
    pub deviation: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn account(steam_id: Option<&str>) -> Account {
        Account {
            id: 1,
            login: "Player1".into(),
            email: "p1@example.com".into(),
            password_hash: "hash".into(),
            steam_id: steam_id.map(str::to_string),
            recent_ip: None,
        }
    }

    #[test]
    fn empty_steam_id_is_not_a_link() {
        assert!(!account(None).has_steam_link());
        assert!(!account(Some("")).has_steam_link());
        assert!(account(Some("76561198000000000")).has_steam_link());
    }

    #[test]
    fn serialized_account_omits_password_hash() {
        let json = serde_json::to_value(account(None)).unwrap();
        assert!(json.get("password_hash").is_none());
        assert_eq!(json["login"], "Player1");
    }
}
