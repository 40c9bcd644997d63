//! Account change notifications.
//!
//! Published after a successful commit; subscribers (cache invalidation,
//! chat services sync, audit logging) receive every change in order.

use serde::Serialize;
use tokio::sync::broadcast;
use tracing::trace;

use crate::models::account::{Account, AccountId};

/// Capacity of the change channel; slow subscribers lag rather than block.
const CHANNEL_CAPACITY: usize = 256;

/// Snapshot of an account after a change.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AccountUpdated {
    pub id: AccountId,
    pub login: String,
    pub email: String,
    pub recent_ip: Option<String>,
}

impl From<&Account> for AccountUpdated {
    fn from(account: &Account) -> Self {
        Self {
            id: account.id,
            login: account.login.clone(),
            email: account.email.clone(),
            recent_ip: account.recent_ip.clone(),
        }
    }
}

/// Fan-out channel for [`AccountUpdated`] events.
#[derive(Clone)]
pub struct AccountEvents {
    sender: broadcast::Sender<AccountUpdated>,
}

impl AccountEvents {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<AccountUpdated> {
        self.sender.subscribe()
    }

    /// Publish a change. Having no subscribers is not an error.
    pub fn publish(&self, account: &Account) {
        let event = AccountUpdated::from(account);
        if self.sender.send(event).is_err() {
            trace!(account_id = account.id, "no subscribers for account change");
        }
    }
}

impl Default for AccountEvents {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn account() -> Account {
        Account {
            id: 3,
            login: "Player1".into(),
            email: "p1@example.com".into(),
            password_hash: "hash".into(),
            steam_id: None,
            recent_ip: Some("10.0.0.1".into()),
        }
    }

    #[tokio::test]
    async fn subscribers_receive_published_changes() {
        let events = AccountEvents::new();
        let mut rx = events.subscribe();
        events.publish(&account());
        let event = rx.recv().await.unwrap();
        assert_eq!(event.id, 3);
        assert_eq!(event.login, "Player1");
        assert_eq!(event.recent_ip.as_deref(), Some("10.0.0.1"));
    }

    #[test]
    fn publish_without_subscribers_is_fine() {
        AccountEvents::new().publish(&account());
    }
}
