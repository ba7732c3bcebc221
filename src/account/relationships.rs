//! Follow, block, mute, feature and notes

use std::sync::Arc;

use serde_json::{Value, json};

use super::Account;
use crate::actions::{AccountAction, follow_args, mute_args, note_args};
use crate::error::{Error, Result};
use crate::events::Event;
use crate::json::JsonExt;
use crate::models::{Identity, Relationship};

impl Account {
    fn action_failed(&self, action: AccountAction, server: String) -> Error {
        let message = action.failure_message().to_string();
        tracing::warn!("{action} failed: {server}");
        self.inner.events.emit(Event::Error(message.clone()));
        Error::Action {
            action,
            message,
            server,
        }
    }

    /// Run `action` against `identity` and store the relationship the server
    /// answers with.
    ///
    /// Any failure (transport, non-2xx, or an `error` key in a 2xx body)
    /// emits [`Event::Error`] and leaves the stored relationship untouched.
    pub async fn execute_action(
        &self,
        identity: &Identity,
        action: AccountAction,
        args: Value,
    ) -> Result<Relationship> {
        let id = identity.id();
        if id.is_empty() {
            return Err(self.action_failed(action, format!("no account id for {}", identity.acct())));
        }

        let url = self.api_url(&format!("/api/v1/accounts/{id}{}", action.path_suffix()))?;
        let json = match self.post(url, args, true).await {
            Ok(response) => response.json(),
            Err(Error::Status { message, .. }) => return Err(self.action_failed(action, message)),
            Err(e) => return Err(self.action_failed(action, e.to_string())),
        };

        if json.has("error") {
            let server = json
                .opt_str_at("error")
                .unwrap_or_else(|| json.at("error").to_string());
            return Err(self.action_failed(action, server));
        }

        let relationship = Relationship::from_json(&json);
        identity.set_relationship(relationship.clone());
        self.inner.events.emit(Event::RelationshipChanged {
            acct: identity.acct(),
        });
        Ok(relationship)
    }

    /// Follow; `reblogs` shows their boosts, `notify` notifies on new posts
    pub async fn follow_account(&self, identity: &Identity, reblogs: bool, notify: bool) -> Result<Relationship> {
        self.execute_action(identity, AccountAction::Follow, follow_args(reblogs, notify))
            .await
    }

    /// Unfollow (also cancels a pending request)
    pub async fn unfollow_account(&self, identity: &Identity) -> Result<Relationship> {
        self.execute_action(identity, AccountAction::Unfollow, json!({}))
            .await
    }

    /// Block
    pub async fn block_account(&self, identity: &Identity) -> Result<Relationship> {
        self.execute_action(identity, AccountAction::Block, json!({}))
            .await
    }

    /// Unblock
    pub async fn unblock_account(&self, identity: &Identity) -> Result<Relationship> {
        self.execute_action(identity, AccountAction::Unblock, json!({}))
            .await
    }

    /// Mute, optionally including notifications. A `duration` of 0 seconds
    /// mutes indefinitely.
    pub async fn mute_account(
        &self,
        identity: &Identity,
        notifications: bool,
        duration: u64,
    ) -> Result<Relationship> {
        self.execute_action(identity, AccountAction::Mute, mute_args(notifications, duration))
            .await
    }

    /// Unmute
    pub async fn unmute_account(&self, identity: &Identity) -> Result<Relationship> {
        self.execute_action(identity, AccountAction::Unmute, json!({}))
            .await
    }

    /// Feature on our profile
    pub async fn feature_account(&self, identity: &Identity) -> Result<Relationship> {
        self.execute_action(identity, AccountAction::Feature, json!({}))
            .await
    }

    /// Stop featuring
    pub async fn unfeature_account(&self, identity: &Identity) -> Result<Relationship> {
        self.execute_action(identity, AccountAction::Unfeature, json!({}))
            .await
    }

    /// Set our private note; an empty note clears it
    pub async fn add_note(&self, identity: &Identity, note: &str) -> Result<Relationship> {
        self.execute_action(identity, AccountAction::Note, note_args(note))
            .await
    }

    /// Fetch relationships for several identities in one request and store
    /// each on its identity
    pub async fn fetch_relationships(&self, identities: &[Arc<Identity>]) -> Result<()> {
        let with_id: Vec<_> = identities.iter().filter(|i| !i.id().is_empty()).collect();
        if with_id.is_empty() {
            return Ok(());
        }

        let mut url = self.api_url("/api/v1/accounts/relationships")?;
        {
            let mut query = url.query_pairs_mut();
            for identity in &with_id {
                query.append_pair("id[]", &identity.id());
            }
        }

        let json = self.get(url, true).await?.json();
        for item in json.as_array().map(Vec::as_slice).unwrap_or_default() {
            let relationship = Relationship::from_json(item);
            let Some(identity) = with_id.iter().find(|i| i.id() == relationship.id) else {
                continue;
            };
            identity.set_relationship(relationship);
            self.inner.events.emit(Event::RelationshipChanged {
                acct: identity.acct(),
            });
        }
        Ok(())
    }
}
