//! Logged-in accounts and which one is selected

use std::sync::{Arc, RwLock, Weak};

use crate::account::Account;
use crate::api::Transport;
use crate::auth::SettingsStore;
use crate::config::Config;
use crate::error::Result;
use crate::lock::{read, write};

pub(crate) struct Shared {
    accounts: RwLock<Vec<Account>>,
    selected: RwLock<Option<Account>>,
    store: Arc<dyn SettingsStore>,
}

/// All accounts of this client. Accounts only hold a weak reference back.
#[derive(Clone)]
pub struct AccountRegistry {
    inner: Arc<Shared>,
}

impl std::fmt::Debug for AccountRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AccountRegistry")
            .field("accounts", &read(&self.inner.accounts).len())
            .finish_non_exhaustive()
    }
}

impl AccountRegistry {
    /// Empty registry persisting to `store`
    pub fn new(store: Arc<dyn SettingsStore>) -> Self {
        Self {
            inner: Arc::new(Shared {
                accounts: RwLock::default(),
                selected: RwLock::default(),
                store,
            }),
        }
    }

    pub(crate) fn upgrade(weak: &Weak<Shared>) -> Option<Self> {
        weak.upgrade().map(|inner| Self { inner })
    }

    /// Restore every account in the store. Tokens are not validated here.
    pub fn load(store: Arc<dyn SettingsStore>, transport: &Arc<dyn Transport>, config: &Config) -> Result<Self> {
        let registry = Self::new(store);
        for settings in registry.inner.store.load_all()? {
            match Account::from_settings(&settings, Arc::clone(transport), config.clone()) {
                Ok(account) => registry.add_account(&account),
                Err(e) => tracing::warn!("Skipping stored account {}: {e}", settings.group_name()),
            }
        }
        if let Some(first) = registry.accounts().first() {
            registry.select_account(first);
        }
        tracing::debug!("loaded {} accounts", registry.accounts().len());
        Ok(registry)
    }

    /// Add an account (once). The account learns about this registry.
    pub fn add_account(&self, account: &Account) {
        account.attach_registry(Arc::downgrade(&self.inner));

        let mut accounts = write(&self.inner.accounts);
        if !accounts.iter().any(|a| a.ptr_eq(account)) {
            accounts.push(account.clone());
        }
    }

    /// Make `account` the selected one
    pub fn select_account(&self, account: &Account) {
        *write(&self.inner.selected) = Some(account.clone());
    }

    /// The selected account
    pub fn selected(&self) -> Option<Account> {
        read(&self.inner.selected).clone()
    }

    /// Remove an account from the registry and the store. If it was
    /// selected, the first remaining account becomes selected.
    pub fn remove_account(&self, account: &Account) -> Result<()> {
        let remaining = {
            let mut accounts = write(&self.inner.accounts);
            accounts.retain(|a| !a.ptr_eq(account));
            accounts.first().cloned()
        };

        {
            let mut selected = write(&self.inner.selected);
            if selected.as_ref().is_some_and(|s| s.ptr_eq(account)) {
                *selected = remaining;
            }
        }

        self.inner.store.remove(&account.settings_group_name())
    }

    /// All accounts, in the order they were added
    pub fn accounts(&self) -> Vec<Account> {
        read(&self.inner.accounts).clone()
    }

    /// Account whose settings group is `group_name`
    pub fn find(&self, group_name: &str) -> Option<Account> {
        read(&self.inner.accounts)
            .iter()
            .find(|a| a.settings_group_name() == group_name)
            .cloned()
    }

    /// Persist one account
    pub fn save_account(&self, account: &Account) -> Result<()> {
        account.write_to_settings(self.inner.store.as_ref())
    }

    /// Persist every account
    pub fn write_all(&self) -> Result<()> {
        for account in self.accounts() {
            self.save_account(&account)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::MockTransport;
    use crate::auth::{AccountSettings, MemoryStore};

    fn settings(username: &str) -> AccountSettings {
        AccountSettings {
            instance_uri: "https://example.social".into(),
            username: username.into(),
            client_id: "cid".into(),
            client_secret: "cs".into(),
            token: format!("{username}-token"),
        }
    }

    #[test]
    fn test_load_and_select() {
        let store = Arc::new(MemoryStore::new());
        store.save(&settings("alice")).unwrap();
        store.save(&settings("bob")).unwrap();

        let transport: Arc<dyn Transport> = Arc::new(MockTransport::new());
        let registry = AccountRegistry::load(store, &transport, &Config::default()).unwrap();

        assert_eq!(registry.accounts().len(), 2);
        assert_eq!(registry.selected().map(|a| a.username()).as_deref(), Some("alice"));
        assert!(registry.find("bob@example.social").is_some_and(|a| a.have_token()));
    }

    #[test]
    fn test_add_is_idempotent() {
        let registry = AccountRegistry::new(Arc::new(MemoryStore::new()));
        let account = Account::new("example.social", Arc::new(MockTransport::new())).unwrap();
        registry.add_account(&account);
        registry.add_account(&account);
        assert_eq!(registry.accounts().len(), 1);
    }

    #[test]
    fn test_remove_reselects() {
        let store = Arc::new(MemoryStore::new());
        store.save(&settings("alice")).unwrap();
        store.save(&settings("bob")).unwrap();
        let transport: Arc<dyn Transport> = Arc::new(MockTransport::new());
        let registry = AccountRegistry::load(store.clone(), &transport, &Config::default()).unwrap();

        let alice = registry.find("alice@example.social").unwrap();
        registry.remove_account(&alice).unwrap();

        assert_eq!(registry.selected().map(|a| a.username()).as_deref(), Some("bob"));
        assert_eq!(store.load_all().unwrap(), vec![settings("bob")]);
    }

    #[test]
    fn test_registry_is_weak_from_account() {
        let account = Account::new("example.social", Arc::new(MockTransport::new())).unwrap();
        {
            let registry = AccountRegistry::new(Arc::new(MemoryStore::new()));
            registry.add_account(&account);
        }
        assert!(account.logout().is_ok());
    }

    #[test]
    fn test_write_all() {
        let store = Arc::new(MemoryStore::new());
        let registry = AccountRegistry::new(store.clone());
        let transport: Arc<dyn Transport> = Arc::new(MockTransport::new());
        for name in ["alice", "bob"] {
            let account = Account::from_settings(&settings(name), Arc::clone(&transport), Config::default()).unwrap();
            registry.add_account(&account);
        }
        registry.write_all().unwrap();
        assert_eq!(store.load_all().unwrap().len(), 2);
    }
}
