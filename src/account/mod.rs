//! The account session.
//!
//! An [`Account`] is one login on one instance. It owns the OAuth state, the
//! instance capabilities, the identity cache and the event bus, and exposes
//! every operation as an `async fn`. Clones share the same session.

mod metadata;
mod posts;
mod relationships;

use std::fmt;
use std::ops::ControlFlow;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock, Weak};

use serde_json::{Value, json};
use url::Url;

use crate::api::gateway::{api_url, instance_url};
use crate::api::{Gateway, MultipartFile, Response, StreamEvent, StreamHandle, Transport, streaming};
use crate::auth::{AccountSettings, SessionState, SettingsStore, oauth, settings_group_name};
use crate::cache::IdentityCache;
use crate::config::Config;
use crate::error::{Error, Result};
use crate::events::{Event, EventBus};
use crate::instance::Capabilities;
use crate::json::JsonExt;
use crate::lock::{read, write};
use crate::models::{CustomEmoji, Identity, Post, Preferences, Visibility};
use crate::registry::{AccountRegistry, Shared as RegistryShared};

pub use crate::actions::AccountAction;

struct AccountInner {
    gateway: Gateway,
    config: Config,
    instance_uri: RwLock<String>,
    username: RwLock<String>,
    session: RwLock<SessionState>,
    additional_scopes: RwLock<String>,
    capabilities: RwLock<Capabilities>,
    cache: IdentityCache,
    custom_emojis: RwLock<Vec<CustomEmoji>>,
    preferences: RwLock<Option<Preferences>>,
    has_follow_requests: AtomicBool,
    events: EventBus,
    registry: RwLock<Weak<RegistryShared>>,
}

/// One login on one instance
#[derive(Clone)]
pub struct Account {
    inner: Arc<AccountInner>,
}

impl fmt::Debug for Account {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Account")
            .field("instance_uri", &self.instance_uri())
            .field("username", &self.username())
            .field("session", &*read(&self.inner.session))
            .finish_non_exhaustive()
    }
}

impl Account {
    /// Start a fresh login on `instance_uri` with default configuration
    pub fn new(instance_uri: &str, transport: Arc<dyn Transport>) -> Result<Self> {
        Self::with_config(instance_uri, transport, Config::default())
    }

    /// Start a fresh login on `instance_uri`
    pub fn with_config(instance_uri: &str, transport: Arc<dyn Transport>, config: Config) -> Result<Self> {
        let additional_scopes = config.additional_scopes.clone();
        let account = Self {
            inner: Arc::new(AccountInner {
                gateway: Gateway::new(transport),
                config,
                instance_uri: RwLock::default(),
                username: RwLock::default(),
                session: RwLock::default(),
                additional_scopes: RwLock::new(additional_scopes),
                capabilities: RwLock::default(),
                cache: IdentityCache::new(),
                custom_emojis: RwLock::default(),
                preferences: RwLock::default(),
                has_follow_requests: AtomicBool::new(false),
                events: EventBus::new(),
                registry: RwLock::new(Weak::new()),
            }),
        };
        account.set_instance_uri(instance_uri)?;
        Ok(account)
    }

    /// Restore a session from persisted settings. The token is not
    /// validated; call [`validate_token`](Self::validate_token).
    pub fn from_settings(settings: &AccountSettings, transport: Arc<dyn Transport>, config: Config) -> Result<Self> {
        let account = Self::with_config(&settings.instance_uri, transport, config)?;
        *write(&account.inner.username) = settings.username.clone();
        *write(&account.inner.session) = SessionState {
            client_id: settings.client_id.clone(),
            client_secret: settings.client_secret.clone(),
            token: settings.token.clone(),
        };
        Ok(account)
    }

    /// Whether two handles refer to the same session
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    // ----- state -----

    /// Instance URI, always `https://host`
    pub fn instance_uri(&self) -> String {
        read(&self.inner.instance_uri).clone()
    }

    /// Point the session at another instance. Plain `http` is upgraded.
    pub fn set_instance_uri(&self, instance_uri: &str) -> Result<()> {
        let url = instance_url(instance_uri)?;
        *write(&self.inner.instance_uri) = url.origin().ascii_serialization();
        Ok(())
    }

    /// Host part of the instance URI
    pub fn instance_host(&self) -> String {
        instance_url(&self.instance_uri())
            .ok()
            .and_then(|url| url.host_str().map(str::to_string))
            .unwrap_or_default()
    }

    /// Local username; empty until known
    pub fn username(&self) -> String {
        read(&self.inner.username).clone()
    }

    /// Change the username
    pub fn set_username(&self, username: &str) {
        let changed = {
            let mut current = write(&self.inner.username);
            let changed = *current != username;
            username.clone_into(&mut current);
            changed
        };
        if changed {
            self.inner.events.emit(Event::UsernameChanged);
        }
    }

    /// Client id and secret are both known
    pub fn is_registered(&self) -> bool {
        read(&self.inner.session).is_registered()
    }

    /// A user token is present
    pub fn have_token(&self) -> bool {
        read(&self.inner.session).have_token()
    }

    /// Configuration this session was created with
    pub fn config(&self) -> &Config {
        &self.inner.config
    }

    /// Snapshot of the instance capabilities
    pub fn capabilities(&self) -> Capabilities {
        read(&self.inner.capabilities).clone()
    }

    /// Our own identity
    pub fn identity(&self) -> Arc<Identity> {
        self.inner.cache.own()
    }

    /// The identity cache
    pub fn cache(&self) -> &IdentityCache {
        &self.inner.cache
    }

    /// Shared identity for `acct`, created from `json` on first sight
    pub fn identity_lookup(&self, acct: &str, json: &Value) -> Arc<Identity> {
        self.inner.cache.lookup(acct, json)
    }

    /// Whether `acct` is already cached
    pub fn identity_cached(&self, acct: &str) -> bool {
        self.inner.cache.contains(acct)
    }

    /// The event bus
    pub fn events(&self) -> &EventBus {
        &self.inner.events
    }

    /// Subscribe to this session's events
    pub fn subscribe(&self) -> tokio::sync::broadcast::Receiver<Event> {
        self.inner.events.subscribe()
    }

    /// The instance's custom emojis
    pub fn custom_emojis(&self) -> Vec<CustomEmoji> {
        read(&self.inner.custom_emojis).clone()
    }

    /// Server-side preferences, once fetched
    pub fn preferences(&self) -> Option<Preferences> {
        read(&self.inner.preferences).clone()
    }

    /// Whether a follow request notification has been seen
    pub fn has_follow_requests(&self) -> bool {
        self.inner.has_follow_requests.load(Ordering::Relaxed)
    }

    /// Mark follow requests as handled (or pending)
    pub fn set_has_follow_requests(&self, pending: bool) {
        if self.inner.has_follow_requests.swap(pending, Ordering::Relaxed) != pending {
            self.inner.events.emit(Event::FollowRequestsChanged(pending));
        }
    }

    /// The transport requests go through
    pub fn transport(&self) -> Arc<dyn Transport> {
        self.inner.gateway.transport()
    }

    pub(crate) fn attach_registry(&self, registry: Weak<RegistryShared>) {
        *write(&self.inner.registry) = registry;
    }

    fn registry(&self) -> Option<AccountRegistry> {
        AccountRegistry::upgrade(&read(&self.inner.registry))
    }

    // ----- requests -----

    /// URL of `path` on this instance
    pub fn api_url(&self, path: &str) -> Result<Url> {
        api_url(&self.instance_uri(), path)
    }

    fn bearer(&self, authenticated: bool) -> Option<String> {
        if !authenticated {
            return None;
        }
        let bearer = read(&self.inner.session).bearer();
        if bearer.is_none() {
            tracing::debug!("no access token; sending request unauthenticated");
        }
        bearer
    }

    /// GET
    pub async fn get(&self, url: Url, authenticated: bool) -> Result<Response> {
        self.inner.gateway.get(url, self.bearer(authenticated)).await
    }

    /// POST a JSON body
    pub async fn post(&self, url: Url, body: Value, authenticated: bool) -> Result<Response> {
        self.inner
            .gateway
            .post_json(url, body, self.bearer(authenticated))
            .await
    }

    /// POST a form body
    pub async fn post_form(&self, url: Url, form: Vec<(String, String)>, authenticated: bool) -> Result<Response> {
        self.inner
            .gateway
            .post_form(url, form, self.bearer(authenticated))
            .await
    }

    /// PUT a JSON body
    pub async fn put(&self, url: Url, body: Value, authenticated: bool) -> Result<Response> {
        self.inner
            .gateway
            .put_json(url, body, self.bearer(authenticated))
            .await
    }

    /// PATCH a JSON body
    pub async fn patch(&self, url: Url, body: Value, authenticated: bool) -> Result<Response> {
        self.inner
            .gateway
            .patch_json(url, body, self.bearer(authenticated))
            .await
    }

    /// DELETE
    pub async fn delete(&self, url: Url, authenticated: bool) -> Result<Response> {
        self.inner.gateway.delete(url, self.bearer(authenticated)).await
    }

    /// Upload a file (always authenticated)
    pub async fn upload(&self, url: Url, file: MultipartFile) -> Result<Response> {
        self.inner.gateway.upload(url, file, self.bearer(true)).await
    }

    // ----- OAuth -----

    fn scopes(&self) -> String {
        oauth::scopes(&read(&self.inner.additional_scopes))
    }

    /// Register this client with the instance.
    ///
    /// Clears any previous token. Returns `false` if the server did not hand
    /// out both a client id and secret; on success emits
    /// [`Event::Registered`] and fetches the instance metadata.
    pub async fn register_application(&self, name: &str, website: &str, additional_scopes: &str) -> Result<bool> {
        write(&self.inner.session).token.clear();
        additional_scopes.clone_into(&mut write(&self.inner.additional_scopes));

        let app = match oauth::register_app(
            &self.inner.gateway,
            &self.instance_uri(),
            name,
            website,
            &self.inner.config.redirect_uri,
            &self.scopes(),
        )
        .await
        {
            Ok(app) => app,
            Err(e) => {
                tracing::warn!("Failed to register application with {}: {e}", self.instance_uri());
                return Err(e);
            }
        };

        let Some(app) = app else {
            tracing::warn!("{} did not return client credentials", self.instance_uri());
            return Ok(false);
        };

        {
            let mut session = write(&self.inner.session);
            session.client_id = app.client_id;
            session.client_secret = app.client_secret;
        }

        tracing::info!("registered application with {}", self.instance_uri());
        self.inner.events.emit(Event::Registered);
        self.fetch_instance_metadata().await;
        Ok(true)
    }

    /// Where the user grants access. Pure: no network involved.
    pub fn authorize_url(&self) -> Result<Url> {
        let client_id = read(&self.inner.session).client_id.clone();
        if client_id.is_empty() {
            return Err(Error::NotRegistered(self.instance_uri()));
        }
        oauth::authorize_url(
            &self.instance_uri(),
            &client_id,
            &self.inner.config.redirect_uri,
            &self.scopes(),
        )
    }

    /// Exchange the authorization code the user pasted for a token, then
    /// adopt it with [`set_access_token`](Self::set_access_token)
    pub async fn set_token(&self, auth_code: &str) -> Result<bool> {
        let session = read(&self.inner.session).clone();
        let token = oauth::exchange_code(
            &self.inner.gateway,
            &self.instance_uri(),
            &session,
            &self.inner.config.redirect_uri,
            auth_code,
        )
        .await?;
        self.set_access_token(&token).await
    }

    /// Store `token`, add this account to its registry as the selected one,
    /// and validate the token
    pub async fn set_access_token(&self, token: &str) -> Result<bool> {
        token.clone_into(&mut write(&self.inner.session).token);

        if let Some(registry) = self.registry() {
            registry.add_account(self);
            registry.select_account(self);
        }

        self.validate_token().await
    }

    /// Check the token against `verify_credentials`.
    ///
    /// On success our own identity and username are refreshed and the
    /// settings are persisted through the registry, then the server-side
    /// preferences are fetched. A rejected token yields `Ok(false)`.
    pub async fn validate_token(&self) -> Result<bool> {
        let url = self.api_url("/api/v1/accounts/verify_credentials")?;
        let json = match self.get(url, true).await {
            Ok(response) => response.json(),
            Err(e) if e.is_unauthorized() => {
                tracing::warn!("token for {} was rejected", self.instance_uri());
                self.inner.events.emit(Event::Authenticated(false));
                return Ok(false);
            }
            Err(e) => return Err(e),
        };

        let identity = self.inner.cache.refresh_own(&json);
        let username = json.str_at("username");
        if !username.is_empty() {
            self.set_username(&username);
        }

        self.inner.events.emit(Event::IdentityChanged {
            acct: identity.acct(),
        });
        self.inner.events.emit(Event::Authenticated(true));

        if let Some(registry) = self.registry() {
            if let Err(e) = registry.save_account(self) {
                tracing::warn!("Failed to persist account settings: {e}");
            }
        }

        if let Err(e) = self.fetch_preferences().await {
            tracing::warn!("Failed to fetch preferences: {e}");
        }

        Ok(true)
    }

    /// Create an account on the instance and log into it.
    ///
    /// Uses an application token for the sign-up itself. The server's raw
    /// error body is emitted as [`Event::RegistrationError`] on failure.
    pub async fn register_account(
        &self,
        username: &str,
        email: &str,
        password: &str,
        agreement: bool,
        locale: &str,
        reason: &str,
    ) -> Result<bool> {
        let session = read(&self.inner.session).clone();
        let app_token = oauth::client_credentials_token(&self.inner.gateway, &self.instance_uri(), &session).await?;

        let form = [
            ("username", username),
            ("email", email),
            ("password", password),
            ("agreement", if agreement { "1" } else { "0" }),
            ("locale", locale),
            ("reason", reason),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();

        let response = self
            .inner
            .gateway
            .post_form(self.api_url("/api/v1/accounts")?, form, Some(app_token))
            .await;

        let json = match response {
            Ok(response) => response.json(),
            Err(Error::Status { body, .. }) => {
                tracing::warn!("account registration rejected");
                self.inner.events.emit(Event::RegistrationError(body.clone()));
                return Err(Error::Registration(body));
            }
            Err(e) => {
                self.inner.events.emit(Event::RegistrationError(e.to_string()));
                return Err(e);
            }
        };

        let Some(token) = json.opt_str_at("access_token") else {
            tracing::info!("registration accepted without a token (approval pending?)");
            return Ok(false);
        };

        self.set_username(username);
        self.set_access_token(&token).await
    }

    /// Forget the token and remove this account from its registry and
    /// settings store
    pub fn logout(&self) -> Result<()> {
        write(&self.inner.session).token.clear();

        if let Some(registry) = self.registry() {
            registry.remove_account(self)?;
        }

        tracing::info!("logged out of {}", self.settings_group_name());
        self.inner.events.emit(Event::LoggedOut);
        Ok(())
    }

    // ----- settings -----

    /// Key under which this account's settings are stored
    pub fn settings_group_name(&self) -> String {
        settings_group_name(&self.username(), &self.instance_uri())
    }

    /// Everything needed to restore this session
    pub fn settings(&self) -> AccountSettings {
        let session = read(&self.inner.session);
        AccountSettings {
            instance_uri: self.instance_uri(),
            username: self.username(),
            client_id: session.client_id.clone(),
            client_secret: session.client_secret.clone(),
            token: session.token.clone(),
        }
    }

    /// Persist this account's settings
    pub fn write_to_settings(&self, store: &dyn SettingsStore) -> Result<()> {
        store.save(&self.settings())
    }

    // ----- preferences -----

    /// Fetch the server-side posting and reading preferences.
    ///
    /// New drafts take their defaults from them and received posts are
    /// expanded according to them. Emits [`Event::PreferencesChanged`].
    pub async fn fetch_preferences(&self) -> Result<Preferences> {
        let json = self.get(self.api_url("/api/v1/preferences")?, true).await?.json();
        let preferences = Preferences::from_json(&json);
        tracing::debug!("preferences for {}: {preferences:?}", self.settings_group_name());

        *write(&self.inner.preferences) = Some(preferences.clone());
        self.inner.events.emit(Event::PreferencesChanged);
        Ok(preferences)
    }

    /// Change the posting defaults stored on the server.
    ///
    /// The reading preferences cannot be changed through the API and are
    /// left as they are.
    pub async fn update_posting_defaults(
        &self,
        visibility: Visibility,
        sensitive: bool,
        language: Option<&str>,
    ) -> Result<()> {
        let body = json!({
            "source": {
                "privacy": visibility.as_str(),
                "sensitive": sensitive,
                "language": language.unwrap_or_default(),
            }
        });
        let url = self.api_url("/api/v1/accounts/update_credentials")?;
        let json = self.patch(url, body, true).await?.json();

        let identity = self.inner.cache.refresh_own(&json);
        {
            let mut preferences = write(&self.inner.preferences);
            let preferences = preferences.get_or_insert_with(Preferences::default);
            preferences.default_visibility = visibility;
            preferences.default_sensitive = sensitive;
            preferences.default_language = language.filter(|l| !l.is_empty()).map(str::to_string);
        }

        self.inner.events.emit(Event::IdentityChanged {
            acct: identity.acct(),
        });
        self.inner.events.emit(Event::PreferencesChanged);
        Ok(())
    }

    /// Parse a received status, honouring the reading preferences
    fn post_from_json(&self, json: &Value) -> Post {
        let mut post = Post::from_json(&self.inner.cache, json);
        if let Some(preferences) = read(&self.inner.preferences).as_ref() {
            preferences.apply_reading(&mut post);
        }
        post
    }

    // ----- streaming -----

    /// WebSocket URL for `stream` (`user`, `public`, ...). The token travels
    /// as a query parameter here, and only here.
    pub fn streaming_url(&self, stream: &str) -> Result<Url> {
        let mut url = self.api_url("/api/v1/streaming")?;
        url.query_pairs_mut()
            .append_pair("access_token", &read(&self.inner.session).token)
            .append_pair("stream", stream);
        url.set_scheme("wss")
            .map_err(|()| Error::Streaming("cannot switch to wss".to_string()))?;
        Ok(url)
    }

    /// Subscribe to a stream. Events are turned into [`Event`]s on this
    /// account's bus. The stream ends when the handle or the account is
    /// dropped.
    pub fn stream(&self, stream: &str) -> Result<StreamHandle> {
        let url = self.streaming_url(stream)?;
        let timeline = if stream == "user" { "home" } else { stream };
        Ok(self.spawn_stream(url, timeline.to_string()))
    }

    fn spawn_stream(&self, url: Url, timeline: String) -> StreamHandle {
        let account = Arc::downgrade(&self.inner);

        streaming::spawn(url, move |event| {
            let Some(inner) = account.upgrade() else {
                tracing::debug!("account dropped; closing stream");
                return ControlFlow::Break(());
            };
            Self { inner }.handle_stream_event(&timeline, event);
            ControlFlow::Continue(())
        })
    }

    fn handle_stream_event(&self, timeline: &str, event: StreamEvent) {
        match event {
            StreamEvent::Update(json) => {
                let post = self.post_from_json(&json);
                self.inner.events.emit(Event::TimelineFetched {
                    timeline: timeline.to_string(),
                    posts: vec![post],
                });
            }
            StreamEvent::Notification(json) => {
                self.handle_notification(&json);
            }
            StreamEvent::StatusUpdate(json) => {
                let post = self.post_from_json(&json);
                self.inner.events.emit(Event::PostUpdated(post));
            }
            StreamEvent::Delete(id) => self.inner.events.emit(Event::PostDeleted { id }),
            StreamEvent::Other(name) => tracing::debug!("ignoring stream event {name}"),
        }
    }
}
