//! OAuth application registration and token exchange

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::json;
use url::Url;

use crate::api::Gateway;
use crate::api::gateway::api_url;
use crate::error::{Error, Result};
use crate::json::JsonExt;

/// Scopes every session requests
pub const BASE_SCOPES: &str = "read write follow";

/// Full scope string: the base scopes plus any extras
pub fn scopes(additional: &str) -> String {
    let additional = additional.trim();
    if additional.is_empty() {
        BASE_SCOPES.to_string()
    } else {
        format!("{BASE_SCOPES} {additional}")
    }
}

/// Signing state of a session: the registered application and the user token
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionState {
    /// OAuth client id
    pub client_id: String,
    /// OAuth client secret
    pub client_secret: String,
    /// User access token; empty when logged out
    pub token: String,
}

impl SessionState {
    /// Both client id and secret are known
    pub fn is_registered(&self) -> bool {
        !self.client_id.is_empty() && !self.client_secret.is_empty()
    }

    /// A user token is present
    pub fn have_token(&self) -> bool {
        !self.token.is_empty()
    }

    /// Token to attach, or `None` when there is none
    pub fn bearer(&self) -> Option<String> {
        self.have_token().then(|| self.token.clone())
    }
}

impl fmt::Debug for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionState")
            .field("client_id", &self.client_id)
            .field("client_secret", &redact(&self.client_secret))
            .field("token", &redact(&self.token))
            .finish()
    }
}

pub(crate) const fn redact(secret: &str) -> &'static str {
    if secret.is_empty() { "" } else { "<redacted>" }
}

/// Client credentials returned by `/api/v1/apps`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OAuthApp {
    /// Client id
    pub client_id: String,
    /// Client secret
    pub client_secret: String,
}

/// Register an application. `Ok(None)` when the server answered without
/// both a client id and secret.
pub async fn register_app(
    gateway: &Gateway,
    instance_uri: &str,
    client_name: &str,
    website: &str,
    redirect_uri: &str,
    scopes: &str,
) -> Result<Option<OAuthApp>> {
    let body = json!({
        "client_name": client_name,
        "redirect_uris": redirect_uri,
        "scopes": scopes,
        "website": website,
    });

    let response = gateway
        .post_json(api_url(instance_uri, "/api/v1/apps")?, body, None)
        .await?;
    let json = response.json();

    match (json.opt_str_at("client_id"), json.opt_str_at("client_secret")) {
        (Some(client_id), Some(client_secret)) => Ok(Some(OAuthApp {
            client_id,
            client_secret,
        })),
        _ => Ok(None),
    }
}

/// Browser URL where the user grants access. No network involved.
pub fn authorize_url(instance_uri: &str, client_id: &str, redirect_uri: &str, scopes: &str) -> Result<Url> {
    let mut url = api_url(instance_uri, "/oauth/authorize")?;
    url.query_pairs_mut()
        .append_pair("client_id", client_id)
        .append_pair("redirect_uri", redirect_uri)
        .append_pair("response_type", "code")
        .append_pair("scope", scopes);
    Ok(url)
}

async fn request_token(gateway: &Gateway, instance_uri: &str, form: Vec<(String, String)>) -> Result<String> {
    let response = gateway
        .post_form(api_url(instance_uri, "/oauth/token")?, form, None)
        .await?;

    response
        .json()
        .opt_str_at("access_token")
        .ok_or_else(|| Error::Auth("no access_token in token response".to_string()))
}

fn pair(key: &str, value: &str) -> (String, String) {
    (key.to_string(), value.to_string())
}

/// Exchange an authorization code for a user access token
pub async fn exchange_code(
    gateway: &Gateway,
    instance_uri: &str,
    session: &SessionState,
    redirect_uri: &str,
    code: &str,
) -> Result<String> {
    if !session.is_registered() {
        return Err(Error::NotRegistered(instance_uri.to_string()));
    }

    request_token(
        gateway,
        instance_uri,
        vec![
            pair("client_id", &session.client_id),
            pair("client_secret", &session.client_secret),
            pair("redirect_uri", redirect_uri),
            pair("grant_type", "authorization_code"),
            pair("code", code.trim()),
        ],
    )
    .await
}

/// Obtain an application-level token (used to create accounts)
pub async fn client_credentials_token(gateway: &Gateway, instance_uri: &str, session: &SessionState) -> Result<String> {
    if !session.is_registered() {
        return Err(Error::NotRegistered(instance_uri.to_string()));
    }

    request_token(
        gateway,
        instance_uri,
        vec![
            pair("client_id", &session.client_id),
            pair("client_secret", &session.client_secret),
            pair("grant_type", "client_credentials"),
            pair("scope", "write"),
        ],
    )
    .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use crate::api::{Method, MockTransport};

    fn registered() -> SessionState {
        SessionState {
            client_id: "cid".into(),
            client_secret: "csecret".into(),
            token: String::new(),
        }
    }

    #[test]
    fn test_scopes() {
        assert_eq!(scopes(""), "read write follow");
        assert_eq!(scopes(" push "), "read write follow push");
    }

    #[test]
    fn test_authorize_url_is_deterministic() {
        let a = authorize_url("example.social", "cid", "urn:ietf:wg:oauth:2.0:oob", "read write follow").unwrap();
        let b = authorize_url("example.social", "cid", "urn:ietf:wg:oauth:2.0:oob", "read write follow").unwrap();
        assert_eq!(a, b);
        assert_eq!(a.path(), "/oauth/authorize");

        let pairs: Vec<(String, String)> = a.query_pairs().into_owned().collect();
        assert!(pairs.contains(&("client_id".into(), "cid".into())));
        assert!(pairs.contains(&("response_type".into(), "code".into())));
        assert!(pairs.contains(&("scope".into(), "read write follow".into())));
    }

    #[test]
    fn test_debug_redacts() {
        let mut state = registered();
        state.token = "user-token".into();
        let debug = format!("{state:?}");
        assert!(debug.contains("cid"));
        assert!(!debug.contains("csecret"));
        assert!(!debug.contains("user-token"));
    }

    #[tokio::test]
    async fn test_register_app() {
        let mock = Arc::new(MockTransport::new());
        mock.on(Method::Post, "/api/v1/apps", 200, r#"{"client_id":"cid","client_secret":"cs"}"#);
        let gateway = Gateway::new(mock.clone());

        let app = register_app(&gateway, "example.social", "Roost", "https://roost", "urn:x", "read")
            .await
            .unwrap();
        assert_eq!(app.map(|a| a.client_id).as_deref(), Some("cid"));

        let sent = mock.requests_to("/api/v1/apps");
        assert!(!sent[0].is_authenticated());
        assert_eq!(sent[0].json_body().map(|b| b["client_name"].clone()), Some(json!("Roost")));
    }

    #[tokio::test]
    async fn test_register_app_missing_secret() {
        let mock = Arc::new(MockTransport::new());
        mock.on(Method::Post, "/api/v1/apps", 200, r#"{"client_id":"cid"}"#);
        let gateway = Gateway::new(mock);

        let app = register_app(&gateway, "example.social", "Roost", "", "urn:x", "read")
            .await
            .unwrap();
        assert!(app.is_none());
    }

    #[tokio::test]
    async fn test_exchange_code() {
        let mock = Arc::new(MockTransport::new());
        mock.on(Method::Post, "/oauth/token", 200, r#"{"access_token":"tok","token_type":"Bearer"}"#);
        let gateway = Gateway::new(mock.clone());

        let token = exchange_code(&gateway, "example.social", &registered(), "urn:x", " abc\n")
            .await
            .unwrap();
        assert_eq!(token, "tok");

        let sent = &mock.requests_to("/oauth/token")[0];
        assert_eq!(sent.form_field("grant_type"), Some("authorization_code"));
        assert_eq!(sent.form_field("code"), Some("abc"));
    }

    #[tokio::test]
    async fn test_exchange_requires_registration() {
        let gateway = Gateway::new(Arc::new(MockTransport::new()));
        let err = exchange_code(&gateway, "example.social", &SessionState::default(), "urn:x", "abc")
            .await
            .unwrap_err();
        assert!(matches!(err, Error::NotRegistered(_)));
    }

    #[tokio::test]
    async fn test_client_credentials() {
        let mock = Arc::new(MockTransport::new());
        mock.on(Method::Post, "/oauth/token", 200, r#"{"access_token":"app-tok"}"#);
        let gateway = Gateway::new(mock.clone());

        let token = client_credentials_token(&gateway, "example.social", &registered())
            .await
            .unwrap();
        assert_eq!(token, "app-tok");
        assert_eq!(
            mock.requests_to("/oauth/token")[0].form_field("grant_type"),
            Some("client_credentials")
        );
    }
}
