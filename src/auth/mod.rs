//! Authentication and tenant session handling

mod session;
mod types;

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use reqwest::Client;
use tracing::{debug, info, warn};

use crate::config::ClientOptions;
use crate::error::Error;
use crate::fetch::Fetch;
use crate::inventory::ListingCache;

pub use session::*;
pub use types::*;

/// Client for the auth endpoints; holds the current session
#[derive(Debug, Clone)]
pub struct Auth {
    url: String,
    key: String,
    client: Client,
    session: Arc<RwLock<Option<Session>>>,
    options: ClientOptions,
    cache: Option<ListingCache>,
}

impl Auth {
    /// Create a new Auth client
    pub fn new(url: &str, key: &str, client: Client, options: ClientOptions) -> Self {
        Self {
            url: url.trim_end_matches('/').to_string(),
            key: key.to_string(),
            client,
            session: Arc::new(RwLock::new(None)),
            options,
            cache: None,
        }
    }

    /// Drop `cache` whenever the signed-in user changes
    pub fn with_cache(mut self, cache: ListingCache) -> Self {
        self.cache = Some(cache);
        self
    }

    fn get_auth_url(&self, path: &str) -> String {
        format!("{}/auth/v1{}", self.url, path)
    }

    /// Sign in a user with email and password
    pub async fn sign_in_with_password(&self, email: &str, password: &str) -> Result<Session, Error> {
        let mut body = HashMap::new();
        body.insert("email", email);
        body.insert("password", password);

        let session = self.request_token("password", &body).await?;
        info!(user_id = %session.user.id, "signed in");
        Ok(session)
    }

    /// Exchange the refresh token for a new session
    pub async fn refresh_session(&self) -> Result<Session, Error> {
        let current = self
            .get_session()
            .ok_or_else(|| Error::auth(NO_AUTHENTICATED_USER))?;

        let mut body = HashMap::new();
        body.insert("refresh_token", current.refresh_token.as_str());

        let session = self.request_token("refresh_token", &body).await?;
        debug!(user_id = %session.user.id, "session refreshed");
        Ok(session)
    }

    async fn request_token(
        &self,
        grant_type: &str,
        body: &HashMap<&str, &str>,
    ) -> Result<Session, Error> {
        let mut params = HashMap::new();
        params.insert("grant_type".to_string(), grant_type.to_string());

        let session = Fetch::post(&self.client, &self.get_auth_url("/token"))
            .header("apikey", &self.key)
            .query(&params)
            .json(body)?
            .execute::<Session>()
            .await
            .map_err(into_auth_error)?
            .stamped();

        if self.options.persist_session {
            self.set_session(Some(session.clone()));
        }

        Ok(session)
    }

    /// Sign out the current user and drop the session
    pub async fn sign_out(&self) -> Result<(), Error> {
        let session = self
            .get_session()
            .ok_or_else(|| Error::auth(NO_AUTHENTICATED_USER))?;

        let result = Fetch::post(&self.client, &self.get_auth_url("/logout"))
            .header("apikey", &self.key)
            .bearer_auth(&session.access_token)
            .execute_empty()
            .await
            .map_err(into_auth_error);

        // The local session goes even if the server call failed
        self.set_session(None);
        info!(user_id = %session.user.id, "signed out");
        result
    }

    /// Replace the current session, e.g. one restored from storage
    pub fn set_session(&self, session: Option<Session>) {
        let session = session.map(Session::stamped);
        let changed = {
            let mut guard = self.session.write().unwrap_or_else(PoisonError::into_inner);
            let changed = owner(guard.as_ref()) != owner(session.as_ref());
            *guard = session;
            changed
        };

        // a token refresh keeps the owner and the cache
        if let (true, Some(cache)) = (changed, &self.cache) {
            cache.invalidate_all();
            debug!("signed-in user changed, listing cache cleared");
        }
    }

    /// Get the current session
    pub fn get_session(&self) -> Option<Session> {
        self.session
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Resolve the tenant for a scoped query.
    ///
    /// A missing session, or an expired one that cannot be refreshed, is an
    /// authentication error rather than an empty tenant.
    pub async fn tenant(&self) -> Result<Tenant, Error> {
        let session = self
            .get_session()
            .ok_or_else(|| Error::auth(NO_AUTHENTICATED_USER))?;

        if !session.is_expired() {
            return session.tenant();
        }

        if !self.options.auto_refresh_token {
            return Err(Error::auth("session expired"));
        }

        match self.refresh_session().await {
            Ok(refreshed) => refreshed.tenant(),
            Err(e) => {
                warn!(error = %e, "session refresh failed");
                Err(Error::auth(format!("session expired: {}", e)))
            }
        }
    }
}

fn owner(session: Option<&Session>) -> Option<String> {
    session.and_then(|s| s.tenant().ok()).map(|t| t.user_id)
}

fn into_auth_error(error: Error) -> Error {
    match error {
        Error::Database { details, .. } => Error::Auth(details.to_string()),
        e => e,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use jsonwebtoken::{encode, EncodingKey, Header};
    use serde_json::json;
    use wiremock::matchers::{body_json, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn user(id: &str) -> User {
        User {
            id: id.to_string(),
            email: Some("seller@example.com".to_string()),
            phone: None,
            app_metadata: json!({}),
            user_metadata: json!({}),
            created_at: None,
            updated_at: None,
        }
    }

    fn token_with_exp(sub: &str, exp: i64) -> String {
        encode(
            &Header::default(),
            &json!({ "sub": sub, "exp": exp }),
            &EncodingKey::from_secret(b"test-secret"),
        )
        .unwrap()
    }

    fn session_json(user_id: &str, access_token: &str) -> serde_json::Value {
        json!({
            "access_token": access_token,
            "refresh_token": "refresh-1",
            "token_type": "bearer",
            "expires_in": 3600,
            "user": {
                "id": user_id,
                "email": "seller@example.com",
                "app_metadata": {},
                "user_metadata": {},
                "created_at": "2024-01-01T00:00:00Z",
                "updated_at": "2024-01-01T00:00:00Z"
            }
        })
    }

    #[tokio::test]
    async fn tenant_without_session_is_an_auth_error() {
        let auth = Auth::new("http://localhost:1", "key", Client::new(), ClientOptions::default());
        match auth.tenant().await {
            Err(Error::Auth(msg)) => assert_eq!(msg, NO_AUTHENTICATED_USER),
            other => panic!("Expected Auth error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn sign_in_stores_session_and_resolves_tenant() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/auth/v1/token"))
            .and(query_param("grant_type", "password"))
            .and(body_json(json!({ "email": "seller@example.com", "password": "hunter2" })))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(session_json("user-1", "access-1")),
            )
            .expect(1)
            .mount(&mock_server)
            .await;

        let auth = Auth::new(&mock_server.uri(), "key", Client::new(), ClientOptions::default());
        let session = auth
            .sign_in_with_password("seller@example.com", "hunter2")
            .await
            .unwrap();

        assert!(session.expires_at.is_some());
        let tenant = auth.tenant().await.unwrap();
        assert_eq!(tenant.user_id, "user-1");
        assert_eq!(tenant.access_token, "access-1");
    }

    #[tokio::test]
    async fn sign_in_failure_is_an_auth_error() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/auth/v1/token"))
            .respond_with(ResponseTemplate::new(400).set_body_json(json!({
                "error": "invalid_grant",
                "message": "Invalid login credentials"
            })))
            .mount(&mock_server)
            .await;

        let auth = Auth::new(&mock_server.uri(), "key", Client::new(), ClientOptions::default());
        let result = auth.sign_in_with_password("seller@example.com", "wrong").await;
        match result {
            Err(Error::Auth(msg)) => assert!(msg.contains("Invalid login credentials")),
            other => panic!("Expected Auth error, got {:?}", other),
        }
        assert!(auth.get_session().is_none());
    }

    #[tokio::test]
    async fn expired_token_claim_triggers_refresh() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/auth/v1/token"))
            .and(query_param("grant_type", "refresh_token"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(session_json("user-1", "access-2")),
            )
            .expect(1)
            .mount(&mock_server)
            .await;

        let auth = Auth::new(&mock_server.uri(), "key", Client::new(), ClientOptions::default());
        let stale = token_with_exp("user-1", Utc::now().timestamp() - 60);
        let mut restored = Session::new(stale, "refresh-1".to_string(), user("user-1"), 0);
        restored.expires_at = None;
        auth.set_session(Some(restored));

        let tenant = auth.tenant().await.unwrap();
        assert_eq!(tenant.access_token, "access-2");
    }

    #[tokio::test]
    async fn expired_session_without_auto_refresh_fails() {
        let options = ClientOptions::default().with_auto_refresh_token(false);
        let auth = Auth::new("http://localhost:1", "key", Client::new(), options);
        let mut session = Session::new("opaque".to_string(), "r".to_string(), user("user-1"), 3600);
        session.expires_at = Some(Utc::now().timestamp() - 1);
        auth.set_session(Some(session));

        assert!(matches!(auth.tenant().await, Err(Error::Auth(_))));
    }

    #[tokio::test]
    async fn changing_the_user_clears_the_listing_cache() {
        use crate::config::InventoryOptions;
        use crate::inventory::ListingFilters;

        let cache = ListingCache::new(&InventoryOptions::default());
        let auth = Auth::new("http://localhost:1", "key", Client::new(), ClientOptions::default())
            .with_cache(cache.clone());
        let filters = ListingFilters::default();
        let signed_in = |id: &str| Session::new("token".to_string(), "r".to_string(), user(id), 3600);

        auth.set_session(Some(signed_in("user-1")));
        cache.set("user-1", &filters, Vec::new()).await;

        // same user, fresh tokens
        auth.set_session(Some(signed_in("user-1")));
        assert!(cache.get("user-1", &filters).await.is_some());

        auth.set_session(Some(signed_in("user-2")));
        assert!(cache.get("user-1", &filters).await.is_none());

        cache.set("user-2", &filters, Vec::new()).await;
        auth.set_session(None);
        assert!(cache.get("user-2", &filters).await.is_none());
    }

    #[test]
    fn tenant_falls_back_to_sub_claim() {
        let token = token_with_exp("user-from-token", Utc::now().timestamp() + 600);
        let session = Session::new(token, "r".to_string(), user(""), 600);
        assert_eq!(session.tenant().unwrap().user_id, "user-from-token");
    }

    #[test]
    fn opaque_token_without_expiry_never_expires() {
        let mut session = Session::new("opaque".to_string(), "r".to_string(), user("u"), 0);
        session.expires_at = None;
        assert!(!session.is_expired());
    }
}
