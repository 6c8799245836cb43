//! Session coordination: credential ownership and single-flight refresh.
//!
//! # Credentials
//!
//! The access token, refresh token and user id live in the key-value store
//! under `token`, `refreshToken` and `userId`. The store is the single source
//! of truth; nothing is cached in memory, so a token written by login is
//! visible to the very next request.
//!
//! # Refresh
//!
//! Any number of concurrent callers that need a refresh share one in-flight
//! token-refresh call. The call runs on its own task, so it settles and
//! clears its slot even if every caller has gone away; a later refresh after
//! a failure starts fresh. A flight only joins callers holding the same
//! refresh token it was started with, and its outcome is discarded if the
//! stored credentials were replaced while it ran.
//!
//! ```rust,ignore
//! let session = SessionCoordinator::new(transport, storage);
//! session.login(&Email::parse("jane@example.com")?, &password).await?;
//!
//! let mut events = session.subscribe();
//! while let Ok(event) = events.recv().await {
//!     if event == SessionEvent::Ended {
//!         // redirect to sign-in
//!     }
//! }
//! ```

mod classify;
pub mod token;

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use futures::FutureExt;
use futures::future::{BoxFuture, Shared};
use secrecy::{ExposeSecret, SecretString};
use storefront_sync_core::{Email, UserId};
use tokio::sync::{Mutex, broadcast};
use tracing::{debug, info, instrument, warn};

pub use classify::{ErrorClass, classify};

use crate::api::operations::{self, TokenCreateData, TokenRefreshData};
use crate::api::{GraphQLRequest, GraphQLResponse, Transport, format_graphql_errors};
use crate::error::{Result, SyncError};
use crate::storage::{SharedStore, keys, read_item};

/// Refresh proactively when the access token expires within this window.
const EXPIRY_LEEWAY_SECS: i64 = 30;

/// Capacity of the session event channel.
const EVENT_CHANNEL_CAPACITY: usize = 16;

type RefreshFuture = Shared<BoxFuture<'static, Result<SecretString>>>;

/// The refresh currently running, if any.
struct InFlight {
    generation: u64,
    /// Refresh token the flight was started with.
    refresh_token: Option<String>,
    future: RefreshFuture,
}

/// Session lifecycle notifications.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEvent {
    /// A refresh succeeded and a new access token is stored.
    Refreshed,
    /// Credentials were cleared; the shopper must sign in again.
    Ended,
}

/// Access token to attach to an outgoing request.
#[derive(Debug)]
pub(crate) struct RequestToken {
    pub token: Option<SecretString>,
    /// A refresh already happened while obtaining `token`.
    pub refreshed: bool,
}

/// Owns credentials and the single-flight refresh.
///
/// Cheap to clone; clones share the refresh slot and event channel.
pub struct SessionCoordinator<T> {
    inner: Arc<SessionInner<T>>,
}

impl<T> Clone for SessionCoordinator<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T> std::fmt::Debug for SessionCoordinator<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionCoordinator")
            .field("authenticated", &self.is_authenticated())
            .finish_non_exhaustive()
    }
}

struct SessionInner<T> {
    transport: T,
    storage: SharedStore,
    in_flight: Mutex<Option<InFlight>>,
    generation: AtomicU64,
    events: broadcast::Sender<SessionEvent>,
}

impl<T> SessionInner<T> {
    /// Remove every credential key and announce the end of the session.
    fn end_session(&self) {
        for key in [keys::TOKEN, keys::REFRESH_TOKEN, keys::USER_ID] {
            if let Err(e) = self.storage.remove_item(key) {
                warn!(key, error = %e, "Failed to clear credential");
            }
        }
        let _ = self.events.send(SessionEvent::Ended);
    }

    /// Whether the stored refresh token is no longer the one `sent`.
    fn credentials_replaced(&self, sent: &str) -> bool {
        read_item(self.storage.as_ref(), keys::REFRESH_TOKEN).as_deref() != Some(sent)
    }
}

impl<T> SessionCoordinator<T> {
    /// Current access token, if any.
    #[must_use]
    pub fn access_token(&self) -> Option<SecretString> {
        read_item(self.inner.storage.as_ref(), keys::TOKEN).map(SecretString::from)
    }

    /// Authenticated customer id, if any.
    #[must_use]
    pub fn user_id(&self) -> Option<UserId> {
        read_item(self.inner.storage.as_ref(), keys::USER_ID).map(UserId::from)
    }

    /// Whether an access token is stored. Says nothing about its validity.
    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        read_item(self.inner.storage.as_ref(), keys::TOKEN).is_some()
    }

    fn has_refresh_token(&self) -> bool {
        read_item(self.inner.storage.as_ref(), keys::REFRESH_TOKEN).is_some()
    }

    /// Subscribe to [`SessionEvent`]s.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.inner.events.subscribe()
    }

    /// Sign out locally. No server call is made.
    #[instrument(skip(self))]
    pub fn logout(&self) {
        info!("Signing out");
        self.inner.end_session();
    }

    /// Clear credentials after an irrecoverable auth error.
    pub(crate) fn end_session(&self) {
        self.inner.end_session();
    }

    pub(crate) fn transport(&self) -> &T {
        &self.inner.transport
    }
}

impl<T: Transport> SessionCoordinator<T> {
    #[must_use]
    pub fn new(transport: T, storage: SharedStore) -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            inner: Arc::new(SessionInner {
                transport,
                storage,
                in_flight: Mutex::new(None),
                generation: AtomicU64::new(0),
                events,
            }),
        }
    }

    /// Authenticate with email and password and store the credentials.
    ///
    /// # Errors
    ///
    /// Returns `SyncError::Domain` if the credentials are rejected,
    /// `SyncError::Network` if the server is unreachable, or
    /// `SyncError::Storage` if the credentials cannot be stored.
    #[instrument(skip(self, password), fields(email = %email))]
    pub async fn login(&self, email: &Email, password: &SecretString) -> Result<UserId> {
        let request = GraphQLRequest::new(
            &operations::TOKEN_CREATE,
            serde_json::json!({
                "email": email.as_str(),
                "password": password.expose_secret(),
            }),
        );
        let response = self.inner.transport.send(&request, None).await?;
        let payload = decode::<TokenCreateData>(response)?.token_create;

        if let Some(error) = payload.errors.first() {
            return Err(SyncError::Domain(error.describe()));
        }
        let (Some(token), Some(refresh_token), Some(user)) =
            (payload.token, payload.refresh_token, payload.user)
        else {
            return Err(SyncError::Domain(
                "Sign-in response did not include credentials".to_string(),
            ));
        };

        let storage = &self.inner.storage;
        let written = storage
            .set_item(keys::TOKEN, &token)
            .and_then(|()| storage.set_item(keys::REFRESH_TOKEN, &refresh_token))
            .and_then(|()| storage.set_item(keys::USER_ID, user.id.as_str()));
        if let Err(e) = written {
            self.inner.end_session();
            return Err(e.into());
        }
        *self.inner.in_flight.lock().await = None;

        info!(user_id = %user.id, "Signed in");
        Ok(user.id)
    }

    /// Refresh the access token.
    ///
    /// Concurrent callers share one refresh call. Returns the new access
    /// token, or `None` after clearing all credentials if the refresh failed
    /// or no refresh token was stored.
    pub async fn refresh(&self) -> Option<SecretString> {
        self.refresh_shared().await.ok()
    }

    /// Single-flight refresh returning the failure reason.
    ///
    /// `SessionExpired` when there was nothing to refresh with,
    /// `RefreshFailed` when the refresh call itself failed.
    pub(crate) async fn refresh_shared(&self) -> Result<SecretString> {
        let future = {
            let mut slot = self.inner.in_flight.lock().await;
            let refresh_token = read_item(self.inner.storage.as_ref(), keys::REFRESH_TOKEN);
            match slot.as_ref() {
                Some(flight) if flight.refresh_token == refresh_token => flight.future.clone(),
                _ => {
                    let flight = self.start_refresh(refresh_token);
                    let future = flight.future.clone();
                    *slot = Some(flight);
                    future
                }
            }
        };
        future.await
    }

    /// Spawn a refresh that clears its own slot when it settles.
    ///
    /// Must be called with the slot lock held.
    fn start_refresh(&self, refresh_token: Option<String>) -> InFlight {
        let generation = self.inner.generation.fetch_add(1, Ordering::Relaxed);
        let inner = Arc::clone(&self.inner);
        let sent = refresh_token.clone();

        let task = tokio::spawn(async move {
            let result = run_refresh(&inner, sent).await;
            let mut slot = inner.in_flight.lock().await;
            if slot.as_ref().is_some_and(|f| f.generation == generation) {
                *slot = None;
            }
            result
        });

        let future = async move {
            task.await
                .unwrap_or_else(|e| Err(SyncError::RefreshFailed(e.to_string())))
        }
        .boxed()
        .shared();

        InFlight {
            generation,
            refresh_token,
            future,
        }
    }

    /// Token to attach to the next request, refreshing first when the stored
    /// access token is about to expire.
    pub(crate) async fn token_for_request(&self) -> Result<RequestToken> {
        let Some(token) = read_item(self.inner.storage.as_ref(), keys::TOKEN) else {
            return Ok(RequestToken {
                token: None,
                refreshed: false,
            });
        };

        if token::expires_within(&token, EXPIRY_LEEWAY_SECS) && self.has_refresh_token() {
            debug!("Access token about to expire, refreshing before request");
            let fresh = self.refresh_shared().await?;
            return Ok(RequestToken {
                token: Some(fresh),
                refreshed: true,
            });
        }

        Ok(RequestToken {
            token: Some(SecretString::from(token)),
            refreshed: false,
        })
    }
}

/// Perform one token refresh against the server and persist the outcome.
///
/// If the stored refresh token changed while the call was in flight (a new
/// login, a logout, or another refresh rotating it), nothing is written or
/// cleared and the currently stored access token is returned instead.
async fn run_refresh<T: Transport>(
    inner: &SessionInner<T>,
    refresh_token: Option<String>,
) -> Result<SecretString> {
    let Some(refresh_token) = refresh_token else {
        debug!("No refresh token stored, ending session");
        inner.end_session();
        return Err(SyncError::SessionExpired);
    };

    let request = GraphQLRequest::new(
        &operations::TOKEN_REFRESH,
        serde_json::json!({ "refreshToken": refresh_token }),
    );

    let outcome = match inner.transport.send(&request, None).await {
        Ok(response) => parse_refreshed(response),
        Err(e) => Err(e),
    };

    if inner.credentials_replaced(&refresh_token) {
        debug!("Credentials replaced during refresh, discarding result");
        return read_item(inner.storage.as_ref(), keys::TOKEN)
            .map(SecretString::from)
            .ok_or(SyncError::SessionExpired);
    }

    match outcome.and_then(|tokens| store_refreshed(inner, tokens)) {
        Ok(token) => {
            info!("Access token refreshed");
            let _ = inner.events.send(SessionEvent::Refreshed);
            Ok(token)
        }
        Err(e) => {
            warn!(error = %e, "Token refresh failed, ending session");
            inner.end_session();
            Err(SyncError::RefreshFailed(e.to_string()))
        }
    }
}

/// New access token and, when rotated, new refresh token.
struct RefreshedTokens {
    token: String,
    refresh_token: Option<String>,
}

fn parse_refreshed(response: GraphQLResponse) -> Result<RefreshedTokens> {
    let payload = decode::<TokenRefreshData>(response)?.token_refresh;
    if let Some(error) = payload.errors.first() {
        return Err(SyncError::Domain(error.describe()));
    }
    let token = payload
        .token
        .filter(|t| !t.is_empty())
        .ok_or_else(|| SyncError::Domain("Refresh response did not include a token".to_string()))?;

    Ok(RefreshedTokens {
        token,
        refresh_token: payload.refresh_token.filter(|t| !t.is_empty()),
    })
}

fn store_refreshed<T>(inner: &SessionInner<T>, tokens: RefreshedTokens) -> Result<SecretString> {
    inner.storage.set_item(keys::TOKEN, &tokens.token)?;
    if let Some(rotated) = tokens.refresh_token {
        inner.storage.set_item(keys::REFRESH_TOKEN, &rotated)?;
    }
    Ok(SecretString::from(tokens.token))
}

/// Decode `data` for calls made outside the orchestrator (login, refresh).
fn decode<D: serde::de::DeserializeOwned>(response: GraphQLResponse) -> Result<D> {
    if let Some(errors) = response.errors.filter(|e| !e.is_empty()) {
        return Err(SyncError::Domain(format_graphql_errors(&errors)));
    }
    let data = response
        .data
        .ok_or_else(|| SyncError::Domain("No data in response".to_string()))?;
    Ok(serde_json::from_value(data)?)
}
