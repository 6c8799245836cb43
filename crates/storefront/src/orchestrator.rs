//! Request orchestration: attach credentials, refresh once, retry once.
//!
//! Every remote call made by the cart and voucher layers goes through
//! [`RequestOrchestrator::execute`]. The policy is fixed:
//!
//! 1. Send with the current access token (or anonymously).
//! 2. If the first error is session-expired, refresh (single-flight) and
//!    retry the same request exactly once.
//! 3. Permission errors and all other errors are surfaced without a retry.
//!
//! No call ever triggers more than one refresh or more than one retry.

use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, instrument, warn};

use crate::api::{GraphQLRequest, GraphQLResponse, Operation, Transport, format_graphql_errors};
use crate::error::{Result, SyncError};
use crate::session::{ErrorClass, SessionCoordinator, classify};

/// Outcome of a single attempt before decoding.
enum Attempt {
    Data(Value),
    Failed(ErrorClass, SyncError),
}

/// Wraps the transport with the refresh-and-retry-once policy.
pub struct RequestOrchestrator<T> {
    session: SessionCoordinator<T>,
}

impl<T> Clone for RequestOrchestrator<T> {
    fn clone(&self) -> Self {
        Self {
            session: self.session.clone(),
        }
    }
}

impl<T> std::fmt::Debug for RequestOrchestrator<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestOrchestrator")
            .field("session", &self.session)
            .finish()
    }
}

impl<T: Transport> RequestOrchestrator<T> {
    #[must_use]
    pub const fn new(session: SessionCoordinator<T>) -> Self {
        Self { session }
    }

    /// The session this orchestrator authenticates with.
    #[must_use]
    pub const fn session(&self) -> &SessionCoordinator<T> {
        &self.session
    }

    /// Execute an operation and decode its `data` into `D`.
    ///
    /// # Errors
    ///
    /// - `SyncError::SessionExpired` if credentials could not be renewed, or
    ///   the retried request was still rejected as expired.
    /// - `SyncError::RefreshFailed` if the refresh call itself failed.
    /// - `SyncError::PermissionDenied` for authenticated-but-forbidden calls.
    /// - `SyncError::Domain` for any other server error, or a response with
    ///   neither data nor errors.
    /// - `SyncError::Network` / `SyncError::Decode` from the transport or
    ///   payload decoding.
    #[instrument(skip(self, operation, variables), fields(operation = operation.name))]
    pub async fn execute<D: DeserializeOwned>(
        &self,
        operation: &Operation,
        variables: Value,
    ) -> Result<D> {
        let request = GraphQLRequest::new(operation, variables);
        let request_token = self.session.token_for_request().await?;

        let data = match self.attempt(&request, request_token.token.as_ref()).await? {
            Attempt::Data(data) => data,
            Attempt::Failed(ErrorClass::SessionExpired, err) if !request_token.refreshed => {
                debug!(error = %err, "Session expired, refreshing before retry");
                let fresh = self.session.refresh_shared().await?;
                self.retry(&request, &fresh).await?
            }
            Attempt::Failed(ErrorClass::SessionExpired, _) => {
                warn!("Session rejected right after refresh, ending session");
                self.session.end_session();
                return Err(SyncError::SessionExpired);
            }
            Attempt::Failed(_, err) => return Err(err),
        };

        Ok(serde_json::from_value(data)?)
    }

    async fn retry(&self, request: &GraphQLRequest, token: &secrecy::SecretString) -> Result<Value> {
        match self.attempt(request, Some(token)).await? {
            Attempt::Data(data) => Ok(data),
            Attempt::Failed(ErrorClass::SessionExpired, _) => {
                warn!("Retried request still expired, ending session");
                self.session.end_session();
                Err(SyncError::SessionExpired)
            }
            Attempt::Failed(_, err) => Err(err),
        }
    }

    async fn attempt(
        &self,
        request: &GraphQLRequest,
        token: Option<&secrecy::SecretString>,
    ) -> Result<Attempt> {
        let response = self.session.transport().send(request, token).await?;
        Ok(interpret(response))
    }
}

fn interpret(response: GraphQLResponse) -> Attempt {
    let GraphQLResponse { data, errors } = response;

    if let Some(errors) = errors.filter(|e| !e.is_empty()) {
        let class = errors.first().map_or(ErrorClass::Domain, classify);
        let err = match class {
            ErrorClass::SessionExpired => SyncError::SessionExpired,
            ErrorClass::PermissionDenied => {
                SyncError::PermissionDenied(format_graphql_errors(&errors))
            }
            ErrorClass::Domain => SyncError::Domain(format_graphql_errors(&errors)),
        };
        return Attempt::Failed(class, err);
    }

    data.map_or_else(
        || {
            Attempt::Failed(
                ErrorClass::Domain,
                SyncError::Domain("No data in response".to_string()),
            )
        },
        Attempt::Data,
    )
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::api::GraphQLError;

    #[test]
    fn test_interpret_classifies_first_error_only() {
        let response = GraphQLResponse::from_errors(vec![
            GraphQLError::new("Variant not found"),
            GraphQLError::new("Signature has expired"),
        ]);
        assert!(matches!(
            interpret(response),
            Attempt::Failed(ErrorClass::Domain, SyncError::Domain(_))
        ));
    }

    #[test]
    fn test_interpret_permission_keeps_server_message() {
        let response = GraphQLResponse::error("You do not have permission to perform this action");
        let Attempt::Failed(class, err) = interpret(response) else {
            panic!("expected failure");
        };
        assert_eq!(class, ErrorClass::PermissionDenied);
        assert_eq!(
            err,
            SyncError::PermissionDenied(
                "You do not have permission to perform this action".to_string()
            )
        );
    }

    #[test]
    fn test_interpret_empty_response_is_domain_error() {
        let Attempt::Failed(_, err) = interpret(GraphQLResponse::default()) else {
            panic!("expected failure");
        };
        assert_eq!(err, SyncError::Domain("No data in response".to_string()));
    }

    #[test]
    fn test_interpret_empty_error_list_is_success() {
        let response = GraphQLResponse {
            data: Some(serde_json::json!({ "ok": true })),
            errors: Some(vec![]),
        };
        assert!(matches!(interpret(response), Attempt::Data(_)));
    }
}
