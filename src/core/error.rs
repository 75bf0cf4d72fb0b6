use anyhow::Error;
use thiserror::Error;

use crate::core::{
    types::{
        Dictionary,
        List,
        Value,
    },
    uri::Uri,
};

/// A basic error that occurs while processing a WAMP message.
#[derive(Debug, Error)]
pub enum BasicError {
    /// A generic resource was not found.
    ///
    /// WAMP defines standard URIs for not finding specific resource types. This error should only
    /// be used when the standard URI cannot be used.
    #[error("{0}")]
    NotFound(String),
    /// An invalid argument was passed.
    #[error("{0}")]
    InvalidArgument(String),
    /// The operation is not allowed based on process configuration.
    #[error("{0}")]
    NotAllowed(String),
    /// The operation is not allowed based on user permissions.
    #[error("{0}")]
    PermissionDenied(String),
    /// Some internal error occurred.
    ///
    /// Should only be used when there is no other error variant that describes the error, since
    /// the message is very vague and not very useful for debugging.
    #[error("{0}")]
    Internal(String),
}

impl BasicError {
    /// The trailing URI component for the error.
    pub fn uri_component(&self) -> &str {
        match self {
            Self::NotFound(_) => "not_found",
            Self::InvalidArgument(_) => "invalid_argument",
            Self::NotAllowed(_) => "not_allowed",
            Self::PermissionDenied(_) => "permission_denied",
            Self::Internal(_) => "internal",
        }
    }
}

/// An interaction error that occurs while processing a WAMP message.
///
/// Interaction errors are clearly defined in the WAMP standard and are reserved for errors that
/// peers must be able to parse easily.
#[derive(Debug, Error)]
pub enum InteractionError {
    /// The incoming message violates the WAMP protocol.
    #[error("protocol violation: {0}")]
    ProtocolViolation(String),
    /// The procedure being called does not exist.
    #[error("no such procedure")]
    NoSuchProcedure,
    /// The registration being referenced does not exist.
    #[error("no such registration")]
    NoSuchRegistration,
    /// The subscription being referenced does not exist.
    #[error("no such subscription")]
    NoSuchSubscription,
    /// The realm being referenced does not exist.
    #[error("no such realm")]
    NoSuchRealm,
    /// The request was canceled before it completed.
    #[error("canceled")]
    Canceled,
}

impl InteractionError {
    /// The trailing URI component for the error.
    pub fn uri_component(&self) -> &str {
        match self {
            Self::ProtocolViolation(_) => "protocol_violation",
            Self::NoSuchProcedure => "no_such_procedure",
            Self::NoSuchRegistration => "no_such_registration",
            Self::NoSuchSubscription => "no_such_subscription",
            Self::NoSuchRealm => "no_such_realm",
            Self::Canceled => "canceled",
        }
    }
}

/// The `wamp.error.*` URI describing an error.
///
/// Errors that do not correspond to a well-known WAMP URI are reported as
/// `wamp.error.internal`.
pub fn uri_for_error(error: &Error) -> Uri {
    if let Some(error) = error.downcast_ref::<WampError>() {
        return error.reason.clone();
    }
    let component = if let Some(error) = error.downcast_ref::<BasicError>() {
        error.uri_component()
    } else if let Some(error) = error.downcast_ref::<InteractionError>() {
        error.uri_component()
    } else {
        "internal"
    };
    Uri::from_known(format!("wamp.error.{component}"))
}

/// An error reported by the router for a single request, correlated to the
/// operation that issued it.
///
/// Carries the ERROR message's reason URI and payload so callers can inspect
/// exactly what the router reported.
#[derive(Debug, Default, Clone, Error)]
#[error("{reason}: {message}")]
pub struct WampError {
    /// The error reason URI.
    pub reason: Uri,
    /// A human-readable message, taken from the `message` key of the ERROR
    /// details when present.
    pub message: String,
    /// Positional payload of the ERROR message.
    pub arguments: List,
    /// Keyword payload of the ERROR message.
    pub arguments_keyword: Dictionary,
}

impl WampError {
    /// The error used to fail every outstanding request and sink when the
    /// session terminates.
    pub fn session_closed() -> Self {
        Self {
            reason: Uri::from_known("wamp.error.canceled"),
            message: "session closed".to_owned(),
            ..Default::default()
        }
    }

    /// Converts the error into an [`Error`] that can be returned out of an
    /// operation.
    pub fn into_error(self) -> Error {
        self.into()
    }
}

/// Extracts the human-readable message from an error details dictionary.
pub(crate) fn message_from_details(details: &Dictionary) -> String {
    match details.get("message") {
        Some(Value::String(message)) => message.clone(),
        _ => "unknown error".to_owned(),
    }
}

/// Error for a handshake rejected by the router with an ABORT message.
#[derive(Debug, Clone, Error)]
#[error("session aborted by router: {reason}: {message}")]
pub struct AbortError {
    /// The ABORT reason URI.
    pub reason: Uri,
    /// A human-readable message, taken from the ABORT details when present.
    pub message: String,
}

/// Error for a CHALLENGE naming an authentication method the peer did not
/// offer.
#[derive(Debug, Clone, Error)]
#[error("router challenged with unsupported authentication method: {method}")]
pub struct UnsupportedAuthMethodError {
    /// The method named by the CHALLENGE.
    pub method: String,
}

/// Error for an operation invoked without an established session.
#[derive(Debug, Clone, Error)]
#[error("peer is not connected")]
pub struct PeerNotConnectedError;
