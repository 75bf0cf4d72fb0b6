use anyhow::Result;
use async_trait::async_trait;

use crate::{
    core::types::Dictionary,
    message::message::AuthenticateMessage,
};

/// Client-side handler for one authentication method of the WAMP
/// challenge-response exchange.
///
/// Authenticators are offered to [`connect`][`crate::peer::Peer::connect`] as
/// an ordered list. When the router sends a CHALLENGE, the first offered
/// authenticator whose [`name`][`Self::name`] equals the challenge's
/// `authmethod` answers it. A method may challenge several times in one
/// handshake (SCRAM-style exchanges), so implementations should be prepared
/// for repeated calls.
///
/// The actual cryptographic work (WAMP-CRA, TICKET, SCRAM key derivation)
/// lives entirely in the implementation; the session simply awaits it.
#[async_trait]
pub trait ClientAuthenticator: Send + Sync {
    /// The authentication method name advertised in the HELLO details (e.g.
    /// `ticket`, `wampcra`, `wamp-scram`).
    fn name(&self) -> &str;

    /// Produces the AUTHENTICATE message answering a CHALLENGE with the given
    /// extra data.
    async fn challenge(&self, extra: Dictionary) -> Result<AuthenticateMessage>;
}
