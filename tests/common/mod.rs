#![allow(dead_code)]

use std::{
    sync::Once,
    time::Duration,
};

use futures_util::{
    SinkExt,
    StreamExt,
};
use wampeer::{
    core::{
        id::Id,
        types::{
            Dictionary,
            Value,
        },
    },
    message::message::{
        Message,
        WelcomeMessage,
    },
    peer::{
        Peer,
        PeerConfig,
    },
    transport::{
        direct_transport_pair,
        DirectTransport,
    },
};

pub const REALM: &str = "com.wampeer.test";

static INIT: Once = Once::new();

pub fn setup_test_environment() {
    INIT.call_once(|| {
        tracing_subscriber::fmt()
            .with_max_level(tracing_core::Level::DEBUG)
            .with_file(true)
            .with_line_number(true)
            .with_thread_ids(true)
            .init();
    });
}

/// Reads the next message the peer sent, panicking if none arrives in time.
pub async fn next_message(router: &mut DirectTransport) -> Message {
    match tokio::time::timeout(Duration::from_secs(5), router.next()).await {
        Ok(Some(Ok(message))) => message,
        Ok(other) => panic!("transport ended while waiting for a message: {other:?}"),
        Err(_) => panic!("timed out waiting for a message from the peer"),
    }
}

/// Sends a message to the peer, as the router.
pub async fn send_message(router: &mut DirectTransport, message: Message) {
    router.send(message).await.unwrap();
}

/// Establishes an anonymous session on the test realm, playing the router's
/// side of the handshake.
///
/// Returns the connected peer and the router's end of the transport.
pub async fn establish_session(config: PeerConfig) -> (Peer, DirectTransport) {
    establish_session_with_id(config, 1).await
}

/// [`establish_session`], with an explicit session id.
pub async fn establish_session_with_id(
    config: PeerConfig,
    session_id: u64,
) -> (Peer, DirectTransport) {
    let (client_end, mut router) = direct_transport_pair();
    let peer = Peer::new(config);
    let (result, _) = tokio::join!(peer.connect(Box::new(client_end), REALM), async {
        assert_matches::assert_matches!(next_message(&mut router).await, Message::Hello(_));
        send_message(
            &mut router,
            Message::Welcome(WelcomeMessage {
                session: Id::try_from(session_id).unwrap(),
                details: Dictionary::from_iter([(
                    "authrole".to_owned(),
                    Value::String("anonymous".to_owned()),
                )]),
            }),
        )
        .await;
    });
    result.unwrap();
    (peer, router)
}
