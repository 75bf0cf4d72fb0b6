mod common;

use std::sync::{
    atomic::{
        AtomicUsize,
        Ordering,
    },
    Arc,
};

use anyhow::Result;
use async_trait::async_trait;
use wampeer::{
    auth::ClientAuthenticator,
    core::{
        error::{
            AbortError,
            PeerNotConnectedError,
            UnsupportedAuthMethodError,
        },
        id::Id,
        types::{
            Dictionary,
            Value,
        },
        uri::Uri,
    },
    message::message::{
        AbortMessage,
        AuthenticateMessage,
        ChallengeMessage,
        Message,
        ResultMessage,
        WelcomeMessage,
    },
    peer::{
        Peer,
        PeerConfig,
    },
    transport::direct_transport_pair,
};

use crate::common::{
    next_message,
    send_message,
};

struct TicketAuthenticator {
    ticket: String,
    challenges: AtomicUsize,
}

impl TicketAuthenticator {
    fn new(ticket: &str) -> Self {
        Self {
            ticket: ticket.to_owned(),
            challenges: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl ClientAuthenticator for TicketAuthenticator {
    fn name(&self) -> &str {
        "ticket"
    }

    async fn challenge(&self, _: Dictionary) -> Result<AuthenticateMessage> {
        self.challenges.fetch_add(1, Ordering::SeqCst);
        Ok(AuthenticateMessage {
            signature: self.ticket.clone(),
            extra: Dictionary::default(),
        })
    }
}

#[tokio::test]
async fn establishes_anonymous_session_on_welcome() {
    common::setup_test_environment();

    let (client_end, mut router) = direct_transport_pair();
    let peer = Peer::new(PeerConfig::default());

    let (result, _) = tokio::join!(peer.connect(Box::new(client_end), "realm1"), async {
        let hello = assert_matches::assert_matches!(
            next_message(&mut router).await,
            Message::Hello(message) => message
        );
        assert_eq!(hello.realm.as_ref(), "realm1");
        assert_matches::assert_matches!(
            hello.details.get("roles").and_then(Value::dictionary),
            Some(roles) => {
                assert!(roles.contains_key("caller"));
                assert!(roles.contains_key("callee"));
                assert!(roles.contains_key("publisher"));
                assert!(roles.contains_key("subscriber"));
            }
        );
        assert!(!hello.details.contains_key("authmethods"));

        send_message(
            &mut router,
            Message::Welcome(WelcomeMessage {
                session: Id::try_from(42).unwrap(),
                details: Dictionary::from_iter([(
                    "authrole".to_owned(),
                    Value::String("anonymous".to_owned()),
                )]),
            }),
        )
        .await;
    });

    let info = result.unwrap();
    assert_eq!(info.id, Id::try_from(42).unwrap());
    assert_eq!(info.realm.as_ref(), "realm1");
    assert_eq!(info.auth_role.as_deref(), Some("anonymous"));
    assert_eq!(info.auth_id, None);

    assert!(peer.is_connected().await);
    assert_eq!(peer.current_session_id().await, Some(Id::try_from(42).unwrap()));
    pretty_assertions::assert_eq!(peer.session_info().await.unwrap(), info);
}

#[tokio::test]
async fn answers_challenge_before_welcome() {
    common::setup_test_environment();

    let authenticator = Arc::new(TicketAuthenticator::new("secret"));
    let mut config = PeerConfig::default();
    config.auth_id = Some("user".to_owned());
    config.authenticators = vec![authenticator.clone()];

    let (client_end, mut router) = direct_transport_pair();
    let peer = Peer::new(config);

    let (result, _) = tokio::join!(peer.connect(Box::new(client_end), common::REALM), async {
        let hello = assert_matches::assert_matches!(
            next_message(&mut router).await,
            Message::Hello(message) => message
        );
        assert_eq!(
            hello.details.get("authmethods"),
            Some(&Value::List(Vec::from_iter([Value::String(
                "ticket".to_owned()
            )])))
        );
        assert_eq!(
            hello.details.get("authid"),
            Some(&Value::String("user".to_owned()))
        );

        send_message(
            &mut router,
            Message::Challenge(ChallengeMessage {
                auth_method: "ticket".to_owned(),
                extra: Dictionary::default(),
            }),
        )
        .await;

        let authenticate = assert_matches::assert_matches!(
            next_message(&mut router).await,
            Message::Authenticate(message) => message
        );
        assert_eq!(authenticate.signature, "secret");

        send_message(
            &mut router,
            Message::Welcome(WelcomeMessage {
                session: Id::try_from(7).unwrap(),
                details: Dictionary::from_iter([
                    ("authid".to_owned(), Value::String("user".to_owned())),
                    ("authrole".to_owned(), Value::String("user".to_owned())),
                    ("authmethod".to_owned(), Value::String("ticket".to_owned())),
                    (
                        "authprovider".to_owned(),
                        Value::String("static".to_owned()),
                    ),
                ]),
            }),
        )
        .await;
    });

    let info = result.unwrap();
    assert_eq!(info.id, Id::try_from(7).unwrap());
    assert_eq!(info.auth_id.as_deref(), Some("user"));
    assert_eq!(info.auth_role.as_deref(), Some("user"));
    assert_eq!(info.auth_method.as_deref(), Some("ticket"));
    assert_eq!(info.auth_provider.as_deref(), Some("static"));
    assert_eq!(authenticator.challenges.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn says_goodbye_for_unsupported_challenge_method() {
    common::setup_test_environment();

    let mut config = PeerConfig::default();
    config.authenticators = vec![Arc::new(TicketAuthenticator::new("secret"))];

    let (client_end, mut router) = direct_transport_pair();
    let peer = Peer::new(config);

    let (result, _) = tokio::join!(peer.connect(Box::new(client_end), common::REALM), async {
        assert_matches::assert_matches!(next_message(&mut router).await, Message::Hello(_));
        send_message(
            &mut router,
            Message::Challenge(ChallengeMessage {
                auth_method: "wampcra".to_owned(),
                extra: Dictionary::default(),
            }),
        )
        .await;

        assert_matches::assert_matches!(
            next_message(&mut router).await,
            Message::Goodbye(message) => {
                assert_eq!(message.reason.as_ref(), "wamp.close.goodbye_and_out");
            }
        );
    });

    assert_matches::assert_matches!(result, Err(err) => {
        assert_matches::assert_matches!(
            err.downcast_ref::<UnsupportedAuthMethodError>(),
            Some(UnsupportedAuthMethodError { method }) => {
                assert_eq!(method, "wampcra");
            }
        );
    });
    assert!(!peer.is_connected().await);
}

#[tokio::test]
async fn fails_connect_on_abort() {
    common::setup_test_environment();

    let (client_end, mut router) = direct_transport_pair();
    let peer = Peer::new(PeerConfig::default());

    let (result, _) = tokio::join!(peer.connect(Box::new(client_end), common::REALM), async {
        assert_matches::assert_matches!(next_message(&mut router).await, Message::Hello(_));
        send_message(
            &mut router,
            Message::Abort(AbortMessage {
                details: Dictionary::from_iter([(
                    "message".to_owned(),
                    Value::String("no such realm".to_owned()),
                )]),
                reason: Uri::try_from("wamp.error.no_such_realm").unwrap(),
            }),
        )
        .await;
    });

    assert_matches::assert_matches!(result, Err(err) => {
        assert_matches::assert_matches!(err.downcast_ref::<AbortError>(), Some(abort) => {
            assert_eq!(abort.reason.as_ref(), "wamp.error.no_such_realm");
            assert_eq!(abort.message, "no such realm");
        });
    });
    assert!(!peer.is_connected().await);
}

#[tokio::test]
async fn aborts_on_unexpected_message_during_handshake() {
    common::setup_test_environment();

    let (client_end, mut router) = direct_transport_pair();
    let peer = Peer::new(PeerConfig::default());

    let (result, _) = tokio::join!(peer.connect(Box::new(client_end), common::REALM), async {
        assert_matches::assert_matches!(next_message(&mut router).await, Message::Hello(_));
        send_message(
            &mut router,
            Message::Result(ResultMessage {
                call_request: Id::try_from(1).unwrap(),
                ..Default::default()
            }),
        )
        .await;

        assert_matches::assert_matches!(
            next_message(&mut router).await,
            Message::Abort(message) => {
                assert_eq!(message.reason.as_ref(), "wamp.error.protocol_violation");
            }
        );
    });

    assert_matches::assert_matches!(result, Err(err) => {
        assert!(err.to_string().contains("RESULT message during the handshake"));
    });
}

#[tokio::test]
async fn rejects_invalid_realm_synchronously() {
    common::setup_test_environment();

    let (client_end, _router) = direct_transport_pair();
    let peer = Peer::new(PeerConfig::default());

    assert_matches::assert_matches!(
        peer.connect(Box::new(client_end), "Not.A.Valid.Realm").await,
        Err(err) => {
            assert!(err.to_string().contains("invalid URI"));
        }
    );
}

#[tokio::test]
async fn operations_require_established_session() {
    common::setup_test_environment();

    let peer = Peer::new(PeerConfig::default());
    assert_matches::assert_matches!(
        peer.subscribe(Uri::try_from("com.wampeer.topic").unwrap()).await,
        Err(err) => {
            assert_matches::assert_matches!(err.downcast_ref::<PeerNotConnectedError>(), Some(_));
        }
    );
    assert!(!peer.is_connected().await);
}

#[tokio::test]
async fn leaves_realm_with_goodbye_handshake() {
    common::setup_test_environment();

    let (peer, mut router) = common::establish_session(PeerConfig::default()).await;
    assert!(peer.is_connected().await);

    let (result, _) = tokio::join!(peer.leave_realm(), async {
        assert_matches::assert_matches!(
            next_message(&mut router).await,
            Message::Goodbye(message) => {
                assert_eq!(message.reason.as_ref(), "wamp.close.normal");
            }
        );
        send_message(
            &mut router,
            wampeer::message::common::goodbye_and_out(),
        )
        .await;
    });
    result.unwrap();

    assert!(!peer.is_connected().await);

    // The peer disconnects once the session is over.
    assert_matches::assert_matches!(
        tokio::time::timeout(std::time::Duration::from_secs(5), async {
            use futures_util::StreamExt;
            router.next().await
        })
        .await,
        Ok(None)
    );
}

#[tokio::test]
async fn acknowledges_goodbye_from_router() {
    common::setup_test_environment();

    let (peer, mut router) = common::establish_session(PeerConfig::default()).await;

    send_message(&mut router, wampeer::message::common::goodbye_and_out()).await;
    assert_matches::assert_matches!(
        next_message(&mut router).await,
        Message::Goodbye(message) => {
            assert_eq!(message.reason.as_ref(), "wamp.close.goodbye_and_out");
        }
    );

    // The session is gone; operations fail.
    let mut closed = false;
    for _ in 0..50 {
        if !peer.is_connected().await {
            closed = true;
            break;
        }
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
    }
    assert!(closed, "session should close after GOODBYE");
}
