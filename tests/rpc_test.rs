mod common;

use anyhow::Result;
use wampeer::{
    core::{
        cancel::CallCancelMode,
        error::{
            BasicError,
            WampError,
        },
        id::Id,
        options::CallOptions,
        types::{
            Dictionary,
            List,
            Value,
        },
        uri::Uri,
    },
    message::message::{
        ErrorMessage,
        InvocationMessage,
        Message,
        RegisteredMessage,
        ResultMessage,
        UnregisteredMessage,
    },
    peer::{
        PeerConfig,
        Procedure,
        RpcCall,
        RpcResult,
        RpcYield,
    },
};

use crate::common::{
    next_message,
    send_message,
};

fn procedure() -> Uri {
    Uri::try_from("com.wampeer.add2").unwrap()
}

fn progress_details() -> Dictionary {
    Dictionary::from_iter([("progress".to_owned(), Value::Bool(true))])
}

async fn register_procedure(
    peer: &wampeer::peer::Peer,
    router: &mut wampeer::transport::DirectTransport,
    registration_id: u64,
) -> Procedure {
    let (result, _) = tokio::join!(peer.register(procedure()), async {
        let register = assert_matches::assert_matches!(
            next_message(&mut *router).await,
            Message::Register(message) => message
        );
        assert_eq!(register.procedure.as_ref(), "com.wampeer.add2");
        send_message(
            router,
            Message::Registered(RegisteredMessage {
                register_request: register.request,
                registration: Id::try_from(registration_id).unwrap(),
            }),
        )
        .await;
    });
    result.unwrap()
}

#[tokio::test]
async fn yields_progressive_results_in_order_until_final() {
    common::setup_test_environment();

    let (peer, mut router) = common::establish_session(PeerConfig::default()).await;

    let mut call = peer
        .call_with_options(
            procedure(),
            RpcCall::default(),
            CallOptions {
                receive_progress: true,
            },
        )
        .await
        .unwrap();

    let call_message = assert_matches::assert_matches!(
        next_message(&mut router).await,
        Message::Call(message) => message
    );
    assert_eq!(call_message.request, Id::try_from(1).unwrap());
    assert_eq!(
        call_message.options.get("receive_progress"),
        Some(&Value::Bool(true))
    );

    for i in 1..=2u64 {
        send_message(
            &mut router,
            Message::Result(ResultMessage {
                call_request: call_message.request,
                details: progress_details(),
                yield_arguments: List::from_iter([Value::Integer(i)]),
                yield_arguments_keyword: Dictionary::default(),
            }),
        )
        .await;
    }
    send_message(
        &mut router,
        Message::Result(ResultMessage {
            call_request: call_message.request,
            details: Dictionary::default(),
            yield_arguments: List::from_iter([Value::Integer(3)]),
            yield_arguments_keyword: Dictionary::default(),
        }),
    )
    .await;

    for i in 1..=3u64 {
        assert_matches::assert_matches!(call.next_result().await, Ok(Some(result)) => {
            assert_eq!(result.arguments, List::from_iter([Value::Integer(i)]));
        });
    }
    assert_matches::assert_matches!(call.next_result().await, Ok(None));
}

#[tokio::test]
async fn cancel_keeps_stream_open_until_terminal_response() {
    common::setup_test_environment();

    let (peer, mut router) = common::establish_session(PeerConfig::default()).await;

    let mut call = peer.call(procedure(), RpcCall::default()).await.unwrap();
    let call_message = assert_matches::assert_matches!(
        next_message(&mut router).await,
        Message::Call(message) => message
    );

    call.cancel(CallCancelMode::Kill).unwrap();
    assert_matches::assert_matches!(
        next_message(&mut router).await,
        Message::Cancel(message) => {
            assert_eq!(message.call_request, call_message.request);
            assert_eq!(message.options.get("mode"), Some(&Value::String("kill".to_owned())));
        }
    );

    // The router still owns the call's fate; a terminal RESULT closes the
    // stream normally.
    send_message(
        &mut router,
        Message::Result(ResultMessage {
            call_request: call_message.request,
            details: Dictionary::default(),
            yield_arguments: List::from_iter([Value::String("done".to_owned())]),
            yield_arguments_keyword: Dictionary::default(),
        }),
    )
    .await;

    assert_matches::assert_matches!(call.next_result().await, Ok(Some(result)) => {
        assert_eq!(result.arguments, List::from_iter([Value::String("done".to_owned())]));
    });
    assert_matches::assert_matches!(call.next_result().await, Ok(None));
}

#[tokio::test]
async fn dropping_an_unfinished_call_cancels_with_skip() {
    common::setup_test_environment();

    let (peer, mut router) = common::establish_session(PeerConfig::default()).await;

    let call = peer.call(procedure(), RpcCall::default()).await.unwrap();
    let call_message = assert_matches::assert_matches!(
        next_message(&mut router).await,
        Message::Call(message) => message
    );

    drop(call);
    assert_matches::assert_matches!(
        next_message(&mut router).await,
        Message::Cancel(message) => {
            assert_eq!(message.call_request, call_message.request);
            assert_eq!(message.options.get("mode"), Some(&Value::String("skip".to_owned())));
        }
    );

    // The router's terminal response for the abandoned call is absorbed
    // without killing the session.
    send_message(
        &mut router,
        Message::Result(ResultMessage {
            call_request: call_message.request,
            ..Default::default()
        }),
    )
    .await;
    assert!(peer.is_connected().await);
}

#[tokio::test]
async fn surfaces_call_errors_from_router() {
    common::setup_test_environment();

    let (peer, mut router) = common::establish_session(PeerConfig::default()).await;

    let (result, _) = tokio::join!(peer.call_and_wait(procedure(), RpcCall::default()), async {
        let call = assert_matches::assert_matches!(
            next_message(&mut router).await,
            Message::Call(message) => message
        );
        send_message(
            &mut router,
            Message::Error(ErrorMessage {
                request_type: Message::CALL_TAG,
                request: call.request,
                details: Dictionary::default(),
                error: Uri::try_from("wamp.error.no_such_procedure").unwrap(),
                ..Default::default()
            }),
        )
        .await;
    });

    assert_matches::assert_matches!(result, Err(err) => {
        assert_matches::assert_matches!(err.downcast_ref::<WampError>(), Some(error) => {
            assert_eq!(error.reason.as_ref(), "wamp.error.no_such_procedure");
        });
    });
    assert!(peer.is_connected().await);
}

#[tokio::test]
async fn invokes_registered_procedure_and_yields() {
    common::setup_test_environment();

    let (peer, mut router) = common::establish_session(PeerConfig::default()).await;
    let mut procedure = register_procedure(&peer, &mut router, 9).await;
    assert_eq!(procedure.id, Id::try_from(9).unwrap());

    fn add2(invocation: &wampeer::peer::Invocation) -> Result<u64> {
        match (invocation.arguments.first(), invocation.arguments.get(1)) {
            (Some(Value::Integer(a)), Some(Value::Integer(b))) => Ok(a + b),
            _ => Err(BasicError::InvalidArgument("invalid arguments".to_owned()).into()),
        }
    }

    send_message(
        &mut router,
        Message::Invocation(InvocationMessage {
            request: Id::try_from(100).unwrap(),
            registered_registration: Id::try_from(9).unwrap(),
            details: Dictionary::default(),
            call_arguments: List::from_iter([Value::Integer(12), Value::Integer(33)]),
            call_arguments_keyword: Dictionary::default(),
        }),
    )
    .await;

    let invocation = procedure.invocation_rx.recv().await.unwrap();
    assert_eq!(invocation.id(), Id::try_from(100).unwrap());
    assert_eq!(invocation.registration_id(), Id::try_from(9).unwrap());
    let sum = add2(&invocation).unwrap();
    invocation
        .respond(Ok(RpcYield {
            arguments: List::from_iter([Value::Integer(sum)]),
            ..Default::default()
        }))
        .unwrap();

    assert_matches::assert_matches!(
        next_message(&mut router).await,
        Message::Yield(message) => {
            assert_eq!(message.invocation_request, Id::try_from(100).unwrap());
            assert_eq!(message.arguments, List::from_iter([Value::Integer(45)]));
        }
    );
}

#[tokio::test]
async fn responds_to_invocation_with_error_from_callee() {
    common::setup_test_environment();

    let (peer, mut router) = common::establish_session(PeerConfig::default()).await;
    let mut procedure = register_procedure(&peer, &mut router, 9).await;

    send_message(
        &mut router,
        Message::Invocation(InvocationMessage {
            request: Id::try_from(101).unwrap(),
            registered_registration: Id::try_from(9).unwrap(),
            details: Dictionary::default(),
            call_arguments: List::from_iter([Value::Bool(false)]),
            call_arguments_keyword: Dictionary::default(),
        }),
    )
    .await;

    let invocation = procedure.invocation_rx.recv().await.unwrap();
    invocation
        .respond(Err(
            BasicError::InvalidArgument("invalid arguments".to_owned()).into()
        ))
        .unwrap();

    assert_matches::assert_matches!(
        next_message(&mut router).await,
        Message::Error(message) => {
            assert_eq!(message.request_type, Message::INVOCATION_TAG);
            assert_eq!(message.request, Id::try_from(101).unwrap());
            assert_eq!(message.error.as_ref(), "wamp.error.invalid_argument");
        }
    );
}

#[tokio::test]
async fn answers_unknown_invocations_with_no_such_registration() {
    common::setup_test_environment();

    let (peer, mut router) = common::establish_session(PeerConfig::default()).await;

    send_message(
        &mut router,
        Message::Invocation(InvocationMessage {
            request: Id::try_from(102).unwrap(),
            registered_registration: Id::try_from(999).unwrap(),
            ..Default::default()
        }),
    )
    .await;

    assert_matches::assert_matches!(
        next_message(&mut router).await,
        Message::Error(message) => {
            assert_eq!(message.request_type, Message::INVOCATION_TAG);
            assert_eq!(message.request, Id::try_from(102).unwrap());
            assert_eq!(message.details, Dictionary::default());
            assert_eq!(message.error.as_ref(), "wamp.error.no_such_registration");
        }
    );
    assert!(peer.is_connected().await);
}

#[tokio::test]
async fn late_invocations_after_unregister_are_answered_with_error() {
    common::setup_test_environment();

    let (peer, mut router) = common::establish_session(PeerConfig::default()).await;
    let mut procedure = register_procedure(&peer, &mut router, 9).await;

    let (result, _) = tokio::join!(peer.unregister(procedure.id), async {
        let unregister = assert_matches::assert_matches!(
            next_message(&mut router).await,
            Message::Unregister(message) => message
        );
        assert_eq!(
            unregister.registered_registration,
            Id::try_from(9).unwrap()
        );
        send_message(
            &mut router,
            Message::Unregistered(UnregisteredMessage {
                unregister_request: unregister.request,
            }),
        )
        .await;
    });
    result.unwrap();

    // The invocation stream closed with the registration.
    assert_matches::assert_matches!(procedure.invocation_rx.recv().await, None);

    send_message(
        &mut router,
        Message::Invocation(InvocationMessage {
            request: Id::try_from(103).unwrap(),
            registered_registration: Id::try_from(9).unwrap(),
            ..Default::default()
        }),
    )
    .await;

    assert_matches::assert_matches!(
        next_message(&mut router).await,
        Message::Error(message) => {
            assert_eq!(message.request, Id::try_from(103).unwrap());
            assert_eq!(message.error.as_ref(), "wamp.error.no_such_registration");
        }
    );
}

#[tokio::test]
async fn call_and_wait_returns_terminal_result() {
    common::setup_test_environment();

    let (peer, mut router) = common::establish_session(PeerConfig::default()).await;

    let (result, _) = tokio::join!(
        peer.call_and_wait(
            procedure(),
            RpcCall {
                arguments: List::from_iter([Value::Integer(12), Value::Integer(33)]),
                ..Default::default()
            },
        ),
        async {
            let call = assert_matches::assert_matches!(
                next_message(&mut router).await,
                Message::Call(message) => message
            );
            assert_eq!(
                call.arguments,
                List::from_iter([Value::Integer(12), Value::Integer(33)])
            );
            send_message(
                &mut router,
                Message::Result(ResultMessage {
                    call_request: call.request,
                    details: Dictionary::default(),
                    yield_arguments: List::from_iter([Value::Integer(45)]),
                    yield_arguments_keyword: Dictionary::default(),
                }),
            )
            .await;
        }
    );

    pretty_assertions::assert_eq!(
        result.unwrap(),
        RpcResult {
            arguments: List::from_iter([Value::Integer(45)]),
            ..Default::default()
        }
    );
}

#[tokio::test]
async fn transport_disconnect_fails_outstanding_requests_and_closes_sinks() {
    common::setup_test_environment();

    let (peer, mut router) = common::establish_session(PeerConfig::default()).await;
    let mut procedure = register_procedure(&peer, &mut router, 9).await;

    let mut call = peer.call(procedure_uri_for_disconnect(), RpcCall::default())
        .await
        .unwrap();
    assert_matches::assert_matches!(next_message(&mut router).await, Message::Call(_));

    let mut disconnect_rx = peer.disconnect_rx().await.unwrap();

    // The router goes away without a GOODBYE.
    drop(router);

    assert_matches::assert_matches!(call.next_result().await, Err(err) => {
        assert_matches::assert_matches!(err.downcast_ref::<WampError>(), Some(error) => {
            assert_eq!(error.reason.as_ref(), "wamp.error.canceled");
            assert_eq!(error.message, "session closed");
        });
    });
    assert_matches::assert_matches!(procedure.invocation_rx.recv().await, None);
    assert_matches::assert_matches!(
        disconnect_rx.recv().await,
        Ok(wampeer::peer::DisconnectReason::Clean)
    );
    assert!(!peer.is_connected().await);
}

fn procedure_uri_for_disconnect() -> Uri {
    Uri::try_from("com.wampeer.slow").unwrap()
}
