use anyhow::{
    Error,
    Result,
};
use log::{
    debug,
    info,
    warn,
};
use tokio::sync::{
    broadcast,
    mpsc::{
        unbounded_channel,
        UnboundedReceiver,
        UnboundedSender,
    },
    oneshot,
    Mutex,
};

use crate::{
    core::{
        close::CloseReason,
        error::{
            message_from_details,
            InteractionError,
            PeerNotConnectedError,
            WampError,
        },
        hash::HashMap,
        id::{
            Id,
            RequestIdAllocator,
        },
        options::{
            CallOptions,
            ProcedureOptions,
            PublishOptions,
            SubscriptionOptions,
        },
        types::{
            Dictionary,
            List,
            Value,
        },
        uri::{
            Uri,
            WildcardUri,
        },
    },
    message::{
        common::{
            error_for_request,
            goodbye_and_out,
            goodbye_with_close_reason,
        },
        message::{
            CallMessage,
            ErrorMessage,
            EventMessage,
            HelloMessage,
            InvocationMessage,
            Message,
            PublishMessage,
            RegisterMessage,
            ResultMessage,
            SubscribeMessage,
            UnregisterMessage,
            UnsubscribeMessage,
            WelcomeMessage,
            YieldMessage,
        },
    },
};

/// The identity of an established WAMP session.
///
/// Assigned by the router in the WELCOME message and immutable for the
/// session's lifetime.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionInfo {
    /// The session id assigned by the router.
    pub id: Id,
    /// The realm the session was established on.
    pub realm: Uri,
    /// The authentication id the peer was authenticated as.
    pub auth_id: Option<String>,
    /// The authentication role assigned to the peer.
    pub auth_role: Option<String>,
    /// The authentication method that was used.
    pub auth_method: Option<String>,
    /// The actual provider of authentication.
    pub auth_provider: Option<String>,
}

impl SessionInfo {
    fn from_welcome(realm: Uri, message: &WelcomeMessage) -> Self {
        let detail = |key: &str| {
            message
                .details
                .get(key)
                .and_then(Value::string)
                .map(str::to_owned)
        };
        Self {
            id: message.session,
            realm,
            auth_id: detail("authid"),
            auth_role: detail("authrole"),
            auth_method: detail("authmethod"),
            auth_provider: detail("authprovider"),
        }
    }
}

/// An event payload to be published to a topic.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct PublishedEvent {
    pub arguments: List,
    pub arguments_keyword: Dictionary,
}

/// An event received over a subscription.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ReceivedEvent {
    pub arguments: List,
    pub arguments_keyword: Dictionary,
    /// The concrete topic the event was published to, if the router disclosed
    /// it (pattern-based subscriptions).
    pub topic: Option<Uri>,
}

/// Arguments of a procedure call.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RpcCall {
    pub arguments: List,
    pub arguments_keyword: Dictionary,
}

/// The result of a procedure call.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RpcResult {
    pub arguments: List,
    pub arguments_keyword: Dictionary,
}

/// The result yielded from an invocation by callee code.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RpcYield {
    pub arguments: List,
    pub arguments_keyword: Dictionary,
}

/// An invocation of a registered procedure, delivered to the callee.
///
/// The invocation must be answered exactly once with [`Self::respond`], which
/// routes a YIELD (or ERROR) back through the session's transport.
#[derive(Debug)]
pub struct Invocation {
    pub arguments: List,
    pub arguments_keyword: Dictionary,

    id: Id,
    registration: Id,
    message_tx: UnboundedSender<Message>,
}

impl Invocation {
    /// The invocation request id.
    pub fn id(&self) -> Id {
        self.id
    }

    /// The registration the invocation was matched against.
    pub fn registration_id(&self) -> Id {
        self.registration
    }

    /// Responds to the invocation.
    pub fn respond(self, rpc_yield: Result<RpcYield>) -> Result<()> {
        let message = match rpc_yield {
            Ok(rpc_yield) => Message::Yield(YieldMessage {
                invocation_request: self.id,
                options: Dictionary::default(),
                arguments: rpc_yield.arguments,
                arguments_keyword: rpc_yield.arguments_keyword,
            }),
            Err(err) => error_for_request(
                &Message::Invocation(InvocationMessage {
                    request: self.id,
                    registered_registration: self.registration,
                    ..Default::default()
                }),
                &err,
            ),
        };
        self.message_tx
            .send(message)
            .map_err(|_| Error::from(PeerNotConnectedError))
    }
}

/// A response pushed into a call's result stream by the dispatcher.
#[derive(Debug)]
pub(crate) enum CallResponse {
    /// A RESULT with the `progress` flag; more results follow.
    Progress(RpcResult),
    /// The terminal RESULT; the stream is complete.
    Final(RpcResult),
    /// A correlated ERROR; the stream failed.
    Error(WampError),
}

/// A confirmed subscription, handed to the requester.
pub(crate) struct GrantedSubscription {
    pub subscription_id: Id,
    pub event_rx: UnboundedReceiver<ReceivedEvent>,
}

/// A confirmed registration, handed to the requester.
pub(crate) struct GrantedRegistration {
    pub registration_id: Id,
    pub invocation_rx: UnboundedReceiver<Invocation>,
}

type Responder<T> = oneshot::Sender<Result<T, WampError>>;

struct PendingSubscribe {
    topic: WildcardUri,
    responder: Responder<GrantedSubscription>,
}

struct PendingUnsubscribe {
    subscription: Id,
    responder: Responder<()>,
}

struct PendingRegister {
    procedure: WildcardUri,
    responder: Responder<GrantedRegistration>,
}

struct PendingUnregister {
    registration: Id,
    responder: Responder<()>,
}

/// Allocates request ids and correlates responses for the six request classes.
///
/// Ids are monotonic per class and unique within the session. Every entry is
/// a waiter for exactly one response (or, for calls, a stream of results).
#[derive(Default)]
struct RequestRegistry {
    call_ids: RequestIdAllocator,
    publish_ids: RequestIdAllocator,
    subscribe_ids: RequestIdAllocator,
    unsubscribe_ids: RequestIdAllocator,
    register_ids: RequestIdAllocator,
    unregister_ids: RequestIdAllocator,

    calls: HashMap<Id, UnboundedSender<CallResponse>>,
    publishes: HashMap<Id, Responder<Id>>,
    subscribes: HashMap<Id, PendingSubscribe>,
    unsubscribes: HashMap<Id, PendingUnsubscribe>,
    registers: HashMap<Id, PendingRegister>,
    unregisters: HashMap<Id, PendingUnregister>,
}

impl RequestRegistry {
    /// Fails every outstanding request with a session-closed error.
    fn fail_all(&mut self) {
        for (_, waiter) in self.calls.drain() {
            waiter
                .send(CallResponse::Error(WampError::session_closed()))
                .ok();
        }
        for (_, responder) in self.publishes.drain() {
            responder.send(Err(WampError::session_closed())).ok();
        }
        for (_, pending) in self.subscribes.drain() {
            pending.responder.send(Err(WampError::session_closed())).ok();
        }
        for (_, pending) in self.unsubscribes.drain() {
            pending.responder.send(Err(WampError::session_closed())).ok();
        }
        for (_, pending) in self.registers.drain() {
            pending.responder.send(Err(WampError::session_closed())).ok();
        }
        for (_, pending) in self.unregisters.drain() {
            pending.responder.send(Err(WampError::session_closed())).ok();
        }
    }
}

struct SubscriptionRecord {
    #[allow(unused)]
    topic: WildcardUri,
    event_tx: UnboundedSender<ReceivedEvent>,
}

struct RegistrationRecord {
    #[allow(unused)]
    procedure: WildcardUri,
    invocation_tx: UnboundedSender<Invocation>,
}

#[derive(Debug, Default)]
enum SessionState {
    #[default]
    Closed,
    Connecting {
        realm: Uri,
    },
    Challenging {
        realm: Uri,
    },
    Established {
        info: SessionInfo,
    },
    Closing,
}

impl SessionState {
    fn name(&self) -> &'static str {
        match self {
            Self::Closed => "CLOSED",
            Self::Connecting { .. } => "CONNECTING",
            Self::Challenging { .. } => "CHALLENGING",
            Self::Established { .. } => "ESTABLISHED",
            Self::Closing => "CLOSING",
        }
    }
}

struct SessionInner {
    state: SessionState,
    requests: RequestRegistry,
    subscriptions: HashMap<Id, SubscriptionRecord>,
    registrations: HashMap<Id, RegistrationRecord>,
}

/// The peer end of a WAMP session.
///
/// Owns the session state machine, the request registry, and the maps of live
/// subscriptions and registrations. All state lives behind a single lock, so
/// the dispatcher task and the interaction surface mutate it in a serialized
/// fashion; nothing is held across a suspension point.
pub(crate) struct Session {
    name: String,
    message_tx: UnboundedSender<Message>,
    inner: Mutex<SessionInner>,
    closed_tx: broadcast::Sender<()>,
}

impl Session {
    /// Creates a new session writing outbound messages to the given channel.
    pub fn new(name: String, message_tx: UnboundedSender<Message>) -> Self {
        let (closed_tx, _) = broadcast::channel(1);
        Self {
            name,
            message_tx,
            inner: Mutex::new(SessionInner {
                state: SessionState::default(),
                requests: RequestRegistry::default(),
                subscriptions: HashMap::default(),
                registrations: HashMap::default(),
            }),
            closed_tx,
        }
    }

    /// The name of the session, for logging.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The channel for writing messages to the transport.
    pub fn message_tx(&self) -> UnboundedSender<Message> {
        self.message_tx.clone()
    }

    /// The receiver channel, populated when the session moves to the CLOSED
    /// state.
    pub fn closed_rx(&self) -> broadcast::Receiver<()> {
        self.closed_tx.subscribe()
    }

    /// Checks if the session is closed.
    pub async fn closed(&self) -> bool {
        matches!(self.inner.lock().await.state, SessionState::Closed)
    }

    /// Checks if the session is established.
    pub async fn is_established(&self) -> bool {
        matches!(
            self.inner.lock().await.state,
            SessionState::Established { .. }
        )
    }

    /// The identity of the established session.
    pub async fn session_info(&self) -> Option<SessionInfo> {
        match &self.inner.lock().await.state {
            SessionState::Established { info } => Some(info.clone()),
            _ => None,
        }
    }

    fn send(&self, message: Message) -> Result<()> {
        self.message_tx
            .send(message)
            .map_err(|_| Error::from(PeerNotConnectedError))
    }

    fn transition(&self, inner: &mut SessionInner, state: SessionState) {
        debug!(
            "Peer {} transitioned from {} to {}",
            self.name,
            inner.state.name(),
            state.name()
        );
        inner.state = state;
    }

    /// Sends HELLO, entering the handshake.
    pub async fn send_hello(&self, realm: Uri, details: Dictionary) -> Result<()> {
        let mut inner = self.inner.lock().await;
        match inner.state {
            SessionState::Closed => (),
            ref state => {
                return Err(Error::msg(format!(
                    "cannot start a handshake on a {} session",
                    state.name()
                )))
            }
        }
        self.transition(
            &mut inner,
            SessionState::Connecting {
                realm: realm.clone(),
            },
        );
        self.send(Message::Hello(HelloMessage { realm, details }))
    }

    /// Records a CHALLENGE round, entering (or re-entering) the CHALLENGING
    /// state.
    pub async fn challenge_received(&self) -> Result<()> {
        let mut inner = self.inner.lock().await;
        let realm = match &inner.state {
            SessionState::Connecting { realm } | SessionState::Challenging { realm } => {
                realm.clone()
            }
            state => {
                return Err(InteractionError::ProtocolViolation(format!(
                    "received CHALLENGE message on a {} session",
                    state.name()
                ))
                .into())
            }
        };
        self.transition(&mut inner, SessionState::Challenging { realm });
        Ok(())
    }

    /// Adopts the identity assigned by a WELCOME, establishing the session.
    ///
    /// The identity is set exactly once; it is immutable until the session
    /// closes.
    pub async fn establish(&self, message: &WelcomeMessage) -> Result<SessionInfo> {
        let mut inner = self.inner.lock().await;
        let realm = match &inner.state {
            SessionState::Connecting { realm } | SessionState::Challenging { realm } => {
                realm.clone()
            }
            state => {
                return Err(InteractionError::ProtocolViolation(format!(
                    "received WELCOME message on a {} session",
                    state.name()
                ))
                .into())
            }
        };
        let info = SessionInfo::from_welcome(realm, message);
        info!(
            "Peer {} established session {} on realm {}",
            self.name, info.id, info.realm
        );
        self.transition(
            &mut inner,
            SessionState::Established { info: info.clone() },
        );
        Ok(info)
    }

    /// Marks a handshake as failed, closing the session.
    pub async fn handshake_failed(&self) {
        let mut inner = self.inner.lock().await;
        self.close_locked(&mut inner);
    }

    /// Sends GOODBYE to leave the realm, entering the CLOSING state.
    ///
    /// The session closes once the router acknowledges with its own GOODBYE.
    pub async fn leave(&self) -> Result<()> {
        let mut inner = self.inner.lock().await;
        match inner.state {
            SessionState::Established { .. } => (),
            _ => return Err(PeerNotConnectedError.into()),
        }
        self.transition(&mut inner, SessionState::Closing);
        self.send(goodbye_with_close_reason(CloseReason::Normal))
    }

    /// Fails all outstanding requests, closes all sinks, and marks the
    /// session closed. Idempotent.
    pub async fn teardown(&self) {
        let mut inner = self.inner.lock().await;
        self.close_locked(&mut inner);
    }

    fn close_locked(&self, inner: &mut SessionInner) {
        if matches!(inner.state, SessionState::Closed) {
            return;
        }
        self.transition(inner, SessionState::Closed);
        inner.requests.fail_all();
        // Dropping the records closes every event and invocation stream.
        inner.subscriptions.clear();
        inner.registrations.clear();
        self.closed_tx.send(()).ok();
    }

    fn established_mut<'a>(&self, inner: &'a mut SessionInner) -> Result<&'a mut SessionInner> {
        match inner.state {
            SessionState::Established { .. } => Ok(inner),
            _ => Err(PeerNotConnectedError.into()),
        }
    }

    /// Issues a CALL, returning the request id and the result stream.
    pub async fn call(
        &self,
        procedure: Uri,
        rpc_call: RpcCall,
        options: CallOptions,
    ) -> Result<(Id, UnboundedReceiver<CallResponse>)> {
        let mut inner = self.inner.lock().await;
        let inner = self.established_mut(&mut inner)?;
        let request_id = inner.requests.call_ids.generate();
        let (result_tx, result_rx) = unbounded_channel();
        inner.requests.calls.insert(request_id, result_tx);
        self.send(Message::Call(CallMessage {
            request: request_id,
            options: options.into(),
            procedure,
            arguments: rpc_call.arguments,
            arguments_keyword: rpc_call.arguments_keyword,
        }))?;
        Ok((request_id, result_rx))
    }

    /// Issues a PUBLISH.
    ///
    /// A PUBLISHED waiter is registered if and only if the options request
    /// acknowledgement; otherwise the publication completes at send and the
    /// returned receiver is absent.
    pub async fn publish(
        &self,
        topic: Uri,
        event: PublishedEvent,
        options: PublishOptions,
    ) -> Result<Option<oneshot::Receiver<Result<Id, WampError>>>> {
        let mut inner = self.inner.lock().await;
        let inner = self.established_mut(&mut inner)?;
        let request_id = inner.requests.publish_ids.generate();
        let acknowledge = options.acknowledge;
        let receiver = if acknowledge {
            let (responder, receiver) = oneshot::channel();
            inner.requests.publishes.insert(request_id, responder);
            Some(receiver)
        } else {
            None
        };
        self.send(Message::Publish(PublishMessage {
            request: request_id,
            options: options.into(),
            topic,
            arguments: event.arguments,
            arguments_keyword: event.arguments_keyword,
        }))?;
        Ok(receiver)
    }

    /// Issues a SUBSCRIBE, returning the request id and the waiter for the
    /// subscription grant.
    pub async fn subscribe(
        &self,
        topic: WildcardUri,
        options: SubscriptionOptions,
    ) -> Result<(Id, oneshot::Receiver<Result<GrantedSubscription, WampError>>)> {
        let mut inner = self.inner.lock().await;
        let inner = self.established_mut(&mut inner)?;
        let request_id = inner.requests.subscribe_ids.generate();
        let (responder, receiver) = oneshot::channel();
        inner.requests.subscribes.insert(
            request_id,
            PendingSubscribe {
                topic: topic.clone(),
                responder,
            },
        );
        self.send(Message::Subscribe(SubscribeMessage {
            request: request_id,
            options: options.into(),
            topic,
        }))?;
        Ok((request_id, receiver))
    }

    /// Issues an UNSUBSCRIBE for a granted subscription.
    pub async fn unsubscribe(
        &self,
        subscription: Id,
    ) -> Result<(Id, oneshot::Receiver<Result<(), WampError>>)> {
        let mut inner = self.inner.lock().await;
        let inner = self.established_mut(&mut inner)?;
        let request_id = inner.requests.unsubscribe_ids.generate();
        let (responder, receiver) = oneshot::channel();
        inner.requests.unsubscribes.insert(
            request_id,
            PendingUnsubscribe {
                subscription,
                responder,
            },
        );
        self.send(Message::Unsubscribe(UnsubscribeMessage {
            request: request_id,
            subscribed_subscription: subscription,
        }))?;
        Ok((request_id, receiver))
    }

    /// Issues a REGISTER, returning the request id and the waiter for the
    /// registration grant.
    pub async fn register(
        &self,
        procedure: WildcardUri,
        options: ProcedureOptions,
    ) -> Result<(Id, oneshot::Receiver<Result<GrantedRegistration, WampError>>)> {
        let mut inner = self.inner.lock().await;
        let inner = self.established_mut(&mut inner)?;
        let request_id = inner.requests.register_ids.generate();
        let (responder, receiver) = oneshot::channel();
        inner.requests.registers.insert(
            request_id,
            PendingRegister {
                procedure: procedure.clone(),
                responder,
            },
        );
        self.send(Message::Register(RegisterMessage {
            request: request_id,
            options: options.into(),
            procedure,
        }))?;
        Ok((request_id, receiver))
    }

    /// Issues an UNREGISTER for a granted registration.
    pub async fn unregister(
        &self,
        registration: Id,
    ) -> Result<(Id, oneshot::Receiver<Result<(), WampError>>)> {
        let mut inner = self.inner.lock().await;
        let inner = self.established_mut(&mut inner)?;
        let request_id = inner.requests.unregister_ids.generate();
        let (responder, receiver) = oneshot::channel();
        inner.requests.unregisters.insert(
            request_id,
            PendingUnregister {
                registration,
                responder,
            },
        );
        self.send(Message::Unregister(UnregisterMessage {
            request: request_id,
            registered_registration: registration,
        }))?;
        Ok((request_id, receiver))
    }

    /// Handles one inbound message over the session state machine.
    ///
    /// This is the dispatcher: every message is routed to the waiter for its
    /// request id, to the stream for its subscription or registration id, or
    /// to session control. An error is a protocol violation and is fatal to
    /// the session.
    pub async fn handle_message(&self, message: Message) -> Result<()> {
        debug!(
            "Peer {} received message: {}",
            self.name,
            message.message_name()
        );
        let mut inner = self.inner.lock().await;
        match inner.state {
            SessionState::Established { .. } => self.handle_established(&mut inner, message),
            SessionState::Closing => self.handle_closing(&mut inner, message),
            ref state => Err(InteractionError::ProtocolViolation(format!(
                "received {} message on a {} session",
                message.message_name(),
                state.name()
            ))
            .into()),
        }
    }

    fn handle_established(&self, inner: &mut SessionInner, message: Message) -> Result<()> {
        match message {
            Message::Abort(message) => {
                warn!(
                    "Session for peer {} aborted by router: {}",
                    self.name, message.reason
                );
                self.close_locked(inner);
                Ok(())
            }
            Message::Goodbye(message) => {
                debug!(
                    "Router said goodbye to peer {}: {}",
                    self.name, message.reason
                );
                self.send(goodbye_and_out())?;
                self.close_locked(inner);
                Ok(())
            }
            Message::Error(message) => self.handle_error(inner, message),
            Message::Subscribed(message) => {
                match inner.requests.subscribes.remove(&message.subscribe_request) {
                    Some(pending) => {
                        let (event_tx, event_rx) = unbounded_channel();
                        inner.subscriptions.insert(
                            message.subscription,
                            SubscriptionRecord {
                                topic: pending.topic,
                                event_tx,
                            },
                        );
                        pending
                            .responder
                            .send(Ok(GrantedSubscription {
                                subscription_id: message.subscription,
                                event_rx,
                            }))
                            .ok();
                    }
                    None => debug!(
                        "Peer {} received SUBSCRIBED for unknown request {}",
                        self.name, message.subscribe_request
                    ),
                }
                Ok(())
            }
            Message::Unsubscribed(message) => {
                match inner
                    .requests
                    .unsubscribes
                    .remove(&message.unsubscribe_request)
                {
                    Some(pending) => {
                        // Dropping the record closes the event stream; events
                        // that arrive late for this id are dropped silently.
                        inner.subscriptions.remove(&pending.subscription);
                        pending.responder.send(Ok(())).ok();
                    }
                    None => debug!(
                        "Peer {} received UNSUBSCRIBED for unknown request {}",
                        self.name, message.unsubscribe_request
                    ),
                }
                Ok(())
            }
            Message::Published(message) => {
                match inner.requests.publishes.remove(&message.publish_request) {
                    Some(responder) => {
                        responder.send(Ok(message.publication)).ok();
                    }
                    None => debug!(
                        "Peer {} received PUBLISHED for unknown request {}",
                        self.name, message.publish_request
                    ),
                }
                Ok(())
            }
            Message::Registered(message) => {
                match inner.requests.registers.remove(&message.register_request) {
                    Some(pending) => {
                        let (invocation_tx, invocation_rx) = unbounded_channel();
                        inner.registrations.insert(
                            message.registration,
                            RegistrationRecord {
                                procedure: pending.procedure,
                                invocation_tx,
                            },
                        );
                        pending
                            .responder
                            .send(Ok(GrantedRegistration {
                                registration_id: message.registration,
                                invocation_rx,
                            }))
                            .ok();
                    }
                    None => debug!(
                        "Peer {} received REGISTERED for unknown request {}",
                        self.name, message.register_request
                    ),
                }
                Ok(())
            }
            Message::Unregistered(message) => {
                match inner
                    .requests
                    .unregisters
                    .remove(&message.unregister_request)
                {
                    Some(pending) => {
                        inner.registrations.remove(&pending.registration);
                        pending.responder.send(Ok(())).ok();
                    }
                    None => debug!(
                        "Peer {} received UNREGISTERED for unknown request {}",
                        self.name, message.unregister_request
                    ),
                }
                Ok(())
            }
            Message::Event(message) => self.handle_event(inner, message),
            Message::Invocation(message) => self.handle_invocation(inner, message),
            Message::Result(message) => self.handle_result(inner, message),
            message => Err(InteractionError::ProtocolViolation(format!(
                "received {} message on an established session",
                message.message_name()
            ))
            .into()),
        }
    }

    fn handle_error(&self, inner: &mut SessionInner, message: ErrorMessage) -> Result<()> {
        let error = WampError {
            reason: message.error,
            message: message_from_details(&message.details),
            arguments: message.arguments,
            arguments_keyword: message.arguments_keyword,
        };
        let request = message.request;
        let matched = match message.request_type {
            Message::CALL_TAG => match inner.requests.calls.remove(&request) {
                Some(waiter) => {
                    waiter.send(CallResponse::Error(error)).ok();
                    true
                }
                None => false,
            },
            Message::PUBLISH_TAG => match inner.requests.publishes.remove(&request) {
                Some(responder) => {
                    responder.send(Err(error)).ok();
                    true
                }
                None => false,
            },
            Message::SUBSCRIBE_TAG => match inner.requests.subscribes.remove(&request) {
                Some(pending) => {
                    pending.responder.send(Err(error)).ok();
                    true
                }
                None => false,
            },
            Message::UNSUBSCRIBE_TAG => match inner.requests.unsubscribes.remove(&request) {
                Some(pending) => {
                    pending.responder.send(Err(error)).ok();
                    true
                }
                None => false,
            },
            Message::REGISTER_TAG => match inner.requests.registers.remove(&request) {
                Some(pending) => {
                    pending.responder.send(Err(error)).ok();
                    true
                }
                None => false,
            },
            Message::UNREGISTER_TAG => match inner.requests.unregisters.remove(&request) {
                Some(pending) => {
                    pending.responder.send(Err(error)).ok();
                    true
                }
                None => false,
            },
            request_type => {
                return Err(InteractionError::ProtocolViolation(format!(
                    "received ERROR message with unexpected request type {request_type}"
                ))
                .into())
            }
        };
        if !matched {
            debug!(
                "Peer {} received ERROR for unknown request {request} of type {}",
                self.name, message.request_type
            );
        }
        Ok(())
    }

    fn handle_event(&self, inner: &mut SessionInner, message: EventMessage) -> Result<()> {
        let subscription = message.subscribed_subscription;
        let event = ReceivedEvent {
            arguments: message.publish_arguments,
            arguments_keyword: message.publish_arguments_keyword,
            topic: message
                .details
                .get("topic")
                .and_then(Value::string)
                .and_then(|topic| Uri::try_from(topic).ok()),
        };
        match inner.subscriptions.get(&subscription) {
            Some(record) => {
                if record.event_tx.send(event).is_err() {
                    // The consumer dropped its stream without unsubscribing.
                    debug!(
                        "Peer {} dropped EVENT for abandoned subscription {subscription}",
                        self.name
                    );
                    inner.subscriptions.remove(&subscription);
                }
            }
            None => debug!(
                "Peer {} dropped EVENT for unknown subscription {subscription}",
                self.name
            ),
        }
        Ok(())
    }

    fn handle_invocation(&self, inner: &mut SessionInner, message: InvocationMessage) -> Result<()> {
        let registration = message.registered_registration;
        let request = message.request;
        let invocation = Invocation {
            arguments: message.call_arguments,
            arguments_keyword: message.call_arguments_keyword,
            id: request,
            registration,
            message_tx: self.message_tx.clone(),
        };
        let delivered = match inner.registrations.get(&registration) {
            Some(record) => match record.invocation_tx.send(invocation) {
                Ok(()) => true,
                Err(_) => {
                    // The callee dropped its stream without unregistering.
                    inner.registrations.remove(&registration);
                    false
                }
            },
            None => false,
        };
        if !delivered {
            debug!(
                "Peer {} received INVOCATION {request} for unknown registration {registration}",
                self.name
            );
            self.send(Message::Error(ErrorMessage {
                request_type: Message::INVOCATION_TAG,
                request,
                details: Dictionary::default(),
                error: Uri::from_known("wamp.error.no_such_registration"),
                ..Default::default()
            }))?;
        }
        Ok(())
    }

    fn handle_result(&self, inner: &mut SessionInner, message: ResultMessage) -> Result<()> {
        let request = message.call_request;
        let progress = message
            .details
            .get("progress")
            .and_then(Value::bool)
            .unwrap_or(false);
        let result = RpcResult {
            arguments: message.yield_arguments,
            arguments_keyword: message.yield_arguments_keyword,
        };
        if progress {
            match inner.requests.calls.get(&request) {
                Some(waiter) => {
                    // A dropped stream stays pending until the terminal
                    // response, so failed sends here are expected.
                    waiter.send(CallResponse::Progress(result)).ok();
                }
                None => debug!(
                    "Peer {} received RESULT for unknown call {request}",
                    self.name
                ),
            }
        } else {
            match inner.requests.calls.remove(&request) {
                Some(waiter) => {
                    waiter.send(CallResponse::Final(result)).ok();
                }
                None => debug!(
                    "Peer {} received RESULT for unknown call {request}",
                    self.name
                ),
            }
        }
        Ok(())
    }

    fn handle_closing(&self, inner: &mut SessionInner, message: Message) -> Result<()> {
        match message {
            Message::Goodbye(_) | Message::Abort(_) => {
                self.close_locked(inner);
                Ok(())
            }
            // The router may still be flushing messages it routed before
            // seeing our GOODBYE.
            message => {
                debug!(
                    "Peer {} dropped {} message on a closing session",
                    self.name,
                    message.message_name()
                );
                Ok(())
            }
        }
    }
}
