use std::{
    fmt::Debug,
    sync::Arc,
};

use anyhow::{
    Error,
    Result,
};
use log::{
    debug,
    error,
    info,
    warn,
};
use tokio::sync::{
    broadcast,
    mpsc::{
        UnboundedReceiver,
        UnboundedSender,
    },
    Mutex,
};

use crate::{
    auth::ClientAuthenticator,
    core::{
        cancel::CallCancelMode,
        error::{
            message_from_details,
            AbortError,
            InteractionError,
            PeerNotConnectedError,
            UnsupportedAuthMethodError,
            WampError,
        },
        hash::HashSet,
        id::Id,
        options::{
            CallOptions,
            ProcedureOptions,
            PublishOptions,
            SubscriptionOptions,
        },
        roles::{
            roles_for_details,
            PeerRole,
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
            abort_message_for_error,
            goodbye_and_out,
        },
        message::{
            CancelMessage,
            Message,
        },
    },
    peer::{
        service::{
            DisconnectReason,
            Service,
            ServiceHandle,
        },
        session::{
            CallResponse,
            Invocation,
            PublishedEvent,
            ReceivedEvent,
            RpcCall,
            RpcResult,
            Session,
            SessionInfo,
        },
    },
    transport::Transport,
};

const DEFAULT_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "-", env!("CARGO_PKG_VERSION"));

/// Configuration for a [`Peer`].
pub struct PeerConfig {
    /// Name of the peer, mostly for logging.
    pub name: String,
    /// Agent name, communicated to the router.
    pub agent: String,
    /// Roles implemented by the peer.
    pub roles: HashSet<PeerRole>,
    /// The authentication id offered in the HELLO details.
    pub auth_id: Option<String>,
    /// Authenticators offered for the challenge-response exchange, in order
    /// of preference.
    ///
    /// The method named by the router's CHALLENGE decides which one answers;
    /// if several share a name, the first wins.
    pub authenticators: Vec<Arc<dyn ClientAuthenticator>>,
}

impl Debug for PeerConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PeerConfig")
            .field("name", &self.name)
            .field("agent", &self.agent)
            .field("roles", &self.roles)
            .field("auth_id", &self.auth_id)
            .field(
                "authenticators",
                &self
                    .authenticators
                    .iter()
                    .map(|authenticator| authenticator.name().to_owned())
                    .collect::<Vec<_>>(),
            )
            .finish()
    }
}

impl Default for PeerConfig {
    fn default() -> Self {
        Self {
            name: DEFAULT_AGENT.to_owned(),
            agent: DEFAULT_AGENT.to_owned(),
            roles: HashSet::from_iter([
                PeerRole::Callee,
                PeerRole::Caller,
                PeerRole::Publisher,
                PeerRole::Subscriber,
            ]),
            auth_id: None,
            authenticators: Vec::new(),
        }
    }
}

struct PeerState {
    service: ServiceHandle,
    session: Arc<Session>,
}

/// A subscription to a topic.
///
/// Events published to the topic arrive on `event_rx`, in the order the
/// router sent them. The stream closes when the peer unsubscribes or when the
/// session ends.
#[derive(Debug)]
pub struct Subscription {
    /// The subscription id, assigned by the router.
    pub id: Id,
    /// The topic subscribed to.
    pub topic: WildcardUri,
    /// The event receiver stream.
    pub event_rx: UnboundedReceiver<ReceivedEvent>,
}

/// A procedure registered in the realm.
///
/// Invocations of the procedure arrive on `invocation_rx`; each one carries
/// its own response hook. The stream closes when the peer unregisters or when
/// the session ends.
#[derive(Debug)]
pub struct Procedure {
    /// The registration id, assigned by the router.
    pub id: Id,
    /// The procedure registered.
    pub procedure: WildcardUri,
    /// The invocation receiver stream.
    pub invocation_rx: UnboundedReceiver<Invocation>,
}

/// An in-flight procedure call.
///
/// Results are consumed with [`Self::next_result`], which yields every
/// progressive RESULT in order and finishes after the terminal one. A router
/// ERROR fails the stream.
///
/// Dropping an unfinished call sends a CANCEL with mode
/// [`skip`][`CallCancelMode::Skip`]; the router's terminal response then
/// releases the call's slot in the session.
#[derive(Debug)]
pub struct PendingCall {
    request_id: Id,
    message_tx: UnboundedSender<Message>,
    result_rx: UnboundedReceiver<CallResponse>,
    finished: bool,
    canceled: bool,
}

impl PendingCall {
    /// The request id of the CALL.
    pub fn request_id(&self) -> Id {
        self.request_id
    }

    /// The next result of the call.
    ///
    /// Returns `Ok(None)` once the call has finished. The result carried by
    /// the terminal RESULT is yielded like any other; the call only counts as
    /// finished after it has been consumed.
    pub async fn next_result(&mut self) -> Result<Option<RpcResult>> {
        if self.finished {
            return Ok(None);
        }
        match self.result_rx.recv().await {
            Some(CallResponse::Progress(result)) => Ok(Some(result)),
            Some(CallResponse::Final(result)) => {
                self.finished = true;
                Ok(Some(result))
            }
            Some(CallResponse::Error(err)) => {
                self.finished = true;
                Err(err.into_error())
            }
            None => {
                self.finished = true;
                Ok(None)
            }
        }
    }

    /// Waits for the call to finish, returning the terminal result.
    ///
    /// Progressive results are discarded.
    pub async fn wait(mut self) -> Result<RpcResult> {
        let mut last = None;
        while let Some(result) = self.next_result().await? {
            last = Some(result);
        }
        last.ok_or_else(|| Error::msg("call finished without a result"))
    }

    /// Cancels the call with the given mode.
    ///
    /// The result stream stays open until the router delivers its terminal
    /// RESULT or ERROR.
    pub fn cancel(&mut self, mode: CallCancelMode) -> Result<()> {
        self.canceled = true;
        self.message_tx
            .send(Message::Cancel(CancelMessage {
                call_request: self.request_id,
                options: Dictionary::from_iter([(
                    "mode".to_owned(),
                    Value::String(mode.into()),
                )]),
            }))
            .map_err(|_| Error::from(PeerNotConnectedError))
    }
}

impl Drop for PendingCall {
    fn drop(&mut self) {
        if !self.finished && !self.canceled {
            self.cancel(CallCancelMode::Skip).ok();
        }
    }
}

/// A WAMP peer (a.k.a., client) that establishes a session in a realm over a
/// [`Transport`][`crate::transport::Transport`] and interacts with resources
/// in the realm.
pub struct Peer {
    config: PeerConfig,
    drop_tx: broadcast::Sender<()>,
    peer_state: Arc<Mutex<Option<PeerState>>>,
}

impl Peer {
    /// Creates a new peer.
    pub fn new(config: PeerConfig) -> Self {
        let (drop_tx, _) = broadcast::channel(1);
        Self {
            config,
            drop_tx,
            peer_state: Arc::new(Mutex::new(None)),
        }
    }

    /// The name of the peer.
    pub fn name(&self) -> &str {
        &self.config.name
    }

    /// Connects to a router over the given transport and establishes a WAMP
    /// session on the realm.
    ///
    /// Opens the transport, performs the opening handshake (including any
    /// challenge-response authentication rounds with the configured
    /// authenticators), and hands the connection over to a background
    /// dispatcher once the router sends WELCOME.
    ///
    /// The session exists for as long as the router allows it to. It is lost
    /// when [`Self::leave_realm`] is called, when the router terminates the
    /// session, or when the transport disconnects. The peer can connect again
    /// with a fresh transport afterwards.
    pub async fn connect(
        &self,
        mut transport: Box<dyn Transport>,
        realm: &str,
    ) -> Result<SessionInfo> {
        let realm = Uri::try_from(realm).map_err(Error::new)?;

        let mut peer_state = self.peer_state.lock().await;
        if peer_state.is_some() {
            return Err(Error::msg("peer is already connected"));
        }

        transport.open().await?;
        info!(
            "Transport opened for peer {} towards realm {realm}",
            self.config.name
        );

        let (service, mut inbound_rx) = Service::new(self.config.name.clone(), transport);
        let service = service.start();
        let session = Arc::new(Session::new(
            self.config.name.clone(),
            service.message_tx(),
        ));

        let mut end_rx = service.end_rx();
        let handshake = self
            .handshake(&session, &mut inbound_rx, &mut end_rx, realm)
            .await;
        let info = match handshake {
            Ok(info) => info,
            Err(err) => {
                session.teardown().await;
                service.cancel().ok();
                return Err(err);
            }
        };

        *peer_state = Some(PeerState {
            service,
            session: session.clone(),
        });
        tokio::spawn(Self::dispatch(
            session,
            inbound_rx,
            end_rx,
            self.drop_tx.subscribe(),
            self.peer_state.clone(),
        ));

        Ok(info)
    }

    /// Performs the opening handshake: HELLO, any number of
    /// CHALLENGE/AUTHENTICATE rounds, then WELCOME or ABORT.
    ///
    /// The handshake is the sole consumer of the inbound sequence; the
    /// dispatcher takes over only after WELCOME.
    async fn handshake(
        &self,
        session: &Arc<Session>,
        inbound_rx: &mut UnboundedReceiver<Message>,
        end_rx: &mut broadcast::Receiver<DisconnectReason>,
        realm: Uri,
    ) -> Result<SessionInfo> {
        let mut details = Dictionary::default();
        details.insert("agent".to_owned(), Value::String(self.config.agent.clone()));
        details.insert(
            "roles".to_owned(),
            Value::Dictionary(roles_for_details(&self.config.roles)),
        );
        if !self.config.authenticators.is_empty() {
            details.insert(
                "authmethods".to_owned(),
                Value::List(List::from_iter(
                    self.config
                        .authenticators
                        .iter()
                        .map(|authenticator| Value::String(authenticator.name().to_owned())),
                )),
            );
        }
        if let Some(auth_id) = &self.config.auth_id {
            details.insert("authid".to_owned(), Value::String(auth_id.clone()));
        }

        session.send_hello(realm, details).await?;

        loop {
            let message = tokio::select! {
                message = inbound_rx.recv() => match message {
                    Some(message) => message,
                    None => return Err(Error::msg("transport closed during the handshake")),
                },
                _ = end_rx.recv() => {
                    return Err(Error::msg("transport disconnected during the handshake"));
                }
            };
            match message {
                Message::Challenge(challenge) => {
                    session.challenge_received().await?;
                    let authenticator = self
                        .config
                        .authenticators
                        .iter()
                        .find(|authenticator| authenticator.name() == challenge.auth_method);
                    let authenticator = match authenticator {
                        Some(authenticator) => authenticator,
                        None => {
                            // We cannot answer the challenge, so say goodbye
                            // instead of leaving the router hanging.
                            session.message_tx().send(goodbye_and_out()).ok();
                            return Err(UnsupportedAuthMethodError {
                                method: challenge.auth_method,
                            }
                            .into());
                        }
                    };
                    debug!(
                        "Peer {} answering {} challenge",
                        self.config.name, challenge.auth_method
                    );
                    let authenticate = authenticator.challenge(challenge.extra).await?;
                    session
                        .message_tx()
                        .send(Message::Authenticate(authenticate))
                        .map_err(|_| Error::from(PeerNotConnectedError))?;
                }
                Message::Welcome(welcome) => {
                    return session.establish(&welcome).await;
                }
                Message::Abort(abort) => {
                    return Err(AbortError {
                        reason: abort.reason,
                        message: message_from_details(&abort.details),
                    }
                    .into());
                }
                message => {
                    let err: Error = InteractionError::ProtocolViolation(format!(
                        "received {} message during the handshake",
                        message.message_name()
                    ))
                    .into();
                    session.message_tx().send(abort_message_for_error(&err)).ok();
                    return Err(err);
                }
            }
        }
    }

    /// The dispatcher task: consumes the inbound sequence for the lifetime of
    /// the established session and drives the session state machine.
    async fn dispatch(
        session: Arc<Session>,
        mut inbound_rx: UnboundedReceiver<Message>,
        mut end_rx: broadcast::Receiver<DisconnectReason>,
        mut drop_rx: broadcast::Receiver<()>,
        peer_state: Arc<Mutex<Option<PeerState>>>,
    ) {
        loop {
            tokio::select! {
                message = inbound_rx.recv() => match message {
                    Some(message) => {
                        if let Err(err) = session.handle_message(message).await {
                            error!("Peer session {} failed: {err:#}", session.name());
                            // Protocol violations are fatal: abort if we still
                            // can, then close everything.
                            session.message_tx().send(abort_message_for_error(&err)).ok();
                            session.teardown().await;
                        }
                    }
                    None => {
                        debug!("Inbound stream for peer {} ended", session.name());
                        session.teardown().await;
                    }
                },
                reason = end_rx.recv() => {
                    match reason {
                        Ok(DisconnectReason::Error(err)) => {
                            warn!("Peer {} disconnected: {err}", session.name());
                        }
                        _ => debug!("Peer {} disconnected", session.name()),
                    }
                    session.teardown().await;
                }
                _ = drop_rx.recv() => {
                    session.teardown().await;
                }
            }
            if session.closed().await {
                break;
            }
        }
        info!("Peer session {} finished", session.name());
        if let Some(state) = peer_state.lock().await.take() {
            state.service.cancel().ok();
        }
    }

    async fn session(&self) -> Result<Arc<Session>> {
        match &*self.peer_state.lock().await {
            Some(state) => Ok(state.session.clone()),
            None => Err(PeerNotConnectedError.into()),
        }
    }

    /// The receiver channel fired once when the connection to the router
    /// ends, with the cause of the disconnect.
    pub async fn disconnect_rx(&self) -> Result<broadcast::Receiver<DisconnectReason>> {
        match &*self.peer_state.lock().await {
            Some(state) => Ok(state.service.end_rx()),
            None => Err(PeerNotConnectedError.into()),
        }
    }

    /// Checks if the peer currently has an established session.
    pub async fn is_connected(&self) -> bool {
        match &*self.peer_state.lock().await {
            Some(state) => state.session.is_established().await,
            None => false,
        }
    }

    /// The identity of the current session, as assigned by the router.
    pub async fn session_info(&self) -> Result<SessionInfo> {
        self.session()
            .await?
            .session_info()
            .await
            .ok_or_else(|| PeerNotConnectedError.into())
    }

    /// The current session id, if a session is established.
    pub async fn current_session_id(&self) -> Option<Id> {
        match self.session().await {
            Ok(session) => session.session_info().await.map(|info| info.id),
            Err(_) => None,
        }
    }

    /// Leaves the realm, closing the WAMP session with a GOODBYE handshake.
    pub async fn leave_realm(&self) -> Result<()> {
        let (session, mut closed_rx) = {
            match &*self.peer_state.lock().await {
                Some(state) => (state.session.clone(), state.session.closed_rx()),
                None => return Err(PeerNotConnectedError.into()),
            }
        };
        session.leave().await?;
        closed_rx.recv().await.ok();
        Ok(())
    }

    /// Disconnects from the router, dropping the session and closing the
    /// transport.
    pub async fn disconnect(&self) -> Result<()> {
        let state = self.peer_state.lock().await.take();
        match state {
            Some(state) => {
                state.service.cancel().ok();
                state.session.teardown().await;
                state.service.join().await
            }
            None => Ok(()),
        }
    }

    /// Calls a procedure in the realm, returning the in-flight call.
    pub async fn call(&self, procedure: Uri, rpc_call: RpcCall) -> Result<PendingCall> {
        self.call_with_options(procedure, rpc_call, CallOptions::default())
            .await
    }

    /// Calls a procedure in the realm with explicit options.
    ///
    /// Progressive results are only delivered if the options ask for them.
    pub async fn call_with_options(
        &self,
        procedure: Uri,
        rpc_call: RpcCall,
        options: CallOptions,
    ) -> Result<PendingCall> {
        let session = self.session().await?;
        let (request_id, result_rx) = session.call(procedure, rpc_call, options).await?;
        Ok(PendingCall {
            request_id,
            message_tx: session.message_tx(),
            result_rx,
            finished: false,
            canceled: false,
        })
    }

    /// Calls a procedure and waits for its terminal result.
    pub async fn call_and_wait(&self, procedure: Uri, rpc_call: RpcCall) -> Result<RpcResult> {
        self.call(procedure, rpc_call).await?.wait().await
    }

    /// Publishes an event to a topic, without acknowledgement.
    pub async fn publish(&self, topic: Uri, event: PublishedEvent) -> Result<()> {
        self.publish_with_options(topic, event, PublishOptions::default())
            .await
            .map(|_| ())
    }

    /// Publishes an event to a topic with explicit options.
    ///
    /// If the options request acknowledgement, waits for PUBLISHED and
    /// returns the publication id; otherwise completes once the event is
    /// handed to the transport.
    pub async fn publish_with_options(
        &self,
        topic: Uri,
        event: PublishedEvent,
        options: PublishOptions,
    ) -> Result<Option<Id>> {
        let session = self.session().await?;
        match session.publish(topic, event, options).await? {
            Some(receiver) => {
                let publication = receiver
                    .await
                    .map_err(|_| Error::from(PeerNotConnectedError))?
                    .map_err(WampError::into_error)?;
                Ok(Some(publication))
            }
            None => Ok(None),
        }
    }

    /// Subscribes to a topic in the realm.
    pub async fn subscribe(&self, topic: Uri) -> Result<Subscription> {
        self.subscribe_with_options(topic.into(), SubscriptionOptions::default())
            .await
    }

    /// Subscribes to a topic (or topic pattern) with explicit options.
    pub async fn subscribe_with_options(
        &self,
        topic: WildcardUri,
        options: SubscriptionOptions,
    ) -> Result<Subscription> {
        let session = self.session().await?;
        let (_, receiver) = session.subscribe(topic.clone(), options).await?;
        let granted = receiver
            .await
            .map_err(|_| Error::from(PeerNotConnectedError))?
            .map_err(WampError::into_error)?;
        Ok(Subscription {
            id: granted.subscription_id,
            topic,
            event_rx: granted.event_rx,
        })
    }

    /// Removes a subscription.
    ///
    /// The subscription id is received when subscribing. Once the router
    /// confirms, the subscription's event stream closes; events that arrive
    /// late for the removed subscription are dropped silently.
    pub async fn unsubscribe(&self, subscription: Id) -> Result<()> {
        let session = self.session().await?;
        let (_, receiver) = session.unsubscribe(subscription).await?;
        receiver
            .await
            .map_err(|_| Error::from(PeerNotConnectedError))?
            .map_err(WampError::into_error)
    }

    /// Registers a procedure in the realm.
    pub async fn register(&self, procedure: Uri) -> Result<Procedure> {
        self.register_with_options(procedure.into(), ProcedureOptions::default())
            .await
    }

    /// Registers a procedure (or procedure pattern) with explicit options.
    pub async fn register_with_options(
        &self,
        procedure: WildcardUri,
        options: ProcedureOptions,
    ) -> Result<Procedure> {
        let session = self.session().await?;
        let (_, receiver) = session.register(procedure.clone(), options).await?;
        let granted = receiver
            .await
            .map_err(|_| Error::from(PeerNotConnectedError))?
            .map_err(WampError::into_error)?;
        Ok(Procedure {
            id: granted.registration_id,
            procedure,
            invocation_rx: granted.invocation_rx,
        })
    }

    /// Removes a registration.
    ///
    /// The registration id is received when registering. Once the router
    /// confirms, the procedure's invocation stream closes; invocations that
    /// arrive late for the removed registration are answered with a
    /// `wamp.error.no_such_registration` ERROR.
    pub async fn unregister(&self, registration: Id) -> Result<()> {
        let session = self.session().await?;
        let (_, receiver) = session.unregister(registration).await?;
        receiver
            .await
            .map_err(|_| Error::from(PeerNotConnectedError))?
            .map_err(WampError::into_error)
    }
}

impl Drop for Peer {
    fn drop(&mut self) {
        self.drop_tx.send(()).ok();
    }
}
