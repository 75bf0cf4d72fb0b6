use anyhow::{
    Error,
    Result,
};
use futures_util::{
    SinkExt,
    StreamExt,
};
use log::{
    debug,
    error,
};
use tokio::{
    sync::{
        broadcast,
        mpsc::{
            unbounded_channel,
            UnboundedReceiver,
            UnboundedSender,
        },
    },
    task::JoinHandle,
};

use crate::{
    message::message::Message,
    transport::Transport,
};

/// Why the connection to the router ended.
#[derive(Debug, Default, Clone)]
pub enum DisconnectReason {
    /// The transport closed cleanly.
    #[default]
    Clean,
    /// The transport failed.
    Error(String),
}

/// A handle to an asynchronously-running [`Service`].
pub(crate) struct ServiceHandle {
    start_handle: JoinHandle<()>,
    cancel_tx: broadcast::Sender<()>,
    end_tx: broadcast::Sender<DisconnectReason>,
    message_tx: UnboundedSender<Message>,
}

impl ServiceHandle {
    /// Joins the task running the service.
    pub async fn join(self) -> Result<()> {
        self.start_handle.await.map_err(Error::new)
    }

    /// Cancels the service, closing the transport.
    ///
    /// Cancellation is the correct way to cleanly exit a service. Messages
    /// already queued for sending are flushed first, on a best-effort basis.
    pub fn cancel(&self) -> Result<()> {
        self.cancel_tx.send(()).map(|_| ()).map_err(Error::new)
    }

    /// The message transmission channel.
    pub fn message_tx(&self) -> UnboundedSender<Message> {
        self.message_tx.clone()
    }

    /// The receiver channel fired once when the connection to the router ends,
    /// with the cause of the disconnect.
    pub fn end_rx(&self) -> broadcast::Receiver<DisconnectReason> {
        self.end_tx.subscribe()
    }
}

/// The asynchronous service that owns a peer's transport.
///
/// The transport presents a single ordered duplex of messages, so exactly one
/// task may use it. The service is that task: inbound messages are forwarded
/// to the channel returned by [`Service::new`] (consumed by the opening
/// handshake, then by the dispatcher), and every outbound message from any
/// part of the session funnels through the service's message channel,
/// serializing writes.
pub(crate) struct Service {
    name: String,
    transport: Box<dyn Transport>,
    inbound_tx: UnboundedSender<Message>,
    outbound_rx: UnboundedReceiver<Message>,
    outbound_tx: UnboundedSender<Message>,
    end_tx: broadcast::Sender<DisconnectReason>,
    cancel_tx: broadcast::Sender<()>,
    cancel_rx: broadcast::Receiver<()>,
}

impl Service {
    /// Creates a new service over the given transport.
    ///
    /// Returns the service and the receiver for inbound messages.
    pub fn new(name: String, transport: Box<dyn Transport>) -> (Self, UnboundedReceiver<Message>) {
        let (inbound_tx, inbound_rx) = unbounded_channel();
        let (outbound_tx, outbound_rx) = unbounded_channel();
        let (end_tx, _) = broadcast::channel(1);
        let (cancel_tx, cancel_rx) = broadcast::channel(1);
        (
            Self {
                name,
                transport,
                inbound_tx,
                outbound_rx,
                outbound_tx,
                end_tx,
                cancel_tx,
                cancel_rx,
            },
            inbound_rx,
        )
    }

    /// Starts the service asynchronously.
    ///
    /// This method takes ownership of the service. All future interactions with the service should
    /// be made through the returned handle.
    pub fn start(self) -> ServiceHandle {
        let cancel_tx = self.cancel_tx.clone();
        let end_tx = self.end_tx.clone();
        let message_tx = self.outbound_tx.clone();
        let start_handle = tokio::spawn(self.run());
        ServiceHandle {
            start_handle,
            cancel_tx,
            end_tx,
            message_tx,
        }
    }

    async fn run(mut self) {
        let reason = match self.service_loop().await {
            Ok(()) => DisconnectReason::Clean,
            Err(err) => {
                error!("Service for peer {} failed: {err:#}", self.name);
                DisconnectReason::Error(err.to_string())
            }
        };
        // The transport may already be closed; close is idempotent.
        self.transport.close().await.ok();
        self.end_tx.send(reason).ok();
    }

    async fn service_loop(&mut self) -> Result<()> {
        loop {
            tokio::select! {
                message = self.transport.next() => {
                    match message {
                        Some(Ok(message)) => {
                            // The handshake or dispatcher dropping its end is
                            // a normal way for the session to finish.
                            if self.inbound_tx.send(message).is_err() {
                                return Ok(());
                            }
                        }
                        Some(Err(err)) => return Err(err),
                        None => {
                            debug!("Transport for peer {} closed", self.name);
                            return Ok(());
                        }
                    }
                }
                message = self.outbound_rx.recv() => {
                    match message {
                        Some(message) => self.transport.send(message).await?,
                        None => return Ok(()),
                    }
                }
                _ = self.cancel_rx.recv() => {
                    self.flush_outbound().await.ok();
                    return Ok(());
                }
            }
        }
    }

    /// Sends messages queued before cancellation, so a final GOODBYE or ABORT
    /// still reaches the router.
    async fn flush_outbound(&mut self) -> Result<()> {
        while let Ok(message) = self.outbound_rx.try_recv() {
            self.transport.send(message).await?;
        }
        Ok(())
    }
}
