use std::{
    fmt::Debug,
    pin::Pin,
    task,
};

use anyhow::{
    Error,
    Result,
};
use async_trait::async_trait;
use futures_util::{
    Sink,
    Stream,
};
use tokio::sync::mpsc::{
    unbounded_channel,
    UnboundedReceiver,
    UnboundedSender,
};

use crate::message::message::Message;

/// A duplex channel of typed WAMP messages connecting a peer to a router.
///
/// How messages become bytes is opaque to the session layer: a transport
/// implementation pairs a byte channel (WebSocket, raw socket, in-process)
/// with a [`Serializer`][`crate::serializer::Serializer`] and presents
/// already-parsed messages.
///
/// Implemented as a [`Stream`] and [`Sink`]. The inbound stream must yield
/// messages in the order they were received and terminate when the underlying
/// channel closes (yielding a final `Err` first if the channel failed). The
/// sink must preserve send order. Closing the sink is idempotent.
#[async_trait]
pub trait Transport:
    Send + Unpin + Debug + Stream<Item = Result<Message>> + Sink<Message, Error = Error>
{
    /// Completes when the underlying channel is ready for messaging.
    async fn open(&mut self) -> Result<()>;

    /// Whether the transport is currently open for messaging.
    fn is_open(&self) -> bool;
}

/// One end of an in-process transport created by [`direct_transport_pair`].
///
/// Useful for tests and for wiring a peer directly to an in-process router
/// without any serialization.
#[derive(Debug)]
pub struct DirectTransport {
    tx: Option<UnboundedSender<Message>>,
    rx: UnboundedReceiver<Message>,
    open: bool,
}

/// Creates a connected pair of in-process transports.
///
/// Messages sent on one end are received on the other, in order. Closing
/// either end terminates the other end's inbound stream.
pub fn direct_transport_pair() -> (DirectTransport, DirectTransport) {
    let (a_tx, a_rx) = unbounded_channel();
    let (b_tx, b_rx) = unbounded_channel();
    (
        DirectTransport {
            tx: Some(a_tx),
            rx: b_rx,
            open: false,
        },
        DirectTransport {
            tx: Some(b_tx),
            rx: a_rx,
            open: false,
        },
    )
}

#[async_trait]
impl Transport for DirectTransport {
    async fn open(&mut self) -> Result<()> {
        if self.tx.is_none() {
            return Err(Error::msg("transport is closed"));
        }
        self.open = true;
        Ok(())
    }

    fn is_open(&self) -> bool {
        self.open && self.tx.is_some()
    }
}

impl Stream for DirectTransport {
    type Item = Result<Message>;

    fn poll_next(
        mut self: Pin<&mut Self>,
        cx: &mut task::Context<'_>,
    ) -> task::Poll<Option<Self::Item>> {
        self.rx.poll_recv(cx).map(|message| message.map(Ok))
    }
}

impl Sink<Message> for DirectTransport {
    type Error = Error;

    fn poll_ready(
        self: Pin<&mut Self>,
        _: &mut task::Context<'_>,
    ) -> task::Poll<Result<(), Self::Error>> {
        task::Poll::Ready(Ok(()))
    }

    fn start_send(mut self: Pin<&mut Self>, item: Message) -> Result<(), Self::Error> {
        match &self.tx {
            Some(tx) => tx
                .send(item)
                .map_err(|_| Error::msg("remote end of the transport is gone")),
            None => {
                // Sends after close are dropped, matching a closed socket that
                // no longer transmits.
                self.open = false;
                Ok(())
            }
        }
    }

    fn poll_flush(
        self: Pin<&mut Self>,
        _: &mut task::Context<'_>,
    ) -> task::Poll<Result<(), Self::Error>> {
        task::Poll::Ready(Ok(()))
    }

    fn poll_close(
        mut self: Pin<&mut Self>,
        _: &mut task::Context<'_>,
    ) -> task::Poll<Result<(), Self::Error>> {
        self.tx.take();
        self.open = false;
        task::Poll::Ready(Ok(()))
    }
}
