//! # wampeer
//!
//! **wampeer** is a client-side implementation of the **Web Application
//! Messaging Protocol** (WAMP) session layer for Rust.
//!
//! The library implements the stateful peer that, once a transport is open,
//! performs the WAMP opening handshake (optionally with challenge-response
//! authentication) and thereafter multiplexes the four WAMP interaction
//! patterns — remote procedure calls as caller and callee, and
//! publish/subscribe — over a single bidirectional message stream.
//!
//! The library uses [`tokio`](https://tokio.rs) as its asynchronous runtime.
//!
//! ## What is WAMP?
//!
//! **WAMP** is an open standard, routed protocol that provides two messaging
//! patterns: Publish & Subscribe and routed Remote Procedure Calls. It is
//! intended to connect application components in distributed applications.
//! WAMP uses WebSocket as its default transport, but it can be transmitted
//! via any other protocol that allows for ordered, reliable, bi-directional,
//! and message-oriented communications.
//!
//! The WAMP protocol specification is described
//! [here](https://wamp-proto.org/spec.html).
//!
//! ## Scope
//!
//! `wampeer` is the session core only. It owns the protocol's identity
//! semantics (session id, roles, realm), assigns and tracks request ids,
//! correlates asynchronous responses with in-flight requests, fans out
//! server-initiated messages (events, invocations) to per-subscription and
//! per-registration streams, and handles protocol-level termination (ABORT,
//! GOODBYE) and transport-level disconnect.
//!
//! Three collaborators are deliberately external, behind traits:
//!
//! - The byte transport. The session consumes a
//!   [`Transport`][`crate::transport::Transport`], a duplex of already-parsed
//!   messages. Pair a WebSocket (or any ordered byte channel) with a
//!   [`Serializer`][`crate::serializer::Serializer`] to produce one, or use
//!   [`direct_transport_pair`][`crate::transport::direct_transport_pair`]
//!   for in-process wiring.
//! - Message serialization, behind
//!   [`Serializer`][`crate::serializer::Serializer`] (JSON and MessagePack
//!   implementations are included).
//! - Authentication methods, behind
//!   [`ClientAuthenticator`][`crate::auth::ClientAuthenticator`]. The session
//!   drives the CHALLENGE/AUTHENTICATE exchange; the cryptography is the
//!   authenticator's business.
//!
//! Router behavior, reconnect policy, and session resumption are out of
//! scope.
//!
//! ## Peers
//!
//! Configure a peer using a [`PeerConfig`][`crate::peer::PeerConfig`],
//! construct a [`Peer`][`crate::peer::Peer`], and connect it to a realm over
//! a transport:
//!
//! ```no_run
//! use wampeer::{
//!     core::uri::Uri,
//!     peer::{
//!         Peer,
//!         PeerConfig,
//!         PublishedEvent,
//!         RpcCall,
//!     },
//!     transport::direct_transport_pair,
//! };
//!
//! #[tokio::main]
//! async fn main() {
//!     let (transport, router_end) = direct_transport_pair();
//!     // ... hand router_end to an in-process router ...
//!
//!     let peer = Peer::new(PeerConfig::default());
//!     let info = peer
//!         .connect(Box::new(transport), "com.myapp.realm")
//!         .await
//!         .unwrap();
//!     println!("session {} established", info.id);
//!
//!     // Publish & Subscribe.
//!     let mut subscription = peer
//!         .subscribe(Uri::try_from("com.myapp.topic").unwrap())
//!         .await
//!         .unwrap();
//!     peer.publish(
//!         Uri::try_from("com.myapp.topic").unwrap(),
//!         PublishedEvent::default(),
//!     )
//!     .await
//!     .unwrap();
//!     let event = subscription.event_rx.recv().await;
//!
//!     // Remote procedure calls.
//!     let result = peer
//!         .call_and_wait(
//!             Uri::try_from("com.myapp.echo").unwrap(),
//!             RpcCall::default(),
//!         )
//!         .await
//!         .unwrap();
//!
//!     peer.leave_realm().await.unwrap();
//! }
//! ```
//!
//! Every interaction requires an established session. Calls yield their
//! results as a stream ([`PendingCall`][`crate::peer::PendingCall`]), so
//! progressive results arrive in order as the router sends them;
//! subscriptions and registered procedures expose their own receiver streams
//! with per-stream backpressure, fed by a single dispatcher that preserves
//! transport receive order.

pub mod auth;
pub mod core;
pub mod message;
pub mod peer;
pub mod serializer;
pub mod transport;
