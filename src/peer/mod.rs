mod peer;
mod service;
mod session;

pub use peer::{
    Peer,
    PeerConfig,
    PendingCall,
    Procedure,
    Subscription,
};
pub use service::DisconnectReason;
pub use session::{
    Invocation,
    PublishedEvent,
    ReceivedEvent,
    RpcCall,
    RpcResult,
    RpcYield,
    SessionInfo,
};
