use crate::core::uri::Uri;

/// The reason for closing a WAMP session.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum CloseReason {
    /// The peer is leaving the realm on its own terms.
    #[default]
    Normal,
    /// The process hosting the peer is shutting down.
    SystemShutdown,
    /// Acknowledgement of a GOODBYE received from the other side.
    GoodbyeAndOut,
}

impl CloseReason {
    fn uri_component(&self) -> &str {
        match self {
            Self::Normal => "normal",
            Self::SystemShutdown => "system_shutdown",
            Self::GoodbyeAndOut => "goodbye_and_out",
        }
    }

    /// The `wamp.close.*` URI for the close reason.
    pub fn uri(&self) -> Uri {
        Uri::from_known(format!("wamp.close.{}", self.uri_component()))
    }
}
