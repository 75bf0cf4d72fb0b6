use crate::core::{
    hash::HashSet,
    types::{
        Dictionary,
        Value,
    },
};

/// A role implemented by a WAMP client.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum PeerRole {
    // Calls RPC endpoints.
    Caller,
    // Registers RPC endpoints.
    Callee,
    // Publishes events to topics.
    Publisher,
    // Subscribes to events for topics.
    Subscriber,
}

impl PeerRole {
    /// The key used for the role in the HELLO details.
    pub fn key_for_details(&self) -> &str {
        match self {
            Self::Caller => "caller",
            Self::Callee => "callee",
            Self::Publisher => "publisher",
            Self::Subscriber => "subscriber",
        }
    }

    /// The advanced features advertised for the role.
    fn features(&self) -> Dictionary {
        match self {
            Self::Caller => Dictionary::from_iter([
                ("call_canceling".to_owned(), Value::Bool(true)),
                ("progressive_call_results".to_owned(), Value::Bool(true)),
            ]),
            Self::Callee => Dictionary::from_iter([(
                "progressive_call_results".to_owned(),
                Value::Bool(true),
            )]),
            _ => Dictionary::default(),
        }
    }
}

/// Builds the `roles` dictionary advertised in the HELLO details.
pub fn roles_for_details(roles: &HashSet<PeerRole>) -> Dictionary {
    roles
        .iter()
        .map(|role| {
            let mut details = Dictionary::default();
            let features = role.features();
            if !features.is_empty() {
                details.insert("features".to_owned(), Value::Dictionary(features));
            }
            (role.key_for_details().to_owned(), Value::Dictionary(details))
        })
        .collect()
}
