use crate::core::{
    match_style::MatchStyle,
    types::{
        Dictionary,
        Value,
    },
};

/// Options for publishing an event.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct PublishOptions {
    /// Should the router acknowledge the publication with PUBLISHED?
    ///
    /// Without acknowledgement, publishing completes as soon as the message is
    /// handed to the transport.
    pub acknowledge: bool,
    /// Should the publisher be excluded from receiving the event?
    pub exclude_me: Option<bool>,
}

impl From<PublishOptions> for Dictionary {
    fn from(value: PublishOptions) -> Self {
        let mut options = Dictionary::default();
        if value.acknowledge {
            options.insert("acknowledge".to_owned(), Value::Bool(true));
        }
        if let Some(exclude_me) = value.exclude_me {
            options.insert("exclude_me".to_owned(), Value::Bool(exclude_me));
        }
        options
    }
}

/// Options for subscribing to a topic.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SubscriptionOptions {
    /// How the topic should be matched against published events.
    pub match_style: Option<MatchStyle>,
}

impl From<SubscriptionOptions> for Dictionary {
    fn from(value: SubscriptionOptions) -> Self {
        let mut options = Dictionary::default();
        if let Some(match_style) = value.match_style {
            options.insert("match".to_owned(), Value::String(match_style.into()));
        }
        options
    }
}

/// Options for registering a procedure.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ProcedureOptions {
    /// How the procedure should be matched against calls.
    pub match_style: Option<MatchStyle>,
}

impl From<ProcedureOptions> for Dictionary {
    fn from(value: ProcedureOptions) -> Self {
        let mut options = Dictionary::default();
        if let Some(match_style) = value.match_style {
            options.insert("match".to_owned(), Value::String(match_style.into()));
        }
        options
    }
}

/// Options for calling a procedure.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct CallOptions {
    /// Should the callee be allowed to produce progressive results?
    pub receive_progress: bool,
}

impl From<CallOptions> for Dictionary {
    fn from(value: CallOptions) -> Self {
        let mut options = Dictionary::default();
        if value.receive_progress {
            options.insert("receive_progress".to_owned(), Value::Bool(true));
        }
        options
    }
}
