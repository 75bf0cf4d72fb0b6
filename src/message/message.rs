use anyhow::{
    Error,
    Result,
};
use serde::{
    Deserialize,
    Serialize,
};

use crate::core::{
    id::Id,
    types::{
        Dictionary,
        Integer,
        List,
        Value,
    },
    uri::{
        Uri,
        WildcardUri,
    },
};

/// A HELLO message for a peer to initiate a WAMP session in a realm.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct HelloMessage {
    pub realm: Uri,
    pub details: Dictionary,
}

/// A WELCOME message for a router to confirm a peer's WAMP session in a realm.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct WelcomeMessage {
    pub session: Id,
    pub details: Dictionary,
}

/// An ABORT message for quickly terminating a WAMP session.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct AbortMessage {
    pub details: Dictionary,
    pub reason: Uri,
}

/// A CHALLENGE message for a router to demand authentication before welcoming
/// a peer.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ChallengeMessage {
    pub auth_method: String,
    pub extra: Dictionary,
}

/// An AUTHENTICATE message answering a router's CHALLENGE.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct AuthenticateMessage {
    pub signature: String,
    pub extra: Dictionary,
}

/// A GOODBYE message for ending a WAMP session with a two-way handshake.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct GoodbyeMessage {
    pub details: Dictionary,
    pub reason: Uri,
}

/// An ERROR message for communicating an error in response to a single request.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ErrorMessage {
    pub request_type: Integer,
    pub request: Id,
    pub details: Dictionary,
    pub error: Uri,
    pub arguments: List,
    pub arguments_keyword: Dictionary,
}

/// A PUBLISH message for publishing an event to a topic.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct PublishMessage {
    pub request: Id,
    pub options: Dictionary,
    pub topic: Uri,
    pub arguments: List,
    pub arguments_keyword: Dictionary,
}

/// A PUBLISHED message for confirming an event was published.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct PublishedMessage {
    pub publish_request: Id,
    pub publication: Id,
}

/// A SUBSCRIBE message for subscribing to a topic.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SubscribeMessage {
    pub request: Id,
    pub options: Dictionary,
    pub topic: WildcardUri,
}

/// A SUBSCRIBED message for confirming a peer has subscribed to a topic.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SubscribedMessage {
    pub subscribe_request: Id,
    pub subscription: Id,
}

/// An UNSUBSCRIBE message for unsubscribing from a topic.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct UnsubscribeMessage {
    pub request: Id,
    pub subscribed_subscription: Id,
}

/// An UNSUBSCRIBED message for confirming a peer has unsubscribed from a topic.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct UnsubscribedMessage {
    pub unsubscribe_request: Id,
}

/// An EVENT message for relaying a published event to subscribers.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct EventMessage {
    pub subscribed_subscription: Id,
    pub published_publication: Id,
    pub details: Dictionary,
    pub publish_arguments: List,
    pub publish_arguments_keyword: Dictionary,
}

/// A CALL message for invoking a procedure.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct CallMessage {
    pub request: Id,
    pub options: Dictionary,
    pub procedure: Uri,
    pub arguments: List,
    pub arguments_keyword: Dictionary,
}

/// A CANCEL message for canceling a previously-issued CALL.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct CancelMessage {
    pub call_request: Id,
    pub options: Dictionary,
}

/// A RESULT message for sending the result of a procedure invocation.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ResultMessage {
    pub call_request: Id,
    pub details: Dictionary,
    pub yield_arguments: List,
    pub yield_arguments_keyword: Dictionary,
}

/// A REGISTER message for registering a procedure in the realm.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RegisterMessage {
    pub request: Id,
    pub options: Dictionary,
    pub procedure: WildcardUri,
}

/// A REGISTERED message for confirming a procedure has been registered.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RegisteredMessage {
    pub register_request: Id,
    pub registration: Id,
}

/// An UNREGISTER message for unregistering a procedure in the realm.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct UnregisterMessage {
    pub request: Id,
    pub registered_registration: Id,
}

/// An UNREGISTERED message for confirming a procedure has been unregistered.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct UnregisteredMessage {
    pub unregister_request: Id,
}

/// An INVOCATION message for invoking a procedure on its callee.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct InvocationMessage {
    pub request: Id,
    pub registered_registration: Id,
    pub details: Dictionary,
    pub call_arguments: List,
    pub call_arguments_keyword: Dictionary,
}

/// A YIELD message for yielding the result of an invocation from the callee.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct YieldMessage {
    pub invocation_request: Id,
    pub options: Dictionary,
    pub arguments: List,
    pub arguments_keyword: Dictionary,
}

/// A WAMP message.
///
/// On the wire, every message is a list whose first element is the integer
/// type code of the message kind, followed by the kind's fields in order.
/// Trailing empty argument lists and keyword dictionaries are omitted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Message {
    Hello(HelloMessage),
    Welcome(WelcomeMessage),
    Abort(AbortMessage),
    Challenge(ChallengeMessage),
    Authenticate(AuthenticateMessage),
    Goodbye(GoodbyeMessage),
    Error(ErrorMessage),
    Publish(PublishMessage),
    Published(PublishedMessage),
    Subscribe(SubscribeMessage),
    Subscribed(SubscribedMessage),
    Unsubscribe(UnsubscribeMessage),
    Unsubscribed(UnsubscribedMessage),
    Event(EventMessage),
    Call(CallMessage),
    Cancel(CancelMessage),
    Result(ResultMessage),
    Register(RegisterMessage),
    Registered(RegisteredMessage),
    Unregister(UnregisterMessage),
    Unregistered(UnregisteredMessage),
    Invocation(InvocationMessage),
    Yield(YieldMessage),
}

impl Message {
    pub const HELLO_TAG: Integer = 1;
    pub const WELCOME_TAG: Integer = 2;
    pub const ABORT_TAG: Integer = 3;
    pub const CHALLENGE_TAG: Integer = 4;
    pub const AUTHENTICATE_TAG: Integer = 5;
    pub const GOODBYE_TAG: Integer = 6;
    pub const ERROR_TAG: Integer = 8;
    pub const PUBLISH_TAG: Integer = 16;
    pub const PUBLISHED_TAG: Integer = 17;
    pub const SUBSCRIBE_TAG: Integer = 32;
    pub const SUBSCRIBED_TAG: Integer = 33;
    pub const UNSUBSCRIBE_TAG: Integer = 34;
    pub const UNSUBSCRIBED_TAG: Integer = 35;
    pub const EVENT_TAG: Integer = 36;
    pub const CALL_TAG: Integer = 48;
    pub const CANCEL_TAG: Integer = 49;
    pub const RESULT_TAG: Integer = 50;
    pub const REGISTER_TAG: Integer = 64;
    pub const REGISTERED_TAG: Integer = 65;
    pub const UNREGISTER_TAG: Integer = 66;
    pub const UNREGISTERED_TAG: Integer = 67;
    pub const INVOCATION_TAG: Integer = 68;
    pub const YIELD_TAG: Integer = 70;

    /// The integer type code of the message.
    pub fn tag(&self) -> Integer {
        match self {
            Self::Hello(_) => Self::HELLO_TAG,
            Self::Welcome(_) => Self::WELCOME_TAG,
            Self::Abort(_) => Self::ABORT_TAG,
            Self::Challenge(_) => Self::CHALLENGE_TAG,
            Self::Authenticate(_) => Self::AUTHENTICATE_TAG,
            Self::Goodbye(_) => Self::GOODBYE_TAG,
            Self::Error(_) => Self::ERROR_TAG,
            Self::Publish(_) => Self::PUBLISH_TAG,
            Self::Published(_) => Self::PUBLISHED_TAG,
            Self::Subscribe(_) => Self::SUBSCRIBE_TAG,
            Self::Subscribed(_) => Self::SUBSCRIBED_TAG,
            Self::Unsubscribe(_) => Self::UNSUBSCRIBE_TAG,
            Self::Unsubscribed(_) => Self::UNSUBSCRIBED_TAG,
            Self::Event(_) => Self::EVENT_TAG,
            Self::Call(_) => Self::CALL_TAG,
            Self::Cancel(_) => Self::CANCEL_TAG,
            Self::Result(_) => Self::RESULT_TAG,
            Self::Register(_) => Self::REGISTER_TAG,
            Self::Registered(_) => Self::REGISTERED_TAG,
            Self::Unregister(_) => Self::UNREGISTER_TAG,
            Self::Unregistered(_) => Self::UNREGISTERED_TAG,
            Self::Invocation(_) => Self::INVOCATION_TAG,
            Self::Yield(_) => Self::YIELD_TAG,
        }
    }

    /// The message name, mostly for logging.
    pub fn message_name(&self) -> &'static str {
        match self {
            Self::Hello(_) => "HELLO",
            Self::Welcome(_) => "WELCOME",
            Self::Abort(_) => "ABORT",
            Self::Challenge(_) => "CHALLENGE",
            Self::Authenticate(_) => "AUTHENTICATE",
            Self::Goodbye(_) => "GOODBYE",
            Self::Error(_) => "ERROR",
            Self::Publish(_) => "PUBLISH",
            Self::Published(_) => "PUBLISHED",
            Self::Subscribe(_) => "SUBSCRIBE",
            Self::Subscribed(_) => "SUBSCRIBED",
            Self::Unsubscribe(_) => "UNSUBSCRIBE",
            Self::Unsubscribed(_) => "UNSUBSCRIBED",
            Self::Event(_) => "EVENT",
            Self::Call(_) => "CALL",
            Self::Cancel(_) => "CANCEL",
            Self::Result(_) => "RESULT",
            Self::Register(_) => "REGISTER",
            Self::Registered(_) => "REGISTERED",
            Self::Unregister(_) => "UNREGISTER",
            Self::Unregistered(_) => "UNREGISTERED",
            Self::Invocation(_) => "INVOCATION",
            Self::Yield(_) => "YIELD",
        }
    }

    /// The request id on the message.
    pub fn request_id(&self) -> Option<Id> {
        match self {
            Self::Error(message) => Some(message.request),
            Self::Publish(message) => Some(message.request),
            Self::Published(message) => Some(message.publish_request),
            Self::Subscribe(message) => Some(message.request),
            Self::Subscribed(message) => Some(message.subscribe_request),
            Self::Unsubscribe(message) => Some(message.request),
            Self::Unsubscribed(message) => Some(message.unsubscribe_request),
            Self::Call(message) => Some(message.request),
            Self::Cancel(message) => Some(message.call_request),
            Self::Result(message) => Some(message.call_request),
            Self::Register(message) => Some(message.request),
            Self::Registered(message) => Some(message.register_request),
            Self::Unregister(message) => Some(message.request),
            Self::Unregistered(message) => Some(message.unregister_request),
            Self::Invocation(message) => Some(message.request),
            Self::Yield(message) => Some(message.invocation_request),
            _ => None,
        }
    }

    /// The details dictionary on the message.
    pub fn details(&self) -> Option<&Dictionary> {
        match self {
            Self::Hello(message) => Some(&message.details),
            Self::Welcome(message) => Some(&message.details),
            Self::Abort(message) => Some(&message.details),
            Self::Goodbye(message) => Some(&message.details),
            Self::Error(message) => Some(&message.details),
            Self::Event(message) => Some(&message.details),
            Self::Result(message) => Some(&message.details),
            Self::Invocation(message) => Some(&message.details),
            _ => None,
        }
    }

    /// The error or close reason on the message.
    pub fn reason(&self) -> Option<&Uri> {
        match self {
            Self::Abort(message) => Some(&message.reason),
            Self::Goodbye(message) => Some(&message.reason),
            Self::Error(message) => Some(&message.error),
            _ => None,
        }
    }
}

/// Appends a payload to the wire form of a message.
///
/// The keyword dictionary can only be omitted if it is empty, and the argument
/// list can only be omitted if both are empty.
fn push_payload(values: &mut List, arguments: List, arguments_keyword: Dictionary) {
    if !arguments_keyword.is_empty() {
        values.push(Value::List(arguments));
        values.push(Value::Dictionary(arguments_keyword));
    } else if !arguments.is_empty() {
        values.push(Value::List(arguments));
    }
}

fn push_dictionary_if_not_empty(values: &mut List, dictionary: Dictionary) {
    if !dictionary.is_empty() {
        values.push(Value::Dictionary(dictionary));
    }
}

impl From<Message> for List {
    fn from(message: Message) -> Self {
        let mut values = List::from_iter([Value::Integer(message.tag())]);
        match message {
            Message::Hello(message) => {
                values.push(Value::String(message.realm.into()));
                push_dictionary_if_not_empty(&mut values, message.details);
            }
            Message::Welcome(message) => {
                values.push(Value::Integer(message.session.into()));
                push_dictionary_if_not_empty(&mut values, message.details);
            }
            Message::Abort(message) => {
                values.push(Value::Dictionary(message.details));
                values.push(Value::String(message.reason.into()));
            }
            Message::Challenge(message) => {
                values.push(Value::String(message.auth_method));
                values.push(Value::Dictionary(message.extra));
            }
            Message::Authenticate(message) => {
                values.push(Value::String(message.signature));
                values.push(Value::Dictionary(message.extra));
            }
            Message::Goodbye(message) => {
                values.push(Value::Dictionary(message.details));
                values.push(Value::String(message.reason.into()));
            }
            Message::Error(message) => {
                values.push(Value::Integer(message.request_type));
                values.push(Value::Integer(message.request.into()));
                values.push(Value::Dictionary(message.details));
                values.push(Value::String(message.error.into()));
                push_payload(&mut values, message.arguments, message.arguments_keyword);
            }
            Message::Publish(message) => {
                values.push(Value::Integer(message.request.into()));
                values.push(Value::Dictionary(message.options));
                values.push(Value::String(message.topic.into()));
                push_payload(&mut values, message.arguments, message.arguments_keyword);
            }
            Message::Published(message) => {
                values.push(Value::Integer(message.publish_request.into()));
                values.push(Value::Integer(message.publication.into()));
            }
            Message::Subscribe(message) => {
                values.push(Value::Integer(message.request.into()));
                values.push(Value::Dictionary(message.options));
                values.push(Value::String(message.topic.into()));
            }
            Message::Subscribed(message) => {
                values.push(Value::Integer(message.subscribe_request.into()));
                values.push(Value::Integer(message.subscription.into()));
            }
            Message::Unsubscribe(message) => {
                values.push(Value::Integer(message.request.into()));
                values.push(Value::Integer(message.subscribed_subscription.into()));
            }
            Message::Unsubscribed(message) => {
                values.push(Value::Integer(message.unsubscribe_request.into()));
            }
            Message::Event(message) => {
                values.push(Value::Integer(message.subscribed_subscription.into()));
                values.push(Value::Integer(message.published_publication.into()));
                values.push(Value::Dictionary(message.details));
                push_payload(
                    &mut values,
                    message.publish_arguments,
                    message.publish_arguments_keyword,
                );
            }
            Message::Call(message) => {
                values.push(Value::Integer(message.request.into()));
                values.push(Value::Dictionary(message.options));
                values.push(Value::String(message.procedure.into()));
                push_payload(&mut values, message.arguments, message.arguments_keyword);
            }
            Message::Cancel(message) => {
                values.push(Value::Integer(message.call_request.into()));
                values.push(Value::Dictionary(message.options));
            }
            Message::Result(message) => {
                values.push(Value::Integer(message.call_request.into()));
                values.push(Value::Dictionary(message.details));
                push_payload(
                    &mut values,
                    message.yield_arguments,
                    message.yield_arguments_keyword,
                );
            }
            Message::Register(message) => {
                values.push(Value::Integer(message.request.into()));
                values.push(Value::Dictionary(message.options));
                values.push(Value::String(message.procedure.into()));
            }
            Message::Registered(message) => {
                values.push(Value::Integer(message.register_request.into()));
                values.push(Value::Integer(message.registration.into()));
            }
            Message::Unregister(message) => {
                values.push(Value::Integer(message.request.into()));
                values.push(Value::Integer(message.registered_registration.into()));
            }
            Message::Unregistered(message) => {
                values.push(Value::Integer(message.unregister_request.into()));
            }
            Message::Invocation(message) => {
                values.push(Value::Integer(message.request.into()));
                values.push(Value::Integer(message.registered_registration.into()));
                values.push(Value::Dictionary(message.details));
                push_payload(
                    &mut values,
                    message.call_arguments,
                    message.call_arguments_keyword,
                );
            }
            Message::Yield(message) => {
                values.push(Value::Integer(message.invocation_request.into()));
                values.push(Value::Dictionary(message.options));
                push_payload(&mut values, message.arguments, message.arguments_keyword);
            }
        }
        values
    }
}

/// A cursor over the fields of a single message on the wire.
struct MessageFields {
    name: &'static str,
    values: std::vec::IntoIter<Value>,
    position: usize,
}

impl MessageFields {
    fn new(name: &'static str, values: std::vec::IntoIter<Value>) -> Self {
        Self {
            name,
            values,
            position: 1,
        }
    }

    fn next(&mut self, field: &str) -> Result<Value> {
        self.position += 1;
        self.values
            .next()
            .ok_or_else(|| Error::msg(format!("{} message is missing {field}", self.name)))
    }

    fn invalid(&self, field: &str) -> Error {
        Error::msg(format!(
            "invalid {field} in element {} of {} message",
            self.position - 1,
            self.name
        ))
    }

    fn integer(&mut self, field: &str) -> Result<Integer> {
        self.next(field)?
            .integer()
            .ok_or_else(|| self.invalid(field))
    }

    fn id(&mut self, field: &str) -> Result<Id> {
        let value = self.integer(field)?;
        Id::try_from(value).map_err(|_| self.invalid(field))
    }

    fn string(&mut self, field: &str) -> Result<String> {
        let value = self.next(field)?;
        match value {
            Value::String(value) => Ok(value),
            _ => Err(self.invalid(field)),
        }
    }

    fn uri(&mut self, field: &str) -> Result<Uri> {
        let value = self.string(field)?;
        Uri::try_from(value).map_err(|_| self.invalid(field))
    }

    fn wildcard_uri(&mut self, field: &str) -> Result<WildcardUri> {
        let value = self.string(field)?;
        WildcardUri::try_from(value).map_err(|_| self.invalid(field))
    }

    fn dictionary(&mut self, field: &str) -> Result<Dictionary> {
        let value = self.next(field)?;
        match value {
            Value::Dictionary(value) => Ok(value),
            _ => Err(self.invalid(field)),
        }
    }

    fn optional_dictionary(&mut self, field: &str) -> Result<Dictionary> {
        match self.values.next() {
            None => Ok(Dictionary::default()),
            Some(Value::Dictionary(value)) => {
                self.position += 1;
                Ok(value)
            }
            Some(_) => Err(self.invalid(field)),
        }
    }

    fn payload(&mut self) -> Result<(List, Dictionary)> {
        let arguments = match self.values.next() {
            None => return Ok((List::default(), Dictionary::default())),
            Some(Value::List(value)) => {
                self.position += 1;
                value
            }
            Some(_) => return Err(self.invalid("arguments")),
        };
        let arguments_keyword = match self.values.next() {
            None => Dictionary::default(),
            Some(Value::Dictionary(value)) => {
                self.position += 1;
                value
            }
            Some(_) => return Err(self.invalid("keyword arguments")),
        };
        Ok((arguments, arguments_keyword))
    }

    fn finish(mut self) -> Result<()> {
        if self.values.next().is_some() {
            return Err(Error::msg(format!(
                "{} message has unexpected trailing elements",
                self.name
            )));
        }
        Ok(())
    }
}

impl TryFrom<List> for Message {
    type Error = Error;

    fn try_from(values: List) -> Result<Self> {
        let mut values = values.into_iter();
        let tag = values
            .next()
            .ok_or_else(|| Error::msg("message is empty"))?
            .integer()
            .ok_or_else(|| Error::msg("message type must be an integer"))?;
        let message = match tag {
            Self::HELLO_TAG => {
                let mut fields = MessageFields::new("HELLO", values);
                let message = Self::Hello(HelloMessage {
                    realm: fields.uri("realm")?,
                    details: fields.optional_dictionary("details")?,
                });
                fields.finish()?;
                message
            }
            Self::WELCOME_TAG => {
                let mut fields = MessageFields::new("WELCOME", values);
                let message = Self::Welcome(WelcomeMessage {
                    session: fields.id("session")?,
                    details: fields.optional_dictionary("details")?,
                });
                fields.finish()?;
                message
            }
            Self::ABORT_TAG => {
                let mut fields = MessageFields::new("ABORT", values);
                let message = Self::Abort(AbortMessage {
                    details: fields.dictionary("details")?,
                    reason: fields.uri("reason")?,
                });
                fields.finish()?;
                message
            }
            Self::CHALLENGE_TAG => {
                let mut fields = MessageFields::new("CHALLENGE", values);
                let message = Self::Challenge(ChallengeMessage {
                    auth_method: fields.string("authmethod")?,
                    extra: fields.optional_dictionary("extra")?,
                });
                fields.finish()?;
                message
            }
            Self::AUTHENTICATE_TAG => {
                let mut fields = MessageFields::new("AUTHENTICATE", values);
                let message = Self::Authenticate(AuthenticateMessage {
                    signature: fields.string("signature")?,
                    extra: fields.optional_dictionary("extra")?,
                });
                fields.finish()?;
                message
            }
            Self::GOODBYE_TAG => {
                let mut fields = MessageFields::new("GOODBYE", values);
                let message = Self::Goodbye(GoodbyeMessage {
                    details: fields.dictionary("details")?,
                    reason: fields.uri("reason")?,
                });
                fields.finish()?;
                message
            }
            Self::ERROR_TAG => {
                let mut fields = MessageFields::new("ERROR", values);
                let request_type = fields.integer("request type")?;
                let request = fields.id("request")?;
                let details = fields.dictionary("details")?;
                let error = fields.uri("error")?;
                let (arguments, arguments_keyword) = fields.payload()?;
                fields.finish()?;
                Self::Error(ErrorMessage {
                    request_type,
                    request,
                    details,
                    error,
                    arguments,
                    arguments_keyword,
                })
            }
            Self::PUBLISH_TAG => {
                let mut fields = MessageFields::new("PUBLISH", values);
                let request = fields.id("request")?;
                let options = fields.dictionary("options")?;
                let topic = fields.uri("topic")?;
                let (arguments, arguments_keyword) = fields.payload()?;
                fields.finish()?;
                Self::Publish(PublishMessage {
                    request,
                    options,
                    topic,
                    arguments,
                    arguments_keyword,
                })
            }
            Self::PUBLISHED_TAG => {
                let mut fields = MessageFields::new("PUBLISHED", values);
                let message = Self::Published(PublishedMessage {
                    publish_request: fields.id("publish request")?,
                    publication: fields.id("publication")?,
                });
                fields.finish()?;
                message
            }
            Self::SUBSCRIBE_TAG => {
                let mut fields = MessageFields::new("SUBSCRIBE", values);
                let message = Self::Subscribe(SubscribeMessage {
                    request: fields.id("request")?,
                    options: fields.dictionary("options")?,
                    topic: fields.wildcard_uri("topic")?,
                });
                fields.finish()?;
                message
            }
            Self::SUBSCRIBED_TAG => {
                let mut fields = MessageFields::new("SUBSCRIBED", values);
                let message = Self::Subscribed(SubscribedMessage {
                    subscribe_request: fields.id("subscribe request")?,
                    subscription: fields.id("subscription")?,
                });
                fields.finish()?;
                message
            }
            Self::UNSUBSCRIBE_TAG => {
                let mut fields = MessageFields::new("UNSUBSCRIBE", values);
                let message = Self::Unsubscribe(UnsubscribeMessage {
                    request: fields.id("request")?,
                    subscribed_subscription: fields.id("subscription")?,
                });
                fields.finish()?;
                message
            }
            Self::UNSUBSCRIBED_TAG => {
                let mut fields = MessageFields::new("UNSUBSCRIBED", values);
                let message = Self::Unsubscribed(UnsubscribedMessage {
                    unsubscribe_request: fields.id("unsubscribe request")?,
                });
                fields.finish()?;
                message
            }
            Self::EVENT_TAG => {
                let mut fields = MessageFields::new("EVENT", values);
                let subscribed_subscription = fields.id("subscription")?;
                let published_publication = fields.id("publication")?;
                let details = fields.dictionary("details")?;
                let (publish_arguments, publish_arguments_keyword) = fields.payload()?;
                fields.finish()?;
                Self::Event(EventMessage {
                    subscribed_subscription,
                    published_publication,
                    details,
                    publish_arguments,
                    publish_arguments_keyword,
                })
            }
            Self::CALL_TAG => {
                let mut fields = MessageFields::new("CALL", values);
                let request = fields.id("request")?;
                let options = fields.dictionary("options")?;
                let procedure = fields.uri("procedure")?;
                let (arguments, arguments_keyword) = fields.payload()?;
                fields.finish()?;
                Self::Call(CallMessage {
                    request,
                    options,
                    procedure,
                    arguments,
                    arguments_keyword,
                })
            }
            Self::CANCEL_TAG => {
                let mut fields = MessageFields::new("CANCEL", values);
                let message = Self::Cancel(CancelMessage {
                    call_request: fields.id("call request")?,
                    options: fields.optional_dictionary("options")?,
                });
                fields.finish()?;
                message
            }
            Self::RESULT_TAG => {
                let mut fields = MessageFields::new("RESULT", values);
                let call_request = fields.id("call request")?;
                let details = fields.dictionary("details")?;
                let (yield_arguments, yield_arguments_keyword) = fields.payload()?;
                fields.finish()?;
                Self::Result(ResultMessage {
                    call_request,
                    details,
                    yield_arguments,
                    yield_arguments_keyword,
                })
            }
            Self::REGISTER_TAG => {
                let mut fields = MessageFields::new("REGISTER", values);
                let message = Self::Register(RegisterMessage {
                    request: fields.id("request")?,
                    options: fields.dictionary("options")?,
                    procedure: fields.wildcard_uri("procedure")?,
                });
                fields.finish()?;
                message
            }
            Self::REGISTERED_TAG => {
                let mut fields = MessageFields::new("REGISTERED", values);
                let message = Self::Registered(RegisteredMessage {
                    register_request: fields.id("register request")?,
                    registration: fields.id("registration")?,
                });
                fields.finish()?;
                message
            }
            Self::UNREGISTER_TAG => {
                let mut fields = MessageFields::new("UNREGISTER", values);
                let message = Self::Unregister(UnregisterMessage {
                    request: fields.id("request")?,
                    registered_registration: fields.id("registration")?,
                });
                fields.finish()?;
                message
            }
            Self::UNREGISTERED_TAG => {
                let mut fields = MessageFields::new("UNREGISTERED", values);
                let message = Self::Unregistered(UnregisteredMessage {
                    unregister_request: fields.id("unregister request")?,
                });
                fields.finish()?;
                message
            }
            Self::INVOCATION_TAG => {
                let mut fields = MessageFields::new("INVOCATION", values);
                let request = fields.id("request")?;
                let registered_registration = fields.id("registration")?;
                let details = fields.dictionary("details")?;
                let (call_arguments, call_arguments_keyword) = fields.payload()?;
                fields.finish()?;
                Self::Invocation(InvocationMessage {
                    request,
                    registered_registration,
                    details,
                    call_arguments,
                    call_arguments_keyword,
                })
            }
            Self::YIELD_TAG => {
                let mut fields = MessageFields::new("YIELD", values);
                let invocation_request = fields.id("invocation request")?;
                let options = fields.dictionary("options")?;
                let (arguments, arguments_keyword) = fields.payload()?;
                fields.finish()?;
                Self::Yield(YieldMessage {
                    invocation_request,
                    options,
                    arguments,
                    arguments_keyword,
                })
            }
            _ => return Err(Error::msg(format!("unknown message type {tag}"))),
        };
        Ok(message)
    }
}

impl Serialize for Message {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        List::from(self.clone()).serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Message {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let values = List::deserialize(deserializer)?;
        Self::try_from(values).map_err(serde::de::Error::custom)
    }
}
