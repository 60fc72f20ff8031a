use std::fmt;

use serde::{Deserialize, Serialize};
use strum_macros::Display;

use crate::{
    peer_msg::{MessageKind, PeerEnvelope},
    services::{ChainEvent, ListenerKind},
};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, Display)]
pub enum UserAction {
    TakeOffer,
    FiatPaymentStarted,
    CompleteTrade,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, Display)]
pub enum InternalEvent {
    ResendFiatPaymentStarted,
}

/// Anything that can make a trade move.
#[derive(Clone, Debug)]
pub enum Stimulus {
    User(UserAction),
    Message(PeerEnvelope),
    Chain(ChainEvent),
    Internal(InternalEvent),
}

/// What a rule matches on. Message payloads and chain event details are
/// not part of matching.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum StimulusKind {
    User(UserAction),
    Message(MessageKind),
    Chain(ListenerKind),
    Internal(InternalEvent),
}

impl fmt::Display for StimulusKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            StimulusKind::User(action) => write!(f, "User action {}", action),
            StimulusKind::Message(kind) => write!(f, "Message {}", kind),
            StimulusKind::Chain(kind) => write!(f, "Chain event {}", kind),
            StimulusKind::Internal(event) => write!(f, "Internal event {}", event),
        }
    }
}

impl Stimulus {
    pub fn kind(&self) -> StimulusKind {
        match self {
            Stimulus::User(action) => StimulusKind::User(*action),
            Stimulus::Message(envelope) => StimulusKind::Message(envelope.message.kind()),
            Stimulus::Chain(event) => StimulusKind::Chain(event.kind),
            Stimulus::Internal(event) => StimulusKind::Internal(*event),
        }
    }

    pub fn envelope(&self) -> Option<&PeerEnvelope> {
        match self {
            Stimulus::Message(envelope) => Some(envelope),
            _ => None,
        }
    }
}
