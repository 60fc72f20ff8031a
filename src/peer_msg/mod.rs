mod peer_messaging;

pub use peer_messaging::*;
