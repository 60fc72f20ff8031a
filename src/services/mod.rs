mod peer;
mod screening;
mod wallet;

use std::sync::Arc;

pub use peer::{PeerAccess, PeerRequest, SendOutcome};
pub use screening::{NoScreening, TradeScreening};
pub use wallet::{ChainEvent, ListenerKind, WalletAccess, WalletRequest};

#[cfg(test)]
pub use screening::MockTradeScreening;

/// Handles to everything outside the protocol engine a task may call into.
#[derive(Clone)]
pub struct Services {
    pub peer: PeerAccess,
    pub wallet: WalletAccess,
    pub screening: Arc<dyn TradeScreening>,
}

impl Services {
    pub fn new(
        peer: PeerAccess,
        wallet: WalletAccess,
        screening: Arc<dyn TradeScreening>,
    ) -> Self {
        Self {
            peer,
            wallet,
            screening,
        }
    }
}
