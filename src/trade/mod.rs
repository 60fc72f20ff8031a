mod contract;
mod data;
mod phase;
mod record;

pub use contract::{Contract, SignedContract};
pub(crate) use data::TradeData;
pub use phase::{DisputeState, Phase, State};
pub use record::{Counterparty, OutboundMessage, TradeArtifacts, TradeRecord};
