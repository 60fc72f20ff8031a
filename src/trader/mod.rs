mod router;
mod trader;

pub(crate) use router::Router;
pub(crate) use trader::Trader;
pub use trader::{TradeNotif, TraderAccess};
