mod offer;
mod trade;

pub use offer::SomeTestOfferParams;
pub use trade::SomeTestTradeParams;

pub const TESTING_DEFAULT_CHANNEL_SIZE: usize = 10;
