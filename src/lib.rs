pub mod common;
pub mod manager;
pub mod offer;
pub mod peer_msg;
pub mod protocol;
pub mod services;
pub mod testing;
pub mod trade;
pub mod trader;
