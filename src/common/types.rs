use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub type TradeId = Uuid;
pub type MessageUid = Uuid;
pub type TxId = String;

/// Network address of a trading peer as handed to us by the transport layer.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PeerAddress(pub String);

impl fmt::Display for PeerAddress {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for PeerAddress {
    fn from(address: &str) -> Self {
        PeerAddress(address.to_string())
    }
}

// Transactions are opaque to the protocol engine. Only the fields needed for
// structural checks are exposed, the wallet owns everything else.

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    pub txid: TxId,
    pub inputs: Vec<TxId>,
    pub lock_time: u32,
    pub raw: Vec<u8>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignedTx {
    pub tx: Transaction,
    pub signature: Vec<u8>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DepositInputs {
    pub inputs: Vec<TxId>,
    pub input_sats: u64,
    pub payout_address: String,
    pub multisig_pubkey: Vec<u8>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PayoutSignature {
    pub payout_txid: TxId,
    pub signature: Vec<u8>,
}
