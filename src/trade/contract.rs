use secp256k1::{schnorr, Message, Secp256k1, XOnlyPublicKey};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::common::{
    error::EscrowError,
    types::{PeerAddress, TradeId, TxId},
};

/// Terms both peers sign before any funds are committed to the deposit tx.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Contract {
    pub trade_id: TradeId,
    pub offer_id: Uuid,
    pub btc_amount_sats: u64,
    pub fiat_amount: u64,
    pub currency_code: String,
    pub maker_address: PeerAddress,
    pub maker_pubkey: XOnlyPublicKey,
    pub maker_fee_txid: TxId,
    pub taker_fee_txid: TxId,
    pub maker_payout_address: String,
    pub taker_payout_address: String,
    pub lock_time: u32,
}

impl Contract {
    pub fn hash(&self) -> Result<[u8; 32], EscrowError> {
        let json = serde_json::to_vec(self)?;
        let digest = Sha256::digest(&json);
        let mut hash = [0u8; 32];
        hash.copy_from_slice(&digest);
        Ok(hash)
    }

    pub fn verify_signature(
        &self,
        signature: &[u8],
        pubkey: &XOnlyPublicKey,
    ) -> Result<(), EscrowError> {
        let hash = self.hash()?;
        let message = Message::from_slice(&hash)?;
        let signature = schnorr::Signature::from_slice(signature)?;
        Secp256k1::verification_only().verify_schnorr(&signature, &message, pubkey)?;
        Ok(())
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SignedContract {
    pub contract: Contract,
    pub contract_hash: Vec<u8>,
    pub maker_signature: Vec<u8>,
    pub taker_signature: Vec<u8>,
}
