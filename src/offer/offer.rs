use iso_currency::Currency;
use secp256k1::XOnlyPublicKey;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::common::{
    error::EscrowError,
    types::{PeerAddress, TxId},
};

// Offer as published by the Maker and taken by us. The Maker sells BTC for fiat.

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Offer {
    pub offer_id: Uuid,
    pub maker_address: PeerAddress,
    pub maker_pubkey: XOnlyPublicKey,
    pub maker_fee_txid: TxId,
    pub currency: Currency,
    pub fiat_amount: u64, // In minor units of the currency
    pub btc_amount_sats: u64,
    pub taker_fee_sats: u64,
    pub security_deposit_sats: u64,
    pub payment_method: String,
}

impl Offer {
    pub fn trade_price(&self) -> Result<f64, EscrowError> {
        if self.btc_amount_sats == 0 {
            return Err(EscrowError::Simple(format!(
                "Offer {} has no BTC amount",
                self.offer_id
            )));
        }
        let minor_units = 10u64.pow(self.currency.exponent().unwrap_or(0) as u32) as f64;
        let btc = self.btc_amount_sats as f64 / 100_000_000.0;
        Ok((self.fiat_amount as f64 / minor_units) / btc)
    }

    /// Trade amount plus the buyer's own security deposit.
    pub fn buyer_payout_sats(&self) -> Result<u64, EscrowError> {
        self.btc_amount_sats
            .checked_add(self.security_deposit_sats)
            .ok_or_else(|| {
                EscrowError::Simple(format!(
                    "Offer {} payout amount overflows, {} + {} sats",
                    self.offer_id, self.btc_amount_sats, self.security_deposit_sats
                ))
            })
    }
}
