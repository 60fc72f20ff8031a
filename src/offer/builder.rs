use std::result::Result;

use iso_currency::Currency;
use secp256k1::XOnlyPublicKey;
use uuid::Uuid;

use crate::common::{
    error::EscrowError,
    types::{PeerAddress, TxId},
};

use super::Offer;

pub struct OfferBuilder {
    offer_id: Option<Uuid>,
    maker_address: Option<PeerAddress>,
    maker_pubkey: Option<XOnlyPublicKey>,
    maker_fee_txid: Option<TxId>,
    currency: Option<Currency>,
    fiat_amount: Option<u64>,
    btc_amount_sats: Option<u64>,
    taker_fee_sats: Option<u64>,
    security_deposit_sats: Option<u64>,
    payment_method: Option<String>,
}

impl OfferBuilder {
    pub fn new() -> Self {
        Self {
            offer_id: None,
            maker_address: None,
            maker_pubkey: None,
            maker_fee_txid: None,
            currency: None,
            fiat_amount: None,
            btc_amount_sats: None,
            taker_fee_sats: None,
            security_deposit_sats: None,
            payment_method: None,
        }
    }

    pub fn offer_id(&mut self, offer_id: impl Into<Uuid>) -> &mut Self {
        self.offer_id = Some(offer_id.into());
        self
    }

    pub fn maker(
        &mut self,
        address: impl Into<PeerAddress>,
        pubkey: XOnlyPublicKey,
    ) -> &mut Self {
        self.maker_address = Some(address.into());
        self.maker_pubkey = Some(pubkey);
        self
    }

    pub fn maker_fee_txid(&mut self, maker_fee_txid: impl Into<TxId>) -> &mut Self {
        self.maker_fee_txid = Some(maker_fee_txid.into());
        self
    }

    pub fn fiat(&mut self, currency: Currency, fiat_amount: u64) -> &mut Self {
        self.currency = Some(currency);
        self.fiat_amount = Some(fiat_amount);
        self
    }

    pub fn btc_amount_sats(&mut self, btc_amount_sats: u64) -> &mut Self {
        self.btc_amount_sats = Some(btc_amount_sats);
        self
    }

    pub fn taker_fee_sats(&mut self, taker_fee_sats: u64) -> &mut Self {
        self.taker_fee_sats = Some(taker_fee_sats);
        self
    }

    pub fn security_deposit_sats(&mut self, security_deposit_sats: u64) -> &mut Self {
        self.security_deposit_sats = Some(security_deposit_sats);
        self
    }

    pub fn payment_method(&mut self, payment_method: impl Into<String>) -> &mut Self {
        self.payment_method = Some(payment_method.into());
        self
    }

    pub fn build(&mut self) -> Result<Offer, EscrowError> {
        let offer_id = if let Some(explicit_id) = self.offer_id.as_ref() {
            explicit_id.to_owned()
        } else {
            Uuid::new_v4()
        };

        let Some(maker_address) = self.maker_address.take() else {
            return Err(EscrowError::Simple("No Maker address defined".to_string()));
        };

        let Some(maker_pubkey) = self.maker_pubkey else {
            return Err(EscrowError::Simple("No Maker pubkey defined".to_string()));
        };

        let Some(maker_fee_txid) = self.maker_fee_txid.take() else {
            return Err(EscrowError::Simple("No Maker fee txid defined".to_string()));
        };

        let (Some(currency), Some(fiat_amount)) = (self.currency, self.fiat_amount) else {
            return Err(EscrowError::Simple("No fiat amount defined".to_string()));
        };

        let Some(btc_amount_sats) = self.btc_amount_sats.filter(|sats| *sats > 0) else {
            return Err(EscrowError::Simple("No BTC amount defined".to_string()));
        };

        let offer = Offer {
            offer_id,
            maker_address,
            maker_pubkey,
            maker_fee_txid,
            currency,
            fiat_amount,
            btc_amount_sats,
            taker_fee_sats: self.taker_fee_sats.unwrap_or_default(),
            security_deposit_sats: self.security_deposit_sats.unwrap_or_default(),
            payment_method: self.payment_method.take().unwrap_or_default(),
        };
        offer.buyer_payout_sats()?;

        Ok(offer)
    }
}
