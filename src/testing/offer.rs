use std::str::FromStr;

use iso_currency::Currency;
use secp256k1::{KeyPair, Secp256k1, SecretKey, XOnlyPublicKey};
use uuid::Uuid;

use crate::{common::types::PeerAddress, offer::OfferBuilder};

pub struct SomeTestOfferParams {}

impl SomeTestOfferParams {
    pub fn some_offer_id() -> Uuid {
        Uuid::from_str("20c38e4b-037b-4654-b99c-1d9f2beb755f").unwrap()
    }

    pub fn maker_secret_key() -> SecretKey {
        SecretKey::from_str("01010101010101010001020304050607ffff0000ffff00006363636363636363")
            .unwrap()
    }

    pub fn maker_keypair() -> KeyPair {
        KeyPair::from_secret_key(&Secp256k1::new(), &Self::maker_secret_key())
    }

    pub fn maker_pubkey() -> XOnlyPublicKey {
        Self::maker_keypair().x_only_public_key().0
    }

    pub fn maker_address() -> PeerAddress {
        PeerAddress::from("maker7xq2wbhjm3ko.onion:9999")
    }

    pub fn maker_fee_txid() -> String {
        "maker-fee-txid".to_string()
    }

    pub fn default_builder() -> OfferBuilder {
        let mut builder = OfferBuilder::new();
        builder
            .offer_id(Self::some_offer_id())
            .maker(Self::maker_address(), Self::maker_pubkey())
            .maker_fee_txid(Self::maker_fee_txid())
            .fiat(Currency::EUR, 250_000)
            .btc_amount_sats(10_000_000)
            .taker_fee_sats(5_000)
            .security_deposit_sats(1_500_000)
            .payment_method("SEPA");
        builder
    }
}
