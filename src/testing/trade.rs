use std::str::FromStr;

use secp256k1::{KeyPair, Message, Secp256k1, SecretKey, XOnlyPublicKey};
use uuid::Uuid;

use super::SomeTestOfferParams;
use crate::{
    common::types::{DepositInputs, MessageUid, PeerAddress, TradeId, Transaction},
    offer::Offer,
    peer_msg::{
        Ack, DelayedPayoutSignatureRequest, DepositAndDelayedPayout, DepositInputsResponse,
        FiatPaymentStarted, MessageKind, PayoutPublished, TradeMessage,
    },
    protocol::Role,
    trade::{Contract, TradeRecord},
};

// Fixed uids so an ack fixture can refer to its source fixture
const DEPOSIT_INPUTS_RESPONSE_UID: u128 = 0x0101;
const DELAYED_PAYOUT_REQUEST_UID: u128 = 0x0102;
const DEPOSIT_AND_DELAYED_PAYOUT_UID: u128 = 0x0103;
const FIAT_PAYMENT_STARTED_UID: u128 = 0x0104;
const PAYOUT_PUBLISHED_UID: u128 = 0x0105;
const ACK_UID: u128 = 0x0106;

pub struct SomeTestTradeParams {}

impl SomeTestTradeParams {
    // Identities

    pub fn some_trade_id() -> TradeId {
        SomeTestOfferParams::some_offer_id()
    }

    pub fn maker_address() -> PeerAddress {
        SomeTestOfferParams::maker_address()
    }

    pub fn maker_pubkey() -> XOnlyPublicKey {
        SomeTestOfferParams::maker_pubkey()
    }

    pub fn taker_pubkey() -> XOnlyPublicKey {
        let secret_key =
            SecretKey::from_str("0202020202020202020202020202020202020202020202020202020202020202")
                .unwrap();
        KeyPair::from_secret_key(&Secp256k1::new(), &secret_key)
            .x_only_public_key()
            .0
    }

    pub fn offer() -> Offer {
        SomeTestOfferParams::default_builder().build().unwrap()
    }

    pub fn trade_record() -> TradeRecord {
        TradeRecord::new(Self::some_trade_id(), Role::BuyerAsTaker, Self::offer())
    }

    // Wallet artifacts

    pub fn lock_time() -> u32 {
        850_000
    }

    pub fn taker_fee_tx() -> Transaction {
        Transaction {
            txid: "taker-fee-txid".to_string(),
            inputs: vec!["taker-fee-utxo".to_string()],
            lock_time: 0,
            raw: vec![0x01, 0xfe],
        }
    }

    pub fn taker_inputs() -> DepositInputs {
        DepositInputs {
            inputs: vec!["taker-utxo-0".to_string()],
            input_sats: 1_500_000,
            payout_address: "bc1q-taker-payout".to_string(),
            multisig_pubkey: vec![0x02; 33],
        }
    }

    pub fn maker_inputs() -> DepositInputs {
        DepositInputs {
            inputs: vec!["maker-utxo-0".to_string(), "maker-utxo-1".to_string()],
            input_sats: 11_500_000,
            payout_address: "bc1q-maker-payout".to_string(),
            multisig_pubkey: vec![0x03; 33],
        }
    }

    pub fn deposit_tx() -> Transaction {
        Transaction {
            txid: "deposit-txid".to_string(),
            inputs: vec![
                "taker-utxo-0".to_string(),
                "maker-utxo-0".to_string(),
                "maker-utxo-1".to_string(),
            ],
            lock_time: 0,
            raw: vec![0x02, 0xde],
        }
    }

    pub fn delayed_payout_tx() -> Transaction {
        Transaction {
            txid: "delayed-payout-txid".to_string(),
            inputs: vec!["deposit-txid".to_string()],
            lock_time: Self::lock_time(),
            raw: vec![0x03, 0xdb],
        }
    }

    pub fn payout_tx() -> Transaction {
        Transaction {
            txid: "payout-txid".to_string(),
            inputs: vec!["deposit-txid".to_string()],
            lock_time: 0,
            raw: vec![0x04, 0xbe],
        }
    }

    pub fn payout_signature() -> Vec<u8> {
        vec![0x05; 64]
    }

    // Contract

    pub fn contract() -> Contract {
        let offer = Self::offer();
        Contract {
            trade_id: Self::some_trade_id(),
            offer_id: offer.offer_id,
            btc_amount_sats: offer.btc_amount_sats,
            fiat_amount: offer.fiat_amount,
            currency_code: offer.currency.code().to_string(),
            maker_address: Self::maker_address(),
            maker_pubkey: Self::maker_pubkey(),
            maker_fee_txid: offer.maker_fee_txid,
            taker_fee_txid: Self::taker_fee_tx().txid,
            maker_payout_address: Self::maker_inputs().payout_address,
            taker_payout_address: Self::taker_inputs().payout_address,
            lock_time: Self::lock_time(),
        }
    }

    pub fn maker_sign(contract: &Contract) -> Vec<u8> {
        let secp = Secp256k1::new();
        let message = Message::from_slice(&contract.hash().unwrap()).unwrap();
        let signature =
            secp.sign_schnorr_no_aux_rand(&message, &SomeTestOfferParams::maker_keypair());
        signature[..].to_vec()
    }

    // Messages from the maker

    pub fn deposit_inputs_response() -> TradeMessage {
        TradeMessage::DepositInputsResponse(DepositInputsResponse {
            trade_id: Self::some_trade_id(),
            uid: Uuid::from_u128(DEPOSIT_INPUTS_RESPONSE_UID),
            maker_inputs: Self::maker_inputs(),
            prepared_deposit_tx: Self::deposit_tx(),
            maker_contract_signature: Self::maker_sign(&Self::contract()),
            lock_time: Self::lock_time(),
        })
    }

    pub fn delayed_payout_signature_request() -> TradeMessage {
        TradeMessage::DelayedPayoutSignatureRequest(DelayedPayoutSignatureRequest {
            trade_id: Self::some_trade_id(),
            uid: Uuid::from_u128(DELAYED_PAYOUT_REQUEST_UID),
            delayed_payout_tx: Self::delayed_payout_tx(),
            seller_signature: vec![0x07; 64],
        })
    }

    pub fn deposit_and_delayed_payout() -> TradeMessage {
        TradeMessage::DepositAndDelayedPayout(DepositAndDelayedPayout {
            trade_id: Self::some_trade_id(),
            uid: Uuid::from_u128(DEPOSIT_AND_DELAYED_PAYOUT_UID),
            deposit_tx: Self::deposit_tx(),
            delayed_payout_tx: Self::delayed_payout_tx(),
        })
    }

    pub fn payout_published() -> TradeMessage {
        TradeMessage::PayoutPublished(PayoutPublished {
            trade_id: Self::some_trade_id(),
            uid: Uuid::from_u128(PAYOUT_PUBLISHED_UID),
            payout_tx: Self::payout_tx(),
        })
    }

    pub fn ack_for_fiat_payment_started() -> TradeMessage {
        TradeMessage::Ack(Ack {
            trade_id: Self::some_trade_id(),
            uid: Uuid::from_u128(ACK_UID),
            source_uid: Self::fiat_payment_started_uid(),
            source_kind: MessageKind::FiatPaymentStarted,
            success: true,
            error_message: None,
        })
    }

    // Messages from us

    pub fn fiat_payment_started_uid() -> MessageUid {
        Uuid::from_u128(FIAT_PAYMENT_STARTED_UID)
    }

    pub fn fiat_payment_started() -> TradeMessage {
        TradeMessage::FiatPaymentStarted(FiatPaymentStarted {
            trade_id: Self::some_trade_id(),
            uid: Self::fiat_payment_started_uid(),
            buyer_payout_address: Self::taker_inputs().payout_address,
            buyer_payout_signature: Self::payout_signature(),
            payout_txid: Self::payout_tx().txid,
        })
    }
}
