use std::time::SystemTime;

use iso_currency::Currency;
use secp256k1::XOnlyPublicKey;
use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumDiscriminants};
use uuid::Uuid;

use crate::common::types::{
    DepositInputs, MessageUid, PeerAddress, TradeId, Transaction, TxId,
};

// Peer Messaging Data Structures

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, Display)]
pub enum Delivery {
    Live,
    Mailbox,
}

/// A decrypted trade message together with what the transport knows about its sender.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PeerEnvelope {
    pub sender: PeerAddress,
    pub pubkey: XOnlyPublicKey,
    pub delivery: Delivery,
    pub message: TradeMessage,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, EnumDiscriminants)]
#[strum_discriminants(name(MessageKind))]
#[strum_discriminants(derive(Hash, Display, Serialize, Deserialize))]
#[serde(tag = "type")]
pub enum TradeMessage {
    DepositInputsRequest(DepositInputsRequest),
    DepositInputsResponse(DepositInputsResponse),
    DelayedPayoutSignatureRequest(DelayedPayoutSignatureRequest),
    DelayedPayoutSignatureResponse(DelayedPayoutSignatureResponse),
    SignedDepositTx(SignedDepositTx),
    DepositAndDelayedPayout(DepositAndDelayedPayout),
    FiatPaymentStarted(FiatPaymentStarted),
    PayoutPublished(PayoutPublished),
    Ack(Ack),
}

impl TradeMessage {
    pub fn kind(&self) -> MessageKind {
        MessageKind::from(self)
    }

    pub fn trade_id(&self) -> TradeId {
        match self {
            TradeMessage::DepositInputsRequest(msg) => msg.trade_id,
            TradeMessage::DepositInputsResponse(msg) => msg.trade_id,
            TradeMessage::DelayedPayoutSignatureRequest(msg) => msg.trade_id,
            TradeMessage::DelayedPayoutSignatureResponse(msg) => msg.trade_id,
            TradeMessage::SignedDepositTx(msg) => msg.trade_id,
            TradeMessage::DepositAndDelayedPayout(msg) => msg.trade_id,
            TradeMessage::FiatPaymentStarted(msg) => msg.trade_id,
            TradeMessage::PayoutPublished(msg) => msg.trade_id,
            TradeMessage::Ack(msg) => msg.trade_id,
        }
    }

    pub fn uid(&self) -> MessageUid {
        match self {
            TradeMessage::DepositInputsRequest(msg) => msg.uid,
            TradeMessage::DepositInputsResponse(msg) => msg.uid,
            TradeMessage::DelayedPayoutSignatureRequest(msg) => msg.uid,
            TradeMessage::DelayedPayoutSignatureResponse(msg) => msg.uid,
            TradeMessage::SignedDepositTx(msg) => msg.uid,
            TradeMessage::DepositAndDelayedPayout(msg) => msg.uid,
            TradeMessage::FiatPaymentStarted(msg) => msg.uid,
            TradeMessage::PayoutPublished(msg) => msg.uid,
            TradeMessage::Ack(msg) => msg.uid,
        }
    }
}

impl MessageKind {
    /// Mailbox messages may be stored by the network and delivered once the
    /// recipient comes back online. The others require both peers online.
    pub fn is_mailbox_eligible(&self) -> bool {
        match self {
            MessageKind::DepositInputsRequest
            | MessageKind::DepositInputsResponse
            | MessageKind::DelayedPayoutSignatureRequest
            | MessageKind::DelayedPayoutSignatureResponse
            | MessageKind::SignedDepositTx => false,
            MessageKind::DepositAndDelayedPayout
            | MessageKind::FiatPaymentStarted
            | MessageKind::PayoutPublished
            | MessageKind::Ack => true,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DepositInputsRequest {
    pub trade_id: TradeId,
    pub uid: MessageUid,
    pub offer_id: Uuid,
    pub btc_amount_sats: u64,
    pub taker_fee_txid: TxId,
    pub taker_inputs: DepositInputs,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DepositInputsResponse {
    pub trade_id: TradeId,
    pub uid: MessageUid,
    pub maker_inputs: DepositInputs,
    pub prepared_deposit_tx: Transaction,
    pub maker_contract_signature: Vec<u8>,
    pub lock_time: u32,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DelayedPayoutSignatureRequest {
    pub trade_id: TradeId,
    pub uid: MessageUid,
    pub delayed_payout_tx: Transaction,
    pub seller_signature: Vec<u8>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DelayedPayoutSignatureResponse {
    pub trade_id: TradeId,
    pub uid: MessageUid,
    pub buyer_signature: Vec<u8>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SignedDepositTx {
    pub trade_id: TradeId,
    pub uid: MessageUid,
    pub deposit_tx: Transaction,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DepositAndDelayedPayout {
    pub trade_id: TradeId,
    pub uid: MessageUid,
    pub deposit_tx: Transaction,
    pub delayed_payout_tx: Transaction,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FiatPaymentStarted {
    pub trade_id: TradeId,
    pub uid: MessageUid,
    pub buyer_payout_address: String,
    pub buyer_payout_signature: Vec<u8>,
    pub payout_txid: TxId,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PayoutPublished {
    pub trade_id: TradeId,
    pub uid: MessageUid,
    pub payout_tx: Transaction,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Ack {
    pub trade_id: TradeId,
    pub uid: MessageUid,
    pub source_uid: MessageUid,
    pub source_kind: MessageKind,
    pub success: bool,
    pub error_message: Option<String>,
}

impl Ack {
    pub fn for_message(message: &TradeMessage, success: bool, error_message: Option<String>) -> Self {
        Self {
            trade_id: message.trade_id(),
            uid: Uuid::new_v4(),
            source_uid: message.uid(),
            source_kind: message.kind(),
            success,
            error_message,
        }
    }
}

/// Published to the network once the deposit is in place.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TradeStatistics {
    pub offer_id: Uuid,
    pub currency: Currency,
    pub fiat_amount: u64,
    pub btc_amount_sats: u64,
    pub trade_price: f64,
    pub payment_method: String,
    pub trade_date: SystemTime,
}
