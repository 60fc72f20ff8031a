use serde::{Deserialize, Serialize};
use strum_macros::{Display, IntoStaticStr};
use tokio::sync::{mpsc, oneshot};

use crate::common::{
    error::EscrowError,
    types::{DepositInputs, SignedTx, TradeId, Transaction, TxId},
};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, Display)]
pub enum ListenerKind {
    DepositTx,
    PayoutTx,
}

/// Confidence update from an armed confirmation listener. Zero confirmations
/// means the transaction was seen in the network.
#[derive(Clone, Debug, PartialEq)]
pub struct ChainEvent {
    pub kind: ListenerKind,
    pub tx: Transaction,
    pub confirmations: u32,
}

/// Handle onto the wallet. Key material and transaction construction stay on
/// the wallet side, the engine only orchestrates.
#[derive(Clone)]
pub struct WalletAccess {
    tx: mpsc::Sender<WalletRequest>,
}

impl WalletAccess {
    pub fn new(tx: mpsc::Sender<WalletRequest>) -> Self {
        Self { tx }
    }

    pub async fn verify_fee_payment(&self, txid: TxId) -> Result<(), EscrowError> {
        let (rsp_tx, rsp_rx) = oneshot::channel::<Result<(), EscrowError>>();
        let request = WalletRequest::VerifyFeePayment { txid, rsp_tx };
        self.tx.send(request).await?;
        rsp_rx.await?
    }

    pub async fn create_taker_fee_tx(
        &self,
        trade_id: TradeId,
        fee_sats: u64,
    ) -> Result<Transaction, EscrowError> {
        let (rsp_tx, rsp_rx) = oneshot::channel::<Result<Transaction, EscrowError>>();
        let request = WalletRequest::CreateTakerFeeTx {
            trade_id,
            fee_sats,
            rsp_tx,
        };
        self.tx.send(request).await?;
        rsp_rx.await?
    }

    pub async fn create_deposit_tx_inputs(
        &self,
        trade_id: TradeId,
        amount_sats: u64,
    ) -> Result<DepositInputs, EscrowError> {
        let (rsp_tx, rsp_rx) = oneshot::channel::<Result<DepositInputs, EscrowError>>();
        let request = WalletRequest::CreateDepositTxInputs {
            trade_id,
            amount_sats,
            rsp_tx,
        };
        self.tx.send(request).await?;
        rsp_rx.await?
    }

    pub async fn sign_contract(
        &self,
        trade_id: TradeId,
        contract_hash: [u8; 32],
    ) -> Result<Vec<u8>, EscrowError> {
        let (rsp_tx, rsp_rx) = oneshot::channel::<Result<Vec<u8>, EscrowError>>();
        let request = WalletRequest::SignContract {
            trade_id,
            contract_hash,
            rsp_tx,
        };
        self.tx.send(request).await?;
        rsp_rx.await?
    }

    pub async fn co_sign(
        &self,
        trade_id: TradeId,
        tx: Transaction,
        counterparty_signature: Option<Vec<u8>>,
    ) -> Result<SignedTx, EscrowError> {
        let (rsp_tx, rsp_rx) = oneshot::channel::<Result<SignedTx, EscrowError>>();
        let request = WalletRequest::CoSign {
            trade_id,
            tx,
            counterparty_signature,
            rsp_tx,
        };
        self.tx.send(request).await?;
        rsp_rx.await?
    }

    /// Builds the payout spending the deposit tx and signs our half of it.
    pub async fn sign_payout_tx(
        &self,
        trade_id: TradeId,
        deposit_tx: Transaction,
        buyer_payout_sats: u64,
        seller_payout_sats: u64,
        buyer_payout_address: String,
        seller_payout_address: String,
    ) -> Result<SignedTx, EscrowError> {
        let (rsp_tx, rsp_rx) = oneshot::channel::<Result<SignedTx, EscrowError>>();
        let request = WalletRequest::SignPayoutTx {
            trade_id,
            deposit_tx,
            buyer_payout_sats,
            seller_payout_sats,
            buyer_payout_address,
            seller_payout_address,
            rsp_tx,
        };
        self.tx.send(request).await?;
        rsp_rx.await?
    }

    pub async fn broadcast(&self, tx: Transaction) -> Result<TxId, EscrowError> {
        let (rsp_tx, rsp_rx) = oneshot::channel::<Result<TxId, EscrowError>>();
        let request = WalletRequest::Broadcast { tx, rsp_tx };
        self.tx.send(request).await?;
        rsp_rx.await?
    }

    pub async fn watch_confirmations(
        &self,
        trade_id: TradeId,
        kind: ListenerKind,
        txid: TxId,
        notif_tx: mpsc::Sender<ChainEvent>,
    ) -> Result<(), EscrowError> {
        let (rsp_tx, rsp_rx) = oneshot::channel::<Result<(), EscrowError>>();
        let request = WalletRequest::WatchConfirmations {
            trade_id,
            kind,
            txid,
            notif_tx,
            rsp_tx,
        };
        self.tx.send(request).await?;
        rsp_rx.await?
    }
}

#[derive(Display, IntoStaticStr)]
pub enum WalletRequest {
    VerifyFeePayment {
        txid: TxId,
        rsp_tx: oneshot::Sender<Result<(), EscrowError>>,
    },
    CreateTakerFeeTx {
        trade_id: TradeId,
        fee_sats: u64,
        rsp_tx: oneshot::Sender<Result<Transaction, EscrowError>>,
    },
    CreateDepositTxInputs {
        trade_id: TradeId,
        amount_sats: u64,
        rsp_tx: oneshot::Sender<Result<DepositInputs, EscrowError>>,
    },
    SignContract {
        trade_id: TradeId,
        contract_hash: [u8; 32],
        rsp_tx: oneshot::Sender<Result<Vec<u8>, EscrowError>>,
    },
    CoSign {
        trade_id: TradeId,
        tx: Transaction,
        counterparty_signature: Option<Vec<u8>>,
        rsp_tx: oneshot::Sender<Result<SignedTx, EscrowError>>,
    },
    SignPayoutTx {
        trade_id: TradeId,
        deposit_tx: Transaction,
        buyer_payout_sats: u64,
        seller_payout_sats: u64,
        buyer_payout_address: String,
        seller_payout_address: String,
        rsp_tx: oneshot::Sender<Result<SignedTx, EscrowError>>,
    },
    Broadcast {
        tx: Transaction,
        rsp_tx: oneshot::Sender<Result<TxId, EscrowError>>,
    },
    WatchConfirmations {
        trade_id: TradeId,
        kind: ListenerKind,
        txid: TxId,
        notif_tx: mpsc::Sender<ChainEvent>,
        rsp_tx: oneshot::Sender<Result<(), EscrowError>>,
    },
}
