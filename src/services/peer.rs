use secp256k1::XOnlyPublicKey;
use strum_macros::{Display, IntoStaticStr};
use tokio::sync::{mpsc, oneshot};

use crate::{
    common::{
        error::EscrowError,
        types::{MessageUid, PeerAddress},
    },
    peer_msg::{TradeMessage, TradeStatistics},
};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Display)]
pub enum SendOutcome {
    Arrived,
    StoredInMailbox,
}

/// Handle onto the network layer. Encryption, addressing and mailbox storage
/// all live on the other side of the channel.
#[derive(Clone)]
pub struct PeerAccess {
    tx: mpsc::Sender<PeerRequest>,
}

impl PeerAccess {
    pub fn new(tx: mpsc::Sender<PeerRequest>) -> Self {
        Self { tx }
    }

    pub async fn send_message(
        &self,
        peer: PeerAddress,
        pubkey: XOnlyPublicKey,
        message: TradeMessage,
    ) -> Result<SendOutcome, EscrowError> {
        let (rsp_tx, rsp_rx) = oneshot::channel::<Result<SendOutcome, EscrowError>>();
        let mailbox = message.kind().is_mailbox_eligible();
        let request = PeerRequest::SendMessage {
            peer,
            pubkey,
            message,
            mailbox,
            rsp_tx,
        };
        self.tx.send(request).await?;
        rsp_rx.await?
    }

    pub async fn remove_mailbox_message(&self, uid: MessageUid) -> Result<(), EscrowError> {
        let (rsp_tx, rsp_rx) = oneshot::channel::<Result<(), EscrowError>>();
        let request = PeerRequest::RemoveMailboxMessage { uid, rsp_tx };
        self.tx.send(request).await?;
        rsp_rx.await?
    }

    pub async fn publish_trade_statistics(
        &self,
        statistics: TradeStatistics,
    ) -> Result<(), EscrowError> {
        let (rsp_tx, rsp_rx) = oneshot::channel::<Result<(), EscrowError>>();
        let request = PeerRequest::PublishTradeStatistics { statistics, rsp_tx };
        self.tx.send(request).await?;
        rsp_rx.await?
    }
}

#[derive(Display, IntoStaticStr)]
pub enum PeerRequest {
    SendMessage {
        peer: PeerAddress,
        pubkey: XOnlyPublicKey,
        message: TradeMessage,
        mailbox: bool,
        rsp_tx: oneshot::Sender<Result<SendOutcome, EscrowError>>,
    },
    RemoveMailboxMessage {
        uid: MessageUid,
        rsp_tx: oneshot::Sender<Result<(), EscrowError>>,
    },
    PublishTradeStatistics {
        statistics: TradeStatistics,
        rsp_tx: oneshot::Sender<Result<(), EscrowError>>,
    },
}
