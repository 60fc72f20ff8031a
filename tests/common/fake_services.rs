use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc, Mutex,
};

use crusty_escrow::{
    common::{
        error::EscrowError,
        types::{MessageUid, PeerAddress, SignedTx, TxId},
    },
    peer_msg::{TradeMessage, TradeStatistics},
    services::{
        ChainEvent, ListenerKind, PeerAccess, PeerRequest, SendOutcome, WalletAccess,
        WalletRequest,
    },
    testing::{SomeTestTradeParams, TESTING_DEFAULT_CHANNEL_SIZE},
};
use tokio::sync::mpsc;

// Wallet

#[derive(Debug)]
pub enum WalletEvent {
    Broadcast(TxId),
    Watching {
        kind: ListenerKind,
        txid: TxId,
        notif_tx: mpsc::Sender<ChainEvent>,
    },
}

#[derive(Clone, Default)]
pub struct WalletControl {
    fail_broadcast: Arc<AtomicBool>,
}

impl WalletControl {
    pub fn fail_broadcast(&self, fail: bool) {
        self.fail_broadcast.store(fail, Ordering::SeqCst);
    }
}

pub struct FakeWallet {}

impl FakeWallet {
    pub fn start(
        control: WalletControl,
        event_tx: mpsc::UnboundedSender<WalletEvent>,
    ) -> WalletAccess {
        let (tx, rx) = mpsc::channel::<WalletRequest>(TESTING_DEFAULT_CHANNEL_SIZE);
        let actor = FakeWalletActor {
            rx,
            control,
            event_tx,
        };
        tokio::spawn(async move { actor.run().await });
        WalletAccess::new(tx)
    }
}

struct FakeWalletActor {
    rx: mpsc::Receiver<WalletRequest>,
    control: WalletControl,
    event_tx: mpsc::UnboundedSender<WalletEvent>,
}

impl FakeWalletActor {
    async fn run(mut self) {
        while let Some(request) = self.rx.recv().await {
            self.handle_request(request);
        }
    }

    fn handle_request(&mut self, request: WalletRequest) {
        match request {
            WalletRequest::VerifyFeePayment { rsp_tx, .. } => {
                let _ = rsp_tx.send(Ok(()));
            }
            WalletRequest::CreateTakerFeeTx { rsp_tx, .. } => {
                let _ = rsp_tx.send(Ok(SomeTestTradeParams::taker_fee_tx()));
            }
            WalletRequest::CreateDepositTxInputs { rsp_tx, .. } => {
                let _ = rsp_tx.send(Ok(SomeTestTradeParams::taker_inputs()));
            }
            WalletRequest::SignContract { rsp_tx, .. } => {
                let _ = rsp_tx.send(Ok(vec![0x0c; 64]));
            }
            WalletRequest::CoSign { tx, rsp_tx, .. } => {
                let signed = SignedTx {
                    tx,
                    signature: vec![0x0d; 64],
                };
                let _ = rsp_tx.send(Ok(signed));
            }
            WalletRequest::SignPayoutTx { rsp_tx, .. } => {
                let signed = SignedTx {
                    tx: SomeTestTradeParams::payout_tx(),
                    signature: SomeTestTradeParams::payout_signature(),
                };
                let _ = rsp_tx.send(Ok(signed));
            }
            WalletRequest::Broadcast { tx, rsp_tx } => {
                if self.control.fail_broadcast.load(Ordering::SeqCst) {
                    let error = EscrowError::Simple(format!("Broadcast of {} rejected", tx.txid));
                    let _ = rsp_tx.send(Err(error));
                    return;
                }
                let _ = self.event_tx.send(WalletEvent::Broadcast(tx.txid.clone()));
                let _ = rsp_tx.send(Ok(tx.txid));
            }
            WalletRequest::WatchConfirmations {
                kind,
                txid,
                notif_tx,
                rsp_tx,
                ..
            } => {
                let _ = self.event_tx.send(WalletEvent::Watching {
                    kind,
                    txid,
                    notif_tx,
                });
                let _ = rsp_tx.send(Ok(()));
            }
        }
    }
}

// Peer network

#[derive(Debug)]
pub enum PeerEvent {
    Sent {
        peer: PeerAddress,
        message: TradeMessage,
        mailbox: bool,
    },
    MailboxRemoved(MessageUid),
    StatisticsPublished(TradeStatistics),
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum PeerMode {
    Online,
    /// Mailbox messages are stored, everything else fails.
    Offline,
    Unreachable,
}

#[derive(Clone)]
pub struct PeerControl {
    mode: Arc<Mutex<PeerMode>>,
}

impl Default for PeerControl {
    fn default() -> Self {
        Self {
            mode: Arc::new(Mutex::new(PeerMode::Online)),
        }
    }
}

impl PeerControl {
    pub fn set_mode(&self, mode: PeerMode) {
        *self.mode.lock().unwrap() = mode;
    }

    fn mode(&self) -> PeerMode {
        *self.mode.lock().unwrap()
    }
}

pub struct FakePeer {}

impl FakePeer {
    pub fn start(control: PeerControl, event_tx: mpsc::UnboundedSender<PeerEvent>) -> PeerAccess {
        let (tx, rx) = mpsc::channel::<PeerRequest>(TESTING_DEFAULT_CHANNEL_SIZE);
        let actor = FakePeerActor {
            rx,
            control,
            event_tx,
        };
        tokio::spawn(async move { actor.run().await });
        PeerAccess::new(tx)
    }
}

struct FakePeerActor {
    rx: mpsc::Receiver<PeerRequest>,
    control: PeerControl,
    event_tx: mpsc::UnboundedSender<PeerEvent>,
}

impl FakePeerActor {
    async fn run(mut self) {
        while let Some(request) = self.rx.recv().await {
            self.handle_request(request);
        }
    }

    fn handle_request(&mut self, request: PeerRequest) {
        match request {
            PeerRequest::SendMessage {
                peer,
                message,
                mailbox,
                rsp_tx,
                ..
            } => {
                let result = match self.control.mode() {
                    PeerMode::Online => Ok(SendOutcome::Arrived),
                    PeerMode::Offline if mailbox => Ok(SendOutcome::StoredInMailbox),
                    PeerMode::Offline | PeerMode::Unreachable => Err(EscrowError::Simple(
                        format!("{} unreachable", peer),
                    )),
                };
                if result.is_ok() {
                    let _ = self.event_tx.send(PeerEvent::Sent {
                        peer,
                        message,
                        mailbox,
                    });
                }
                let _ = rsp_tx.send(result);
            }
            PeerRequest::RemoveMailboxMessage { uid, rsp_tx } => {
                let _ = self.event_tx.send(PeerEvent::MailboxRemoved(uid));
                let _ = rsp_tx.send(Ok(()));
            }
            PeerRequest::PublishTradeStatistics { statistics, rsp_tx } => {
                let _ = self.event_tx.send(PeerEvent::StatisticsPublished(statistics));
                let _ = rsp_tx.send(Ok(()));
            }
        }
    }
}
