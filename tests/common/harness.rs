use std::{future::Future, sync::Arc, time::Duration};

use crusty_escrow::{
    common::{
        config::ProtocolConfig,
        error::EscrowError,
        types::{PeerAddress, TradeId},
    },
    manager::Manager,
    peer_msg::{Ack, MessageKind, TradeMessage},
    protocol::Role,
    services::{ChainEvent, ListenerKind, NoScreening, Services},
    testing::{SomeTestTradeParams, TESTING_DEFAULT_CHANNEL_SIZE},
    trade::{Phase, State},
    trader::{TradeNotif, TraderAccess},
};
use tokio::sync::mpsc;
use uuid::Uuid;

use super::{
    fake_services::{FakePeer, FakeWallet, PeerControl, PeerEvent, WalletControl, WalletEvent},
    logger,
};

// Longer than any protocol deadline so paused-clock tests never trip it first
const WAIT: Duration = Duration::from_secs(120);

pub type NotifRx = mpsc::Receiver<Result<TradeNotif, EscrowError>>;

pub async fn within<F: Future>(future: F) -> F::Output {
    tokio::time::timeout(WAIT, future)
        .await
        .expect("Timed out waiting")
}

pub struct Harness {
    pub manager: Manager,
    pub config: ProtocolConfig,
    pub peer: PeerControl,
    pub wallet: WalletControl,
    pub peer_events: mpsc::UnboundedReceiver<PeerEvent>,
    skipped_peer_events: Vec<PeerEvent>,
    pub wallet_events: mpsc::UnboundedReceiver<WalletEvent>,
}

impl Harness {
    pub fn config() -> ProtocolConfig {
        let data_dir = std::env::temp_dir().join(format!("escrow-test-{}", Uuid::new_v4()));
        ProtocolConfig::default().with_data_dir(data_dir)
    }

    pub async fn start(config: ProtocolConfig) -> Self {
        Self::start_with(config, PeerControl::default(), WalletControl::default()).await
    }

    async fn start_with(config: ProtocolConfig, peer: PeerControl, wallet: WalletControl) -> Self {
        logger::setup();
        let (peer_event_tx, peer_events) = mpsc::unbounded_channel();
        let (wallet_event_tx, wallet_events) = mpsc::unbounded_channel();
        let services = Services::new(
            FakePeer::start(peer.clone(), peer_event_tx),
            FakeWallet::start(wallet.clone(), wallet_event_tx),
            Arc::new(NoScreening),
        );
        let manager = Manager::new(services, config.clone()).await.unwrap();
        Self {
            manager,
            config,
            peer,
            wallet,
            peer_events,
            skipped_peer_events: Vec::new(),
            wallet_events,
        }
    }

    /// Shuts every trader down and brings them back from disk.
    pub async fn restart(self) -> Self {
        let Harness {
            manager,
            config,
            peer,
            wallet,
            ..
        } = self;
        manager.shutdown().await.unwrap();
        Self::start_with(config, peer, wallet).await
    }

    pub async fn new_trade(&self) -> (TraderAccess, NotifRx) {
        let offer = SomeTestTradeParams::offer();
        let trader = self
            .manager
            .new_trade(Role::BuyerAsTaker, offer)
            .await
            .unwrap();
        let (notif_tx, notif_rx) = mpsc::channel(TESTING_DEFAULT_CHANNEL_SIZE);
        trader.register_notif_tx(notif_tx).await.unwrap();
        (trader, notif_rx)
    }

    pub async fn trader(&self, trade_id: TradeId) -> TraderAccess {
        self.manager
            .get_traders()
            .await
            .remove(&trade_id)
            .expect("No trader for trade id")
    }

    // Input from the maker

    pub async fn from_maker(&self, message: TradeMessage) {
        self.manager
            .on_decrypted_message(
                SomeTestTradeParams::maker_address(),
                SomeTestTradeParams::maker_pubkey(),
                message,
            )
            .await
            .unwrap();
    }

    pub async fn from_maker_mailbox(&self, message: TradeMessage) {
        self.manager
            .on_mailbox_message(
                SomeTestTradeParams::maker_address(),
                SomeTestTradeParams::maker_pubkey(),
                message,
            )
            .await
            .unwrap();
    }

    pub async fn from_address(&self, address: &str, message: TradeMessage) {
        self.manager
            .on_decrypted_message(
                PeerAddress::from(address),
                SomeTestTradeParams::maker_pubkey(),
                message,
            )
            .await
            .unwrap();
    }

    // Output to the maker

    pub async fn expect_sent(&mut self, kind: MessageKind) -> (PeerAddress, TradeMessage, bool) {
        loop {
            match within(self.peer_events.recv()).await {
                Some(PeerEvent::Sent {
                    peer,
                    message,
                    mailbox,
                }) if message.kind() == kind => return (peer, message, mailbox),
                Some(event) => self.skipped_peer_events.push(event),
                None => panic!("Peer event channel closed"),
            }
        }
    }

    /// Next ack or nack sent for the message with `source_uid`.
    pub async fn expect_ack(&mut self, source_uid: Uuid) -> Ack {
        loop {
            let (_, message, _) = self.expect_sent(MessageKind::Ack).await;
            if let TradeMessage::Ack(ack) = message {
                if ack.source_uid == source_uid {
                    return ack;
                }
            }
        }
    }

    pub async fn expect_mailbox_removed(&mut self, uid: Uuid) {
        loop {
            match within(self.peer_events.recv()).await {
                Some(PeerEvent::MailboxRemoved(removed)) if removed == uid => return,
                Some(event) => self.skipped_peer_events.push(event),
                None => panic!("Peer event channel closed"),
            }
        }
    }

    /// Everything the peer saw that no expectation consumed, without waiting.
    pub fn drain_peer_events(&mut self) -> Vec<PeerEvent> {
        let mut events = std::mem::take(&mut self.skipped_peer_events);
        while let Ok(event) = self.peer_events.try_recv() {
            events.push(event);
        }
        events
    }

    // Wallet

    pub async fn expect_watching(&mut self, expected: ListenerKind) -> mpsc::Sender<ChainEvent> {
        loop {
            match within(self.wallet_events.recv()).await {
                Some(WalletEvent::Watching { kind, notif_tx, .. }) if kind == expected => {
                    return notif_tx
                }
                Some(_) => continue,
                None => panic!("Wallet event channel closed"),
            }
        }
    }

    pub fn drain_wallet_events(&mut self) -> Vec<WalletEvent> {
        let mut events = Vec::new();
        while let Ok(event) = self.wallet_events.try_recv() {
            events.push(event);
        }
        events
    }

    // Trade driving

    /// Takes the offer and co-signs the delayed payout. The maker has not
    /// sent the published deposit yet. Returns the deposit listener too.
    pub async fn drive_to_delayed_payout_signed(
        &mut self,
    ) -> (TraderAccess, NotifRx, mpsc::Sender<ChainEvent>) {
        let (trader, mut notif_rx) = self.new_trade().await;
        trader.take_offer().await.unwrap();
        self.expect_sent(MessageKind::DepositInputsRequest).await;

        self.from_maker(SomeTestTradeParams::deposit_inputs_response())
            .await;
        expect_state(&mut notif_rx, State::SignedDepositTxSent).await;
        let deposit_listener = self.expect_watching(ListenerKind::DepositTx).await;

        self.from_maker(SomeTestTradeParams::delayed_payout_signature_request())
            .await;
        expect_state(&mut notif_rx, State::DelayedPayoutSigned).await;
        (trader, notif_rx, deposit_listener)
    }

    /// Walks on to the maker's deposit message.
    pub async fn drive_to_deposit_received(
        &mut self,
    ) -> (TraderAccess, NotifRx, mpsc::Sender<ChainEvent>) {
        let (trader, mut notif_rx, deposit_listener) =
            self.drive_to_delayed_payout_signed().await;

        let deposit_message = SomeTestTradeParams::deposit_and_delayed_payout();
        self.from_maker_mailbox(deposit_message.clone()).await;
        expect_state(&mut notif_rx, State::DepositTxReceived).await;
        self.expect_mailbox_removed(deposit_message.uid()).await;
        (trader, notif_rx, deposit_listener)
    }

    /// Takes the offer and walks through deposit confirmation.
    pub async fn drive_to_deposit_confirmed(&mut self) -> (TraderAccess, NotifRx) {
        let (trader, mut notif_rx, deposit_listener) = self.drive_to_deposit_received().await;
        deposit_listener
            .send(ChainEvent {
                kind: ListenerKind::DepositTx,
                tx: SomeTestTradeParams::deposit_tx(),
                confirmations: 1,
            })
            .await
            .unwrap();
        expect_state(&mut notif_rx, State::DepositTxConfirmed).await;
        (trader, notif_rx)
    }
}

/// Waits for the given state, skipping intermediate ones. Panics on a fault.
pub async fn expect_state(notif_rx: &mut NotifRx, expected: State) -> Phase {
    loop {
        match within(notif_rx.recv()).await {
            Some(Ok(TradeNotif::StateChanged { phase, state })) if state == expected => {
                return phase
            }
            Some(Ok(_)) => continue,
            Some(Err(error)) => panic!("Expected state {}, got fault {}", expected, error),
            None => panic!("Notif channel closed"),
        }
    }
}

pub async fn expect_fault(notif_rx: &mut NotifRx) -> EscrowError {
    loop {
        match within(notif_rx.recv()).await {
            Some(Ok(_)) => continue,
            Some(Err(error)) => return error,
            None => panic!("Notif channel closed"),
        }
    }
}
