mod common;

#[cfg(test)]
mod restore_tests {
    use std::time::Duration;

    use crusty_escrow::{
        peer_msg::{Ack, MessageKind, TradeMessage},
        services::{ChainEvent, ListenerKind},
        testing::{SomeTestTradeParams, TESTING_DEFAULT_CHANNEL_SIZE},
        trade::{Phase, State},
    };
    use tokio::{
        sync::mpsc,
        time::{sleep, Instant},
    };

    use super::common::{
        fake_services::{PeerEvent, PeerMode, WalletEvent},
        harness::{expect_state, Harness},
    };

    fn fiat_payment_started_resent(events: &[PeerEvent]) -> bool {
        events.iter().any(|event| {
            matches!(
                event,
                PeerEvent::Sent { message, .. } if message.kind() == MessageKind::FiatPaymentStarted
            )
        })
    }

    #[tokio::test]
    async fn test_restart_rearms_deposit_listener() {
        let mut harness = Harness::start(Harness::config()).await;
        let (_trader, _notif_rx, _deposit_listener) = harness.drive_to_deposit_received().await;
        let trade_id = SomeTestTradeParams::some_trade_id();

        let mut harness = harness.restart().await;
        let deposit_listener = harness.expect_watching(ListenerKind::DepositTx).await;
        let trader = harness.trader(trade_id).await;
        let (notif_tx, mut notif_rx) = mpsc::channel(TESTING_DEFAULT_CHANNEL_SIZE);
        trader.register_notif_tx(notif_tx).await.unwrap();

        let record = trader.query_record().await.unwrap();
        assert_eq!(record.state(), State::DepositTxReceived);

        deposit_listener
            .send(ChainEvent {
                kind: ListenerKind::DepositTx,
                tx: SomeTestTradeParams::deposit_tx(),
                confirmations: 3,
            })
            .await
            .unwrap();
        expect_state(&mut notif_rx, State::DepositTxConfirmed).await;

        harness.manager.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_restart_with_fee_published_rearms_without_broadcast() {
        let mut harness = Harness::start(Harness::config()).await;
        let (_trader, _notif_rx, _deposit_listener) =
            harness.drive_to_delayed_payout_signed().await;
        let trade_id = SomeTestTradeParams::some_trade_id();

        let mut harness = harness.restart().await;
        let trader = harness.trader(trade_id).await;
        let (notif_tx, mut notif_rx) = mpsc::channel(TESTING_DEFAULT_CHANNEL_SIZE);
        trader.register_notif_tx(notif_tx).await.unwrap();

        let record = trader.query_record().await.unwrap();
        assert_eq!(record.phase(), Phase::TakerFeePublished);
        assert_eq!(record.state(), State::DelayedPayoutSigned);

        let wallet_events = harness.drain_wallet_events();
        assert!(!wallet_events
            .iter()
            .any(|event| matches!(event, WalletEvent::Broadcast(_))));
        let deposit_listener = wallet_events
            .into_iter()
            .find_map(|event| match event {
                WalletEvent::Watching {
                    kind: ListenerKind::DepositTx,
                    notif_tx,
                    ..
                } => Some(notif_tx),
                _ => None,
            })
            .expect("Deposit tx listener not re-armed");

        deposit_listener
            .send(ChainEvent {
                kind: ListenerKind::DepositTx,
                tx: SomeTestTradeParams::deposit_tx(),
                confirmations: 0,
            })
            .await
            .unwrap();
        expect_state(&mut notif_rx, State::DepositTxSeenInNetwork).await;

        harness.manager.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_restart_stops_resending_at_max_resends() {
        let mut config = Harness::config();
        config.max_resends = 1;
        let mut harness = Harness::start(config).await;
        let (trader, mut notif_rx) = harness.drive_to_deposit_confirmed().await;
        let trade_id = SomeTestTradeParams::some_trade_id();

        harness.peer.set_mode(PeerMode::Offline);
        trader.fiat_payment_started().await.unwrap();
        expect_state(&mut notif_rx, State::FiatStartedMsgStoredInMailbox).await;
        harness
            .expect_sent(MessageKind::FiatPaymentStarted)
            .await;

        // First restart uses up the only resend
        let mut harness = harness.restart().await;
        harness
            .expect_sent(MessageKind::FiatPaymentStarted)
            .await;
        let record = harness.trader(trade_id).await.query_record().await.unwrap();
        assert_eq!(record.last_outbound.unwrap().resend_count, 1);

        let mut harness = harness.restart().await;
        let record = harness.trader(trade_id).await.query_record().await.unwrap();
        assert_eq!(record.state(), State::FiatStartedMsgStoredInMailbox);
        assert_eq!(record.last_outbound.unwrap().resend_count, 1);
        assert!(!fiat_payment_started_resent(&harness.drain_peer_events()));

        harness.manager.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_restart_resends_stored_fiat_payment_started() {
        let mut harness = Harness::start(Harness::config()).await;
        let (trader, mut notif_rx) = harness.drive_to_deposit_confirmed().await;
        let trade_id = SomeTestTradeParams::some_trade_id();

        harness.peer.set_mode(PeerMode::Offline);
        trader.fiat_payment_started().await.unwrap();
        expect_state(&mut notif_rx, State::FiatStartedMsgStoredInMailbox).await;
        let (_, stored, _) = harness
            .expect_sent(MessageKind::FiatPaymentStarted)
            .await;

        harness.peer.set_mode(PeerMode::Online);
        let mut harness = harness.restart().await;
        let (_, resent, _) = harness
            .expect_sent(MessageKind::FiatPaymentStarted)
            .await;
        assert_eq!(resent.uid(), stored.uid());
        harness.expect_watching(ListenerKind::PayoutTx).await;

        let trader = harness.trader(trade_id).await;
        let record = trader.query_record().await.unwrap();
        assert_eq!(record.state(), State::FiatStartedMsgArrived);
        assert_eq!(record.last_outbound.unwrap().resend_count, 1);

        // Restoring never publishes anything
        assert!(!harness
            .drain_wallet_events()
            .iter()
            .any(|event| matches!(event, WalletEvent::Broadcast(_))));

        harness.manager.shutdown().await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_resend_backs_off_until_max_resends() {
        let mut config = Harness::config();
        config.resend_delay = Duration::from_secs(10);
        config.max_resends = 2;
        let mut harness = Harness::start(config).await;
        let (trader, mut notif_rx) = harness.drive_to_deposit_confirmed().await;

        harness.peer.set_mode(PeerMode::Offline);
        trader.fiat_payment_started().await.unwrap();
        expect_state(&mut notif_rx, State::FiatStartedMsgStoredInMailbox).await;
        let (_, stored, _) = harness
            .expect_sent(MessageKind::FiatPaymentStarted)
            .await;

        let start = Instant::now();
        let (_, first, _) = harness
            .expect_sent(MessageKind::FiatPaymentStarted)
            .await;
        assert_eq!(first.uid(), stored.uid());
        assert!(start.elapsed() >= Duration::from_secs(10));

        let start = Instant::now();
        let (_, second, _) = harness
            .expect_sent(MessageKind::FiatPaymentStarted)
            .await;
        assert_eq!(second.uid(), stored.uid());
        assert!(start.elapsed() >= Duration::from_secs(20));

        sleep(Duration::from_secs(3600)).await;
        assert!(!fiat_payment_started_resent(&harness.drain_peer_events()));
        let record = trader.query_record().await.unwrap();
        assert_eq!(record.last_outbound.unwrap().resend_count, 2);

        harness.manager.shutdown().await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_ack_stops_resend() {
        let mut config = Harness::config();
        config.resend_delay = Duration::from_secs(10);
        let mut harness = Harness::start(config).await;
        let (trader, mut notif_rx) = harness.drive_to_deposit_confirmed().await;

        harness.peer.set_mode(PeerMode::Offline);
        trader.fiat_payment_started().await.unwrap();
        let (_, stored, _) = harness
            .expect_sent(MessageKind::FiatPaymentStarted)
            .await;

        harness.peer.set_mode(PeerMode::Online);
        let ack = TradeMessage::Ack(Ack::for_message(&stored, true, None));
        harness.from_maker_mailbox(ack).await;
        expect_state(&mut notif_rx, State::FiatStartedMsgAcked).await;

        sleep(Duration::from_secs(3600)).await;
        assert!(!fiat_payment_started_resent(&harness.drain_peer_events()));

        harness.manager.shutdown().await.unwrap();
    }
}
