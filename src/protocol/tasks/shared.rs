use std::time::SystemTime;

use tracing::{debug, info, warn};

use crate::{
    common::error::EscrowError,
    peer_msg::{MessageKind, TradeMessage, TradeStatistics},
    protocol::TaskContext,
    trade::{Phase, State},
};

pub(super) fn apply_filter(ctx: &mut TaskContext) -> Result<(), EscrowError> {
    ctx.services
        .screening
        .apply_filter(&ctx.trade)
        .map_err(|reason| EscrowError::Rejected(format!("Filter - {}", reason)))
}

pub(super) fn verify_peer_account_age(ctx: &mut TaskContext) -> Result<(), EscrowError> {
    ctx.services
        .screening
        .verify_peers_account_age_witness(&ctx.trade)
        .map_err(|reason| EscrowError::Rejected(format!("Account age witness - {}", reason)))
}

pub(super) async fn verify_maker_fee(ctx: &mut TaskContext) -> Result<(), EscrowError> {
    let txid = ctx.trade.offer.maker_fee_txid.clone();
    ctx.services.wallet.verify_fee_payment(txid).await
}

// Statistics are informational. A failed publish is logged and the chain moves on
pub(super) async fn publish_statistics(ctx: &mut TaskContext) -> Result<(), EscrowError> {
    let offer = &ctx.trade.offer;
    let trade_price = match offer.trade_price() {
        Ok(trade_price) => trade_price,
        Err(error) => {
            warn!(
                "Trade w/ TradeUUID {} skipping trade statistics - {}",
                ctx.trade.trade_id, error
            );
            return Ok(());
        }
    };
    let statistics = TradeStatistics {
        offer_id: offer.offer_id,
        currency: offer.currency,
        fiat_amount: offer.fiat_amount,
        btc_amount_sats: offer.btc_amount_sats,
        trade_price,
        payment_method: offer.payment_method.clone(),
        trade_date: ctx.trade.take_offer_date,
    };
    if let Err(error) = ctx.services.peer.publish_trade_statistics(statistics).await {
        warn!(
            "Trade w/ TradeUUID {} failed to publish trade statistics - {}",
            ctx.trade.trade_id, error
        );
    }
    Ok(())
}

pub(super) fn process_ack(ctx: &mut TaskContext) -> Result<(), EscrowError> {
    let Some(TradeMessage::Ack(ack)) = ctx.process.message().cloned() else {
        return Err(ctx.unexpected_stimulus("an ack"));
    };
    let trade_id = ctx.trade.trade_id;

    let Some(outbound) = ctx.trade.last_outbound.as_mut() else {
        debug!(
            "Trade w/ TradeUUID {} received ack for {} {} with nothing outstanding",
            trade_id, ack.source_kind, ack.source_uid
        );
        return Ok(());
    };
    if outbound.message.uid() != ack.source_uid {
        debug!(
            "Trade w/ TradeUUID {} received ack for {} {} which is not the last outbound message",
            trade_id, ack.source_kind, ack.source_uid
        );
        return Ok(());
    }

    if !ack.success {
        let cause = ack
            .error_message
            .unwrap_or_else(|| "no reason given".to_string());
        warn!(
            "Trade w/ TradeUUID {} peer rejected {} - {}",
            trade_id, ack.source_kind, cause
        );
        ctx.trade.error_message = Some(format!("Peer rejected {} - {}", ack.source_kind, cause));
        return Ok(());
    }

    info!(
        "Trade w/ TradeUUID {} peer acknowledged {}",
        trade_id, ack.source_kind
    );
    outbound.acked = true;
    if ack.source_kind == MessageKind::FiatPaymentStarted
        && ctx.trade.phase() == Phase::FiatSent
    {
        ctx.process.stage_state(State::FiatStartedMsgAcked);
    }
    Ok(())
}

pub(super) fn close_trade(ctx: &mut TaskContext) -> Result<(), EscrowError> {
    info!(
        "Trade w/ TradeUUID {} completed at {:?}",
        ctx.trade.trade_id,
        SystemTime::now()
    );
    ctx.process.stage_state(State::WithdrawCompleted);
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use tokio::sync::mpsc;

    use super::*;
    use crate::{
        peer_msg::{Ack, Delivery, PeerEnvelope},
        protocol::Stimulus,
        services::{MockTradeScreening, PeerAccess, Services, TradeScreening, WalletAccess},
        testing::SomeTestTradeParams,
        trade::{OutboundMessage, TradeRecord},
    };

    fn task_context(
        record: TradeRecord,
        stimulus: Option<Stimulus>,
        screening: Arc<dyn TradeScreening>,
    ) -> TaskContext {
        let (peer_tx, _) = mpsc::channel(1);
        let (wallet_tx, _) = mpsc::channel(1);
        let (chain_tx, _) = mpsc::channel(1);
        let services = Services::new(
            PeerAccess::new(peer_tx),
            WalletAccess::new(wallet_tx),
            screening,
        );
        TaskContext::new(record, stimulus, services, chain_tx)
    }

    fn from_maker(message: TradeMessage) -> Option<Stimulus> {
        Some(Stimulus::Message(PeerEnvelope {
            sender: SomeTestTradeParams::maker_address(),
            pubkey: SomeTestTradeParams::maker_pubkey(),
            delivery: Delivery::Mailbox,
            message,
        }))
    }

    fn fiat_sent_record() -> TradeRecord {
        let mut record = SomeTestTradeParams::trade_record();
        record.commit_state(State::FiatStartedMsgStoredInMailbox);
        record.last_outbound = Some(OutboundMessage {
            message: SomeTestTradeParams::fiat_payment_started(),
            acked: false,
            resend_count: 1,
        });
        record
    }

    #[test]
    fn test_filter_failure_is_rejection() {
        let mut screening = MockTradeScreening::new();
        screening
            .expect_apply_filter()
            .times(1)
            .returning(|_| Err("offer id is banned".to_string()));
        let mut ctx = task_context(
            SomeTestTradeParams::trade_record(),
            None,
            Arc::new(screening),
        );

        let result = apply_filter(&mut ctx);
        match result {
            Err(EscrowError::Rejected(reason)) => assert!(reason.contains("offer id is banned")),
            other => panic!("Expected rejection, got {:?}", other),
        }
    }

    #[test]
    fn test_account_age_passes() {
        let mut screening = MockTradeScreening::new();
        screening
            .expect_verify_peers_account_age_witness()
            .times(1)
            .returning(|_| Ok(()));
        let mut ctx = task_context(
            SomeTestTradeParams::trade_record(),
            None,
            Arc::new(screening),
        );
        verify_peer_account_age(&mut ctx).unwrap();
    }

    #[test]
    fn test_ack_for_fiat_payment_started() {
        let mut ctx = task_context(
            fiat_sent_record(),
            from_maker(SomeTestTradeParams::ack_for_fiat_payment_started()),
            Arc::new(MockTradeScreening::new()),
        );
        process_ack(&mut ctx).unwrap();
        assert!(ctx.trade.last_outbound.as_ref().unwrap().acked);
        assert_eq!(ctx.process.staged_state(), Some(State::FiatStartedMsgAcked));
    }

    #[test]
    fn test_nack_records_error_and_stays_unacked() {
        let nack = TradeMessage::Ack(Ack::for_message(
            &SomeTestTradeParams::fiat_payment_started(),
            false,
            Some("payout signature invalid".to_string()),
        ));
        let mut ctx = task_context(
            fiat_sent_record(),
            from_maker(nack),
            Arc::new(MockTradeScreening::new()),
        );
        process_ack(&mut ctx).unwrap();
        assert!(!ctx.trade.last_outbound.as_ref().unwrap().acked);
        assert!(ctx
            .trade
            .error_message
            .as_ref()
            .unwrap()
            .contains("payout signature invalid"));
        assert_eq!(ctx.process.staged_state(), None);
    }

    #[test]
    fn test_ack_for_other_message_ignored() {
        let stale_ack = TradeMessage::Ack(Ack::for_message(
            &SomeTestTradeParams::payout_published(),
            true,
            None,
        ));
        let mut ctx = task_context(
            fiat_sent_record(),
            from_maker(stale_ack),
            Arc::new(MockTradeScreening::new()),
        );
        process_ack(&mut ctx).unwrap();
        assert!(!ctx.trade.last_outbound.as_ref().unwrap().acked);
        assert_eq!(ctx.process.staged_state(), None);
    }
}
