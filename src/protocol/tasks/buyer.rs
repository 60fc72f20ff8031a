use tracing::{debug, info, warn};
use uuid::Uuid;

use super::taker::{send_direct, watch_confirmations};
use crate::{
    common::{
        error::EscrowError,
        types::{PayoutSignature, Transaction},
    },
    peer_msg::{DelayedPayoutSignatureResponse, FiatPaymentStarted, TradeMessage},
    protocol::TaskContext,
    services::{ListenerKind, SendOutcome},
    trade::{OutboundMessage, State, TradeArtifacts},
};

// Delayed payout

pub(super) fn process_delayed_payout_request(ctx: &mut TaskContext) -> Result<(), EscrowError> {
    let Some(TradeMessage::DelayedPayoutSignatureRequest(request)) =
        ctx.process.message().cloned()
    else {
        return Err(ctx.unexpected_stimulus("a delayed payout signature request"));
    };
    if request.seller_signature.is_empty() {
        return Err(EscrowError::Simple(
            "Delayed payout signature request is not signed by the seller".to_string(),
        ));
    }
    ctx.process.prepared_delayed_payout_tx = Some(request.delayed_payout_tx);
    ctx.process.seller_delayed_payout_signature = Some(request.seller_signature);
    Ok(())
}

pub(super) fn verify_prepared_delayed_payout(ctx: &mut TaskContext) -> Result<(), EscrowError> {
    let delayed_payout_tx = ctx
        .process
        .prepared_delayed_payout_tx
        .as_ref()
        .ok_or_else(|| ctx.missing("prepared delayed payout tx"))?;
    verify_delayed_payout(ctx, delayed_payout_tx)
}

pub(super) async fn sign_delayed_payout(ctx: &mut TaskContext) -> Result<(), EscrowError> {
    let delayed_payout_tx = ctx
        .process
        .prepared_delayed_payout_tx
        .clone()
        .ok_or_else(|| ctx.missing("prepared delayed payout tx"))?;
    let seller_signature = ctx.process.seller_delayed_payout_signature.clone();
    let signed = ctx
        .services
        .wallet
        .co_sign(ctx.trade.trade_id, delayed_payout_tx, seller_signature)
        .await?;
    ctx.process.buyer_delayed_payout_signature = Some(signed.signature);
    Ok(())
}

pub(super) async fn send_delayed_payout_signature(
    ctx: &mut TaskContext,
) -> Result<(), EscrowError> {
    let buyer_signature = ctx
        .process
        .buyer_delayed_payout_signature
        .clone()
        .ok_or_else(|| ctx.missing("delayed payout signature"))?;
    let message = TradeMessage::DelayedPayoutSignatureResponse(DelayedPayoutSignatureResponse {
        trade_id: ctx.trade.trade_id,
        uid: Uuid::new_v4(),
        buyer_signature,
    });
    send_direct(ctx, message).await?;
    ctx.process.stage_state(State::DelayedPayoutSigned);
    Ok(())
}

// Deposit

pub(super) fn process_deposit_and_delayed_payout(
    ctx: &mut TaskContext,
) -> Result<(), EscrowError> {
    let Some(TradeMessage::DepositAndDelayedPayout(message)) = ctx.process.message().cloned()
    else {
        return Err(ctx.unexpected_stimulus("the published deposit tx"));
    };

    // The seller's copy is fully signed and replaces nothing but must be the
    // same transaction we co-signed
    match &ctx.trade.artifacts.deposit_tx {
        Some(deposit_tx) if deposit_tx.txid != message.deposit_tx.txid => {
            return Err(EscrowError::Simple(format!(
                "Published deposit tx {} does not match co-signed deposit tx {}",
                message.deposit_tx.txid, deposit_tx.txid
            )));
        }
        Some(_) => {}
        None => {
            ctx.trade.artifacts.deposit_tx = Some(message.deposit_tx);
        }
    }
    TradeArtifacts::write_once(
        &mut ctx.trade.artifacts.delayed_payout_tx,
        message.delayed_payout_tx,
        "delayed_payout_tx",
    )?;
    ctx.process.stage_state(State::DepositTxReceived);
    Ok(())
}

pub(super) fn verify_final_delayed_payout(ctx: &mut TaskContext) -> Result<(), EscrowError> {
    let delayed_payout_tx = ctx
        .trade
        .artifacts
        .delayed_payout_tx
        .as_ref()
        .ok_or_else(|| ctx.missing("delayed payout tx"))?;
    verify_delayed_payout(ctx, delayed_payout_tx)
}

pub(super) fn process_deposit_confidence(ctx: &mut TaskContext) -> Result<(), EscrowError> {
    let Some(event) = ctx.process.chain_event().cloned() else {
        return Err(ctx.unexpected_stimulus("a deposit tx confidence update"));
    };
    let deposit_txid = ctx
        .trade
        .artifacts
        .deposit_tx
        .as_ref()
        .map(|tx| tx.txid.clone())
        .ok_or_else(|| ctx.missing("deposit tx"))?;
    if event.tx.txid != deposit_txid {
        return Err(EscrowError::Simple(format!(
            "Confidence update for {} while watching deposit tx {}",
            event.tx.txid, deposit_txid
        )));
    }

    if event.confirmations == 0 {
        debug!(
            "Trade w/ TradeUUID {} deposit tx {} seen in network",
            ctx.trade.trade_id, deposit_txid
        );
        ctx.process.stage_state(State::DepositTxSeenInNetwork);
    } else {
        info!(
            "Trade w/ TradeUUID {} deposit tx {} confirmed with {} confirmations",
            ctx.trade.trade_id, deposit_txid, event.confirmations
        );
        ctx.process.stage_state(State::DepositTxConfirmed);
    }
    Ok(())
}

// Fiat payment

pub(super) fn mark_fiat_payment_started(ctx: &mut TaskContext) -> Result<(), EscrowError> {
    ctx.process.stage_state(State::FiatPaymentConfirmedByUser);
    Ok(())
}

pub(super) async fn sign_payout_tx(ctx: &mut TaskContext) -> Result<(), EscrowError> {
    if ctx.trade.artifacts.payout_signature.is_some() {
        return Ok(());
    }
    let deposit_tx = ctx
        .trade
        .artifacts
        .deposit_tx
        .clone()
        .ok_or_else(|| ctx.missing("deposit tx"))?;
    let contract = ctx
        .trade
        .artifacts
        .contract
        .as_ref()
        .map(|signed| &signed.contract)
        .ok_or_else(|| ctx.missing("contract"))?;

    let buyer_payout_sats = ctx.trade.offer.buyer_payout_sats()?;
    let seller_payout_sats = ctx.trade.offer.security_deposit_sats;
    let signed = ctx
        .services
        .wallet
        .sign_payout_tx(
            ctx.trade.trade_id,
            deposit_tx,
            buyer_payout_sats,
            seller_payout_sats,
            contract.taker_payout_address.clone(),
            contract.maker_payout_address.clone(),
        )
        .await?;

    let payout_signature = PayoutSignature {
        payout_txid: signed.tx.txid,
        signature: signed.signature,
    };
    TradeArtifacts::write_once(
        &mut ctx.trade.artifacts.payout_signature,
        payout_signature,
        "payout_signature",
    )?;
    Ok(())
}

pub(super) async fn watch_payout_tx(ctx: &mut TaskContext) -> Result<(), EscrowError> {
    if ctx.trade.is_payout_published() {
        return Ok(());
    }
    let txid = ctx
        .trade
        .artifacts
        .payout_signature
        .as_ref()
        .map(|signature| signature.payout_txid.clone())
        .ok_or_else(|| ctx.missing("payout signature"))?;
    watch_confirmations(ctx, ListenerKind::PayoutTx, txid).await
}

/// Sends the fiat-started notice, or resends the stored one with its original
/// uid. A send failure is recorded in the state and left to the resend timer.
pub(super) async fn send_fiat_payment_started(ctx: &mut TaskContext) -> Result<(), EscrowError> {
    let outbound = match ctx.trade.last_outbound.take() {
        Some(mut outbound)
            if matches!(outbound.message, TradeMessage::FiatPaymentStarted(_)) =>
        {
            outbound.resend_count += 1;
            info!(
                "Trade w/ TradeUUID {} resending fiat payment started notice, attempt {}",
                ctx.trade.trade_id, outbound.resend_count
            );
            outbound
        }
        previous => {
            ctx.trade.last_outbound = previous;
            OutboundMessage {
                message: fiat_payment_started_message(ctx)?,
                acked: false,
                resend_count: 0,
            }
        }
    };
    let message = outbound.message.clone();
    ctx.trade.last_outbound = Some(outbound);

    let result = ctx
        .services
        .peer
        .send_message(ctx.peer_address(), ctx.trade.counterparty.pubkey, message)
        .await;
    let state = match result {
        Ok(SendOutcome::Arrived) => State::FiatStartedMsgArrived,
        Ok(SendOutcome::StoredInMailbox) => State::FiatStartedMsgStoredInMailbox,
        Err(error) => {
            warn!(
                "Trade w/ TradeUUID {} failed to send fiat payment started notice - {}",
                ctx.trade.trade_id, error
            );
            State::FiatStartedMsgSendFailed
        }
    };
    ctx.process.stage_state(state);
    Ok(())
}

fn fiat_payment_started_message(ctx: &TaskContext) -> Result<TradeMessage, EscrowError> {
    let payout_signature = ctx
        .trade
        .artifacts
        .payout_signature
        .clone()
        .ok_or_else(|| ctx.missing("payout signature"))?;
    let buyer_payout_address = ctx
        .trade
        .artifacts
        .deposit_inputs
        .as_ref()
        .map(|inputs| inputs.payout_address.clone())
        .ok_or_else(|| ctx.missing("deposit inputs"))?;
    Ok(TradeMessage::FiatPaymentStarted(FiatPaymentStarted {
        trade_id: ctx.trade.trade_id,
        uid: Uuid::new_v4(),
        buyer_payout_address,
        buyer_payout_signature: payout_signature.signature,
        payout_txid: payout_signature.payout_txid,
    }))
}

// Payout

pub(super) fn process_payout_published(ctx: &mut TaskContext) -> Result<(), EscrowError> {
    let Some(TradeMessage::PayoutPublished(message)) = ctx.process.message().cloned() else {
        return Err(ctx.unexpected_stimulus("the published payout tx"));
    };
    apply_payout_tx(ctx, message.payout_tx)?;
    ctx.process.stage_state(State::PayoutTxReceived);
    Ok(())
}

pub(super) fn process_payout_confidence(ctx: &mut TaskContext) -> Result<(), EscrowError> {
    let Some(event) = ctx.process.chain_event().cloned() else {
        return Err(ctx.unexpected_stimulus("a payout tx confidence update"));
    };
    apply_payout_tx(ctx, event.tx)?;
    ctx.process.stage_state(State::PayoutTxSeenInNetwork);
    Ok(())
}

fn apply_payout_tx(ctx: &mut TaskContext, payout_tx: Transaction) -> Result<(), EscrowError> {
    let deposit_txid = ctx
        .trade
        .artifacts
        .deposit_tx
        .as_ref()
        .map(|tx| tx.txid.clone())
        .ok_or_else(|| ctx.missing("deposit tx"))?;
    if !payout_tx.inputs.contains(&deposit_txid) {
        return Err(EscrowError::Simple(format!(
            "Payout tx {} does not spend deposit tx {}",
            payout_tx.txid, deposit_txid
        )));
    }
    if let Some(signature) = &ctx.trade.artifacts.payout_signature {
        if signature.payout_txid != payout_tx.txid {
            return Err(EscrowError::Simple(format!(
                "Payout tx {} is not the payout tx {} we signed",
                payout_tx.txid, signature.payout_txid
            )));
        }
    }
    match &ctx.trade.artifacts.payout_tx {
        // Seen both from the peer and from the chain
        Some(existing) if existing.txid == payout_tx.txid => Ok(()),
        _ => TradeArtifacts::write_once(
            &mut ctx.trade.artifacts.payout_tx,
            payout_tx,
            "payout_tx",
        )
        .map(|_| ()),
    }
}

fn verify_delayed_payout(
    ctx: &TaskContext,
    delayed_payout_tx: &Transaction,
) -> Result<(), EscrowError> {
    let deposit_txid = ctx
        .trade
        .artifacts
        .deposit_tx
        .as_ref()
        .map(|tx| tx.txid.as_str())
        .ok_or_else(|| ctx.missing("deposit tx"))?;
    let lock_time = ctx
        .trade
        .artifacts
        .lock_time
        .ok_or_else(|| ctx.missing("lock time"))?;

    if delayed_payout_tx.inputs.len() != 1 || delayed_payout_tx.inputs[0] != deposit_txid {
        return Err(EscrowError::Simple(format!(
            "Delayed payout tx {} must spend deposit tx {} only",
            delayed_payout_tx.txid, deposit_txid
        )));
    }
    if delayed_payout_tx.lock_time != lock_time {
        return Err(EscrowError::Simple(format!(
            "Delayed payout tx {} lock time {} does not match agreed lock time {}",
            delayed_payout_tx.txid, delayed_payout_tx.lock_time, lock_time
        )));
    }
    Ok(())
}
