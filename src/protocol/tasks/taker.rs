use tracing::{debug, info};
use uuid::Uuid;

use crate::{
    common::{error::EscrowError, types::TxId},
    peer_msg::{DepositInputsRequest, SignedDepositTx, TradeMessage},
    protocol::TaskContext,
    services::{ListenerKind, SendOutcome},
    trade::{Contract, Phase, SignedContract, State, TradeArtifacts},
};

pub(super) async fn create_fee_tx(ctx: &mut TaskContext) -> Result<(), EscrowError> {
    if ctx.trade.artifacts.taker_fee_tx.is_some() {
        debug!(
            "Trade w/ TradeUUID {} already has a taker fee tx",
            ctx.trade.trade_id
        );
        return Ok(());
    }
    let fee_tx = ctx
        .services
        .wallet
        .create_taker_fee_tx(ctx.trade.trade_id, ctx.trade.offer.taker_fee_sats)
        .await?;
    TradeArtifacts::write_once(&mut ctx.trade.artifacts.taker_fee_tx, fee_tx, "taker_fee_tx")?;
    Ok(())
}

pub(super) async fn create_deposit_inputs(ctx: &mut TaskContext) -> Result<(), EscrowError> {
    if ctx.trade.artifacts.deposit_inputs.is_some() {
        return Ok(());
    }
    // Buyer funds its own security deposit, the seller funds the trade amount
    let amount_sats = ctx.trade.offer.security_deposit_sats;
    let inputs = ctx
        .services
        .wallet
        .create_deposit_tx_inputs(ctx.trade.trade_id, amount_sats)
        .await?;
    TradeArtifacts::write_once(
        &mut ctx.trade.artifacts.deposit_inputs,
        inputs,
        "deposit_inputs",
    )?;
    Ok(())
}

pub(super) async fn send_deposit_inputs_request(ctx: &mut TaskContext) -> Result<(), EscrowError> {
    let fee_tx = ctx
        .trade
        .artifacts
        .taker_fee_tx
        .clone()
        .ok_or_else(|| ctx.missing("taker fee tx"))?;
    let taker_inputs = ctx
        .trade
        .artifacts
        .deposit_inputs
        .clone()
        .ok_or_else(|| ctx.missing("deposit inputs"))?;

    let message = TradeMessage::DepositInputsRequest(DepositInputsRequest {
        trade_id: ctx.trade.trade_id,
        uid: Uuid::new_v4(),
        offer_id: ctx.trade.offer.offer_id,
        btc_amount_sats: ctx.trade.offer.btc_amount_sats,
        taker_fee_txid: fee_tx.txid,
        taker_inputs,
    });
    send_direct(ctx, message).await?;
    ctx.process.stage_state(State::DepositInputsRequested);
    Ok(())
}

pub(super) fn process_deposit_inputs_response(ctx: &mut TaskContext) -> Result<(), EscrowError> {
    let Some(TradeMessage::DepositInputsResponse(response)) = ctx.process.message().cloned()
    else {
        return Err(ctx.unexpected_stimulus("a deposit inputs response"));
    };
    let taker_inputs = ctx
        .trade
        .artifacts
        .deposit_inputs
        .as_ref()
        .ok_or_else(|| ctx.missing("deposit inputs"))?;

    if response.maker_inputs.inputs.is_empty() {
        return Err(EscrowError::Simple(
            "Maker did not contribute any deposit inputs".to_string(),
        ));
    }
    let prepared = &response.prepared_deposit_tx;
    let spends_all = taker_inputs
        .inputs
        .iter()
        .chain(response.maker_inputs.inputs.iter())
        .all(|input| prepared.inputs.contains(input));
    if !spends_all {
        return Err(EscrowError::Simple(format!(
            "Prepared deposit tx {} does not spend the inputs of both peers",
            prepared.txid
        )));
    }
    if response.lock_time == 0 {
        return Err(EscrowError::Simple(
            "Deposit inputs response carries no lock time".to_string(),
        ));
    }

    TradeArtifacts::write_once(
        &mut ctx.trade.artifacts.lock_time,
        response.lock_time,
        "lock_time",
    )?;
    ctx.process.maker_inputs = Some(response.maker_inputs);
    ctx.process.prepared_deposit_tx = Some(response.prepared_deposit_tx);
    ctx.process.maker_contract_signature = Some(response.maker_contract_signature);
    Ok(())
}

pub(super) async fn sign_contract(ctx: &mut TaskContext) -> Result<(), EscrowError> {
    let artifacts = &ctx.trade.artifacts;
    let taker_fee_txid = artifacts
        .taker_fee_tx
        .as_ref()
        .map(|tx| tx.txid.clone())
        .ok_or_else(|| ctx.missing("taker fee tx"))?;
    let taker_payout_address = artifacts
        .deposit_inputs
        .as_ref()
        .map(|inputs| inputs.payout_address.clone())
        .ok_or_else(|| ctx.missing("deposit inputs"))?;
    let lock_time = artifacts.lock_time.ok_or_else(|| ctx.missing("lock time"))?;
    let maker_inputs = ctx
        .process
        .maker_inputs
        .as_ref()
        .ok_or_else(|| ctx.missing("maker inputs"))?;
    let maker_signature = ctx
        .process
        .maker_contract_signature
        .clone()
        .ok_or_else(|| ctx.missing("maker contract signature"))?;

    let offer = &ctx.trade.offer;
    let contract = Contract {
        trade_id: ctx.trade.trade_id,
        offer_id: offer.offer_id,
        btc_amount_sats: offer.btc_amount_sats,
        fiat_amount: offer.fiat_amount,
        currency_code: offer.currency.code().to_string(),
        maker_address: ctx.trade.counterparty.address.clone(),
        maker_pubkey: ctx.trade.counterparty.pubkey,
        maker_fee_txid: offer.maker_fee_txid.clone(),
        taker_fee_txid,
        maker_payout_address: maker_inputs.payout_address.clone(),
        taker_payout_address,
        lock_time,
    };

    if let Some(signed) = &ctx.trade.artifacts.contract {
        if signed.contract == contract {
            debug!(
                "Trade w/ TradeUUID {} contract already signed",
                ctx.trade.trade_id
            );
            return Ok(());
        }
    }

    contract.verify_signature(&maker_signature, &ctx.trade.counterparty.pubkey)?;
    let contract_hash = contract.hash()?;
    let taker_signature = ctx
        .services
        .wallet
        .sign_contract(ctx.trade.trade_id, contract_hash)
        .await?;

    let signed = SignedContract {
        contract,
        contract_hash: contract_hash.to_vec(),
        maker_signature,
        taker_signature,
    };
    TradeArtifacts::write_once(&mut ctx.trade.artifacts.contract, signed, "contract")?;
    Ok(())
}

/// Broadcasts the taker fee once. Retries of the chain find the published
/// txid on the record and skip the broadcast.
pub(super) async fn publish_fee_tx(ctx: &mut TaskContext) -> Result<(), EscrowError> {
    let fee_tx = ctx
        .trade
        .artifacts
        .taker_fee_tx
        .clone()
        .ok_or_else(|| ctx.missing("taker fee tx"))?;

    if ctx.trade.artifacts.taker_fee_published.is_some() {
        debug!(
            "Trade w/ TradeUUID {} taker fee tx {} already published",
            ctx.trade.trade_id, fee_tx.txid
        );
        return Ok(());
    }

    let txid = ctx.services.wallet.broadcast(fee_tx.clone()).await?;
    if txid != fee_tx.txid {
        return Err(EscrowError::Simple(format!(
            "Broadcast returned txid {} for taker fee tx {}",
            txid, fee_tx.txid
        )));
    }
    info!(
        "Trade w/ TradeUUID {} published taker fee tx {}",
        ctx.trade.trade_id, txid
    );
    TradeArtifacts::write_once(
        &mut ctx.trade.artifacts.taker_fee_published,
        txid,
        "taker_fee_published",
    )?;
    ctx.process.stage_state(State::FeeTxPublished);
    Ok(())
}

pub(super) async fn sign_deposit_tx(ctx: &mut TaskContext) -> Result<(), EscrowError> {
    if ctx.trade.artifacts.deposit_tx.is_some() {
        return Ok(());
    }
    let prepared = ctx
        .process
        .prepared_deposit_tx
        .clone()
        .ok_or_else(|| ctx.missing("prepared deposit tx"))?;
    let signed = ctx
        .services
        .wallet
        .co_sign(ctx.trade.trade_id, prepared, None)
        .await?;
    TradeArtifacts::write_once(&mut ctx.trade.artifacts.deposit_tx, signed.tx, "deposit_tx")?;
    Ok(())
}

pub(super) async fn watch_deposit_tx(ctx: &mut TaskContext) -> Result<(), EscrowError> {
    if ctx.trade.phase() >= Phase::DepositConfirmed {
        return Ok(());
    }
    let txid = ctx
        .trade
        .artifacts
        .deposit_tx
        .as_ref()
        .map(|tx| tx.txid.clone())
        .ok_or_else(|| ctx.missing("deposit tx"))?;
    watch_confirmations(ctx, ListenerKind::DepositTx, txid).await
}

pub(super) async fn send_deposit_tx(ctx: &mut TaskContext) -> Result<(), EscrowError> {
    let deposit_tx = ctx
        .trade
        .artifacts
        .deposit_tx
        .clone()
        .ok_or_else(|| ctx.missing("deposit tx"))?;
    let message = TradeMessage::SignedDepositTx(SignedDepositTx {
        trade_id: ctx.trade.trade_id,
        uid: Uuid::new_v4(),
        deposit_tx,
    });
    send_direct(ctx, message).await?;
    ctx.process.stage_state(State::SignedDepositTxSent);
    Ok(())
}

/// Arms a confirmation listener unless this trader already armed one of the
/// same kind since it started.
pub(super) async fn watch_confirmations(
    ctx: &mut TaskContext,
    kind: ListenerKind,
    txid: TxId,
) -> Result<(), EscrowError> {
    if ctx.watching.contains(&kind) {
        debug!(
            "Trade w/ TradeUUID {} already watching {} {}",
            ctx.trade.trade_id, kind, txid
        );
        return Ok(());
    }
    ctx.services
        .wallet
        .watch_confirmations(ctx.trade.trade_id, kind, txid, ctx.chain_tx.clone())
        .await?;
    ctx.watching.insert(kind);
    Ok(())
}

/// Sends a message that needs the peer online. Storing it in the mailbox
/// counts as failure.
pub(super) async fn send_direct(
    ctx: &mut TaskContext,
    message: TradeMessage,
) -> Result<(), EscrowError> {
    let kind = message.kind();
    let outcome = ctx
        .services
        .peer
        .send_message(ctx.peer_address(), ctx.trade.counterparty.pubkey, message)
        .await?;
    match outcome {
        SendOutcome::Arrived => {
            debug!(
                "Trade w/ TradeUUID {} {} arrived at peer",
                ctx.trade.trade_id, kind
            );
            Ok(())
        }
        SendOutcome::StoredInMailbox => Err(EscrowError::Simple(format!(
            "{} could not be delivered directly, peer offline",
            kind
        ))),
    }
}
