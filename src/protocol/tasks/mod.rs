mod buyer;
mod shared;
mod taker;

use std::future::Future;

use serde::{Deserialize, Serialize};
use strum_macros::{Display, IntoStaticStr};

use super::{context::TaskContext, task::Task};
use crate::common::error::EscrowError;

/// Every step a trade protocol can be assembled from.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, Display, IntoStaticStr,
)]
pub enum TradeTask {
    // Checks
    ApplyFilter,
    VerifyPeerAccountAge,
    VerifyMakerFee,

    // Taking the offer
    CreateFeeTx,
    CreateDepositInputs,
    SendDepositInputsRequest,
    ProcessDepositInputsResponse,
    SignContract,
    PublishFeeTx,
    SignDepositTx,
    WatchDepositTx,
    SendDepositTx,

    // Delayed payout and deposit
    ProcessDelayedPayoutRequest,
    VerifyPreparedDelayedPayout,
    SignDelayedPayout,
    SendDelayedPayoutSignature,
    ProcessDepositAndDelayedPayout,
    VerifyFinalDelayedPayout,
    PublishStatistics,
    ProcessDepositConfidence,

    // Fiat payment and payout
    MarkFiatPaymentStarted,
    SignPayoutTx,
    WatchPayoutTx,
    SendFiatPaymentStarted,
    ProcessPayoutPublished,
    ProcessPayoutConfidence,

    ProcessAck,
    CloseTrade,
}

impl Task<TaskContext> for TradeTask {
    fn name(&self) -> &'static str {
        self.into()
    }

    fn run<'a>(
        &'a self,
        ctx: &'a mut TaskContext,
    ) -> impl Future<Output = Result<(), EscrowError>> + Send + 'a {
        async move {
            match self {
                TradeTask::ApplyFilter => shared::apply_filter(ctx),
                TradeTask::VerifyPeerAccountAge => shared::verify_peer_account_age(ctx),
                TradeTask::VerifyMakerFee => shared::verify_maker_fee(ctx).await,

                TradeTask::CreateFeeTx => taker::create_fee_tx(ctx).await,
                TradeTask::CreateDepositInputs => taker::create_deposit_inputs(ctx).await,
                TradeTask::SendDepositInputsRequest => {
                    taker::send_deposit_inputs_request(ctx).await
                }
                TradeTask::ProcessDepositInputsResponse => {
                    taker::process_deposit_inputs_response(ctx)
                }
                TradeTask::SignContract => taker::sign_contract(ctx).await,
                TradeTask::PublishFeeTx => taker::publish_fee_tx(ctx).await,
                TradeTask::SignDepositTx => taker::sign_deposit_tx(ctx).await,
                TradeTask::WatchDepositTx => taker::watch_deposit_tx(ctx).await,
                TradeTask::SendDepositTx => taker::send_deposit_tx(ctx).await,

                TradeTask::ProcessDelayedPayoutRequest => {
                    buyer::process_delayed_payout_request(ctx)
                }
                TradeTask::VerifyPreparedDelayedPayout => {
                    buyer::verify_prepared_delayed_payout(ctx)
                }
                TradeTask::SignDelayedPayout => buyer::sign_delayed_payout(ctx).await,
                TradeTask::SendDelayedPayoutSignature => {
                    buyer::send_delayed_payout_signature(ctx).await
                }
                TradeTask::ProcessDepositAndDelayedPayout => {
                    buyer::process_deposit_and_delayed_payout(ctx)
                }
                TradeTask::VerifyFinalDelayedPayout => buyer::verify_final_delayed_payout(ctx),
                TradeTask::PublishStatistics => shared::publish_statistics(ctx).await,
                TradeTask::ProcessDepositConfidence => buyer::process_deposit_confidence(ctx),

                TradeTask::MarkFiatPaymentStarted => buyer::mark_fiat_payment_started(ctx),
                TradeTask::SignPayoutTx => buyer::sign_payout_tx(ctx).await,
                TradeTask::WatchPayoutTx => buyer::watch_payout_tx(ctx).await,
                TradeTask::SendFiatPaymentStarted => buyer::send_fiat_payment_started(ctx).await,
                TradeTask::ProcessPayoutPublished => buyer::process_payout_published(ctx),
                TradeTask::ProcessPayoutConfidence => buyer::process_payout_confidence(ctx),

                TradeTask::ProcessAck => shared::process_ack(ctx),
                TradeTask::CloseTrade => shared::close_trade(ctx),
            }
        }
    }
}
