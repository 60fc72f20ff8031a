use std::time::Duration;

use super::{
    rule::{AlternateAction, Guard, PhasePredicate, TriggerRule},
    stimulus::{InternalEvent, StimulusKind, UserAction},
    tasks::TradeTask::{self, *},
    RoleProtocol,
};
use crate::{
    common::config::ProtocolConfig,
    peer_msg::MessageKind,
    services::ListenerKind,
    trade::{Phase, State, TradeRecord},
};

const PEER_REPLY_TIMEOUT: Duration = Duration::from_secs(30);

const DEPOSIT_PHASES: &[Phase] = &[Phase::TakerFeePublished, Phase::DepositPublished];
const PAYOUT_PHASES: &[Phase] = &[Phase::FiatSent, Phase::PayoutPublished];

pub(super) static PROTOCOL: RoleProtocol = RoleProtocol {
    rules: &RULES,
    startup,
};

static RULES: [TriggerRule<TradeTask>; 11] = [
    TriggerRule {
        phases: PhasePredicate::Is(Phase::Init),
        stimulus: StimulusKind::User(UserAction::TakeOffer),
        from_peer: false,
        guard: None,
        deadline: Some(PEER_REPLY_TIMEOUT),
        completes_deadline: false,
        chain: &[
            ApplyFilter,
            VerifyMakerFee,
            CreateFeeTx,
            CreateDepositInputs,
            SendDepositInputsRequest,
        ],
    },
    TriggerRule {
        phases: PhasePredicate::Is(Phase::Init),
        stimulus: StimulusKind::Message(MessageKind::DepositInputsResponse),
        from_peer: true,
        guard: None,
        deadline: Some(PEER_REPLY_TIMEOUT),
        completes_deadline: false,
        chain: &[
            ProcessDepositInputsResponse,
            ApplyFilter,
            VerifyPeerAccountAge,
            SignContract,
            PublishFeeTx,
            SignDepositTx,
            WatchDepositTx,
            SendDepositTx,
        ],
    },
    TriggerRule {
        phases: PhasePredicate::Is(Phase::TakerFeePublished),
        stimulus: StimulusKind::Message(MessageKind::DelayedPayoutSignatureRequest),
        from_peer: true,
        guard: None,
        deadline: Some(PEER_REPLY_TIMEOUT),
        completes_deadline: false,
        chain: &[
            ProcessDelayedPayoutRequest,
            VerifyPreparedDelayedPayout,
            SignDelayedPayout,
            SendDelayedPayoutSignature,
        ],
    },
    // Also sent by mailbox, so it may arrive after the deposit was already seen
    TriggerRule {
        phases: PhasePredicate::AnyOf(DEPOSIT_PHASES),
        stimulus: StimulusKind::Message(MessageKind::DepositAndDelayedPayout),
        from_peer: true,
        guard: Some(Guard {
            skip_if: TradeRecord::is_deposit_and_delayed_payout_applied,
            alternate: AlternateAction::AckAndIgnore,
        }),
        deadline: None,
        completes_deadline: true,
        chain: &[
            ProcessDepositAndDelayedPayout,
            VerifyFinalDelayedPayout,
            PublishStatistics,
        ],
    },
    TriggerRule {
        phases: PhasePredicate::AnyOf(DEPOSIT_PHASES),
        stimulus: StimulusKind::Chain(ListenerKind::DepositTx),
        from_peer: false,
        guard: None,
        deadline: None,
        completes_deadline: false,
        chain: &[ProcessDepositConfidence],
    },
    TriggerRule {
        phases: PhasePredicate::Is(Phase::DepositConfirmed),
        stimulus: StimulusKind::User(UserAction::FiatPaymentStarted),
        from_peer: false,
        guard: Some(Guard {
            skip_if: fiat_payment_not_allowed,
            alternate: AlternateAction::Reject(
                "trade is or was in dispute, or the delayed payout tx is missing",
            ),
        }),
        deadline: None,
        completes_deadline: false,
        chain: &[
            MarkFiatPaymentStarted,
            ApplyFilter,
            VerifyMakerFee,
            SignPayoutTx,
            WatchPayoutTx,
            SendFiatPaymentStarted,
        ],
    },
    TriggerRule {
        phases: PhasePredicate::AnyOf(PAYOUT_PHASES),
        stimulus: StimulusKind::Message(MessageKind::PayoutPublished),
        from_peer: true,
        guard: None,
        deadline: None,
        completes_deadline: false,
        chain: &[ProcessPayoutPublished],
    },
    TriggerRule {
        phases: PhasePredicate::AnyOf(PAYOUT_PHASES),
        stimulus: StimulusKind::Chain(ListenerKind::PayoutTx),
        from_peer: false,
        guard: None,
        deadline: None,
        completes_deadline: false,
        chain: &[ProcessPayoutConfidence],
    },
    TriggerRule {
        phases: PhasePredicate::Is(Phase::FiatSent),
        stimulus: StimulusKind::Internal(InternalEvent::ResendFiatPaymentStarted),
        from_peer: false,
        guard: Some(Guard {
            skip_if: fiat_payment_started_acked,
            alternate: AlternateAction::Ignore,
        }),
        deadline: None,
        completes_deadline: false,
        chain: &[SendFiatPaymentStarted],
    },
    TriggerRule {
        phases: PhasePredicate::Any,
        stimulus: StimulusKind::Message(MessageKind::Ack),
        from_peer: true,
        guard: None,
        deadline: None,
        completes_deadline: false,
        chain: &[ProcessAck],
    },
    TriggerRule {
        phases: PhasePredicate::Is(Phase::PayoutPublished),
        stimulus: StimulusKind::User(UserAction::CompleteTrade),
        from_peer: false,
        guard: None,
        deadline: None,
        completes_deadline: false,
        chain: &[CloseTrade],
    },
];

// Without the delayed payout the buyer has no way back to its deposit
fn fiat_payment_not_allowed(record: &TradeRecord) -> bool {
    record.was_disputed() || record.artifacts.delayed_payout_tx.is_none()
}

fn fiat_payment_started_acked(record: &TradeRecord) -> bool {
    record.state() == State::FiatStartedMsgAcked
        || record
            .last_outbound
            .as_ref()
            .map_or(true, |outbound| outbound.acked)
}

/// Listeners and pending sends to re-arm for a record loaded from disk.
/// Never broadcasts anything.
fn startup(record: &TradeRecord, config: &ProtocolConfig) -> Vec<TradeTask> {
    match record.phase() {
        Phase::TakerFeePublished | Phase::DepositPublished
            if record.artifacts.deposit_tx.is_some() =>
        {
            vec![WatchDepositTx]
        }
        Phase::FiatSent | Phase::FiatReceived => {
            let mut chain = vec![WatchPayoutTx];
            let resends_left = record
                .last_outbound
                .as_ref()
                .map_or(true, |outbound| outbound.resend_count < config.max_resends);
            if resends_left
                && matches!(
                    record.state(),
                    State::FiatStartedMsgStoredInMailbox | State::FiatStartedMsgSendFailed
                )
            {
                chain.push(SendFiatPaymentStarted);
            }
            chain
        }
        _ => Vec::new(),
    }
}
