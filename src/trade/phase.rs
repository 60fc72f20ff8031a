use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumString, IntoStaticStr};

/// Coarse milestone of a trade. Ordered, and never decreases on a record.
#[derive(
    Clone,
    Copy,
    Debug,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    IntoStaticStr,
)]
pub enum Phase {
    Init,
    TakerFeePublished,
    DepositPublished,
    DepositConfirmed,
    FiatSent,
    FiatReceived,
    PayoutPublished,
    Withdrawn,
}

/// Fine-grained checkpoint inside a phase. Only consulted to decide what to
/// resume after a restart.
#[derive(
    Clone,
    Copy,
    Debug,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    IntoStaticStr,
)]
pub enum State {
    // Phase::Init
    Preparation,
    DepositInputsRequested,

    // Phase::TakerFeePublished
    FeeTxPublished,
    SignedDepositTxSent,
    DelayedPayoutSigned,

    // Phase::DepositPublished
    DepositTxReceived,
    DepositTxSeenInNetwork,

    // Phase::DepositConfirmed
    DepositTxConfirmed,

    // Phase::FiatSent
    FiatPaymentConfirmedByUser,
    FiatStartedMsgArrived,
    FiatStartedMsgAcked,
    FiatStartedMsgStoredInMailbox,
    FiatStartedMsgSendFailed,

    // Phase::FiatReceived
    FiatPaymentReceiptConfirmed,

    // Phase::PayoutPublished
    PayoutTxReceived,
    PayoutTxSeenInNetwork,

    // Phase::Withdrawn
    WithdrawCompleted,
}

impl State {
    pub fn phase(&self) -> Phase {
        match self {
            State::Preparation | State::DepositInputsRequested => Phase::Init,

            State::FeeTxPublished
            | State::SignedDepositTxSent
            | State::DelayedPayoutSigned => Phase::TakerFeePublished,

            State::DepositTxReceived | State::DepositTxSeenInNetwork => {
                Phase::DepositPublished
            }

            State::DepositTxConfirmed => Phase::DepositConfirmed,

            State::FiatPaymentConfirmedByUser
            | State::FiatStartedMsgArrived
            | State::FiatStartedMsgAcked
            | State::FiatStartedMsgStoredInMailbox
            | State::FiatStartedMsgSendFailed => Phase::FiatSent,

            State::FiatPaymentReceiptConfirmed => Phase::FiatReceived,

            State::PayoutTxReceived | State::PayoutTxSeenInNetwork => {
                Phase::PayoutPublished
            }

            State::WithdrawCompleted => Phase::Withdrawn,
        }
    }
}

#[derive(
    Clone, Copy, Debug, PartialEq, Eq, Default, Serialize, Deserialize, Display, IntoStaticStr,
)]
pub enum DisputeState {
    #[default]
    NoDispute,
    DisputeRequested,
    DisputeStarted,
    DisputeClosed,
    MediationRequested,
    MediationClosed,
}

impl DisputeState {
    pub fn is_disputed(&self) -> bool {
        !matches!(self, DisputeState::NoDispute)
    }
}
