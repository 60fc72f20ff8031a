use std::time::SystemTime;

use secp256k1::XOnlyPublicKey;
use serde::{Deserialize, Serialize};
use tracing::warn;

use super::{contract::SignedContract, DisputeState, Phase, State};
use crate::{
    common::{
        error::EscrowError,
        types::{DepositInputs, PayoutSignature, PeerAddress, TradeId, Transaction, TxId},
    },
    offer::Offer,
    peer_msg::TradeMessage,
    protocol::Role,
};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Counterparty {
    pub address: PeerAddress,
    pub pubkey: XOnlyPublicKey,
}

/// Last mailbox-eligible message we sent, kept so it can be resent verbatim
/// until the peer acknowledges it.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct OutboundMessage {
    pub message: TradeMessage,
    pub acked: bool,
    pub resend_count: u32,
}

/// Transaction artifacts accumulated along the trade. Every slot goes from
/// absent to present exactly once.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct TradeArtifacts {
    pub taker_fee_tx: Option<Transaction>,
    // Set once the broadcast went through, even if the rest of its chain failed
    pub taker_fee_published: Option<TxId>,
    pub deposit_inputs: Option<DepositInputs>,
    pub lock_time: Option<u32>,
    pub contract: Option<SignedContract>,
    pub deposit_tx: Option<Transaction>,
    pub delayed_payout_tx: Option<Transaction>,
    pub payout_signature: Option<PayoutSignature>,
    pub payout_tx: Option<Transaction>,
}

impl TradeArtifacts {
    /// Returns `Ok(true)` if the slot was empty and is now set, `Ok(false)` if
    /// the same value was already present.
    pub(crate) fn write_once<T: PartialEq>(
        slot: &mut Option<T>,
        value: T,
        name: &'static str,
    ) -> Result<bool, EscrowError> {
        match slot {
            Some(existing) if *existing == value => Ok(false),
            Some(_) => Err(EscrowError::WriteOnceViolation(name)),
            None => {
                *slot = Some(value);
                Ok(true)
            }
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TradeRecord {
    pub trade_id: TradeId,
    pub role: Role,
    pub offer: Offer,
    pub take_offer_date: SystemTime,
    pub counterparty: Counterparty,
    phase: Phase,
    state: State,
    pub dispute_state: DisputeState,
    pub artifacts: TradeArtifacts,
    pub last_outbound: Option<OutboundMessage>,
    pub error_message: Option<String>,
}

impl TradeRecord {
    pub fn new(trade_id: TradeId, role: Role, offer: Offer) -> Self {
        let counterparty = Counterparty {
            address: offer.maker_address.clone(),
            pubkey: offer.maker_pubkey,
        };
        Self {
            trade_id,
            role,
            offer,
            take_offer_date: SystemTime::now(),
            counterparty,
            phase: Phase::Init,
            state: State::Preparation,
            dispute_state: DisputeState::NoDispute,
            artifacts: TradeArtifacts::default(),
            last_outbound: None,
            error_message: None,
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn state(&self) -> State {
        self.state
    }

    pub fn was_disputed(&self) -> bool {
        self.dispute_state.is_disputed()
    }

    pub fn is_payout_published(&self) -> bool {
        self.phase >= Phase::PayoutPublished
    }

    pub fn is_deposit_and_delayed_payout_applied(&self) -> bool {
        self.artifacts.deposit_tx.is_some() && self.artifacts.delayed_payout_tx.is_some()
    }

    /// Records a new checkpoint. The phase follows the state forward but is
    /// never lowered.
    pub(crate) fn commit_state(&mut self, state: State) -> bool {
        let new_phase = state.phase();
        if new_phase < self.phase {
            warn!(
                "Trade w/ TradeUUID {} committing state {} of earlier phase {} while in phase {}. Phase kept",
                self.trade_id, state, new_phase, self.phase
            );
        } else {
            self.phase = new_phase;
        }
        let changed = self.state != state;
        self.state = state;
        changed
    }
}
