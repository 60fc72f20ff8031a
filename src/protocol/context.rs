use std::collections::HashSet;

use tokio::sync::mpsc;

use super::stimulus::Stimulus;
use crate::{
    common::{
        error::EscrowError,
        types::{DepositInputs, PeerAddress, Transaction},
    },
    peer_msg::{PeerEnvelope, TradeMessage},
    services::{ChainEvent, ListenerKind, Services},
    trade::{State, TradeRecord},
};

/// Scratch space for a single chain. Dropped once the chain ends.
#[derive(Debug, Default)]
pub struct ProcessContext {
    pub stimulus: Option<Stimulus>,
    pub temp_peer_address: Option<PeerAddress>,
    pub maker_inputs: Option<DepositInputs>,
    pub prepared_deposit_tx: Option<Transaction>,
    pub maker_contract_signature: Option<Vec<u8>>,
    pub prepared_delayed_payout_tx: Option<Transaction>,
    pub seller_delayed_payout_signature: Option<Vec<u8>>,
    pub buyer_delayed_payout_signature: Option<Vec<u8>>,
    staged_state: Option<State>,
}

impl ProcessContext {
    pub fn new(stimulus: Option<Stimulus>) -> Self {
        let temp_peer_address = stimulus
            .as_ref()
            .and_then(Stimulus::envelope)
            .map(|envelope| envelope.sender.clone());
        Self {
            stimulus,
            temp_peer_address,
            ..Default::default()
        }
    }

    pub fn envelope(&self) -> Option<&PeerEnvelope> {
        self.stimulus.as_ref().and_then(Stimulus::envelope)
    }

    pub fn message(&self) -> Option<&TradeMessage> {
        self.envelope().map(|envelope| &envelope.message)
    }

    pub fn chain_event(&self) -> Option<&ChainEvent> {
        match &self.stimulus {
            Some(Stimulus::Chain(event)) => Some(event),
            _ => None,
        }
    }

    /// Later stages overwrite earlier ones. Only committed if the whole chain
    /// succeeds.
    pub fn stage_state(&mut self, state: State) {
        self.staged_state = Some(state);
    }

    pub fn staged_state(&self) -> Option<State> {
        self.staged_state
    }
}

/// Everything a trade task may read or write.
pub struct TaskContext {
    pub trade: TradeRecord,
    pub process: ProcessContext,
    pub services: Services,
    pub chain_tx: mpsc::Sender<ChainEvent>,
    /// Listeners armed by this trader so far. Not persisted, a restarted
    /// trader re-arms.
    pub watching: HashSet<ListenerKind>,
}

impl TaskContext {
    pub fn new(
        trade: TradeRecord,
        stimulus: Option<Stimulus>,
        services: Services,
        chain_tx: mpsc::Sender<ChainEvent>,
    ) -> Self {
        Self {
            trade,
            process: ProcessContext::new(stimulus),
            services,
            chain_tx,
            watching: HashSet::new(),
        }
    }

    /// Address replies go to. Prefers the address the stimulus came from.
    pub fn peer_address(&self) -> PeerAddress {
        self.process
            .temp_peer_address
            .clone()
            .unwrap_or_else(|| self.trade.counterparty.address.clone())
    }

    pub fn unexpected_stimulus(&self, expected: &str) -> EscrowError {
        let received = self
            .process
            .stimulus
            .as_ref()
            .map(|stimulus| stimulus.kind().to_string())
            .unwrap_or_else(|| "startup".to_string());
        EscrowError::Simple(format!(
            "Trade w/ TradeUUID {} expected {} but chain was triggered by {}",
            self.trade.trade_id, expected, received
        ))
    }

    pub fn missing(&self, what: &str) -> EscrowError {
        EscrowError::Simple(format!(
            "Trade w/ TradeUUID {} has no {} yet",
            self.trade.trade_id, what
        ))
    }
}
