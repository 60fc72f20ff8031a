use tracing::warn;

use super::{
    rule::{AlternateAction, TriggerRule},
    stimulus::Stimulus,
};
use crate::{peer_msg::PeerEnvelope, trade::TradeRecord};

/// Outcome of matching one stimulus against a rule table.
#[derive(Debug)]
pub enum Dispatch<'r, T: 'static> {
    Run(&'r TriggerRule<T>),
    ShortCircuit(&'r TriggerRule<T>, AlternateAction),
    NoMatch,
    /// Message from someone other than the registered counterparty.
    Drop,
}

pub fn find_rule<'r, T: 'static>(
    rules: &'r [TriggerRule<T>],
    record: &TradeRecord,
    stimulus: &Stimulus,
) -> Option<&'r TriggerRule<T>> {
    let phase = record.phase();
    let kind = stimulus.kind();
    rules.iter().find(|rule| rule.matches(phase, kind))
}

pub fn from_counterparty(record: &TradeRecord, envelope: &PeerEnvelope) -> bool {
    envelope.sender == record.counterparty.address
        && envelope.pubkey == record.counterparty.pubkey
        && envelope.message.trade_id() == record.trade_id
}

pub fn dispatch<'r, T: 'static>(
    rules: &'r [TriggerRule<T>],
    record: &TradeRecord,
    stimulus: &Stimulus,
) -> Dispatch<'r, T> {
    let rule = find_rule(rules, record, stimulus);

    // Unknown senders never get an answer, matched rule or not
    if let Some(envelope) = stimulus.envelope() {
        let peer_checked = rule.map_or(true, |rule| rule.from_peer);
        if peer_checked && !from_counterparty(record, envelope) {
            warn!(
                "Trade w/ TradeUUID {} dropping {} from unexpected sender {} / {}",
                record.trade_id,
                envelope.message.kind(),
                envelope.sender,
                envelope.pubkey
            );
            return Dispatch::Drop;
        }
    }

    match rule {
        Some(rule) => match rule.short_circuit(record) {
            Some(alternate) => Dispatch::ShortCircuit(rule, alternate),
            None => Dispatch::Run(rule),
        },
        None => Dispatch::NoMatch,
    }
}
