use std::{fmt, time::Duration};

use super::stimulus::StimulusKind;
use crate::trade::{Phase, TradeRecord};

#[derive(Clone, Copy, Debug)]
pub enum PhasePredicate {
    Is(Phase),
    AnyOf(&'static [Phase]),
    Any,
}

impl PhasePredicate {
    pub fn accepts(&self, phase: Phase) -> bool {
        match self {
            PhasePredicate::Is(expected) => *expected == phase,
            PhasePredicate::AnyOf(phases) => phases.contains(&phase),
            PhasePredicate::Any => true,
        }
    }
}

/// What happens instead of the chain when a guard short-circuits.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AlternateAction {
    /// Cancel any pending deadline and ack positively.
    AckAndIgnore,
    Ignore,
    Reject(&'static str),
}

#[derive(Clone, Copy)]
pub struct Guard {
    pub skip_if: fn(&TradeRecord) -> bool,
    pub alternate: AlternateAction,
}

impl fmt::Debug for Guard {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("Guard")
            .field("alternate", &self.alternate)
            .finish_non_exhaustive()
    }
}

/// Binds a phase and a stimulus to the chain of tasks it triggers.
#[derive(Debug)]
pub struct TriggerRule<T: 'static> {
    pub phases: PhasePredicate,
    pub stimulus: StimulusKind,
    pub from_peer: bool,
    pub guard: Option<Guard>,
    pub deadline: Option<Duration>,
    pub completes_deadline: bool,
    pub chain: &'static [T],
}

impl<T: 'static> TriggerRule<T> {
    pub fn matches(&self, phase: Phase, stimulus: StimulusKind) -> bool {
        self.stimulus == stimulus && self.phases.accepts(phase)
    }

    pub fn short_circuit(&self, record: &TradeRecord) -> Option<AlternateAction> {
        self.guard
            .filter(|guard| (guard.skip_if)(record))
            .map(|guard| guard.alternate)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{peer_msg::MessageKind, protocol::UserAction, testing::SomeTestTradeParams};

    #[test]
    fn test_phase_predicate() {
        assert!(PhasePredicate::Is(Phase::Init).accepts(Phase::Init));
        assert!(!PhasePredicate::Is(Phase::Init).accepts(Phase::FiatSent));

        let any_of = PhasePredicate::AnyOf(&[Phase::TakerFeePublished, Phase::DepositPublished]);
        assert!(any_of.accepts(Phase::DepositPublished));
        assert!(!any_of.accepts(Phase::DepositConfirmed));

        assert!(PhasePredicate::Any.accepts(Phase::Withdrawn));
    }

    #[test]
    fn test_rule_matches_phase_and_stimulus() {
        let rule: TriggerRule<()> = TriggerRule {
            phases: PhasePredicate::Is(Phase::Init),
            stimulus: StimulusKind::User(UserAction::TakeOffer),
            from_peer: false,
            guard: None,
            deadline: None,
            completes_deadline: false,
            chain: &[],
        };
        assert!(rule.matches(Phase::Init, StimulusKind::User(UserAction::TakeOffer)));
        assert!(!rule.matches(
            Phase::Init,
            StimulusKind::User(UserAction::FiatPaymentStarted)
        ));
        assert!(!rule.matches(
            Phase::TakerFeePublished,
            StimulusKind::User(UserAction::TakeOffer)
        ));
    }

    #[test]
    fn test_guard_short_circuit() {
        let rule: TriggerRule<()> = TriggerRule {
            phases: PhasePredicate::Any,
            stimulus: StimulusKind::Message(MessageKind::DepositAndDelayedPayout),
            from_peer: true,
            guard: Some(Guard {
                skip_if: TradeRecord::is_deposit_and_delayed_payout_applied,
                alternate: AlternateAction::AckAndIgnore,
            }),
            deadline: None,
            completes_deadline: true,
            chain: &[],
        };
        let mut record = SomeTestTradeParams::trade_record();
        assert_eq!(rule.short_circuit(&record), None);

        record.artifacts.deposit_tx = Some(SomeTestTradeParams::deposit_tx());
        record.artifacts.delayed_payout_tx = Some(SomeTestTradeParams::delayed_payout_tx());
        assert_eq!(
            rule.short_circuit(&record),
            Some(AlternateAction::AckAndIgnore)
        );
    }
}
