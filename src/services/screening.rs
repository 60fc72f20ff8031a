use crate::trade::TradeRecord;

/// Filter and reputation checks. Pass/fail only, the reason is surfaced as the
/// cause of the failing task.
#[cfg_attr(test, mockall::automock)]
pub trait TradeScreening: Send + Sync {
    fn apply_filter(&self, record: &TradeRecord) -> Result<(), String>;
    fn verify_peers_account_age_witness(&self, record: &TradeRecord) -> Result<(), String>;
}

/// Lets every trade through.
pub struct NoScreening;

impl TradeScreening for NoScreening {
    fn apply_filter(&self, _record: &TradeRecord) -> Result<(), String> {
        Ok(())
    }

    fn verify_peers_account_age_witness(&self, _record: &TradeRecord) -> Result<(), String> {
        Ok(())
    }
}
