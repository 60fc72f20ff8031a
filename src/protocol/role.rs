use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumString, IntoStaticStr};

use super::{buyer_as_taker, rule::TriggerRule, tasks::TradeTask};
use crate::{common::config::ProtocolConfig, trade::TradeRecord};

/// Rule table and startup re-arm logic of one side of a trade.
pub struct RoleProtocol {
    pub rules: &'static [TriggerRule<TradeTask>],
    pub startup: fn(&TradeRecord, &ProtocolConfig) -> Vec<TradeTask>,
}

#[derive(
    Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString, IntoStaticStr,
)]
pub enum Role {
    BuyerAsTaker,
}

impl Role {
    pub fn protocol(&self) -> &'static RoleProtocol {
        match self {
            Role::BuyerAsTaker => &buyer_as_taker::PROTOCOL,
        }
    }
}
