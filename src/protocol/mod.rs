mod buyer_as_taker;
mod context;
mod dispatcher;
mod role;
mod rule;
mod stimulus;
mod task;
mod tasks;

pub use context::{ProcessContext, TaskContext};
pub use dispatcher::{dispatch, find_rule, from_counterparty, Dispatch};
pub use role::{Role, RoleProtocol};
pub use rule::{AlternateAction, Guard, PhasePredicate, TriggerRule};
pub use stimulus::{InternalEvent, Stimulus, StimulusKind, UserAction};
pub use task::{run_chain, ChainFault, Task};
pub use tasks::TradeTask;
