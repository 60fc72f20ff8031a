use std::{fmt, future::Future};

use tracing::{debug, trace};

use crate::common::error::EscrowError;

/// One step of a protocol chain. Tasks mutate the context they are handed
/// and report failure through the returned `Result`.
pub trait Task<C>: fmt::Debug + Sync {
    fn name(&self) -> &'static str;

    fn run<'a>(
        &'a self,
        ctx: &'a mut C,
    ) -> impl Future<Output = Result<(), EscrowError>> + Send + 'a;
}

/// First failure of a chain. Tasks before `index` have run to completion,
/// tasks after it never ran.
#[derive(Debug)]
pub struct ChainFault {
    pub task: &'static str,
    pub index: usize,
    pub error: EscrowError,
}

impl ChainFault {
    pub fn cause(&self) -> String {
        self.error.to_string()
    }
}

impl fmt::Display for ChainFault {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "task #{} {} failed - {}", self.index, self.task, self.error)
    }
}

impl From<ChainFault> for EscrowError {
    fn from(fault: ChainFault) -> EscrowError {
        EscrowError::TaskFailed {
            task: fault.task,
            cause: fault.error.to_string(),
        }
    }
}

/// Runs `tasks` in order against `ctx`, stopping at the first failure.
/// Nothing a completed task did is undone.
pub async fn run_chain<C, T>(tasks: &[T], ctx: &mut C) -> Result<(), ChainFault>
where
    C: Send,
    T: Task<C>,
{
    for (index, task) in tasks.iter().enumerate() {
        trace!("Running task {} ({}/{})", task.name(), index + 1, tasks.len());
        if let Err(error) = task.run(ctx).await {
            debug!("Chain stopped at task {} - {}", task.name(), error);
            return Err(ChainFault {
                task: task.name(),
                index,
                error,
            });
        }
    }
    Ok(())
}
