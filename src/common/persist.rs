use serde::Serialize;
use std::{
    fs,
    path::{Path, PathBuf},
    sync::{
        mpsc::{self, TrySendError},
        Arc, RwLock,
    },
};
use tracing::{debug, error, trace};

use crate::common::error::EscrowError;

enum PersisterMsg {
    Persist,
    Close,
}

pub(crate) struct Persister {
    persist_tx: mpsc::SyncSender<PersisterMsg>,
    task_handle: std::thread::JoinHandle<()>,
}

impl Persister {
    pub(crate) fn restore(data_path: impl AsRef<Path>) -> Result<String, EscrowError> {
        let json: String = std::fs::read_to_string(data_path.as_ref())?;
        Ok(json)
    }

    pub(crate) fn new<T>(store: Arc<RwLock<T>>, data_path: impl AsRef<Path>) -> Self
    where
        T: Serialize + Send + Sync + 'static,
    {
        let (persist_tx, task_handle) = Self::setup_persistence(store, data_path);

        Self {
            persist_tx,
            task_handle,
        }
    }

    fn setup_persistence<T>(
        store: Arc<RwLock<T>>,
        data_path: impl AsRef<Path>,
    ) -> (mpsc::SyncSender<PersisterMsg>, std::thread::JoinHandle<()>)
    where
        T: Serialize + Send + Sync + 'static,
    {
        let data_path_buf = data_path.as_ref().to_path_buf();

        // No more than 1 persistence request is allowed nor needed. A queued
        // request always reads the latest store when it runs.
        let (persist_tx, persist_rx) = mpsc::sync_channel(1);
        let task_handle = std::thread::spawn(move || {
            let data_path = data_path_buf;
            loop {
                match persist_rx.recv() {
                    Ok(PersisterMsg::Persist) => {
                        let json = match store.read() {
                            Ok(store) => serde_json::to_string(&*store),
                            Err(error) => {
                                error!("Error reading store - {}", error);
                                continue;
                            }
                        };
                        if let Some(error) = json
                            .map_err(EscrowError::from)
                            .and_then(|json| Self::persist(json, &data_path))
                            .err()
                        {
                            error!(
                                "Error persisting data to path {} - {}",
                                data_path.display(),
                                error
                            );
                        }
                    }
                    Ok(PersisterMsg::Close) => {
                        break;
                    }
                    Err(err) => {
                        error!("Persistence channel recv Error - {}", err);
                        break;
                    }
                }
            }
            debug!("Persistence thread for {} exiting", data_path.display());
        });
        (persist_tx, task_handle)
    }

    fn persist(json: String, data_path: &PathBuf) -> Result<(), EscrowError> {
        trace!(
            "Persisting JSON to path: {} - {}",
            data_path.display(),
            json
        );
        // Write then rename so a crash mid-write never leaves a torn record
        let tmp_path = data_path.with_extension("json.tmp");
        fs::write(&tmp_path, json)?;
        fs::rename(&tmp_path, data_path)?;
        Ok(())
    }

    pub(crate) fn queue(&self) {
        match self.persist_tx.try_send(PersisterMsg::Persist) {
            Ok(_) => {}
            Err(error) => match error {
                TrySendError::Full(_) => {
                    trace!("Persistence channel full")
                }
                TrySendError::Disconnected(_) => {
                    error!("Persistence channel disconnected")
                }
            },
        }
    }

    pub(crate) fn terminate(self) {
        if let Some(error) = self.persist_tx.send(PersisterMsg::Close).err() {
            error!("Error closing persistence channel - {}", error);
        }
        if let Some(error) = self.task_handle.join().err() {
            error!("Error terminating persistence thread - {:?}", error);
        }
    }
}
