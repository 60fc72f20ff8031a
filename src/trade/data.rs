use std::{
    path::{Path, PathBuf},
    sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard},
};

use tracing::debug;

use super::{DisputeState, TradeRecord};
use crate::common::{
    error::EscrowError,
    persist::Persister,
    types::{PeerAddress, TradeId},
};

pub(crate) struct TradeData {
    pub(crate) trade_id: TradeId,
    store: Arc<RwLock<TradeRecord>>,
    persister: Persister,
}

impl TradeData {
    pub(crate) fn new(dir_path: impl AsRef<Path>, record: TradeRecord) -> Result<Self, EscrowError> {
        let trade_id = record.trade_id;
        std::fs::create_dir_all(dir_path.as_ref())?;
        let data_path = Self::data_path(&dir_path, trade_id);

        let store = Arc::new(RwLock::new(record));
        let persister = Persister::new(store.clone(), data_path);
        persister.queue();

        Ok(Self {
            trade_id,
            store,
            persister,
        })
    }

    pub(crate) fn restore(data_path: impl AsRef<Path>) -> Result<(TradeId, Self), EscrowError> {
        let json = Persister::restore(&data_path)?;
        debug!(
            "Restored JSON from path: {} - {}",
            data_path.as_ref().display(),
            &json
        );
        let record: TradeRecord = serde_json::from_str(&json)?;
        let trade_id = record.trade_id;

        let store = Arc::new(RwLock::new(record));
        let persister = Persister::new(store.clone(), data_path.as_ref());

        let data = Self {
            trade_id,
            store,
            persister,
        };
        Ok((trade_id, data))
    }

    pub(crate) fn data_path(dir_path: impl AsRef<Path>, trade_id: TradeId) -> PathBuf {
        dir_path.as_ref().join(format!("{}-trade.json", trade_id))
    }

    fn read_store(&self) -> RwLockReadGuard<'_, TradeRecord> {
        match self.store.read() {
            Ok(store) => store,
            Err(error) => {
                panic!("Error reading store - {}", error);
            }
        }
    }

    fn write_store(&self) -> RwLockWriteGuard<'_, TradeRecord> {
        match self.store.write() {
            Ok(store) => store,
            Err(error) => {
                panic!("Error writing store - {}", error);
            }
        }
    }

    // Getter methods

    pub(crate) fn record(&self) -> TradeRecord {
        self.read_store().clone()
    }

    // Setter methods

    /// Stores the working copy a task chain ran against.
    pub(crate) fn store_record(&self, record: TradeRecord) {
        let mut store = self.write_store();
        debug_assert!(record.phase() >= store.phase());
        *store = record;
        self.persister.queue();
    }

    pub(crate) fn set_error_message(&self, error_message: impl Into<String>) {
        self.write_store().error_message = Some(error_message.into());
        self.persister.queue();
    }

    pub(crate) fn set_peer_address(&self, address: PeerAddress) {
        self.write_store().counterparty.address = address;
        self.persister.queue();
    }

    pub(crate) fn set_dispute_state(&self, dispute_state: DisputeState) {
        self.write_store().dispute_state = dispute_state;
        self.persister.queue();
    }

    pub(crate) fn terminate(self) {
        self.persister.queue();
        self.persister.terminate();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        testing::SomeTestTradeParams,
        trade::{Phase, State},
    };

    #[test]
    fn test_restore_persisted_record() {
        let dir = std::env::temp_dir().join(format!("trade-data-test-{}", uuid::Uuid::new_v4()));
        let mut record = SomeTestTradeParams::trade_record();
        let trade_id = record.trade_id;

        let data = TradeData::new(&dir, record.clone()).unwrap();
        record.commit_state(State::FeeTxPublished);
        record.artifacts.taker_fee_tx = Some(SomeTestTradeParams::taker_fee_tx());
        data.store_record(record.clone());
        data.set_error_message("some error");
        data.terminate();

        let (restored_id, restored) =
            TradeData::restore(TradeData::data_path(&dir, trade_id)).unwrap();
        assert_eq!(restored_id, trade_id);
        let restored_record = restored.record();
        assert_eq!(restored_record.phase(), Phase::TakerFeePublished);
        assert_eq!(
            restored_record.artifacts.taker_fee_tx,
            record.artifacts.taker_fee_tx
        );
        assert_eq!(restored_record.error_message, Some("some error".to_string()));
        restored.terminate();
        std::fs::remove_dir_all(&dir).unwrap();
    }
}
