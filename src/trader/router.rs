use std::collections::HashMap;

use tokio::sync::mpsc;
use tracing::debug;

use crate::{
    common::{error::EscrowError, types::TradeId},
    peer_msg::PeerEnvelope,
};

/// Routes decrypted peer messages to the trader owning their trade id.
pub(crate) struct Router {
    peer_message_tx_map: HashMap<TradeId, mpsc::Sender<PeerEnvelope>>,
    peer_message_fallback_tx: Option<mpsc::Sender<PeerEnvelope>>,
}

impl Router {
    pub(crate) fn new() -> Self {
        Router {
            peer_message_tx_map: HashMap::new(),
            peer_message_fallback_tx: None,
        }
    }

    pub(crate) fn register_peer_message_tx(
        &mut self,
        trade_id: TradeId,
        tx: mpsc::Sender<PeerEnvelope>,
    ) -> Result<(), EscrowError> {
        debug!("register_peer_message_tx() for {}", trade_id);
        if self.peer_message_tx_map.insert(trade_id, tx).is_some() {
            let error = EscrowError::Simple(format!(
                "register_peer_message_tx() for {} already registered",
                trade_id
            ));
            Err(error)
        } else {
            Ok(())
        }
    }

    pub(crate) fn unregister_peer_message_tx(
        &mut self,
        trade_id: TradeId,
    ) -> Result<(), EscrowError> {
        debug!("unregister_peer_message_tx() for {}", trade_id);
        if self.peer_message_tx_map.remove(&trade_id).is_none() {
            let error = EscrowError::Simple(format!(
                "unregister_peer_message_tx() {} expected to already be registered",
                trade_id
            ));
            Err(error)
        } else {
            Ok(())
        }
    }

    pub(crate) fn register_peer_message_fallback_tx(
        &mut self,
        tx: mpsc::Sender<PeerEnvelope>,
    ) -> Result<(), EscrowError> {
        debug!("register_peer_message_fallback_tx()");

        let mut result = Ok(());
        if self.peer_message_fallback_tx.is_some() {
            let error = EscrowError::Simple(
                "register_peer_message_fallback_tx() already registered".to_string(),
            );
            result = Err(error);
        }
        self.peer_message_fallback_tx = Some(tx);
        result
    }

    pub(crate) fn unregister_peer_message_fallback_tx(&mut self) -> Result<(), EscrowError> {
        debug!("unregister_peer_message_fallback_tx()");

        let mut result = Ok(());
        if self.peer_message_fallback_tx.is_none() {
            let error = EscrowError::Simple(
                "unregister_peer_message_fallback_tx() expected to already be registered"
                    .to_string(),
            );
            result = Err(error);
        }
        self.peer_message_fallback_tx = None;
        result
    }

    pub(crate) async fn handle_peer_message(
        &self,
        envelope: PeerEnvelope,
    ) -> Result<(), EscrowError> {
        let trade_id = envelope.message.trade_id();

        if let Some(tx) = self.peer_message_tx_map.get(&trade_id) {
            tx.send(envelope).await?;
            return Ok(());
        }

        if let Some(tx) = &self.peer_message_fallback_tx {
            tx.send(envelope).await?;
            return Ok(());
        }

        Err(EscrowError::Simple(format!(
            "No channel Tx registered for peer message of TradeUUID {}",
            trade_id
        )))
    }
}
