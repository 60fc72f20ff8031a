use std::collections::HashMap;

use secp256k1::XOnlyPublicKey;
use tokio::sync::{mpsc, RwLock};
use tracing::{error, info};

use crate::{
    common::{
        config::ProtocolConfig,
        error::EscrowError,
        types::{PeerAddress, TradeId},
    },
    offer::Offer,
    peer_msg::{Delivery, PeerEnvelope, TradeMessage},
    protocol::Role,
    services::Services,
    trade::TradeRecord,
    trader::{Router, Trader, TraderAccess},
};

/// Owns one trader per trade and routes network input to them.
pub struct Manager {
    config: ProtocolConfig,
    services: Services,
    router: RwLock<Router>,
    traders: RwLock<HashMap<TradeId, Trader>>,
}

impl Manager {
    // Constructors

    /// Restores every trade persisted under the configured data dir.
    pub async fn new(services: Services, config: ProtocolConfig) -> Result<Manager, EscrowError> {
        let manager = Manager {
            config,
            services,
            router: RwLock::new(Router::new()),
            traders: RwLock::new(HashMap::new()),
        };
        manager.restore_trades().await?;
        Ok(manager)
    }

    async fn restore_trades(&self) -> Result<(), EscrowError> {
        let trades_dir = self.config.trades_dir();
        if !trades_dir.exists() {
            return Ok(());
        }

        for entry in std::fs::read_dir(&trades_dir)? {
            let path = entry?.path();
            if !path.is_file() || path.extension().map_or(true, |ext| ext != "json") {
                continue;
            }
            match Trader::restore(self.services.clone(), self.config.clone(), &path) {
                Ok((trade_id, trader)) => {
                    info!("Restored trade w/ TradeUUID {}", trade_id);
                    self.insert_trader(trade_id, trader).await?;
                }
                Err(error) => {
                    error!(
                        "Failed to restore trade from {} - {}",
                        path.display(),
                        error
                    );
                }
            }
        }
        Ok(())
    }

    // Trade Management

    pub async fn new_trade(&self, role: Role, offer: Offer) -> Result<TraderAccess, EscrowError> {
        let trade_id = offer.offer_id;
        if self.traders.read().await.contains_key(&trade_id) {
            return Err(EscrowError::Simple(format!(
                "Trade w/ TradeUUID {} already exists",
                trade_id
            )));
        }

        let record = TradeRecord::new(trade_id, role, offer);
        let trader = Trader::new(self.services.clone(), self.config.clone(), record)?;
        let accessor = trader.new_accessor();
        self.insert_trader(trade_id, trader).await?;
        Ok(accessor)
    }

    /// Creates the trade as buyer and sends the take-offer request.
    pub async fn take_offer(&self, offer: Offer) -> Result<TraderAccess, EscrowError> {
        let accessor = self.new_trade(Role::BuyerAsTaker, offer).await?;
        accessor.take_offer().await?;
        Ok(accessor)
    }

    pub async fn get_traders(&self) -> HashMap<TradeId, TraderAccess> {
        let traders = self.traders.read().await;
        traders
            .iter()
            .map(|(trade_id, trader)| (*trade_id, trader.new_accessor()))
            .collect()
    }

    async fn insert_trader(&self, trade_id: TradeId, trader: Trader) -> Result<(), EscrowError> {
        self.router
            .write()
            .await
            .register_peer_message_tx(trade_id, trader.peer_tx())?;
        self.traders.write().await.insert(trade_id, trader);
        Ok(())
    }

    // Network input

    pub async fn on_decrypted_message(
        &self,
        sender: PeerAddress,
        pubkey: XOnlyPublicKey,
        message: TradeMessage,
    ) -> Result<(), EscrowError> {
        self.route(sender, pubkey, Delivery::Live, message).await
    }

    pub async fn on_mailbox_message(
        &self,
        sender: PeerAddress,
        pubkey: XOnlyPublicKey,
        message: TradeMessage,
    ) -> Result<(), EscrowError> {
        self.route(sender, pubkey, Delivery::Mailbox, message).await
    }

    async fn route(
        &self,
        sender: PeerAddress,
        pubkey: XOnlyPublicKey,
        delivery: Delivery,
        message: TradeMessage,
    ) -> Result<(), EscrowError> {
        let envelope = PeerEnvelope {
            sender,
            pubkey,
            delivery,
            message,
        };
        self.router.read().await.handle_peer_message(envelope).await
    }

    /// Receives messages for trade ids no trader owns.
    pub async fn register_fallback_tx(
        &self,
        tx: mpsc::Sender<PeerEnvelope>,
    ) -> Result<(), EscrowError> {
        self.router
            .write()
            .await
            .register_peer_message_fallback_tx(tx)
    }

    pub async fn unregister_fallback_tx(&self) -> Result<(), EscrowError> {
        self.router
            .write()
            .await
            .unregister_peer_message_fallback_tx()
    }

    pub async fn shutdown(self) -> Result<(), EscrowError> {
        info!("Manager shutting down");
        let traders = self.traders.into_inner();
        let mut router = self.router.into_inner();
        for (trade_id, trader) in traders {
            router.unregister_peer_message_tx(trade_id)?;
            trader.new_accessor().shutdown().await?;
            trader.task_handle.await?;
        }
        Ok(())
    }
}
