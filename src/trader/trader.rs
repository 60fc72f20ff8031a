use std::{collections::HashSet, future, path::Path, pin::Pin, time::Duration};

use strum_macros::{Display, IntoStaticStr};
use tokio::{
    select,
    sync::{mpsc, oneshot},
    time::{sleep, Sleep},
};
use tracing::{debug, error, info, warn};

use crate::{
    common::{
        config::ProtocolConfig,
        error::EscrowError,
        types::{PeerAddress, TradeId},
    },
    peer_msg::{Ack, Delivery, MessageKind, PeerEnvelope, TradeMessage},
    protocol::{
        dispatch, run_chain, AlternateAction, Dispatch, InternalEvent, RoleProtocol, Stimulus,
        StimulusKind, TaskContext, TradeTask, TriggerRule, UserAction,
    },
    services::{ChainEvent, ListenerKind, Services},
    trade::{DisputeState, Phase, State, TradeData, TradeRecord},
};

/// Pushed to the registered notif channel. Faults arrive as `Err`.
#[derive(Debug)]
pub enum TradeNotif {
    StateChanged { phase: Phase, state: State },
}

#[derive(Clone)]
pub struct TraderAccess {
    tx: mpsc::Sender<TraderRequest>,
}

impl TraderAccess {
    pub(super) fn new(tx: mpsc::Sender<TraderRequest>) -> Self {
        Self { tx }
    }

    pub async fn take_offer(&self) -> Result<(), EscrowError> {
        self.user_action(UserAction::TakeOffer).await
    }

    pub async fn fiat_payment_started(&self) -> Result<(), EscrowError> {
        self.user_action(UserAction::FiatPaymentStarted).await
    }

    pub async fn complete_trade(&self) -> Result<(), EscrowError> {
        self.user_action(UserAction::CompleteTrade).await
    }

    async fn user_action(&self, action: UserAction) -> Result<(), EscrowError> {
        let (rsp_tx, rsp_rx) = oneshot::channel::<Result<(), EscrowError>>();
        let request = TraderRequest::UserAction { action, rsp_tx };
        self.tx.send(request).await?;
        rsp_rx.await?
    }

    pub async fn query_record(&self) -> Result<TradeRecord, EscrowError> {
        let (rsp_tx, rsp_rx) = oneshot::channel::<Result<TradeRecord, EscrowError>>();
        let request = TraderRequest::QueryRecord { rsp_tx };
        self.tx.send(request).await?;
        rsp_rx.await?
    }

    pub async fn update_peer_address(&self, address: PeerAddress) -> Result<(), EscrowError> {
        let (rsp_tx, rsp_rx) = oneshot::channel::<Result<(), EscrowError>>();
        let request = TraderRequest::UpdatePeerAddress { address, rsp_tx };
        self.tx.send(request).await?;
        rsp_rx.await?
    }

    pub async fn set_dispute_state(&self, dispute_state: DisputeState) -> Result<(), EscrowError> {
        let (rsp_tx, rsp_rx) = oneshot::channel::<Result<(), EscrowError>>();
        let request = TraderRequest::SetDisputeState {
            dispute_state,
            rsp_tx,
        };
        self.tx.send(request).await?;
        rsp_rx.await?
    }

    pub async fn register_notif_tx(
        &self,
        tx: mpsc::Sender<Result<TradeNotif, EscrowError>>,
    ) -> Result<(), EscrowError> {
        let (rsp_tx, rsp_rx) = oneshot::channel::<Result<(), EscrowError>>();
        let request = TraderRequest::RegisterNotifTx { tx, rsp_tx };
        self.tx.send(request).await?;
        rsp_rx.await?
    }

    pub async fn unregister_notif_tx(&self) -> Result<(), EscrowError> {
        let (rsp_tx, rsp_rx) = oneshot::channel::<Result<(), EscrowError>>();
        let request = TraderRequest::UnregisterNotifTx { rsp_tx };
        self.tx.send(request).await?;
        rsp_rx.await?
    }

    pub async fn shutdown(&self) -> Result<(), EscrowError> {
        let (rsp_tx, rsp_rx) = oneshot::channel::<Result<(), EscrowError>>();
        let request = TraderRequest::Shutdown { rsp_tx };
        self.tx.send(request).await?; // Shutdown is allowed to fail if already shutdown
        rsp_rx.await?
    }
}

pub(crate) struct Trader {
    tx: mpsc::Sender<TraderRequest>,
    peer_tx: mpsc::Sender<PeerEnvelope>,
    pub(crate) task_handle: tokio::task::JoinHandle<()>,
}

impl Trader {
    pub(crate) fn new(
        services: Services,
        config: ProtocolConfig,
        record: TradeRecord,
    ) -> Result<Self, EscrowError> {
        let data = TradeData::new(config.trades_dir(), record)?;
        Ok(Self::start(services, config, data))
    }

    pub(crate) fn restore(
        services: Services,
        config: ProtocolConfig,
        data_path: impl AsRef<Path>,
    ) -> Result<(TradeId, Self), EscrowError> {
        let (trade_id, data) = TradeData::restore(data_path)?;
        Ok((trade_id, Self::start(services, config, data)))
    }

    fn start(services: Services, config: ProtocolConfig, data: TradeData) -> Self {
        let (tx, rx) = mpsc::channel::<TraderRequest>(config.trader_request_channel_size);
        let (peer_tx, peer_rx) = mpsc::channel::<PeerEnvelope>(config.trader_peer_channel_size);
        let actor = TraderActor::new(rx, peer_rx, services, config, data);
        let task_handle = tokio::spawn(async move { actor.run().await });
        Self {
            tx,
            peer_tx,
            task_handle,
        }
    }

    pub(crate) fn new_accessor(&self) -> TraderAccess {
        TraderAccess::new(self.tx.clone())
    }

    pub(crate) fn peer_tx(&self) -> mpsc::Sender<PeerEnvelope> {
        self.peer_tx.clone()
    }
}

#[derive(Display, IntoStaticStr)]
pub(super) enum TraderRequest {
    UserAction {
        action: UserAction,
        rsp_tx: oneshot::Sender<Result<(), EscrowError>>,
    },
    QueryRecord {
        rsp_tx: oneshot::Sender<Result<TradeRecord, EscrowError>>,
    },
    UpdatePeerAddress {
        address: PeerAddress,
        rsp_tx: oneshot::Sender<Result<(), EscrowError>>,
    },
    SetDisputeState {
        dispute_state: DisputeState,
        rsp_tx: oneshot::Sender<Result<(), EscrowError>>,
    },
    RegisterNotifTx {
        tx: mpsc::Sender<Result<TradeNotif, EscrowError>>,
        rsp_tx: oneshot::Sender<Result<(), EscrowError>>,
    },
    UnregisterNotifTx {
        rsp_tx: oneshot::Sender<Result<(), EscrowError>>,
    },
    Shutdown {
        rsp_tx: oneshot::Sender<Result<(), EscrowError>>,
    },
}

/// How a stimulus ended. Decides the reply, the ack and the notification.
enum Outcome {
    Completed,
    Skipped,
    Rejected(EscrowError),
    Failed(EscrowError),
    Dropped,
}

struct Deadline {
    armed_by: StimulusKind,
    timeout: Duration,
    sleep: Pin<Box<Sleep>>,
}

struct TraderActor {
    rx: mpsc::Receiver<TraderRequest>,
    peer_rx: mpsc::Receiver<PeerEnvelope>,
    chain_tx: mpsc::Sender<ChainEvent>,
    chain_rx: mpsc::Receiver<ChainEvent>,
    services: Services,
    config: ProtocolConfig,
    protocol: &'static RoleProtocol,
    data: TradeData,
    notif_tx: Option<mpsc::Sender<Result<TradeNotif, EscrowError>>>,
    deadline: Option<Deadline>,
    resend: Option<Pin<Box<Sleep>>>,
    watching: HashSet<ListenerKind>,
}

impl TraderActor {
    fn new(
        rx: mpsc::Receiver<TraderRequest>,
        peer_rx: mpsc::Receiver<PeerEnvelope>,
        services: Services,
        config: ProtocolConfig,
        data: TradeData,
    ) -> Self {
        let (chain_tx, chain_rx) = mpsc::channel::<ChainEvent>(config.trader_chain_channel_size);
        let protocol = data.record().role.protocol();
        TraderActor {
            rx,
            peer_rx,
            chain_tx,
            chain_rx,
            services,
            config,
            protocol,
            data,
            notif_tx: None,
            deadline: None,
            resend: None,
            watching: HashSet::new(),
        }
    }

    async fn run(mut self) {
        self.resume().await;

        loop {
            select! {
                Some(request) = self.rx.recv() => {
                    if self.handle_request(request).await {
                        break;
                    }
                },
                Some(envelope) = self.peer_rx.recv() => {
                    self.handle_peer_message(envelope).await;
                },
                Some(event) = self.chain_rx.recv() => {
                    self.handle_chain_event(event).await;
                },
                _ = expire(self.deadline.as_mut().map(|deadline| &mut deadline.sleep)) => {
                    self.handle_deadline_expired().await;
                },
                _ = expire(self.resend.as_mut()) => {
                    self.handle_resend().await;
                },
                else => break,
            }
        }
        info!("Trader w/ TradeUUID {} terminating", self.data.trade_id);
        self.data.terminate();
    }

    // Startup

    async fn resume(&mut self) {
        let record = self.data.record();
        let chain = (self.protocol.startup)(&record, &self.config);
        if !chain.is_empty() {
            info!(
                "Trader w/ TradeUUID {} resuming in phase {} state {} with {:?}",
                self.data.trade_id,
                record.phase(),
                record.state(),
                chain
            );
            if let Err(error) = self.run_tasks(&chain, record, None).await {
                self.notify(Err(error)).await;
            }
        }
        self.update_resend_timer();
    }

    // Top-down Requests Handling

    async fn handle_request(&mut self, request: TraderRequest) -> bool {
        let mut terminate = false;
        debug!(
            "Trader w/ TradeUUID {} handle_request() of type {}",
            self.data.trade_id, request
        );

        match request {
            TraderRequest::UserAction { action, rsp_tx } => {
                let result = self.handle_user_action(action).await;
                self.reply(rsp_tx, result);
            }
            TraderRequest::QueryRecord { rsp_tx } => {
                self.reply(rsp_tx, Ok(self.data.record()));
            }
            TraderRequest::UpdatePeerAddress { address, rsp_tx } => {
                info!(
                    "Trader w/ TradeUUID {} peer address updated to {}",
                    self.data.trade_id, address
                );
                self.data.set_peer_address(address);
                self.reply(rsp_tx, Ok(()));
            }
            TraderRequest::SetDisputeState {
                dispute_state,
                rsp_tx,
            } => {
                self.data.set_dispute_state(dispute_state);
                self.reply(rsp_tx, Ok(()));
            }
            TraderRequest::RegisterNotifTx { tx, rsp_tx } => {
                self.register_notif_tx(tx, rsp_tx);
            }
            TraderRequest::UnregisterNotifTx { rsp_tx } => {
                self.unregister_notif_tx(rsp_tx);
            }
            TraderRequest::Shutdown { rsp_tx } => {
                self.reply(rsp_tx, Ok(()));
                terminate = true;
            }
        }
        terminate
    }

    async fn handle_user_action(&mut self, action: UserAction) -> Result<(), EscrowError> {
        match self.process(Stimulus::User(action)).await {
            Outcome::Completed | Outcome::Skipped => Ok(()),
            Outcome::Rejected(error) | Outcome::Failed(error) => {
                warn!(
                    "Trader w/ TradeUUID {} user action {} failed - {}",
                    self.data.trade_id, action, error
                );
                Err(error)
            }
            Outcome::Dropped => Err(EscrowError::UnexpectedPeer(action.to_string())),
        }
    }

    fn reply<T>(&self, rsp_tx: oneshot::Sender<Result<T, EscrowError>>, result: Result<T, EscrowError>) {
        if rsp_tx.send(result).is_err() {
            warn!(
                "Trader w/ TradeUUID {} requester went away before the reply",
                self.data.trade_id
            );
        }
    }

    fn register_notif_tx(
        &mut self,
        tx: mpsc::Sender<Result<TradeNotif, EscrowError>>,
        rsp_tx: oneshot::Sender<Result<(), EscrowError>>,
    ) {
        let mut result = Ok(());
        if self.notif_tx.is_some() {
            let error = EscrowError::Simple(format!(
                "Trader w/ TradeUUID {} already have notif_tx registered",
                self.data.trade_id
            ));
            result = Err(error);
        }
        self.notif_tx = Some(tx);
        self.reply(rsp_tx, result);
    }

    fn unregister_notif_tx(&mut self, rsp_tx: oneshot::Sender<Result<(), EscrowError>>) {
        let mut result = Ok(());
        if self.notif_tx.is_none() {
            let error = EscrowError::Simple(format!(
                "Trader w/ TradeUUID {} does not have notif_tx registered",
                self.data.trade_id
            ));
            result = Err(error);
        }
        self.notif_tx = None;
        self.reply(rsp_tx, result);
    }

    // Bottom-up Peer Message Handling

    async fn handle_peer_message(&mut self, envelope: PeerEnvelope) {
        debug!(
            "Trader w/ TradeUUID {} handle_peer_message() {} from {} via {}",
            self.data.trade_id,
            envelope.message.kind(),
            envelope.sender,
            envelope.delivery
        );
        let message = envelope.message.clone();
        let delivery = envelope.delivery;

        let outcome = self.process(Stimulus::Message(envelope)).await;
        let nack_cause = match &outcome {
            Outcome::Dropped => return,
            Outcome::Completed | Outcome::Skipped => None,
            Outcome::Rejected(error) | Outcome::Failed(error) => Some(error.to_string()),
        };

        if message.kind() != MessageKind::Ack {
            self.send_ack(&message, nack_cause).await;
        }
        if let Outcome::Failed(error) = outcome {
            self.notify(Err(error)).await;
        }
        if delivery == Delivery::Mailbox {
            if let Err(error) = self
                .services
                .peer
                .remove_mailbox_message(message.uid())
                .await
            {
                warn!(
                    "Trader w/ TradeUUID {} failed to remove {} from mailbox - {}",
                    self.data.trade_id,
                    message.kind(),
                    error
                );
            }
        }
    }

    async fn send_ack(&self, message: &TradeMessage, nack_cause: Option<String>) {
        let success = nack_cause.is_none();
        let ack = TradeMessage::Ack(Ack::for_message(message, success, nack_cause));
        let counterparty = self.data.record().counterparty;
        let result = self
            .services
            .peer
            .send_message(counterparty.address, counterparty.pubkey, ack)
            .await;
        match result {
            Ok(outcome) => debug!(
                "Trader w/ TradeUUID {} acked {} with success {} - {}",
                self.data.trade_id,
                message.kind(),
                success,
                outcome
            ),
            Err(error) => warn!(
                "Trader w/ TradeUUID {} failed to ack {} - {}",
                self.data.trade_id,
                message.kind(),
                error
            ),
        }
    }

    async fn handle_chain_event(&mut self, event: ChainEvent) {
        debug!(
            "Trader w/ TradeUUID {} handle_chain_event() {} {} with {} confirmations",
            self.data.trade_id, event.kind, event.tx.txid, event.confirmations
        );
        match self.process(Stimulus::Chain(event)).await {
            Outcome::Failed(error) => self.notify(Err(error)).await,
            Outcome::Rejected(error) => {
                debug!(
                    "Trader w/ TradeUUID {} chain event not applicable - {}",
                    self.data.trade_id, error
                );
            }
            Outcome::Completed | Outcome::Skipped | Outcome::Dropped => {}
        }
    }

    // Timers

    async fn handle_deadline_expired(&mut self) {
        let Some(deadline) = self.deadline.take() else {
            return;
        };
        let error = EscrowError::Timeout(format!(
            "No reply from peer within {:?} after {}",
            deadline.timeout, deadline.armed_by
        ));
        error!("Trader w/ TradeUUID {} {}", self.data.trade_id, error);
        self.data.set_error_message(error.to_string());
        self.notify(Err(error)).await;
    }

    async fn handle_resend(&mut self) {
        self.resend = None;
        let stimulus = Stimulus::Internal(InternalEvent::ResendFiatPaymentStarted);
        match self.process(stimulus).await {
            Outcome::Failed(error) => self.notify(Err(error)).await,
            Outcome::Rejected(error) => {
                debug!(
                    "Trader w/ TradeUUID {} resend not applicable - {}",
                    self.data.trade_id, error
                );
            }
            Outcome::Completed | Outcome::Skipped | Outcome::Dropped => {}
        }
        self.update_resend_timer();
    }

    fn arm_deadline(&mut self, armed_by: StimulusKind, timeout: Duration) {
        debug!(
            "Trader w/ TradeUUID {} arming {:?} deadline for {}",
            self.data.trade_id, timeout, armed_by
        );
        self.deadline = Some(Deadline {
            armed_by,
            timeout,
            sleep: Box::pin(sleep(timeout)),
        });
    }

    fn cancel_deadline(&mut self) {
        if let Some(deadline) = self.deadline.take() {
            debug!(
                "Trader w/ TradeUUID {} deadline armed by {} cancelled",
                self.data.trade_id, deadline.armed_by
            );
        }
    }

    /// Keeps a resend scheduled while the fiat-started notice is unacknowledged.
    /// The delay doubles with every attempt.
    fn update_resend_timer(&mut self) {
        let record = self.data.record();
        let pending = record.phase() == Phase::FiatSent
            && record.last_outbound.as_ref().is_some_and(|outbound| {
                !outbound.acked
                    && outbound.message.kind().is_mailbox_eligible()
                    && outbound.resend_count < self.config.max_resends
            });

        if !pending {
            if self.resend.take().is_some() {
                debug!(
                    "Trader w/ TradeUUID {} resend timer cancelled",
                    self.data.trade_id
                );
            }
            return;
        }
        if self.resend.is_none() {
            let attempt = record
                .last_outbound
                .map_or(0, |outbound| outbound.resend_count);
            let delay = self
                .config
                .resend_delay
                .saturating_mul(2u32.saturating_pow(attempt));
            debug!(
                "Trader w/ TradeUUID {} resend scheduled in {:?}",
                self.data.trade_id, delay
            );
            self.resend = Some(Box::pin(sleep(delay)));
        }
    }

    // Dispatching

    async fn process(&mut self, stimulus: Stimulus) -> Outcome {
        let record = self.data.record();
        let kind = stimulus.kind();

        match dispatch(self.protocol.rules, &record, &stimulus) {
            Dispatch::Drop => Outcome::Dropped,
            Dispatch::NoMatch => {
                warn!(
                    "Trader w/ TradeUUID {} has no rule for {} in phase {}",
                    self.data.trade_id,
                    kind,
                    record.phase()
                );
                Outcome::Rejected(EscrowError::NoMatchingRule {
                    phase: record.phase(),
                    stimulus: kind.to_string(),
                })
            }
            Dispatch::ShortCircuit(_, alternate) => {
                debug!(
                    "Trader w/ TradeUUID {} guard short-circuited {} with {:?}",
                    self.data.trade_id, kind, alternate
                );
                match alternate {
                    AlternateAction::AckAndIgnore => {
                        self.cancel_deadline();
                        Outcome::Skipped
                    }
                    AlternateAction::Ignore => Outcome::Skipped,
                    AlternateAction::Reject(reason) => {
                        Outcome::Rejected(EscrowError::Rejected(format!("{} - {}", kind, reason)))
                    }
                }
            }
            Dispatch::Run(rule) => self.run_rule(rule, record, stimulus).await,
        }
    }

    async fn run_rule(
        &mut self,
        rule: &'static TriggerRule<TradeTask>,
        record: TradeRecord,
        stimulus: Stimulus,
    ) -> Outcome {
        if let Some(timeout) = rule.deadline {
            self.arm_deadline(stimulus.kind(), timeout);
        }
        match self.run_tasks(rule.chain, record, Some(stimulus)).await {
            Ok(()) => {
                if rule.completes_deadline {
                    self.cancel_deadline();
                }
                Outcome::Completed
            }
            Err(error) => {
                self.cancel_deadline();
                Outcome::Failed(error)
            }
        }
    }

    /// Runs a chain on a working copy of the record. Artifacts written by
    /// completed tasks are kept either way, the staged state only on success.
    async fn run_tasks(
        &mut self,
        chain: &[TradeTask],
        record: TradeRecord,
        stimulus: Option<Stimulus>,
    ) -> Result<(), EscrowError> {
        let before = (record.phase(), record.state());
        let mut ctx = TaskContext::new(
            record,
            stimulus,
            self.services.clone(),
            self.chain_tx.clone(),
        );
        ctx.watching = std::mem::take(&mut self.watching);
        let result = run_chain(chain, &mut ctx).await;
        let TaskContext {
            trade: mut record,
            process,
            watching,
            ..
        } = ctx;
        self.watching = watching;

        match result {
            Ok(()) => {
                if let Some(state) = process.staged_state() {
                    record.commit_state(state);
                }
                let (phase, state) = (record.phase(), record.state());
                self.data.store_record(record);
                if (phase, state) != before {
                    info!(
                        "Trader w/ TradeUUID {} now in phase {} state {}",
                        self.data.trade_id, phase, state
                    );
                    self.notify(Ok(TradeNotif::StateChanged { phase, state }))
                        .await;
                }
                self.update_resend_timer();
                Ok(())
            }
            Err(fault) => {
                error!("Trader w/ TradeUUID {} {}", self.data.trade_id, fault);
                record.error_message = Some(fault.to_string());
                self.data.store_record(record);
                Err(fault.into())
            }
        }
    }

    async fn notify(&self, notif: Result<TradeNotif, EscrowError>) {
        if let Some(tx) = &self.notif_tx {
            if let Some(error) = tx.send(notif).await.err() {
                error!(
                    "Trader w/ TradeUUID {} failed in notifying user - {}",
                    self.data.trade_id, error
                );
            }
        } else {
            warn!(
                "Trader w/ TradeUUID {} do not have notif_tx registered",
                self.data.trade_id
            );
        }
    }
}

async fn expire(sleep: Option<&mut Pin<Box<Sleep>>>) {
    match sleep {
        Some(sleep) => sleep.as_mut().await,
        None => future::pending().await,
    }
}
