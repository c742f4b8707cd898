//! One simulated backend process
//!
//! Each backend owns a `TradeServer` and runs it on a single task: player
//! actions, relayed frames and game ticks are handled one at a time.

use chrono::{DateTime, Utc};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{Duration, Instant, MissedTickBehavior};
use tracing::{info, warn};
use tradelink_core::{
    CurrencyIcon, InMemoryGoods, ItemSlotIcon, MemoryAudit, Notice, RecordingInterface, Session,
    TradeInterface, TradeSettings, TracingInterface, Visual,
};
use tradelink_proxy::TradeServer;
use tradelink_types::{
    Asset, ItemStack, Perspective, PlayerHandle, PlayerId, PlayerIdentity, Result, ServerId,
    SessionId, TradeError,
};

use crate::relay::{Envelope, RelayTransport};

/// Currency slot of the standard layout
pub const COINS_SLOT: usize = 4;

pub type Backend = TradeServer<InMemoryGoods, MemoryAudit, ScriptedInterface, RelayTransport>;

pub fn coins() -> Asset {
    Asset::Currency("coins".to_string())
}

/// Logs every interface call and keeps it for the scenario report
#[derive(Debug, Default)]
pub struct ScriptedInterface {
    log: TracingInterface,
    pub record: RecordingInterface,
}

impl TradeInterface for ScriptedInterface {
    fn open(&mut self, viewer: &PlayerHandle, session: &Session, perspective: Perspective) {
        self.log.open(viewer, session, perspective);
        self.record.open(viewer, session, perspective);
    }

    fn notify_slot_changed(
        &mut self,
        viewer: &PlayerHandle,
        session_id: &SessionId,
        perspective: Perspective,
        slot: usize,
        visual: &Visual,
    ) {
        self.log
            .notify_slot_changed(viewer, session_id, perspective, slot, visual);
        self.record
            .notify_slot_changed(viewer, session_id, perspective, slot, visual);
    }

    fn notify(&mut self, viewer: &PlayerHandle, notice: Notice) {
        self.log.notify(viewer, notice.clone());
        self.record.notify(viewer, notice);
    }

    fn close(&mut self, viewer: &PlayerHandle, session_id: &SessionId) {
        self.log.close(viewer, session_id);
        self.record.close(viewer, session_id);
    }
}

/// Something a scripted player does
#[derive(Debug, Clone)]
pub enum Action {
    Connect(PlayerIdentity),
    RegisterRemote { player: PlayerIdentity, host: ServerId },
    Fund { player: PlayerId, coins: u64 },
    Stock { player: PlayerId, item: ItemStack },
    Request { sender: PlayerId, receiver: PlayerId },
    Accept { receiver: PlayerId, sender: PlayerId },
    OfferCoins { player: PlayerId, amount: u64 },
    OfferItem { player: PlayerId, slot: usize, item: ItemStack },
    Ready { player: PlayerId },
    Leave { player: PlayerId },
    Disconnect { player: PlayerId },
}

/// Backend inbox message
#[derive(Debug)]
pub enum Input {
    Frame { from: ServerId, frame: Vec<u8> },
    Act(Action),
    Stop,
}

/// Wall clock driven by the runtime timer, so paused test time moves it too
#[derive(Debug, Clone, Copy)]
struct Clock {
    wall: DateTime<Utc>,
    started: Instant,
}

impl Clock {
    fn start() -> Self {
        Self {
            wall: Utc::now(),
            started: Instant::now(),
        }
    }

    fn now(&self) -> DateTime<Utc> {
        let elapsed = chrono::Duration::from_std(self.started.elapsed())
            .unwrap_or_else(|_| chrono::Duration::zero());
        self.wall + elapsed
    }
}

fn perform(server: &mut Backend, action: Action, now: DateTime<Utc>) -> Result<()> {
    match action {
        Action::Connect(identity) => {
            server.connect(identity);
        }
        Action::RegisterRemote { player, host } => server.register_remote(player, host),
        Action::Fund { player, coins: amount } => server.goods_mut().set_balance(&player, coins(), amount),
        Action::Stock { player, item } => server.goods_mut().add_items(&player, item),
        Action::Request { sender, receiver } => {
            server.request(&sender, &receiver, now)?;
        }
        Action::Accept { receiver, sender } => {
            let request = server
                .pending_request(&sender, &receiver)
                .ok_or_else(|| TradeError::RequestNotFound {
                    request_id: format!("{} -> {}", sender, receiver),
                })?;
            server.accept(&request, &receiver, now)?;
        }
        Action::OfferCoins { player, amount } => {
            let icon = CurrencyIcon::new("coins").with_amount(amount);
            server.update_icon(&player, COINS_SLOT, Box::new(icon))?;
        }
        Action::OfferItem { player, slot, item } => {
            server.update_icon(&player, slot, Box::new(ItemSlotIcon::holding(item)))?;
        }
        Action::Ready { player } => {
            server.toggle_ready(&player)?;
        }
        Action::Leave { player } => server.leave(&player)?,
        Action::Disconnect { player } => server.disconnect(&player),
    }
    Ok(())
}

async fn run(mut server: Backend, mut inbox: mpsc::UnboundedReceiver<Input>, tick: Duration) -> Backend {
    let clock = Clock::start();
    let mut interval = tokio::time::interval(tick);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut last_tick = Instant::now();

    loop {
        tokio::select! {
            _ = interval.tick() => {
                let now = Instant::now();
                server.tick(now - last_tick, clock.now());
                last_tick = now;
            }
            input = inbox.recv() => match input {
                Some(Input::Frame { from, frame }) => {
                    // failures are logged by the server and only drop the frame
                    let _ = server.receive(&from, &frame, clock.now());
                }
                Some(Input::Act(action)) => {
                    let label = format!("{:?}", action);
                    if let Err(e) = perform(&mut server, action, clock.now()) {
                        warn!(server = %server.name(), action = %label, error = %e, "action failed");
                    }
                }
                Some(Input::Stop) | None => break,
            }
        }
    }

    server.shutdown();
    info!("Backend {} stopped", server.name());
    server
}

/// Handle to a running backend task
pub struct BackendHandle {
    name: ServerId,
    inbox: mpsc::UnboundedSender<Input>,
    task: JoinHandle<Backend>,
}

impl BackendHandle {
    /// Start a backend whose frames go to `relay`
    pub fn spawn(
        name: ServerId,
        settings: TradeSettings,
        relay: mpsc::UnboundedSender<Envelope>,
        tick: Duration,
    ) -> Self {
        let server = TradeServer::new(
            name.clone(),
            settings,
            InMemoryGoods::new(),
            MemoryAudit::new(),
            ScriptedInterface::default(),
            RelayTransport::new(name.clone(), relay),
        );
        let (inbox, receiver) = mpsc::unbounded_channel();
        let task = tokio::spawn(run(server, receiver, tick));
        info!("Backend {} started", name);
        Self { name, inbox, task }
    }

    pub fn name(&self) -> &ServerId {
        &self.name
    }

    /// Sender the relay uses to deliver frames
    pub fn inbox(&self) -> mpsc::UnboundedSender<Input> {
        self.inbox.clone()
    }

    pub fn act(&self, action: Action) -> anyhow::Result<()> {
        self.inbox
            .send(Input::Act(action))
            .map_err(|_| anyhow::anyhow!("backend {} is not running", self.name))
    }

    /// Stop the backend and take back its server
    pub async fn stop(self) -> anyhow::Result<Backend> {
        let _ = self.inbox.send(Input::Stop);
        Ok(self.task.await?)
    }
}
