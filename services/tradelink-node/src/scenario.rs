//! Scripted trades played on the simulated network

use std::collections::HashMap;

use clap::ValueEnum;
use serde::Serialize;
use tokio::sync::mpsc;
use tokio::time::{sleep, Duration};
use tracing::info;
use tradelink_core::{AuditEntry, Goods, Notice};
use tradelink_types::{ItemStack, PlayerIdentity, ServerId};

use crate::backend::{coins, Action, Backend, BackendHandle};
use crate::config::NodeConfig;
use crate::relay;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Scenario {
    /// Both players on the same backend
    Local,
    /// Players on different backends, trade completes
    Proxy,
    /// Players on different backends, one disconnects during the countdown
    ProxyQuit,
    /// A cross-server request nobody answers
    Expiry,
    /// Every scenario above, one after the other
    All,
}

impl Scenario {
    pub fn each() -> [Scenario; 4] {
        [Self::Local, Self::Proxy, Self::ProxyQuit, Self::Expiry]
    }

    fn name(self) -> &'static str {
        match self {
            Self::Local => "local",
            Self::Proxy => "proxy",
            Self::ProxyQuit => "proxy-quit",
            Self::Expiry => "expiry",
            Self::All => "all",
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct PlayerReport {
    pub name: String,
    pub server: String,
    pub coins: u64,
    pub diamonds: u32,
    pub notices: Vec<Notice>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ScenarioReport {
    pub scenario: String,
    pub players: Vec<PlayerReport>,
    pub audit: Vec<AuditEntry>,
}

#[cfg(test)]
impl ScenarioReport {
    pub fn player(&self, name: &str) -> Option<&PlayerReport> {
        self.players.iter().find(|p| p.name == name)
    }
}

fn diamonds(amount: u16) -> ItemStack {
    ItemStack::new("diamond", amount)
}

/// Two backends behind a relay, with Alex and Blake connected
struct Network {
    alpha: BackendHandle,
    beta: BackendHandle,
    alex: (PlayerIdentity, ServerId),
    blake: (PlayerIdentity, ServerId),
    relay: tokio::task::JoinHandle<()>,
    config: NodeConfig,
}

impl Network {
    /// Start both backends; `same_host` puts Blake on alpha as well
    fn start(config: &NodeConfig, same_host: bool) -> anyhow::Result<Self> {
        let sim = &config.simulation;
        let (relay_tx, relay_rx) = mpsc::unbounded_channel();
        let alpha = BackendHandle::spawn(
            ServerId::new(&sim.alpha),
            config.trade.clone(),
            relay_tx.clone(),
            sim.tick(),
        );
        let beta = BackendHandle::spawn(
            ServerId::new(&sim.beta),
            config.trade.clone(),
            relay_tx,
            sim.tick(),
        );
        let inboxes = HashMap::from([
            (alpha.name().clone(), alpha.inbox()),
            (beta.name().clone(), beta.inbox()),
        ]);
        let relay = tokio::spawn(relay::run(relay_rx, inboxes, sim.relay_delay()));

        let alex = (PlayerIdentity::named("Alex"), alpha.name().clone());
        let blake_host = if same_host { alpha.name() } else { beta.name() };
        let blake = (PlayerIdentity::named("Blake"), blake_host.clone());

        let network = Self {
            alpha,
            beta,
            alex,
            blake,
            relay,
            config: config.clone(),
        };
        for (identity, host) in [&network.alex, &network.blake] {
            network.on(host)?.act(Action::Connect(identity.clone()))?;
            network.on(host)?.act(Action::Fund {
                player: identity.id,
                coins: sim.starting_coins,
            })?;
            network.on(host)?.act(Action::Stock {
                player: identity.id,
                item: diamonds(sim.starting_diamonds),
            })?;
        }
        if !same_host {
            let (alex, blake) = (&network.alex, &network.blake);
            network.beta.act(Action::RegisterRemote {
                player: alex.0.clone(),
                host: alex.1.clone(),
            })?;
            network.alpha.act(Action::RegisterRemote {
                player: blake.0.clone(),
                host: blake.1.clone(),
            })?;
        }
        Ok(network)
    }

    fn on(&self, host: &ServerId) -> anyhow::Result<&BackendHandle> {
        if host == self.alpha.name() {
            Ok(&self.alpha)
        } else if host == self.beta.name() {
            Ok(&self.beta)
        } else {
            anyhow::bail!("unknown backend {}", host)
        }
    }

    fn alex_does(&self, action: Action) -> anyhow::Result<()> {
        self.on(&self.alex.1)?.act(action)
    }

    fn blake_does(&self, action: Action) -> anyhow::Result<()> {
        self.on(&self.blake.1)?.act(action)
    }

    async fn settle(&self) {
        sleep(self.config.simulation.settle()).await;
    }

    /// Alex invites Blake and Blake accepts
    async fn open(&self) -> anyhow::Result<()> {
        self.alex_does(Action::Request {
            sender: self.alex.0.id,
            receiver: self.blake.0.id,
        })?;
        self.settle().await;
        self.blake_does(Action::Accept {
            receiver: self.blake.0.id,
            sender: self.alex.0.id,
        })?;
        self.settle().await;
        Ok(())
    }

    /// Alex offers 30 coins for two diamonds, then both get ready
    async fn offer_and_ready(&self) -> anyhow::Result<()> {
        self.alex_does(Action::OfferCoins {
            player: self.alex.0.id,
            amount: 30,
        })?;
        self.blake_does(Action::OfferItem {
            player: self.blake.0.id,
            slot: 0,
            item: diamonds(2),
        })?;
        self.settle().await;
        self.alex_does(Action::Ready { player: self.alex.0.id })?;
        self.settle().await;
        self.blake_does(Action::Ready { player: self.blake.0.id })?;
        self.settle().await;
        Ok(())
    }

    /// Stop everything and collect what each backend saw
    async fn finish(self, scenario: Scenario) -> anyhow::Result<ScenarioReport> {
        let Network {
            alpha,
            beta,
            alex,
            blake,
            relay,
            ..
        } = self;
        let servers = [alpha.stop().await?, beta.stop().await?];
        relay.abort();

        let mut players = Vec::new();
        for (identity, server) in [&alex, &blake] {
            let backend: &Backend = servers
                .iter()
                .find(|s| s.name() == server)
                .ok_or_else(|| anyhow::anyhow!("unknown backend {}", server))?;
            players.push(PlayerReport {
                name: identity.name.clone(),
                server: server.to_string(),
                coins: backend.goods().balance(&identity.id, &coins()),
                diamonds: backend.goods().item_count(&identity.id, &diamonds(1)),
                notices: backend
                    .interface()
                    .record
                    .notices_for(&identity.name)
                    .into_iter()
                    .cloned()
                    .collect(),
            });
        }
        let audit = servers
            .iter()
            .flat_map(|s| s.audit().entries.iter().cloned())
            .collect();

        Ok(ScenarioReport {
            scenario: scenario.name().to_string(),
            players,
            audit,
        })
    }
}

/// Play one scenario on a fresh network
pub async fn run(scenario: Scenario, config: &NodeConfig) -> anyhow::Result<ScenarioReport> {
    info!("Playing scenario {}", scenario.name());
    let countdown = config.trade.countdown() + config.simulation.settle();

    let network = match scenario {
        Scenario::Local => {
            let network = Network::start(config, true)?;
            network.open().await?;
            network.offer_and_ready().await?;
            sleep(countdown).await;
            network
        }
        Scenario::Proxy => {
            let network = Network::start(config, false)?;
            network.open().await?;
            network.offer_and_ready().await?;
            sleep(countdown).await;
            network.settle().await;
            network
        }
        Scenario::ProxyQuit => {
            let network = Network::start(config, false)?;
            network.open().await?;
            network.offer_and_ready().await?;
            network.blake_does(Action::Disconnect {
                player: network.blake.0.id,
            })?;
            sleep(countdown).await;
            network
        }
        Scenario::Expiry => {
            let network = Network::start(config, false)?;
            network.alex_does(Action::Request {
                sender: network.alex.0.id,
                receiver: network.blake.0.id,
            })?;
            let timeout = Duration::from_secs(config.trade.request_timeout_secs);
            info!("Waiting {}s for the request to expire", timeout.as_secs());
            sleep(timeout + config.simulation.settle()).await;
            network
        }
        Scenario::All => anyhow::bail!("play each scenario on its own network"),
    };

    let report = network.finish(scenario).await?;
    info!(
        "Scenario {} finished with {} audit lines",
        report.scenario,
        report.audit.len()
    );
    Ok(report)
}
