//! In-process stand-in for the proxy's plugin messaging channel

use std::collections::HashMap;
use std::time::Duration;

use tokio::sync::mpsc;
use tracing::{debug, warn};
use tradelink_proxy::PacketTransport;
use tradelink_types::ServerId;

use crate::backend::Input;

/// Frame in flight between two backend processes
#[derive(Debug, Clone)]
pub struct Envelope {
    pub from: ServerId,
    pub to: ServerId,
    pub frame: Vec<u8>,
}

/// Transport of one backend process: hands every frame to the relay
#[derive(Debug, Clone)]
pub struct RelayTransport {
    from: ServerId,
    relay: mpsc::UnboundedSender<Envelope>,
}

impl RelayTransport {
    pub fn new(from: ServerId, relay: mpsc::UnboundedSender<Envelope>) -> Self {
        Self { from, relay }
    }
}

impl PacketTransport for RelayTransport {
    fn send(&mut self, target: &ServerId, frame: Vec<u8>) {
        let envelope = Envelope {
            from: self.from.clone(),
            to: target.clone(),
            frame,
        };
        if self.relay.send(envelope).is_err() {
            warn!(from = %self.from, to = %target, "relay stopped, frame dropped");
        }
    }
}

/// Forward envelopes to their target's inbox, in arrival order.
///
/// Every frame is held for `delay`, one after the other, so frames between
/// two processes never overtake each other.
pub async fn run(
    mut envelopes: mpsc::UnboundedReceiver<Envelope>,
    inboxes: HashMap<ServerId, mpsc::UnboundedSender<Input>>,
    delay: Duration,
) {
    while let Some(envelope) = envelopes.recv().await {
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        let Some(inbox) = inboxes.get(&envelope.to) else {
            warn!(to = %envelope.to, "no such backend, frame dropped");
            continue;
        };
        debug!(from = %envelope.from, to = %envelope.to, bytes = envelope.frame.len(), "relaying frame");
        let input = Input::Frame {
            from: envelope.from,
            frame: envelope.frame,
        };
        if inbox.send(input).is_err() {
            warn!(to = %envelope.to, "backend stopped, frame dropped");
        }
    }
    debug!("relay stopped");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_relay_preserves_order() {
        let (relay_tx, relay_rx) = mpsc::unbounded_channel();
        let (inbox_tx, mut inbox_rx) = mpsc::unbounded_channel();
        let beta = ServerId::new("beta");
        let relay = tokio::spawn(run(
            relay_rx,
            HashMap::from([(beta.clone(), inbox_tx)]),
            Duration::from_millis(1),
        ));

        let mut transport = RelayTransport::new(ServerId::new("alpha"), relay_tx);
        for byte in 0..3u8 {
            transport.send(&beta, vec![byte]);
        }
        transport.send(&ServerId::new("gamma"), vec![9]);
        drop(transport);
        relay.await.unwrap();

        let mut received = Vec::new();
        while let Ok(Input::Frame { from, frame }) = inbox_rx.try_recv() {
            assert_eq!(from, ServerId::new("alpha"));
            received.extend(frame);
        }
        assert_eq!(received, vec![0, 1, 2]);
    }
}
