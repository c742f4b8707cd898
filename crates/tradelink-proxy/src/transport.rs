//! Transport seam between backend processes
//!
//! The real transport is the proxy's plugin messaging channel. Frames sent
//! to one target arrive in order, at least once.

use std::collections::VecDeque;

use tradelink_types::ServerId;

pub trait PacketTransport {
    fn send(&mut self, target: &ServerId, frame: Vec<u8>);
}

/// Collects outgoing frames in send order
#[derive(Debug, Default, Clone)]
pub struct Outbox {
    frames: Vec<(ServerId, Vec<u8>)>,
}

impl Outbox {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    pub fn drain(&mut self) -> Vec<(ServerId, Vec<u8>)> {
        std::mem::take(&mut self.frames)
    }
}

impl PacketTransport for Outbox {
    fn send(&mut self, target: &ServerId, frame: Vec<u8>) {
        self.frames.push((target.clone(), frame));
    }
}

/// In-memory link with knobs for delay, duplication and reordering
#[derive(Debug, Default, Clone)]
pub struct SimulatedLink {
    queue: VecDeque<(ServerId, Vec<u8>)>,
    duplicate: bool,
    held: bool,
    sent: usize,
}

impl SimulatedLink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Deliver every frame twice
    pub fn set_duplicate(&mut self, duplicate: bool) {
        self.duplicate = duplicate;
    }

    /// Keep frames queued until `release`
    pub fn hold(&mut self) {
        self.held = true;
    }

    pub fn release(&mut self) {
        self.held = false;
    }

    /// Reverse the order of the queued frames
    pub fn reorder(&mut self) {
        self.queue.make_contiguous().reverse();
    }

    pub fn pending(&self) -> usize {
        self.queue.len()
    }

    /// Frames sent through the link so far, duplicates included
    pub fn sent(&self) -> usize {
        self.sent
    }

    /// Frames ready for delivery; empty while held
    pub fn take(&mut self) -> Vec<(ServerId, Vec<u8>)> {
        if self.held {
            return Vec::new();
        }
        self.queue.drain(..).collect()
    }

    /// Copy of the queued frames, leaving the queue intact
    pub fn peek(&self) -> Vec<(ServerId, Vec<u8>)> {
        self.queue.iter().cloned().collect()
    }
}

impl PacketTransport for SimulatedLink {
    fn send(&mut self, target: &ServerId, frame: Vec<u8>) {
        if self.duplicate {
            self.queue.push_back((target.clone(), frame.clone()));
            self.sent += 1;
        }
        self.queue.push_back((target.clone(), frame));
        self.sent += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hold_and_reorder() {
        let mut link = SimulatedLink::new();
        let beta = ServerId::new("beta");
        link.hold();
        link.send(&beta, vec![1]);
        link.send(&beta, vec![2]);
        assert!(link.take().is_empty());

        link.reorder();
        link.release();
        let frames: Vec<Vec<u8>> = link.take().into_iter().map(|(_, f)| f).collect();
        assert_eq!(frames, vec![vec![2], vec![1]]);
    }

    #[test]
    fn test_duplicate() {
        let mut link = SimulatedLink::new();
        link.set_duplicate(true);
        link.send(&ServerId::new("beta"), vec![7]);
        assert_eq!(link.pending(), 2);
        assert_eq!(link.sent(), 2);
    }

    #[test]
    fn test_outbox_keeps_order() {
        let mut outbox = Outbox::new();
        outbox.send(&ServerId::new("a"), vec![1]);
        outbox.send(&ServerId::new("b"), vec![2]);
        let drained = outbox.drain();
        assert_eq!(drained[0].0, ServerId::new("a"));
        assert!(outbox.is_empty());
    }
}
