use std::collections::HashSet;

use crate::entity::{EntityId, PlayerId};

/// Console-level commands a player can issue while connected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsoleCommand {
    SwapSeats,
}

/// Notifications emitted by the host world as its state changes. Delivered
/// in FIFO order through a single queue; handlers may enqueue further events
/// which are processed in the same drain.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum HostEvent {
    VehicleSpawned {
        vehicle: EntityId,
    },
    VehicleBuilt {
        vehicle: EntityId,
        builder: PlayerId,
    },
    VehicleDestroyed {
        vehicle: EntityId,
    },
    SeatDamaged {
        seat: EntityId,
        amount: f32,
        attacker: Option<PlayerId>,
    },
    PlayerMounted {
        player: PlayerId,
        seat: EntityId,
    },
    PlayerDismounted {
        player: PlayerId,
        seat: EntityId,
    },
    PlayerDisconnected {
        player: PlayerId,
    },
    Command {
        player: PlayerId,
        command: ConsoleCommand,
    },
    ScaleBegin {
        vehicle: EntityId,
        old_scale: f32,
        new_scale: f32,
    },
}

/// Named event channels whose dispatch can be switched off while no tracked
/// entity needs them. Gating is a dispatch-cost optimization only; observable
/// behavior for any single entity must be identical either way.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventChannel {
    VolumeProximity,
    SeatDamage,
    Mounted,
    Dismounted,
    Command,
}

#[derive(Debug, Default)]
pub struct SubscriptionSet {
    active: HashSet<EventChannel>,
}

impl SubscriptionSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&mut self, channel: EventChannel) {
        self.active.insert(channel);
    }

    pub fn unsubscribe(&mut self, channel: EventChannel) {
        self.active.remove(&channel);
    }

    pub fn is_subscribed(&self, channel: EventChannel) -> bool {
        self.active.contains(&channel)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn subscribe_and_unsubscribe_toggle_membership() {
        let mut subscriptions = SubscriptionSet::new();
        assert!(!subscriptions.is_subscribed(EventChannel::Mounted));

        subscriptions.subscribe(EventChannel::Mounted);
        subscriptions.subscribe(EventChannel::Mounted);
        assert!(subscriptions.is_subscribed(EventChannel::Mounted));
        assert!(!subscriptions.is_subscribed(EventChannel::Command));

        subscriptions.unsubscribe(EventChannel::Mounted);
        assert!(!subscriptions.is_subscribed(EventChannel::Mounted));
    }
}
