use std::collections::HashSet;

use simcore::{EntityId, EventChannel, SubscriptionSet};

/// Reference-counted activation gate: while at least one tracked entity is
/// present, the gate's event channels stay subscribed; the 1 -> 0 transition
/// unsubscribes them all. Duplicate adds and removals of non-members are
/// inert, so callers never need to pre-check membership.
#[derive(Debug)]
pub struct HookGate {
    channels: &'static [EventChannel],
    members: HashSet<EntityId>,
}

impl HookGate {
    pub fn new(channels: &'static [EventChannel]) -> Self {
        Self {
            channels,
            members: HashSet::new(),
        }
    }

    pub fn add(&mut self, id: EntityId, subscriptions: &mut SubscriptionSet) {
        if self.members.insert(id) && self.members.len() == 1 {
            for channel in self.channels {
                subscriptions.subscribe(*channel);
            }
        }
    }

    pub fn remove(&mut self, id: EntityId, subscriptions: &mut SubscriptionSet) {
        if self.members.remove(&id) && self.members.is_empty() {
            for channel in self.channels {
                subscriptions.unsubscribe(*channel);
            }
        }
    }

    pub fn contains(&self, id: EntityId) -> bool {
        self.members.contains(&id)
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub fn clear(&mut self, subscriptions: &mut SubscriptionSet) {
        if !self.members.is_empty() {
            self.members.clear();
            for channel in self.channels {
                subscriptions.unsubscribe(*channel);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    const TEST_CHANNELS: &[EventChannel] = &[EventChannel::Mounted, EventChannel::Dismounted];

    fn subscribed(subscriptions: &SubscriptionSet) -> bool {
        TEST_CHANNELS
            .iter()
            .all(|channel| subscriptions.is_subscribed(*channel))
    }

    #[test]
    fn first_member_subscribes_and_last_member_unsubscribes() {
        let mut gate = HookGate::new(TEST_CHANNELS);
        let mut subscriptions = SubscriptionSet::new();

        gate.add(EntityId(1), &mut subscriptions);
        assert!(subscribed(&subscriptions));
        gate.add(EntityId(2), &mut subscriptions);
        gate.remove(EntityId(1), &mut subscriptions);
        assert!(subscribed(&subscriptions));
        gate.remove(EntityId(2), &mut subscriptions);
        assert!(!subscribed(&subscriptions));
    }

    #[test]
    fn duplicate_adds_and_absent_removes_are_inert() {
        let mut gate = HookGate::new(TEST_CHANNELS);
        let mut subscriptions = SubscriptionSet::new();

        gate.remove(EntityId(9), &mut subscriptions);
        assert!(!subscribed(&subscriptions));

        gate.add(EntityId(1), &mut subscriptions);
        gate.add(EntityId(1), &mut subscriptions);
        gate.remove(EntityId(1), &mut subscriptions);
        assert!(!subscribed(&subscriptions));
    }

    #[test]
    fn subscription_matches_membership_over_random_sequences() {
        let mut rng = StdRng::seed_from_u64(0x52494445);
        let mut gate = HookGate::new(TEST_CHANNELS);
        let mut subscriptions = SubscriptionSet::new();

        for _ in 0..2000 {
            let id = EntityId(rng.gen_range(0..8));
            if rng.gen_bool(0.5) {
                gate.add(id, &mut subscriptions);
            } else {
                gate.remove(id, &mut subscriptions);
            }
            assert_eq!(
                subscribed(&subscriptions),
                !gate.is_empty(),
                "subscription state diverged from membership"
            );
        }

        gate.clear(&mut subscriptions);
        assert!(!subscribed(&subscriptions));
        assert!(gate.is_empty());
    }
}
