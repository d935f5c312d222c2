use std::collections::HashMap;

use crate::entity::{EntityId, PlayerId};

/// Extensibility points other subsystems can observe or veto.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HookPoint {
    BeforeVolumeCreate,
    AfterVolumeCreate,
    BeforeSeatDeploy,
    AfterSeatDeploy,
    ControlStarted,
    ControlEnded,
}

impl HookPoint {
    /// Only the `Before*` points may veto; the rest are observe-only.
    pub fn can_veto(self) -> bool {
        matches!(self, Self::BeforeVolumeCreate | Self::BeforeSeatDeploy)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HookVerdict {
    NoOpinion,
    Allow,
    Deny,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HookEvent {
    pub vehicle: Option<EntityId>,
    pub player: Option<PlayerId>,
}

impl HookEvent {
    pub fn for_vehicle(vehicle: EntityId) -> Self {
        Self {
            vehicle: Some(vehicle),
            player: None,
        }
    }

    pub fn for_vehicle_and_player(vehicle: EntityId, player: Option<PlayerId>) -> Self {
        Self {
            vehicle: Some(vehicle),
            player,
        }
    }
}

pub type HookFn = Box<dyn Fn(&HookEvent) -> HookVerdict>;

/// Ordered veto-callback lists per hook point. The first callback returning
/// something other than `NoOpinion` decides.
#[derive(Default)]
pub struct HookRegistry {
    callbacks: HashMap<HookPoint, Vec<HookFn>>,
}

impl HookRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<F>(&mut self, point: HookPoint, callback: F)
    where
        F: Fn(&HookEvent) -> HookVerdict + 'static,
    {
        self.callbacks
            .entry(point)
            .or_default()
            .push(Box::new(callback));
    }

    /// First non-`NoOpinion` verdict wins; `NoOpinion` when nobody decides.
    pub fn evaluate(&self, point: HookPoint, event: &HookEvent) -> HookVerdict {
        debug_assert!(point.can_veto(), "{point:?} is observe-only");
        let Some(callbacks) = self.callbacks.get(&point) else {
            return HookVerdict::NoOpinion;
        };
        for callback in callbacks {
            let verdict = callback(event);
            if verdict != HookVerdict::NoOpinion {
                return verdict;
            }
        }
        HookVerdict::NoOpinion
    }

    /// Observe-only delivery: every callback runs, verdicts are ignored.
    pub fn notify(&self, point: HookPoint, event: &HookEvent) {
        let Some(callbacks) = self.callbacks.get(&point) else {
            return;
        };
        for callback in callbacks {
            let _ = callback(event);
        }
    }
}
