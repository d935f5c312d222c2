use tracing::info;

use simcore::{EntityId, PlayerId, World};

use crate::{RiderSubsystem, MAX_UPRIGHT_ALIGNMENT_FOR_FLIP};

/// Per-rider record backing the stuck-dismount valve. Lives as long as the
/// player occupies a seat, plus one deferred step after dismounting so a
/// seat swap can revive it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DismountRecovery {
    pub vehicle: EntityId,
    /// Bumped on every (re)bind; see the deferred destroy actions.
    pub generation: u64,
    /// Input sequence last inspected by the valve, so each press is
    /// evaluated exactly once.
    pub(crate) last_valve_sequence: u64,
}

impl RiderSubsystem {
    pub(crate) fn recovery_bind(&mut self, player: PlayerId, vehicle: EntityId) {
        match self.recovery.get_mut(&player) {
            Some(record) => {
                record.vehicle = vehicle;
                record.generation += 1;
            }
            None => {
                self.recovery.insert(
                    player,
                    DismountRecovery {
                        vehicle,
                        generation: 0,
                        last_valve_sequence: 0,
                    },
                );
            }
        }
    }

    pub(crate) fn apply_deferred_recovery_destroy(&mut self, player: PlayerId, generation: u64) {
        if self
            .recovery
            .get(&player)
            .map_or(false, |record| record.generation == generation)
        {
            self.recovery.remove(&player);
        }
    }

    /// Rescue valve for riders trapped in a flipped vehicle: when a
    /// dismount press finds no usable egress point and the vehicle lies
    /// near-inverted, stand the vehicle back up. Heading is preserved so
    /// the reset reads as righting the vehicle, not teleporting it.
    pub(crate) fn recovery_valve(&mut self, world: &mut World) {
        let mut resets: Vec<EntityId> = Vec::new();
        for (player_id, record) in self.recovery.iter_mut() {
            let Some(player) = world.player(*player_id) else {
                continue;
            };
            if !player.connected {
                continue;
            }
            let Some(seat_id) = player.mounted_on else {
                continue;
            };
            let input = player.input;
            if !input.dismount_pressed || input.sequence == record.last_valve_sequence {
                continue;
            }
            record.last_valve_sequence = input.sequence;
            if world.has_valid_dismount_position(seat_id) {
                continue;
            }
            let Some(vehicle) = world.vehicle(record.vehicle) else {
                continue;
            };
            if vehicle.transform.upright_alignment() <= MAX_UPRIGHT_ALIGNMENT_FOR_FLIP {
                resets.push(record.vehicle);
            }
        }
        for vehicle in resets {
            let Some(state) = world.vehicle(vehicle) else {
                continue;
            };
            let upright = state.transform.yaw_only_rotation();
            world.set_vehicle_rotation(vehicle, upright);
            info!(vehicle = vehicle.0, "flipped vehicle reset upright");
        }
    }
}
