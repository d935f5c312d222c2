use tracing::debug;

use simcore::{
    rotate_about_y, EntityId, HookEvent, HookPoint, HostServices, PlayerId, World,
};

use crate::seats::{seats_of, SeatTriple};
use crate::{DeferredAction, RiderSubsystem, CAP_SEAT_PILOT};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeatRole {
    Pilot,
    Passenger,
}

/// Live binding of one player to one vehicle and seat role. At most one
/// exists per player; seat swaps update it in place so vehicle control
/// never flickers mid-swap.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ControlSession {
    pub vehicle: EntityId,
    pub role: SeatRole,
    /// Whether input is routed to the vehicle. Pilot-entitled players
    /// control from either seat; unentitled passengers just ride.
    pub controlling: bool,
    pub last_input_sequence: u64,
    /// Bumped on every (re)bind; pending deferred destroys carry the
    /// generation they were scheduled against and no-op on mismatch.
    pub generation: u64,
}

impl RiderSubsystem {
    /// Seat mount notification. The passenger seat is the shared ingress:
    /// a fresh boarder holding the pilot capability is auto-redirected to
    /// the pilot seat, while unentitled riders stay put as passengers.
    pub(crate) fn on_player_mounted(
        &mut self,
        world: &mut World,
        services: &HostServices,
        player: PlayerId,
        seat_id: EntityId,
    ) {
        let Some(vehicle) = world.seat(seat_id).map(|seat| seat.vehicle) else {
            return;
        };
        if world.vehicle(vehicle).is_none() {
            return;
        }
        let Some(triple) = seats_of(world, vehicle) else {
            return;
        };
        if seat_id != triple.pilot && seat_id != triple.passenger {
            return;
        }

        self.recovery_bind(player, vehicle);

        let can_pilot = services.entitlements.has_capability(player, CAP_SEAT_PILOT);
        if seat_id == triple.pilot {
            // The ingress seat must not be boarded by someone else while
            // the pilot seat is occupied.
            world.set_seat_busy(triple.passenger, true);
        } else if can_pilot && !self.sessions.contains_key(&player) {
            // Fresh board through the ingress: move them up front. The
            // resulting mount notification creates the session.
            self.switch_to_seat(world, player, seat_id, triple.pilot, &triple);
            return;
        }

        let role = if seat_id == triple.pilot {
            SeatRole::Pilot
        } else {
            SeatRole::Passenger
        };
        self.session_bind(world, player, vehicle, role, can_pilot);
    }

    pub(crate) fn on_player_dismounted(
        &mut self,
        world: &mut World,
        player: PlayerId,
        seat_id: EntityId,
    ) {
        let Some(vehicle) = world.seat(seat_id).map(|seat| seat.vehicle) else {
            return;
        };
        if let Some(triple) = seats_of(world, vehicle) {
            if seat_id == triple.pilot {
                world.set_seat_busy(triple.passenger, false);
            }
        }

        // Deferred one step so a dismount-then-remount seat swap can
        // cancel the teardown by bumping the generation.
        if let Some(record) = self.recovery.get(&player) {
            self.deferred.push(DeferredAction::DestroyRecovery {
                player,
                generation: record.generation,
            });
        }
        if let Some(session) = self.sessions.get(&player) {
            self.deferred.push(DeferredAction::DestroySession {
                player,
                generation: session.generation,
            });
        }
    }

    /// Creates or updates the player's session. Control start/end hooks
    /// fire only on actual transitions, so a whole swap sequence produces
    /// at most one of each.
    pub(crate) fn session_bind(
        &mut self,
        world: &mut World,
        player: PlayerId,
        vehicle: EntityId,
        role: SeatRole,
        controlling: bool,
    ) {
        if let Some(mut session) = self.sessions.get(&player).copied() {
            session.generation += 1;
            let was_controlling = session.controlling;
            let old_vehicle = session.vehicle;
            session.role = role;
            session.controlling = controlling;
            session.vehicle = vehicle;
            self.sessions.insert(player, session);

            if old_vehicle != vehicle {
                // Remounted onto a different vehicle inside the deferral
                // window; migrate the gate entry and restart control. The old
                // vehicle's gate entry stays while other sessions ride it.
                if !self
                    .sessions
                    .values()
                    .any(|other| other.vehicle == old_vehicle)
                {
                    self.mounted_gate.remove(old_vehicle, &mut self.subscriptions);
                }
                self.mounted_gate.add(vehicle, &mut self.subscriptions);
                if was_controlling {
                    if world.vehicle(old_vehicle).is_some() {
                        world.stop_control(old_vehicle);
                    }
                    self.hooks.notify(
                        HookPoint::ControlEnded,
                        &HookEvent::for_vehicle_and_player(old_vehicle, Some(player)),
                    );
                }
                if controlling {
                    world.init_control(vehicle, player);
                    self.hooks.notify(
                        HookPoint::ControlStarted,
                        &HookEvent::for_vehicle_and_player(vehicle, Some(player)),
                    );
                }
                return;
            }

            if controlling && !was_controlling {
                world.init_control(vehicle, player);
                self.hooks.notify(
                    HookPoint::ControlStarted,
                    &HookEvent::for_vehicle_and_player(vehicle, Some(player)),
                );
            } else if was_controlling && !controlling {
                world.stop_control(vehicle);
                self.hooks.notify(
                    HookPoint::ControlEnded,
                    &HookEvent::for_vehicle_and_player(vehicle, Some(player)),
                );
            }
            return;
        }

        self.sessions.insert(
            player,
            ControlSession {
                vehicle,
                role,
                controlling,
                last_input_sequence: world
                    .player(player)
                    .map(|p| p.input.sequence)
                    .unwrap_or(0),
                generation: 0,
            },
        );
        self.mounted_gate.add(vehicle, &mut self.subscriptions);
        if controlling {
            world.init_control(vehicle, player);
            self.hooks.notify(
                HookPoint::ControlStarted,
                &HookEvent::for_vehicle_and_player(vehicle, Some(player)),
            );
        }
        debug!(player = player.0, vehicle = vehicle.0, ?role, "control session started");
    }

    pub(crate) fn apply_deferred_session_destroy(
        &mut self,
        world: &mut World,
        player: PlayerId,
        generation: u64,
    ) {
        let Some(session) = self.sessions.get(&player) else {
            return;
        };
        if session.generation != generation {
            // A remount landed first; the teardown is stale.
            return;
        }
        self.destroy_session_now(world, player);
    }

    pub(crate) fn destroy_session_now(&mut self, world: &mut World, player: PlayerId) {
        let Some(session) = self.sessions.remove(&player) else {
            return;
        };
        if session.controlling {
            if world.vehicle(session.vehicle).is_some() {
                world.stop_control(session.vehicle);
            }
            self.hooks.notify(
                HookPoint::ControlEnded,
                &HookEvent::for_vehicle_and_player(session.vehicle, Some(player)),
            );
        }
        // The gate entry is shared by every session on the vehicle; it is
        // released only with the last one.
        if !self
            .sessions
            .values()
            .any(|other| other.vehicle == session.vehicle)
        {
            self.mounted_gate
                .remove(session.vehicle, &mut self.subscriptions);
        }
        debug!(player = player.0, vehicle = session.vehicle.0, "control session ended");
    }

    /// Per-tick input routing for controlling sessions. Input is only
    /// forwarded when fresh; passengers steer relative to where they look
    /// rather than where the vehicle points.
    pub(crate) fn route_control_inputs(&mut self, world: &mut World) {
        let mut dead: Vec<PlayerId> = Vec::new();
        for (player_id, session) in self.sessions.iter_mut() {
            if world.vehicle(session.vehicle).is_none() {
                dead.push(*player_id);
                continue;
            }
            if !session.controlling {
                continue;
            }
            let Some(player) = world.player(*player_id) else {
                dead.push(*player_id);
                continue;
            };
            let input = player.input;
            let yaw = player.yaw;
            if input.sequence == session.last_input_sequence {
                continue;
            }
            session.last_input_sequence = input.sequence;
            let movement = match session.role {
                SeatRole::Pilot => input.move_intent,
                SeatRole::Passenger => rotate_about_y(input.move_intent, yaw),
            };
            world.apply_control_input(session.vehicle, movement);
        }
        for player in dead {
            self.destroy_session_now(world, player);
        }
    }

    /// Console command: move between the pilot and passenger seats of the
    /// vehicle the player currently occupies. Requires the pilot
    /// capability in either direction; the session survives the swap.
    pub(crate) fn swap_seats(
        &mut self,
        world: &mut World,
        services: &HostServices,
        player: PlayerId,
    ) {
        let Some(current_seat) = world.player(player).and_then(|p| p.mounted_on) else {
            return;
        };
        let Some(vehicle) = world.seat(current_seat).map(|seat| seat.vehicle) else {
            return;
        };
        let Some(triple) = seats_of(world, vehicle) else {
            return;
        };
        if current_seat != triple.pilot && current_seat != triple.passenger {
            return;
        }
        if !services.entitlements.has_capability(player, CAP_SEAT_PILOT) {
            return;
        }
        let desired_seat = if current_seat == triple.pilot {
            triple.passenger
        } else {
            triple.pilot
        };
        self.switch_to_seat(world, player, current_seat, desired_seat, &triple);
    }

    /// Dismount-then-mount inside one logical operation. The busy flag on
    /// the ingress seat is released eagerly when leaving the pilot seat so
    /// the immediate remount is not refused.
    pub(crate) fn switch_to_seat(
        &mut self,
        world: &mut World,
        player: PlayerId,
        current_seat: EntityId,
        desired_seat: EntityId,
        triple: &SeatTriple,
    ) {
        if current_seat == triple.pilot {
            world.set_seat_busy(triple.passenger, false);
        }
        world.dismount_lite(player);
        world.mount(player, desired_seat);
    }
}
