use std::collections::{HashMap, VecDeque};

use nalgebra::Vector3;
use thiserror::Error;
use tracing::debug;

use crate::events::{ConsoleCommand, HostEvent};
use crate::math::{ray_aabb_distance, Aabb, Quat, Transform, Vec3};

const PLAYER_EYE_HEIGHT: f32 = 1.5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct EntityId(pub u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PlayerId(pub u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VehicleKind {
    Standard,
    /// Autonomous delivery vehicles; always ineligible for rider support.
    Delivery,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeatKind {
    Pilot,
    Passenger,
    Visible,
}

impl SeatKind {
    /// The visible seat is cosmetic and never a mount target.
    pub fn is_mountable(self) -> bool {
        matches!(self, Self::Pilot | Self::Passenger)
    }
}

#[derive(Debug, Clone)]
pub struct Vehicle {
    pub transform: Transform,
    pub half_extents: Vec3,
    pub owner: Option<PlayerId>,
    pub kind: VehicleKind,
    pub health: f32,
    /// Exclusive attachment slot; occupied while a conflicting attachment
    /// (such as a deployed seat pair) is present.
    pub slot: Option<EntityId>,
    pub children: Vec<EntityId>,
    pub controlled_by: Option<PlayerId>,
    pub last_control_input: Option<Vec3>,
    pub control_input_count: u32,
}

impl Vehicle {
    pub fn world_aabb(&self) -> Aabb {
        Aabb {
            center: self.transform.position,
            half_extents: self.half_extents,
        }
    }
}

/// Per-tick player input as sampled by the host. `sequence` increases on
/// every fresh sample so consumers can tell new input from stale input.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct InputState {
    pub move_intent: Vec3,
    pub dismount_pressed: bool,
    pub sequence: u64,
}

impl InputState {
    fn empty() -> Self {
        Self {
            move_intent: Vector3::zeros(),
            dismount_pressed: false,
            sequence: 0,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Player {
    pub position: Vec3,
    pub yaw: f32,
    pub look_direction: Vec3,
    pub mounted_on: Option<EntityId>,
    /// Reference-frame parenting applied by a trigger volume.
    pub parent: Option<EntityId>,
    pub connected: bool,
    pub input: InputState,
}

#[derive(Debug, Clone)]
pub struct Seat {
    pub vehicle: EntityId,
    pub kind: SeatKind,
    pub local_offset: Vec3,
    pub busy: bool,
    pub mounted_by: Option<PlayerId>,
    pub dismount_positions: Vec<Vec3>,
    pub persisted: bool,
    pub mobile: bool,
    pub mesh_collision_stripped: bool,
    /// When set, damage received by this seat belongs to the vehicle.
    pub damage_passthrough: bool,
}

#[derive(Debug, Error)]
#[error("host refused to spawn seat for vehicle {vehicle:?}")]
pub struct SeatSpawnError {
    pub vehicle: EntityId,
}

/// The externally-owned simulation state: vehicles, players, and mountable
/// seats, in side tables keyed by opaque ids, plus the FIFO notification
/// queue the subsystem consumes.
#[derive(Debug, Default)]
pub struct World {
    vehicles: HashMap<EntityId, Vehicle>,
    players: HashMap<PlayerId, Player>,
    seats: HashMap<EntityId, Seat>,
    next_entity_id: u64,
    next_player_id: u64,
    events: VecDeque<HostEvent>,
    fail_spawn_countdown: Option<u32>,
}

impl World {
    pub fn new() -> Self {
        Self::default()
    }

    fn alloc_entity_id(&mut self) -> EntityId {
        let id = EntityId(self.next_entity_id);
        self.next_entity_id += 1;
        id
    }

    pub fn pop_event(&mut self) -> Option<HostEvent> {
        self.events.pop_front()
    }

    pub fn push_event(&mut self, event: HostEvent) {
        self.events.push_back(event);
    }

    /// Arms the spawn fault injector: the next `skip` seat spawns succeed
    /// and the one after fails, then the injector disarms.
    pub fn fail_nth_seat_spawn(&mut self, skip: u32) {
        self.fail_spawn_countdown = Some(skip);
    }

    // --- vehicles ---

    pub fn spawn_vehicle(
        &mut self,
        transform: Transform,
        half_extents: Vec3,
        owner: Option<PlayerId>,
        kind: VehicleKind,
    ) -> EntityId {
        let id = self.alloc_entity_id();
        self.vehicles.insert(
            id,
            Vehicle {
                transform,
                half_extents,
                owner,
                kind,
                health: 100.0,
                slot: None,
                children: Vec::new(),
                controlled_by: None,
                last_control_input: None,
                control_input_count: 0,
            },
        );
        self.events.push_back(HostEvent::VehicleSpawned { vehicle: id });
        id
    }

    /// Reports that a player placed the vehicle in the world themselves.
    pub fn notify_built(&mut self, vehicle: EntityId, builder: PlayerId) {
        if self.vehicles.contains_key(&vehicle) {
            self.events
                .push_back(HostEvent::VehicleBuilt { vehicle, builder });
        }
    }

    pub fn vehicle(&self, id: EntityId) -> Option<&Vehicle> {
        self.vehicles.get(&id)
    }

    pub fn vehicle_mut(&mut self, id: EntityId) -> Option<&mut Vehicle> {
        self.vehicles.get_mut(&id)
    }

    pub fn vehicle_ids(&self) -> Vec<EntityId> {
        let mut ids: Vec<EntityId> = self.vehicles.keys().copied().collect();
        ids.sort();
        ids
    }

    pub fn destroy_vehicle(&mut self, id: EntityId) {
        let Some(vehicle) = self.vehicles.remove(&id) else {
            return;
        };
        for child in vehicle.children {
            if let Some(seat) = self.seats.remove(&child) {
                if let Some(rider) = seat.mounted_by {
                    if let Some(player) = self.players.get_mut(&rider) {
                        player.mounted_on = None;
                    }
                }
            }
        }
        for player in self.players.values_mut() {
            if player.parent == Some(id) {
                player.parent = None;
            }
        }
        debug!(vehicle = id.0, "vehicle destroyed");
        self.events.push_back(HostEvent::VehicleDestroyed { vehicle: id });
    }

    pub fn apply_vehicle_damage(&mut self, id: EntityId, amount: f32) {
        let destroyed = {
            let Some(vehicle) = self.vehicles.get_mut(&id) else {
                return;
            };
            vehicle.health -= amount;
            vehicle.health <= 0.0
        };
        if destroyed {
            self.destroy_vehicle(id);
        }
    }

    pub fn set_vehicle_rotation(&mut self, id: EntityId, rotation: Quat) {
        if let Some(vehicle) = self.vehicles.get_mut(&id) {
            vehicle.transform.rotation = rotation;
        }
    }

    pub fn set_slot(&mut self, vehicle: EntityId, occupant: Option<EntityId>) {
        if let Some(vehicle) = self.vehicles.get_mut(&vehicle) {
            vehicle.slot = occupant;
        }
    }

    pub fn init_control(&mut self, vehicle: EntityId, player: PlayerId) {
        if let Some(vehicle) = self.vehicles.get_mut(&vehicle) {
            vehicle.controlled_by = Some(player);
        }
    }

    pub fn stop_control(&mut self, vehicle: EntityId) {
        if let Some(vehicle) = self.vehicles.get_mut(&vehicle) {
            vehicle.controlled_by = None;
            vehicle.last_control_input = None;
        }
    }

    pub fn apply_control_input(&mut self, vehicle: EntityId, movement: Vec3) {
        if let Some(vehicle) = self.vehicles.get_mut(&vehicle) {
            vehicle.last_control_input = Some(movement);
            vehicle.control_input_count += 1;
        }
    }

    pub fn notify_scale_begin(&mut self, vehicle: EntityId, old_scale: f32, new_scale: f32) {
        if self.vehicles.contains_key(&vehicle) {
            self.events.push_back(HostEvent::ScaleBegin {
                vehicle,
                old_scale,
                new_scale,
            });
        }
    }

    // --- players ---

    pub fn spawn_player(&mut self, position: Vec3) -> PlayerId {
        let id = PlayerId(self.next_player_id);
        self.next_player_id += 1;
        self.players.insert(
            id,
            Player {
                position,
                yaw: 0.0,
                look_direction: Vector3::z(),
                mounted_on: None,
                parent: None,
                connected: true,
                input: InputState::empty(),
            },
        );
        id
    }

    pub fn player(&self, id: PlayerId) -> Option<&Player> {
        self.players.get(&id)
    }

    pub fn player_mut(&mut self, id: PlayerId) -> Option<&mut Player> {
        self.players.get_mut(&id)
    }

    pub fn player_ids(&self) -> Vec<PlayerId> {
        let mut ids: Vec<PlayerId> = self.players.keys().copied().collect();
        ids.sort();
        ids
    }

    pub fn set_player_input(&mut self, id: PlayerId, move_intent: Vec3, dismount_pressed: bool) {
        if let Some(player) = self.players.get_mut(&id) {
            let sequence = player.input.sequence + 1;
            player.input = InputState {
                move_intent,
                dismount_pressed,
                sequence,
            };
        }
    }

    pub fn set_player_parent(&mut self, id: PlayerId, parent: Option<EntityId>) {
        if let Some(player) = self.players.get_mut(&id) {
            player.parent = parent;
        }
    }

    pub fn disconnect_player(&mut self, id: PlayerId) {
        let Some(player) = self.players.get_mut(&id) else {
            return;
        };
        player.connected = false;
        if let Some(seat_id) = player.mounted_on.take() {
            if let Some(seat) = self.seats.get_mut(&seat_id) {
                seat.mounted_by = None;
            }
        }
        player.parent = None;
        self.events.push_back(HostEvent::PlayerDisconnected { player: id });
    }

    pub fn issue_command(&mut self, player: PlayerId, command: ConsoleCommand) {
        if self.players.contains_key(&player) {
            self.events.push_back(HostEvent::Command { player, command });
        }
    }

    /// Ray cast from the player's eyes against vehicle bounds; nearest hit
    /// within `max_range` wins.
    pub fn look_target(&self, player: PlayerId, max_range: f32) -> Option<EntityId> {
        let player = self.players.get(&player)?;
        let origin = player.position + Vector3::new(0.0, PLAYER_EYE_HEIGHT, 0.0);
        let mut best: Option<(f32, EntityId)> = None;
        for (id, vehicle) in &self.vehicles {
            let Some(distance) =
                ray_aabb_distance(origin, player.look_direction, &vehicle.world_aabb())
            else {
                continue;
            };
            if distance > max_range {
                continue;
            }
            if best.map_or(true, |(best_distance, _)| distance < best_distance) {
                best = Some((distance, *id));
            }
        }
        best.map(|(_, id)| id)
    }

    // --- seats ---

    pub fn spawn_seat(
        &mut self,
        vehicle: EntityId,
        kind: SeatKind,
        local_offset: Vec3,
    ) -> Result<EntityId, SeatSpawnError> {
        if !self.vehicles.contains_key(&vehicle) {
            return Err(SeatSpawnError { vehicle });
        }
        if let Some(countdown) = self.fail_spawn_countdown {
            if countdown == 0 {
                self.fail_spawn_countdown = None;
                return Err(SeatSpawnError { vehicle });
            }
            self.fail_spawn_countdown = Some(countdown - 1);
        }
        let id = self.alloc_entity_id();
        self.seats.insert(
            id,
            Seat {
                vehicle,
                kind,
                local_offset,
                busy: false,
                mounted_by: None,
                dismount_positions: Vec::new(),
                persisted: false,
                mobile: false,
                mesh_collision_stripped: false,
                damage_passthrough: false,
            },
        );
        if let Some(vehicle) = self.vehicles.get_mut(&vehicle) {
            vehicle.children.push(id);
        }
        Ok(id)
    }

    pub fn seat(&self, id: EntityId) -> Option<&Seat> {
        self.seats.get(&id)
    }

    pub fn seat_mut(&mut self, id: EntityId) -> Option<&mut Seat> {
        self.seats.get_mut(&id)
    }

    pub fn destroy_seat(&mut self, id: EntityId) {
        let Some(seat) = self.seats.remove(&id) else {
            return;
        };
        if let Some(rider) = seat.mounted_by {
            if let Some(player) = self.players.get_mut(&rider) {
                player.mounted_on = None;
            }
        }
        if let Some(vehicle) = self.vehicles.get_mut(&seat.vehicle) {
            vehicle.children.retain(|child| *child != id);
            if vehicle.slot == Some(id) {
                vehicle.slot = None;
            }
        }
    }

    pub fn set_seat_busy(&mut self, id: EntityId, busy: bool) {
        if let Some(seat) = self.seats.get_mut(&id) {
            seat.busy = busy;
        }
    }

    pub fn report_seat_damage(&mut self, seat: EntityId, amount: f32, attacker: Option<PlayerId>) {
        if self.seats.contains_key(&seat) {
            self.events.push_back(HostEvent::SeatDamaged {
                seat,
                amount,
                attacker,
            });
        }
    }

    /// Mounts a player on a seat. Fails when the seat is cosmetic, busy,
    /// occupied, or the player is already mounted.
    pub fn mount(&mut self, player_id: PlayerId, seat_id: EntityId) -> bool {
        let Some(seat) = self.seats.get(&seat_id) else {
            return false;
        };
        if !seat.kind.is_mountable() || seat.busy || seat.mounted_by.is_some() {
            return false;
        }
        let Some(player) = self.players.get_mut(&player_id) else {
            return false;
        };
        if !player.connected || player.mounted_on.is_some() {
            return false;
        }
        player.mounted_on = Some(seat_id);
        player.parent = None;
        if let Some(seat) = self.seats.get_mut(&seat_id) {
            seat.mounted_by = Some(player_id);
        }
        self.events.push_back(HostEvent::PlayerMounted {
            player: player_id,
            seat: seat_id,
        });
        true
    }

    pub fn has_valid_dismount_position(&self, seat_id: EntityId) -> bool {
        self.seats
            .get(&seat_id)
            .map_or(false, |seat| !seat.dismount_positions.is_empty())
    }

    /// Normal dismount: requires a valid egress point. Returns false and
    /// leaves the player seated when none exists.
    pub fn request_dismount(&mut self, player_id: PlayerId) -> bool {
        let Some(seat_id) = self.players.get(&player_id).and_then(|p| p.mounted_on) else {
            return false;
        };
        if !self.has_valid_dismount_position(seat_id) {
            return false;
        }
        let egress = self.seats[&seat_id].dismount_positions[0];
        let vehicle = self.seats[&seat_id].vehicle;
        let vehicle_position = self
            .vehicles
            .get(&vehicle)
            .map(|v| v.transform.position)
            .unwrap_or_else(Vector3::zeros);
        self.unmount_internal(player_id, seat_id, Some(vehicle_position + egress));
        true
    }

    /// Lite dismount used for seat switching: no egress repositioning.
    pub fn dismount_lite(&mut self, player_id: PlayerId) {
        let Some(seat_id) = self.players.get(&player_id).and_then(|p| p.mounted_on) else {
            return;
        };
        self.unmount_internal(player_id, seat_id, None);
    }

    fn unmount_internal(
        &mut self,
        player_id: PlayerId,
        seat_id: EntityId,
        egress_position: Option<Vec3>,
    ) {
        if let Some(player) = self.players.get_mut(&player_id) {
            player.mounted_on = None;
            if let Some(position) = egress_position {
                player.position = position;
            }
        }
        if let Some(seat) = self.seats.get_mut(&seat_id) {
            seat.mounted_by = None;
        }
        self.events.push_back(HostEvent::PlayerDismounted {
            player: player_id,
            seat: seat_id,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn standard_vehicle(world: &mut World) -> EntityId {
        world.spawn_vehicle(
            Transform::identity(),
            Vector3::new(0.4, 0.1, 0.4),
            None,
            VehicleKind::Standard,
        )
    }

    #[test]
    fn spawning_a_vehicle_emits_spawn_event() {
        let mut world = World::new();
        let vehicle = standard_vehicle(&mut world);
        assert_eq!(
            world.pop_event(),
            Some(HostEvent::VehicleSpawned { vehicle })
        );
    }

    #[test]
    fn destroying_a_vehicle_removes_child_seats_and_unseats_riders() {
        let mut world = World::new();
        let vehicle = standard_vehicle(&mut world);
        let seat = world
            .spawn_seat(vehicle, SeatKind::Pilot, Vector3::zeros())
            .expect("seat");
        let player = world.spawn_player(Vector3::zeros());
        assert!(world.mount(player, seat));

        world.destroy_vehicle(vehicle);

        assert!(world.vehicle(vehicle).is_none());
        assert!(world.seat(seat).is_none());
        assert_eq!(world.player(player).expect("player").mounted_on, None);
    }

    #[test]
    fn mount_refuses_busy_and_occupied_seats() {
        let mut world = World::new();
        let vehicle = standard_vehicle(&mut world);
        let seat = world
            .spawn_seat(vehicle, SeatKind::Passenger, Vector3::zeros())
            .expect("seat");
        let first = world.spawn_player(Vector3::zeros());
        let second = world.spawn_player(Vector3::zeros());

        assert!(world.mount(first, seat));
        assert!(!world.mount(second, seat));

        world.dismount_lite(first);
        world.set_seat_busy(seat, true);
        assert!(!world.mount(second, seat));
    }

    #[test]
    fn visible_seats_are_never_mountable() {
        let mut world = World::new();
        let vehicle = standard_vehicle(&mut world);
        let seat = world
            .spawn_seat(vehicle, SeatKind::Visible, Vector3::zeros())
            .expect("seat");
        let player = world.spawn_player(Vector3::zeros());
        assert!(!world.mount(player, seat));
    }

    #[test]
    fn spawn_fault_injector_fails_exactly_the_requested_spawn() {
        let mut world = World::new();
        let vehicle = standard_vehicle(&mut world);
        world.fail_nth_seat_spawn(1);

        assert!(world
            .spawn_seat(vehicle, SeatKind::Pilot, Vector3::zeros())
            .is_ok());
        assert!(world
            .spawn_seat(vehicle, SeatKind::Passenger, Vector3::zeros())
            .is_err());
        assert!(world
            .spawn_seat(vehicle, SeatKind::Visible, Vector3::zeros())
            .is_ok());
    }

    #[test]
    fn request_dismount_fails_without_egress_and_succeeds_with_one() {
        let mut world = World::new();
        let vehicle = standard_vehicle(&mut world);
        let seat = world
            .spawn_seat(vehicle, SeatKind::Passenger, Vector3::zeros())
            .expect("seat");
        let player = world.spawn_player(Vector3::zeros());
        assert!(world.mount(player, seat));

        assert!(!world.request_dismount(player));
        assert!(world.player(player).expect("player").mounted_on.is_some());

        world
            .seat_mut(seat)
            .expect("seat")
            .dismount_positions
            .push(Vector3::new(1.0, 0.0, 0.0));
        assert!(world.request_dismount(player));
        assert_eq!(world.player(player).expect("player").mounted_on, None);
    }

    #[test]
    fn look_target_returns_nearest_vehicle_within_range() {
        let mut world = World::new();
        let near = world.spawn_vehicle(
            Transform::at(Vector3::new(0.0, 1.5, 2.0)),
            Vector3::new(0.4, 0.2, 0.4),
            None,
            VehicleKind::Standard,
        );
        let _far = world.spawn_vehicle(
            Transform::at(Vector3::new(0.0, 1.5, 8.0)),
            Vector3::new(0.4, 0.2, 0.4),
            None,
            VehicleKind::Standard,
        );
        let player = world.spawn_player(Vector3::zeros());

        assert_eq!(world.look_target(player, 3.0), Some(near));
        assert_eq!(world.look_target(player, 0.5), None);
    }
}
