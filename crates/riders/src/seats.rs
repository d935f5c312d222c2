use nalgebra::Vector3;
use thiserror::Error;
use tracing::{debug, warn};

use simcore::{
    EntityId, HookEvent, HookPoint, HookVerdict, HostServices, PlayerId, SeatKind, Vec3, World,
};

use crate::RiderSubsystem;

// Seat placement relative to the vehicle origin. The pilot seat sits
// forward where view locking feels natural; the passenger and visible
// seats share the near-centerline spot.
const PILOT_SEAT_OFFSET: [f32; 3] = [-0.006, 0.027, 0.526];
const PASSENGER_SEAT_OFFSET: [f32; 3] = [0.0, 0.081, 0.0];

// Egress points offered by both mountable seats, relative to the vehicle.
const DEFAULT_DISMOUNT_POSITIONS: [[f32; 3]; 2] = [[0.8, 0.1, 0.0], [-0.8, 0.1, 0.0]];

/// The three co-located seats a vehicle carries: all exist or none do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SeatTriple {
    /// Locks view direction; the precise-control seat.
    pub pilot: EntityId,
    /// The mount ingress: shows the prompt, probes dismounts, forwards
    /// damage to the vehicle.
    pub passenger: EntityId,
    /// Cosmetic only, always rendered, never a mount target.
    pub visible: EntityId,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum DeployError {
    #[error("vehicle no longer exists")]
    VehicleMissing,
    #[error("vehicle already has a seat pair")]
    AlreadyDeployed,
    #[error("vehicle has an incompatible attachment in the seat slot")]
    SlotOccupied,
    #[error("seat deployment vetoed by an external hook")]
    Blocked,
    #[error("host refused to create a seat")]
    SpawnFailed,
}

/// All three seats of a vehicle, or `None`. A partial set counts as no
/// seat pair at all.
pub fn seats_of(world: &World, vehicle: EntityId) -> Option<SeatTriple> {
    let children = &world.vehicle(vehicle)?.children;
    let mut pilot = None;
    let mut passenger = None;
    let mut visible = None;
    for child in children {
        let Some(seat) = world.seat(*child) else {
            continue;
        };
        match seat.kind {
            SeatKind::Pilot => pilot = Some(*child),
            SeatKind::Passenger => passenger = Some(*child),
            SeatKind::Visible => visible = Some(*child),
        }
    }
    Some(SeatTriple {
        pilot: pilot?,
        passenger: passenger?,
        visible: visible?,
    })
}

fn offset(raw: [f32; 3]) -> Vec3 {
    Vector3::new(raw[0], raw[1], raw[2])
}

impl RiderSubsystem {
    /// Deploys the pilot/passenger/visible triple onto a vehicle. Every
    /// step can fail independently; failure destroys whatever was created
    /// in this attempt so no partial seat set ever persists.
    pub fn deploy_seats(
        &mut self,
        world: &mut World,
        _services: &HostServices,
        vehicle: EntityId,
        deployer: Option<PlayerId>,
    ) -> Result<SeatTriple, DeployError> {
        let Some(state) = world.vehicle(vehicle) else {
            return Err(DeployError::VehicleMissing);
        };
        if seats_of(world, vehicle).is_some() {
            return Err(DeployError::AlreadyDeployed);
        }
        if state.slot.is_some() {
            return Err(DeployError::SlotOccupied);
        }
        let hook_event = HookEvent::for_vehicle_and_player(vehicle, deployer);
        if self.hooks.evaluate(HookPoint::BeforeSeatDeploy, &hook_event) == HookVerdict::Deny {
            return Err(DeployError::Blocked);
        }

        let pilot = world
            .spawn_seat(vehicle, SeatKind::Pilot, offset(PILOT_SEAT_OFFSET))
            .map_err(|_| DeployError::SpawnFailed)?;

        let passenger =
            match world.spawn_seat(vehicle, SeatKind::Passenger, offset(PASSENGER_SEAT_OFFSET)) {
                Ok(seat) => seat,
                Err(_) => {
                    world.destroy_seat(pilot);
                    return Err(DeployError::SpawnFailed);
                }
            };

        let visible =
            match world.spawn_seat(vehicle, SeatKind::Visible, offset(PASSENGER_SEAT_OFFSET)) {
                Ok(seat) => seat,
                Err(_) => {
                    world.destroy_seat(pilot);
                    world.destroy_seat(passenger);
                    return Err(DeployError::SpawnFailed);
                }
            };

        let triple = SeatTriple {
            pilot,
            passenger,
            visible,
        };
        self.configure_seats(world, &triple);
        if let Some(seat) = world.seat_mut(passenger) {
            seat.dismount_positions = DEFAULT_DISMOUNT_POSITIONS.iter().map(|p| offset(*p)).collect();
        }
        self.copy_dismount_positions(world, &triple);

        // The exclusive slot signals other systems not to deploy
        // conflicting attachments here.
        world.set_slot(vehicle, Some(passenger));
        self.mountable_gate.add(vehicle, &mut self.subscriptions);
        self.hooks.notify(HookPoint::AfterSeatDeploy, &hook_event);
        debug!(vehicle = vehicle.0, "seat pair deployed");
        Ok(triple)
    }

    /// Re-applies seat setup to an existing triple; used by startup
    /// reconciliation where the entities persisted but our flags and gate
    /// registrations did not.
    pub(crate) fn refresh_seats(&mut self, world: &mut World, vehicle: EntityId, triple: &SeatTriple) {
        self.configure_seats(world, triple);
        self.copy_dismount_positions(world, triple);
        // The busy flag is derived state; a pilot may have left while
        // nothing was listening, so it is recomputed rather than trusted.
        let pilot_occupied = world
            .seat(triple.pilot)
            .map_or(false, |seat| seat.mounted_by.is_some());
        world.set_seat_busy(triple.passenger, pilot_occupied);
        if world.vehicle(vehicle).map_or(false, |v| v.slot.is_none()) {
            world.set_slot(vehicle, Some(triple.passenger));
        }
        self.mountable_gate.add(vehicle, &mut self.subscriptions);
    }

    fn configure_seats(&self, world: &mut World, triple: &SeatTriple) {
        for seat_id in [triple.pilot, triple.passenger, triple.visible] {
            if let Some(seat) = world.seat_mut(seat_id) {
                seat.persisted = true;
                seat.mobile = true;
                // Leftover mesh collision interferes with mounting.
                seat.mesh_collision_stripped = true;
            }
        }
        // The vehicle is the authoritative health pool; the ingress seat
        // must not absorb damage itself.
        if let Some(seat) = world.seat_mut(triple.passenger) {
            seat.damage_passthrough = true;
        }
    }

    /// Both mountable seats must offer the same physical egress points.
    fn copy_dismount_positions(&self, world: &mut World, triple: &SeatTriple) {
        let positions = world
            .seat(triple.passenger)
            .map(|seat| seat.dismount_positions.clone())
            .unwrap_or_default();
        if let Some(seat) = world.seat_mut(triple.pilot) {
            seat.dismount_positions = positions;
        }
    }

    /// Tears down the triple and clears the exclusive slot. Idempotent
    /// when no seat pair exists.
    pub fn remove_seats(&mut self, world: &mut World, vehicle: EntityId) {
        let Some(triple) = seats_of(world, vehicle) else {
            return;
        };
        for seat in [triple.pilot, triple.passenger, triple.visible] {
            world.destroy_seat(seat);
        }
        world.set_slot(vehicle, None);
        self.mountable_gate.remove(vehicle, &mut self.subscriptions);
        debug!(vehicle = vehicle.0, "seat pair removed");
    }

    /// Damage received by the ingress seat belongs to the vehicle.
    pub(crate) fn on_seat_damaged(
        &mut self,
        world: &mut World,
        seat_id: EntityId,
        amount: f32,
        attacker: Option<PlayerId>,
    ) {
        let Some(seat) = world.seat(seat_id) else {
            return;
        };
        if seat.kind != SeatKind::Passenger || !seat.damage_passthrough {
            return;
        }
        let vehicle = seat.vehicle;
        if world.vehicle(vehicle).is_none() {
            warn!(seat = seat_id.0, "seat damage for vehicle that no longer exists");
            return;
        }
        if let Some(attacker) = attacker {
            debug!(
                vehicle = vehicle.0,
                attacker = attacker.0,
                amount,
                "seat damage forwarded to vehicle"
            );
        }
        world.apply_vehicle_damage(vehicle, amount);
    }
}
