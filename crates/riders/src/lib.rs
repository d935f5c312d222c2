use std::collections::HashMap;

use rand::Rng;
use tracing::{debug, info, warn};

use simcore::{
    ConsoleCommand, DeferredQueue, EntityId, EventChannel, HookEvent, HookPoint, HookRegistry,
    HookVerdict, HostEvent, HostServices, Notice, PlayerId, SubscriptionSet, World,
};

pub mod commands;
pub mod config;
pub mod control;
pub mod gate;
pub mod recovery;
pub mod resize;
pub mod runtime;
pub mod seats;
pub mod trigger;


pub use config::RidersConfig;
pub use control::{ControlSession, SeatRole};
pub use runtime::Runtime;
pub use seats::{seats_of, DeployError, SeatTriple};
pub use trigger::{TriggerVolume, VolumeHost};

use gate::HookGate;
use recovery::DismountRecovery;

pub const CAP_RIDABLE: &str = "riders.ridable";
pub const CAP_SEAT_DEPLOY: &str = "riders.seat.deploy";
pub const CAP_SEAT_DEPLOY_FREE: &str = "riders.seat.deploy.free";
pub const CAP_SEAT_AUTODEPLOY: &str = "riders.seat.autodeploy";
pub const CAP_SEAT_PILOT: &str = "riders.seat.pilot";

// A vehicle tilted past this alignment refuses new volume entries; an
// inverted view while parenting causes camera glitches.
pub(crate) const MIN_UPRIGHT_ALIGNMENT_FOR_ENTRY: f32 = 0.8;
// Below this alignment a failed dismount triggers the upright reset.
pub(crate) const MAX_UPRIGHT_ALIGNMENT_FOR_FLIP: f32 = 0.1;

const RIDABLE_CHANNELS: &[EventChannel] = &[EventChannel::VolumeProximity];
const MOUNTABLE_CHANNELS: &[EventChannel] = &[
    EventChannel::SeatDamage,
    EventChannel::Mounted,
    EventChannel::Dismounted,
];
const MOUNTED_CHANNELS: &[EventChannel] = &[EventChannel::Command];

/// Work items deferred to the next scheduling step. Each names its targets
/// by id and re-validates them when applied; the entities may be gone.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) enum DeferredAction {
    /// Post-spawn eligibility checks, delayed so other subsystems get a
    /// chance to claim the vehicle first.
    SpawnChecks { vehicle: EntityId },
    /// Deploy-command tip for a player who just placed a vehicle.
    DeployTip { vehicle: EntityId, builder: PlayerId },
    /// Second half of scaling back to default size: the volume returns
    /// from the root proxy to the vehicle once the transition settles.
    RehostVolumeOnVehicle { vehicle: EntityId },
    /// Generation-tagged teardown; a remount bumps the generation first,
    /// which turns the stale destroy into a no-op.
    DestroySession { player: PlayerId, generation: u64 },
    DestroyRecovery { player: PlayerId, generation: u64 },
}

/// The rider/pilot subsystem: owns every piece of bookkeeping layered onto
/// the host's vehicles and players, in side tables keyed by id. One
/// instance exists per host; all entry points take the world and services
/// explicitly.
pub struct RiderSubsystem {
    pub(crate) config: RidersConfig,
    pub(crate) subscriptions: SubscriptionSet,
    pub(crate) hooks: HookRegistry,
    /// Vehicles with a trigger volume; gates the proximity scan.
    pub(crate) ridable_gate: HookGate,
    /// Vehicles with a seat pair; gates damage/mount/dismount handling.
    pub(crate) mountable_gate: HookGate,
    /// Vehicles with an active control session; gates command interception.
    pub(crate) mounted_gate: HookGate,
    pub(crate) volumes: HashMap<EntityId, TriggerVolume>,
    pub(crate) sessions: HashMap<PlayerId, ControlSession>,
    pub(crate) recovery: HashMap<PlayerId, DismountRecovery>,
    pub(crate) deferred: DeferredQueue<DeferredAction>,
}

impl RiderSubsystem {
    pub fn new(config: RidersConfig) -> Self {
        Self {
            config,
            subscriptions: SubscriptionSet::new(),
            hooks: HookRegistry::new(),
            ridable_gate: HookGate::new(RIDABLE_CHANNELS),
            mountable_gate: HookGate::new(MOUNTABLE_CHANNELS),
            mounted_gate: HookGate::new(MOUNTED_CHANNELS),
            volumes: HashMap::new(),
            sessions: HashMap::new(),
            recovery: HashMap::new(),
            deferred: DeferredQueue::new(),
        }
    }

    pub fn hooks_mut(&mut self) -> &mut HookRegistry {
        &mut self.hooks
    }

    pub fn subscriptions(&self) -> &SubscriptionSet {
        &self.subscriptions
    }

    pub fn volume(&self, vehicle: EntityId) -> Option<&TriggerVolume> {
        self.volumes.get(&vehicle)
    }

    pub fn session(&self, player: PlayerId) -> Option<&ControlSession> {
        self.sessions.get(&player)
    }

    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }

    /// Routes one host notification. Gated channels are skipped wholesale
    /// while unsubscribed; this mirrors the dynamic hook pattern and must
    /// not change observable behavior for any single entity.
    pub fn handle_event(&mut self, world: &mut World, services: &HostServices, event: HostEvent) {
        match event {
            HostEvent::VehicleSpawned { vehicle } => {
                self.on_vehicle_spawned(world, services, vehicle);
            }
            HostEvent::VehicleBuilt { vehicle, builder } => {
                self.deferred.push(DeferredAction::DeployTip { vehicle, builder });
            }
            HostEvent::VehicleDestroyed { vehicle } => {
                self.on_vehicle_destroyed(world, vehicle);
            }
            HostEvent::SeatDamaged {
                seat,
                amount,
                attacker,
            } => {
                if self.subscriptions.is_subscribed(EventChannel::SeatDamage) {
                    self.on_seat_damaged(world, seat, amount, attacker);
                }
            }
            HostEvent::PlayerMounted { player, seat } => {
                if self.subscriptions.is_subscribed(EventChannel::Mounted) {
                    self.on_player_mounted(world, services, player, seat);
                }
            }
            HostEvent::PlayerDismounted { player, seat } => {
                if self.subscriptions.is_subscribed(EventChannel::Dismounted) {
                    self.on_player_dismounted(world, player, seat);
                }
            }
            HostEvent::PlayerDisconnected { player } => {
                self.on_player_disconnected(world, player);
            }
            HostEvent::Command { player, command } => {
                if self.subscriptions.is_subscribed(EventChannel::Command) {
                    match command {
                        ConsoleCommand::SwapSeats => self.swap_seats(world, services, player),
                    }
                }
            }
            HostEvent::ScaleBegin {
                vehicle,
                old_scale,
                new_scale,
            } => {
                self.on_scale_begin(world, services, vehicle, old_scale, new_scale);
            }
        }
    }

    /// One scheduling step: deferred work first, then the proximity scan,
    /// input routing, and the dismount-recovery valve.
    pub fn tick(&mut self, world: &mut World, services: &HostServices) {
        self.deferred.begin_tick();
        for action in self.deferred.drain_ready() {
            self.apply_deferred(world, services, action);
        }
        if self
            .subscriptions
            .is_subscribed(EventChannel::VolumeProximity)
        {
            self.proximity_scan(world);
        }
        self.route_control_inputs(world);
        self.recovery_valve(world);
    }

    fn on_vehicle_spawned(&mut self, world: &World, services: &HostServices, vehicle: EntityId) {
        if !services.filter.is_eligible(world, vehicle) {
            return;
        }
        // Deferred so other subsystems get a scheduling step to claim the
        // vehicle before we attach anything.
        self.deferred.push(DeferredAction::SpawnChecks { vehicle });
    }

    fn on_vehicle_destroyed(&mut self, world: &mut World, vehicle: EntityId) {
        // Teardown order: sessions, then trigger/seat bookkeeping, then
        // gate refcounts.
        let riders: Vec<PlayerId> = self
            .sessions
            .iter()
            .filter(|(_, session)| session.vehicle == vehicle)
            .map(|(player, _)| *player)
            .collect();
        for player in riders {
            self.destroy_session_now(world, player);
        }
        self.recovery.retain(|_, record| record.vehicle != vehicle);
        self.volumes.remove(&vehicle);
        self.ridable_gate.remove(vehicle, &mut self.subscriptions);
        self.mountable_gate.remove(vehicle, &mut self.subscriptions);
        self.mounted_gate.remove(vehicle, &mut self.subscriptions);
    }

    fn on_player_disconnected(&mut self, world: &mut World, player: PlayerId) {
        // The host unseats a disconnecting player without a dismount
        // notification, so a vacating pilot releases the ingress seat here.
        if let Some(session) = self.sessions.get(&player) {
            if session.role == SeatRole::Pilot {
                if let Some(triple) = seats_of(world, session.vehicle) {
                    world.set_seat_busy(triple.passenger, false);
                }
            }
        }
        self.destroy_session_now(world, player);
        self.recovery.remove(&player);
    }

    fn apply_deferred(&mut self, world: &mut World, services: &HostServices, action: DeferredAction) {
        match action {
            DeferredAction::SpawnChecks { vehicle } => {
                if world.vehicle(vehicle).is_none()
                    || !services.filter.is_eligible(world, vehicle)
                {
                    return;
                }
                self.maybe_create_trigger(world, services, vehicle);
                self.maybe_auto_deploy_seats(world, services, vehicle);
            }
            DeferredAction::DeployTip { vehicle, builder } => {
                self.maybe_send_deploy_tip(world, services, vehicle, builder);
            }
            DeferredAction::RehostVolumeOnVehicle { vehicle } => {
                self.finish_rehost_on_vehicle(world, services, vehicle);
            }
            DeferredAction::DestroySession { player, generation } => {
                self.apply_deferred_session_destroy(world, player, generation);
            }
            DeferredAction::DestroyRecovery { player, generation } => {
                self.apply_deferred_recovery_destroy(player, generation);
            }
        }
    }

    pub(crate) fn maybe_create_trigger(
        &mut self,
        world: &World,
        services: &HostServices,
        vehicle: EntityId,
    ) {
        if self.volumes.contains_key(&vehicle) {
            return;
        }
        let Some(owner) = world.vehicle(vehicle).and_then(|v| v.owner) else {
            return;
        };
        if !services.entitlements.has_capability(owner, CAP_RIDABLE) {
            return;
        }
        let hook_event = HookEvent::for_vehicle(vehicle);
        if self.hooks.evaluate(HookPoint::BeforeVolumeCreate, &hook_event) == HookVerdict::Deny {
            return;
        }
        let scale = services.scale.scale_of(vehicle);
        let host = match services.scale.root_entity(vehicle) {
            Some(root) => VolumeHost::Root(root),
            None => VolumeHost::Vehicle,
        };
        let Some(volume) = TriggerVolume::attach(world, services, vehicle, host, scale) else {
            return;
        };
        self.volumes.insert(vehicle, volume);
        self.ridable_gate.add(vehicle, &mut self.subscriptions);
        self.hooks.notify(HookPoint::AfterVolumeCreate, &hook_event);
        debug!(vehicle = vehicle.0, "trigger volume created");
    }

    pub(crate) fn maybe_auto_deploy_seats(
        &mut self,
        world: &mut World,
        services: &HostServices,
        vehicle: EntityId,
    ) {
        let Some(state) = world.vehicle(vehicle) else {
            return;
        };
        let Some(owner) = state.owner else {
            return;
        };
        if state.slot.is_some()
            || !services
                .entitlements
                .has_capability(owner, CAP_SEAT_AUTODEPLOY)
        {
            return;
        }
        if let Err(error) = self.deploy_seats(world, services, vehicle, None) {
            warn!(vehicle = vehicle.0, %error, "auto seat deploy failed");
        }
    }

    fn maybe_send_deploy_tip(
        &mut self,
        world: &World,
        services: &HostServices,
        vehicle: EntityId,
        builder: PlayerId,
    ) {
        let Some(state) = world.vehicle(vehicle) else {
            return;
        };
        // Another subsystem may have claimed the slot during the deferral.
        if state.slot.is_some() {
            return;
        }
        let entitlements = &services.entitlements;
        if !entitlements.has_capability(builder, CAP_SEAT_DEPLOY)
            || entitlements.has_capability(builder, CAP_SEAT_AUTODEPLOY)
        {
            return;
        }
        if rand::thread_rng().gen_range(0..100) < u32::from(self.config.tip_chance) {
            services.messenger.reply(builder, Notice::TipDeployCommand);
        }
    }

    /// Continuous rider detection, run only while at least one vehicle has
    /// a volume. Entry is refused (not queued) while the vehicle is tilted
    /// past the alignment threshold; players already parented are left
    /// alone. Vehicles are never candidates, which rules out recursive
    /// parenting.
    fn proximity_scan(&mut self, world: &mut World) {
        let regions: Vec<(EntityId, simcore::Aabb, f32)> = self
            .volumes
            .iter()
            .filter_map(|(vehicle, volume)| {
                let aabb = volume.world_aabb(world)?;
                let alignment = world.vehicle(*vehicle)?.transform.upright_alignment();
                Some((*vehicle, aabb, alignment))
            })
            .collect();

        for player_id in world.player_ids() {
            let Some(player) = world.player(player_id) else {
                continue;
            };
            let (connected, parent, mounted, position) = (
                player.connected,
                player.parent,
                player.mounted_on,
                player.position,
            );
            if !connected {
                continue;
            }
            if let Some(parent_vehicle) = parent {
                let still_inside = regions
                    .iter()
                    .any(|(vehicle, aabb, _)| *vehicle == parent_vehicle && aabb.contains(position));
                if !still_inside {
                    world.set_player_parent(player_id, None);
                }
                continue;
            }
            if mounted.is_some() {
                continue;
            }
            for (vehicle, aabb, alignment) in &regions {
                if !aabb.contains(position) {
                    continue;
                }
                if *alignment < MIN_UPRIGHT_ALIGNMENT_FOR_ENTRY {
                    continue;
                }
                world.set_player_parent(player_id, Some(*vehicle));
                break;
            }
        }
    }

    /// Startup pass over pre-existing entities: rebuild volumes, seat
    /// registrations, recovery records, and control sessions from live
    /// host state. Safe to run repeatedly.
    pub fn reconcile(&mut self, world: &mut World, services: &HostServices) {
        for vehicle in world.vehicle_ids() {
            if !services.filter.is_eligible(world, vehicle) {
                continue;
            }
            self.maybe_create_trigger(world, services, vehicle);
            if let Some(triple) = seats_of(world, vehicle) {
                self.refresh_seats(world, vehicle, &triple);
            } else {
                self.maybe_auto_deploy_seats(world, services, vehicle);
            }
        }

        for player in world.player_ids() {
            let Some(seat_id) = world.player(player).and_then(|p| p.mounted_on) else {
                continue;
            };
            let Some(vehicle) = world.seat(seat_id).map(|seat| seat.vehicle) else {
                continue;
            };
            let Some(triple) = seats_of(world, vehicle) else {
                continue;
            };
            let role = if seat_id == triple.pilot {
                SeatRole::Pilot
            } else if seat_id == triple.passenger {
                SeatRole::Passenger
            } else {
                continue;
            };
            self.recovery_bind(player, vehicle);
            if role == SeatRole::Pilot {
                world.set_seat_busy(triple.passenger, true);
            }
            let can_pilot = services.entitlements.has_capability(player, CAP_SEAT_PILOT);
            self.session_bind(world, player, vehicle, role, can_pilot);
        }
        info!(
            volumes = self.volumes.len(),
            sessions = self.sessions.len(),
            "rider subsystem reconciled"
        );
    }

    /// Synchronous teardown of all subsystem bookkeeping. Seats persist as
    /// host entities; everything layered on top is released here so a
    /// reload starts from a clean slate.
    pub fn unload(&mut self, world: &mut World) {
        let riders: Vec<PlayerId> = self.sessions.keys().copied().collect();
        for player in riders {
            self.destroy_session_now(world, player);
        }
        self.recovery.clear();

        let parented_vehicles: Vec<EntityId> = self.volumes.keys().copied().collect();
        for player in world.player_ids() {
            let parent = world.player(player).and_then(|p| p.parent);
            if let Some(parent) = parent {
                if parented_vehicles.contains(&parent) {
                    world.set_player_parent(player, None);
                }
            }
        }
        self.volumes.clear();

        self.ridable_gate.clear(&mut self.subscriptions);
        self.mountable_gate.clear(&mut self.subscriptions);
        self.mounted_gate.clear(&mut self.subscriptions);
        self.deferred.clear();
        info!("rider subsystem unloaded");
    }
}
