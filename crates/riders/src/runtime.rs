use tracing::info;

use simcore::{HostServices, World};

use crate::{RiderSubsystem, RidersConfig};

/// Owns the world, the external services, and the rider subsystem, and
/// drives them in the order the host would: dismount requests, queued
/// notifications, then the subsystem's scheduling step.
pub struct Runtime {
    world: World,
    services: HostServices,
    riders: RiderSubsystem,
}

impl Runtime {
    pub fn new(config: RidersConfig) -> Self {
        Self::with_services(config, HostServices::default())
    }

    pub fn with_services(config: RidersConfig, services: HostServices) -> Self {
        Self {
            world: World::new(),
            services,
            riders: RiderSubsystem::new(config),
        }
    }

    /// Brings the subsystem up against whatever already exists in the
    /// world, as after a live reload.
    pub fn install(&mut self) {
        info!("installing rider subsystem");
        self.riders.reconcile(&mut self.world, &self.services);
    }

    /// One host frame. Events raised while handling earlier events (seat
    /// swaps chain dismount and mount) are drained in the same frame, in
    /// arrival order.
    pub fn step(&mut self) {
        for player in self.world.player_ids() {
            let wants_out = self.world.player(player).map_or(false, |p| {
                p.connected && p.mounted_on.is_some() && p.input.dismount_pressed
            });
            if wants_out {
                self.world.request_dismount(player);
            }
        }

        self.drain_events();
        self.riders.tick(&mut self.world, &self.services);
        self.drain_events();
    }

    fn drain_events(&mut self) {
        while let Some(event) = self.world.pop_event() {
            self.riders.handle_event(&mut self.world, &self.services, event);
        }
    }

    /// Chat-command entry point; see
    /// [`RiderSubsystem::deploy_seat_command`].
    pub fn deploy_seat_command(&mut self, player: simcore::PlayerId) {
        self.riders
            .deploy_seat_command(&mut self.world, &self.services, player);
    }

    pub fn shutdown(&mut self) {
        info!("shutting down rider subsystem");
        self.riders.unload(&mut self.world);
    }

    pub fn world(&self) -> &World {
        &self.world
    }

    pub fn world_mut(&mut self) -> &mut World {
        &mut self.world
    }

    pub fn services(&self) -> &HostServices {
        &self.services
    }

    pub fn riders(&self) -> &RiderSubsystem {
        &self.riders
    }

    pub fn riders_mut(&mut self) -> &mut RiderSubsystem {
        &mut self.riders
    }
}
