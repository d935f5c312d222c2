use tracing::{debug, warn};

use simcore::{EntityId, HostServices, World};

use crate::trigger::{TriggerVolume, VolumeHost};
use crate::{DeferredAction, RiderSubsystem};

impl RiderSubsystem {
    /// A visual resize is starting. Volumes hosted on the vehicle itself
    /// cannot survive a departure from default size: resized vehicles hand
    /// their visuals to a root proxy, so the volume moves with them. The
    /// return trip is deferred because the proxy is dismantled after this
    /// notification, not during it.
    pub(crate) fn on_scale_begin(
        &mut self,
        world: &World,
        services: &HostServices,
        vehicle: EntityId,
        old_scale: f32,
        new_scale: f32,
    ) {
        if !self.volumes.contains_key(&vehicle) {
            return;
        }

        if old_scale == 1.0 && new_scale != 1.0 {
            let Some(root) = services.scale.root_entity(vehicle) else {
                warn!(vehicle = vehicle.0, "resize began without a root proxy");
                return;
            };
            // Host switches recreate the volume rather than mutate it.
            self.volumes.remove(&vehicle);
            if let Some(volume) =
                TriggerVolume::attach(world, services, vehicle, VolumeHost::Root(root), new_scale)
            {
                self.volumes.insert(vehicle, volume);
                debug!(vehicle = vehicle.0, new_scale, "trigger volume moved to root proxy");
            }
            return;
        }

        if new_scale == 1.0 {
            let root_hosted = self
                .volumes
                .get(&vehicle)
                .map_or(false, |volume| volume.host != VolumeHost::Vehicle);
            if root_hosted {
                self.volumes.remove(&vehicle);
                self.deferred
                    .push(DeferredAction::RehostVolumeOnVehicle { vehicle });
            }
            return;
        }

        // Scaling between two non-default sizes keeps the same host.
        if let Some(mut volume) = self.volumes.remove(&vehicle) {
            volume.rescale(world, services, new_scale);
            self.volumes.insert(vehicle, volume);
        }
    }

    /// Deferred completion of a scale-back-to-default: reattach the volume
    /// to the vehicle once the root proxy is gone. The gate entry survived
    /// the whole round trip, so detection gaps last at most one step.
    pub(crate) fn finish_rehost_on_vehicle(
        &mut self,
        world: &World,
        services: &HostServices,
        vehicle: EntityId,
    ) {
        if world.vehicle(vehicle).is_none() || self.volumes.contains_key(&vehicle) {
            return;
        }
        if let Some(volume) =
            TriggerVolume::attach(world, services, vehicle, VolumeHost::Vehicle, 1.0)
        {
            self.volumes.insert(vehicle, volume);
            debug!(vehicle = vehicle.0, "trigger volume rehosted on vehicle");
        }
    }
}
