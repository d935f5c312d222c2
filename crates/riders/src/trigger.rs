use nalgebra::Vector3;
use simcore::{Aabb, EntityId, HostServices, Transform, Vec3, World};
use tracing::warn;

// Minimum rider-sized envelope, in world units, regardless of vehicle scale.
pub(crate) const MIN_TRIGGER_EXTENT_X: f32 = 0.75;
pub(crate) const MIN_TRIGGER_EXTENT_Y: f32 = 1.8;
pub(crate) const MIN_TRIGGER_EXTENT_Z: f32 = 0.75;
// Lift above the hull so detection begins at the vehicle surface.
const TRIGGER_BASE_LIFT: f32 = 0.05;

/// Which transform the volume hangs from: the vehicle itself, or the
/// externally-managed root proxy a resized vehicle's visuals use.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VolumeHost {
    Vehicle,
    Root(EntityId),
}

/// Spatial volume that detects riders near a vehicle and parents them to
/// its reference frame. At most one exists per vehicle; switching hosts
/// always recreates it.
#[derive(Debug, Clone, PartialEq)]
pub struct TriggerVolume {
    pub vehicle: EntityId,
    pub host: VolumeHost,
    pub local_offset: Vec3,
    pub half_extents: Vec3,
    pub scale: f32,
    /// Kinematic body: the vehicle's own sweep tests must never collide
    /// with its trigger volume, or it falsely detects obstructions and
    /// loses altitude.
    pub kinematic: bool,
}

impl TriggerVolume {
    /// Builds a volume for `vehicle` hosted on `host` at the given visual
    /// scale. Returns `None` only when the vehicle no longer exists.
    pub fn attach(
        world: &World,
        services: &HostServices,
        vehicle: EntityId,
        host: VolumeHost,
        scale: f32,
    ) -> Option<Self> {
        let bounds = world.vehicle(vehicle)?.half_extents;
        let mut volume = Self {
            vehicle,
            host,
            local_offset: Vector3::zeros(),
            half_extents: Self::clamped_extents(bounds, scale),
            scale,
            kinematic: true,
        };
        volume.reposition(services);
        Some(volume)
    }

    /// In-place rescale; host switches must detach and attach instead.
    pub fn rescale(&mut self, world: &World, services: &HostServices, new_scale: f32) {
        self.scale = new_scale;
        if let Some(vehicle) = world.vehicle(self.vehicle) {
            self.half_extents = Self::clamped_extents(vehicle.half_extents, new_scale);
        }
        self.reposition(services);
    }

    /// World-space half extents: the vehicle's own envelope grows with
    /// scale on the horizontal axes, but no axis ever shrinks below the
    /// rider-sized minimum, so miniaturized vehicles stay enterable.
    fn clamped_extents(vehicle_half_extents: Vec3, scale: f32) -> Vec3 {
        Vector3::new(
            (vehicle_half_extents.x * scale).max(MIN_TRIGGER_EXTENT_X),
            vehicle_half_extents.y.max(MIN_TRIGGER_EXTENT_Y),
            (vehicle_half_extents.z * scale).max(MIN_TRIGGER_EXTENT_Z),
        )
    }

    fn reposition(&mut self, services: &HostServices) {
        let mut child = Transform::at(Vector3::new(0.0, TRIGGER_BASE_LIFT, 0.0));
        if self.host != VolumeHost::Vehicle
            && !services.scale.reparent_relative_transform(self.vehicle, &mut child)
        {
            // Non-fatal: the volume still works, just possibly mispositioned.
            warn!(
                vehicle = self.vehicle.0,
                "unable to position trigger volume relative to resized vehicle"
            );
        }
        // Raise after root-relative positioning so the scaled offset is
        // taken into account; detection starts at the hull, not the centroid.
        self.local_offset =
            child.position + Vector3::new(0.0, MIN_TRIGGER_EXTENT_Y / 2.0, 0.0);
    }

    /// Axis-aligned detection region in world space.
    pub fn world_aabb(&self, world: &World) -> Option<Aabb> {
        let transform = world.vehicle(self.vehicle)?.transform;
        Some(Aabb {
            center: transform.position + transform.rotation * self.local_offset,
            half_extents: self.half_extents,
        })
    }
}
