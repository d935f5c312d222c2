use nalgebra::{UnitQuaternion, Vector3};

pub type Vec3 = Vector3<f32>;
pub type Quat = UnitQuaternion<f32>;

pub fn world_up() -> Vec3 {
    Vector3::y()
}

/// Position plus orientation in world space, Y-up.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Transform {
    pub position: Vec3,
    pub rotation: Quat,
}

impl Default for Transform {
    fn default() -> Self {
        Self::identity()
    }
}

impl Transform {
    pub fn identity() -> Self {
        Self {
            position: Vector3::zeros(),
            rotation: UnitQuaternion::identity(),
        }
    }

    pub fn at(position: Vec3) -> Self {
        Self {
            position,
            rotation: UnitQuaternion::identity(),
        }
    }

    pub fn up(&self) -> Vec3 {
        self.rotation * Vector3::y()
    }

    pub fn forward(&self) -> Vec3 {
        self.rotation * Vector3::z()
    }

    /// Dot product of this transform's up axis against world up.
    /// 1.0 is perfectly upright, 0.0 is sideways, -1.0 is inverted.
    pub fn upright_alignment(&self) -> f32 {
        world_up().dot(&self.up())
    }

    /// Heading angle about the world Y axis, derived from the forward axis
    /// projected onto the ground plane. Falls back to zero when the forward
    /// axis is near-vertical.
    pub fn heading_yaw(&self) -> f32 {
        let forward = self.forward();
        if forward.x.abs() < 1e-6 && forward.z.abs() < 1e-6 {
            return 0.0;
        }
        forward.x.atan2(forward.z)
    }

    /// An upright rotation that keeps only the current heading.
    pub fn yaw_only_rotation(&self) -> Quat {
        UnitQuaternion::from_axis_angle(&Vector3::y_axis(), self.heading_yaw())
    }
}

pub fn rotate_about_y(value: Vec3, yaw_radians: f32) -> Vec3 {
    UnitQuaternion::from_axis_angle(&Vector3::y_axis(), yaw_radians) * value
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Aabb {
    pub center: Vec3,
    pub half_extents: Vec3,
}

impl Aabb {
    pub fn contains(&self, point: Vec3) -> bool {
        let delta = point - self.center;
        delta.x.abs() <= self.half_extents.x
            && delta.y.abs() <= self.half_extents.y
            && delta.z.abs() <= self.half_extents.z
    }
}

/// Slab-method ray cast. Returns the distance along `direction` to the first
/// intersection, or `None` when the ray misses. A ray starting inside the box
/// hits at distance zero.
pub fn ray_aabb_distance(origin: Vec3, direction: Vec3, aabb: &Aabb) -> Option<f32> {
    let mut t_min = 0.0f32;
    let mut t_max = f32::INFINITY;

    for axis in 0..3 {
        let origin_axis = origin[axis] - aabb.center[axis];
        let dir_axis = direction[axis];
        let half = aabb.half_extents[axis];

        if dir_axis.abs() < 1e-8 {
            if origin_axis.abs() > half {
                return None;
            }
            continue;
        }

        let inv = 1.0 / dir_axis;
        let mut t0 = (-half - origin_axis) * inv;
        let mut t1 = (half - origin_axis) * inv;
        if t0 > t1 {
            std::mem::swap(&mut t0, &mut t1);
        }
        t_min = t_min.max(t0);
        t_max = t_max.min(t1);
        if t_min > t_max {
            return None;
        }
    }

    Some(t_min)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f32::consts::FRAC_PI_2;

    fn assert_close(actual: f32, expected: f32) {
        assert!(
            (actual - expected).abs() < 1e-4,
            "expected {expected}, got {actual}"
        );
    }

    #[test]
    fn identity_transform_is_upright() {
        let transform = Transform::identity();
        assert_close(transform.upright_alignment(), 1.0);
        assert_close(transform.heading_yaw(), 0.0);
    }

    #[test]
    fn rolled_transform_loses_upright_alignment() {
        let transform = Transform {
            position: Vector3::zeros(),
            rotation: UnitQuaternion::from_axis_angle(&Vector3::z_axis(), FRAC_PI_2),
        };
        assert_close(transform.upright_alignment(), 0.0);
    }

    #[test]
    fn yaw_only_rotation_discards_roll_and_pitch_but_keeps_heading() {
        let heading = 1.1f32;
        let tilted = UnitQuaternion::from_axis_angle(&Vector3::y_axis(), heading)
            * UnitQuaternion::from_axis_angle(&Vector3::x_axis(), 0.9);
        let transform = Transform {
            position: Vector3::zeros(),
            rotation: tilted,
        };
        let fixed = Transform {
            position: Vector3::zeros(),
            rotation: transform.yaw_only_rotation(),
        };
        assert_close(fixed.upright_alignment(), 1.0);
        assert_close(fixed.heading_yaw(), heading);
    }

    #[test]
    fn rotate_about_y_quarter_turn_maps_forward_to_side() {
        let rotated = rotate_about_y(Vector3::new(0.0, 0.0, 1.0), FRAC_PI_2);
        assert_close(rotated.x, 1.0);
        assert_close(rotated.z, 0.0);
    }

    #[test]
    fn ray_hits_box_ahead_and_misses_box_behind() {
        let aabb = Aabb {
            center: Vector3::new(0.0, 0.0, 5.0),
            half_extents: Vector3::new(1.0, 1.0, 1.0),
        };
        let hit = ray_aabb_distance(Vector3::zeros(), Vector3::new(0.0, 0.0, 1.0), &aabb);
        assert_close(hit.expect("ray should hit"), 4.0);

        let miss = ray_aabb_distance(Vector3::zeros(), Vector3::new(0.0, 0.0, -1.0), &aabb);
        assert!(miss.is_none());
    }

    #[test]
    fn ray_starting_inside_box_hits_at_zero() {
        let aabb = Aabb {
            center: Vector3::zeros(),
            half_extents: Vector3::new(2.0, 2.0, 2.0),
        };
        let hit = ray_aabb_distance(
            Vector3::new(0.5, 0.0, 0.0),
            Vector3::new(1.0, 0.0, 0.0),
            &aabb,
        );
        assert_close(hit.expect("inside ray should hit"), 0.0);
    }
}
