pub mod entity;
pub mod events;
pub mod hooks;
pub mod math;
pub mod schedule;
pub mod services;

pub use entity::{
    EntityId, InputState, Player, PlayerId, Seat, SeatKind, SeatSpawnError, Vehicle, VehicleKind,
    World,
};
pub use events::{ConsoleCommand, EventChannel, HostEvent, SubscriptionSet};
pub use hooks::{HookEvent, HookPoint, HookRegistry, HookVerdict};
pub use math::{
    ray_aabb_distance, rotate_about_y, world_up, Aabb, Quat, Transform, Vec3,
};
pub use schedule::DeferredQueue;
pub use services::{
    CountedInventory, Entitlements, HostServices, Inventory, ItemKind, LogMessenger, Messenger,
    NoEntitlements, NoScaling, Notice, ScaleService, StandardVehiclesOnly, StaticEntitlements,
    VehicleFilter,
};
