use std::cell::RefCell;
use std::collections::{HashMap, HashSet};

use tracing::debug;

use crate::entity::{EntityId, PlayerId, VehicleKind, World};
use crate::math::Transform;

/// Consumables the subsystem may require from a player's inventory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ItemKind {
    Chair,
}

/// User-facing reply keys. Rendering and localization belong to the host's
/// chat layer; the core only names the message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Notice {
    TipDeployCommand,
    ErrorNoPermission,
    ErrorNoVehicleFound,
    ErrorNoSeatItem,
    ErrorAlreadyHasSeat,
    ErrorIncompatibleAttachment,
    ErrorDeployFailed,
}

pub trait Entitlements {
    fn has_capability(&self, player: PlayerId, capability: &str) -> bool;
}

/// Grants nothing.
#[derive(Debug, Default)]
pub struct NoEntitlements;

impl Entitlements for NoEntitlements {
    fn has_capability(&self, _player: PlayerId, _capability: &str) -> bool {
        false
    }
}

/// Explicit grant table, the usual choice for tests and the demo binary.
#[derive(Debug, Default)]
pub struct StaticEntitlements {
    grants: HashSet<(PlayerId, String)>,
}

impl StaticEntitlements {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn grant(&mut self, player: PlayerId, capability: &str) {
        self.grants.insert((player, capability.to_string()));
    }

    pub fn revoke(&mut self, player: PlayerId, capability: &str) {
        self.grants.remove(&(player, capability.to_string()));
    }
}

impl Entitlements for StaticEntitlements {
    fn has_capability(&self, player: PlayerId, capability: &str) -> bool {
        self.grants.contains(&(player, capability.to_string()))
    }
}

/// External scaling service. All methods are best-effort; the defaults
/// describe a world where nothing is ever resized.
pub trait ScaleService {
    fn scale_of(&self, _vehicle: EntityId) -> f32 {
        1.0
    }

    /// The externally-managed root proxy a resized vehicle's visuals hang
    /// from, when one exists.
    fn root_entity(&self, _vehicle: EntityId) -> Option<EntityId> {
        None
    }

    /// Repositions `child` relative to the vehicle across the root proxy
    /// indirection. `false` means the caller should keep going with
    /// degraded positioning.
    fn reparent_relative_transform(&self, _vehicle: EntityId, _child: &mut Transform) -> bool {
        false
    }
}

#[derive(Debug, Default)]
pub struct NoScaling;

impl ScaleService for NoScaling {}

/// External veto over which vehicle subtypes may receive rider support.
pub trait VehicleFilter {
    fn is_eligible(&self, world: &World, vehicle: EntityId) -> bool;
}

/// Default policy: anything except autonomous delivery vehicles.
#[derive(Debug, Default)]
pub struct StandardVehiclesOnly;

impl VehicleFilter for StandardVehiclesOnly {
    fn is_eligible(&self, world: &World, vehicle: EntityId) -> bool {
        world
            .vehicle(vehicle)
            .map_or(false, |v| v.kind != VehicleKind::Delivery)
    }
}

pub trait Inventory {
    fn has_item(&self, player: PlayerId, item: ItemKind) -> bool;
    /// Removes `count` items; returns false (taking nothing) when the player
    /// holds fewer.
    fn take_item(&self, player: PlayerId, item: ItemKind, count: u32) -> bool;
}

/// Simple counted inventory. Interior mutability keeps the trait object
/// usable behind a shared reference on the single-threaded host.
#[derive(Debug, Default)]
pub struct CountedInventory {
    counts: RefCell<HashMap<(PlayerId, ItemKind), u32>>,
}

impl CountedInventory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn give(&self, player: PlayerId, item: ItemKind, count: u32) {
        *self.counts.borrow_mut().entry((player, item)).or_insert(0) += count;
    }

    pub fn count(&self, player: PlayerId, item: ItemKind) -> u32 {
        self.counts
            .borrow()
            .get(&(player, item))
            .copied()
            .unwrap_or(0)
    }
}

impl Inventory for CountedInventory {
    fn has_item(&self, player: PlayerId, item: ItemKind) -> bool {
        self.count(player, item) > 0
    }

    fn take_item(&self, player: PlayerId, item: ItemKind, count: u32) -> bool {
        let mut counts = self.counts.borrow_mut();
        let Some(held) = counts.get_mut(&(player, item)) else {
            return false;
        };
        if *held < count {
            return false;
        }
        *held -= count;
        true
    }
}

pub trait Messenger {
    fn reply(&self, player: PlayerId, notice: Notice);
}

/// Default messenger: log and move on. The real chat pipeline is external.
#[derive(Debug, Default)]
pub struct LogMessenger;

impl Messenger for LogMessenger {
    fn reply(&self, player: PlayerId, notice: Notice) {
        debug!(player = player.0, ?notice, "notice");
    }
}

/// The external collaborators the subsystem consults, bundled so entry
/// points take one context argument.
pub struct HostServices {
    pub entitlements: Box<dyn Entitlements>,
    pub scale: Box<dyn ScaleService>,
    pub filter: Box<dyn VehicleFilter>,
    pub inventory: Box<dyn Inventory>,
    pub messenger: Box<dyn Messenger>,
}

impl Default for HostServices {
    fn default() -> Self {
        Self {
            entitlements: Box::new(NoEntitlements),
            scale: Box::new(NoScaling),
            filter: Box::new(StandardVehiclesOnly),
            inventory: Box::new(CountedInventory::new()),
            messenger: Box::new(LogMessenger),
        }
    }
}
