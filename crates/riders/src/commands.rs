use tracing::{debug, warn};

use simcore::{HostServices, ItemKind, Notice, PlayerId, World};

use crate::seats::seats_of;
use crate::{RiderSubsystem, CAP_SEAT_DEPLOY, CAP_SEAT_DEPLOY_FREE};

impl RiderSubsystem {
    /// Chat command: deploy a seat pair onto the vehicle the player is
    /// looking at. Every refusal is reported back; the seat item is only
    /// consumed once the deploy has actually succeeded.
    pub fn deploy_seat_command(
        &mut self,
        world: &mut World,
        services: &HostServices,
        player: PlayerId,
    ) {
        if !services.entitlements.has_capability(player, CAP_SEAT_DEPLOY) {
            services.messenger.reply(player, Notice::ErrorNoPermission);
            return;
        }

        let target = world
            .look_target(player, self.config.deploy_reach)
            .filter(|vehicle| services.filter.is_eligible(world, *vehicle));
        let Some(vehicle) = target else {
            services.messenger.reply(player, Notice::ErrorNoVehicleFound);
            return;
        };

        if seats_of(world, vehicle).is_some() {
            services.messenger.reply(player, Notice::ErrorAlreadyHasSeat);
            return;
        }
        if world.vehicle(vehicle).map_or(false, |v| v.slot.is_some()) {
            services
                .messenger
                .reply(player, Notice::ErrorIncompatibleAttachment);
            return;
        }

        let free = services
            .entitlements
            .has_capability(player, CAP_SEAT_DEPLOY_FREE);
        if !free && !services.inventory.has_item(player, ItemKind::Chair) {
            services.messenger.reply(player, Notice::ErrorNoSeatItem);
            return;
        }

        match self.deploy_seats(world, services, vehicle, Some(player)) {
            Ok(_) => {
                if !free && !services.inventory.take_item(player, ItemKind::Chair, 1) {
                    // Checked above; a racing consumer is tolerable, the
                    // deploy stands.
                    warn!(player = player.0, "seat item vanished before it was consumed");
                }
                debug!(player = player.0, vehicle = vehicle.0, "seat deployed by command");
            }
            Err(error) => {
                warn!(player = player.0, vehicle = vehicle.0, %error, "seat deploy failed");
                services.messenger.reply(player, Notice::ErrorDeployFailed);
            }
        }
    }
}
