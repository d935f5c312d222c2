use std::path::Path;

use nalgebra::Vector3;
use tracing::info;
use tracing_subscriber::EnvFilter;

use riders::{
    RidersConfig, Runtime, CAP_RIDABLE, CAP_SEAT_DEPLOY_FREE, CAP_SEAT_PILOT,
};
use simcore::{
    ConsoleCommand, HostServices, StaticEntitlements, Transform, VehicleKind,
};

const CONFIG_PATH: &str = "riders.json";

/// Scripted walkthrough of the subsystem: a ridable vehicle, a hitching
/// rider, a seat deploy, a seat swap, and a dismount.
fn main() {
    init_tracing();

    let config = RidersConfig::load_or_default(Path::new(CONFIG_PATH));
    info!(?config, "starting rider demo");

    let mut entitlements = StaticEntitlements::new();
    let pilot_id = 0;
    entitlements.grant(simcore::PlayerId(pilot_id), CAP_RIDABLE);
    entitlements.grant(simcore::PlayerId(pilot_id), CAP_SEAT_DEPLOY_FREE);
    entitlements.grant(simcore::PlayerId(pilot_id), CAP_SEAT_PILOT);
    let mut services = HostServices::default();
    services.entitlements = Box::new(entitlements);

    let mut runtime = Runtime::with_services(config, services);
    runtime.install();

    let pilot = runtime.world_mut().spawn_player(Vector3::zeros());
    let hitcher = runtime.world_mut().spawn_player(Vector3::new(0.2, 0.0, 0.2));
    let vehicle = runtime.world_mut().spawn_vehicle(
        Transform::at(Vector3::new(0.0, 1.5, 2.0)),
        Vector3::new(0.4, 0.1, 0.4),
        Some(pilot),
        VehicleKind::Standard,
    );
    runtime.step();
    info!(
        volume = runtime.riders().volume(vehicle).is_some(),
        "vehicle spawned and checked"
    );

    // Seat deploy via the chat command; the free capability skips the item.
    if let Some(player) = runtime.world_mut().player_mut(pilot) {
        player.position = Vector3::new(0.0, 0.0, 0.5);
    }
    runtime.deploy_seat_command(pilot);
    runtime.step();

    // Board through the passenger seat; the pilot capability redirects the
    // player to the front seat.
    if let Some(triple) = riders::seats_of(runtime.world(), vehicle) {
        runtime.world_mut().mount(pilot, triple.passenger);
    }
    runtime.step();
    if let Some(session) = runtime.riders().session(pilot) {
        info!(role = ?session.role, controlling = session.controlling, "pilot seated");
    }

    // Fly a little.
    runtime
        .world_mut()
        .set_player_input(pilot, Vector3::new(0.0, 1.0, 1.0), false);
    runtime.step();

    // Swap to the back seat and back to the front.
    runtime.world_mut().issue_command(pilot, ConsoleCommand::SwapSeats);
    runtime.step();
    runtime.world_mut().issue_command(pilot, ConsoleCommand::SwapSeats);
    runtime.step();

    // Walk away: the dismount ends the session, the hitcher unparents once
    // the vehicle leaves them behind.
    runtime
        .world_mut()
        .set_player_input(pilot, Vector3::zeros(), true);
    runtime.step();
    info!(
        sessions = runtime.riders().session_count(),
        hitcher_parented = runtime
            .world()
            .player(hitcher)
            .and_then(|p| p.parent)
            .is_some(),
        "after dismount"
    );

    runtime.shutdown();
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_names(true)
        .compact()
        .init();
}
