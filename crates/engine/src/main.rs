//! Warpgate Engine - demo entry point.
//!
//! Builds an in-memory overworld, nether and end, wires the teleport pipeline
//! and runs a scripted set of teleports so every outcome shows up in the log.

use std::sync::Arc;
use std::time::Duration;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use warpgate_domain::{
    ActorId, ActorRef, BlockPos, DimensionKind, Occupancy, PortalKind, PortalLinkTable, Position,
    TeleportCause, TeleportDecision, TeleportRequest, WorldId, WorldProfile, END_PLATFORM,
};
use warpgate_engine::infrastructure::{
    app_settings::TeleportSettings, clock::SystemClock, memory_snapshots::MemorySnapshotStore,
    memory_world::MemoryWorld, static_policy::StaticPolicy, world_context::WorldContext,
};
use warpgate_engine::App;

struct DemoWorlds {
    overworld: WorldId,
    nether: WorldId,
    end: WorldId,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment from repo root (the binary may run from `crates/engine`).
    load_dotenv_from_repo_root();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "warpgate_engine=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting Warpgate Engine demo");

    let settings = TeleportSettings::from_env();
    settings.validate()?;

    let worlds = DemoWorlds {
        overworld: WorldId::new(),
        nether: WorldId::new(),
        end: WorldId::new(),
    };
    let steve = ActorRef::player(ActorId::new());
    let zombie = ActorRef::entity(ActorId::new());
    let host = build_host(&worlds, steve, zombie)?;

    let (world, thread) = WorldContext::spawn(Box::new(host))?;
    tracing::info!("World context running");

    let links = PortalLinkTable::new()
        .link_nether(worlds.overworld, worlds.nether)?
        .link_end(worlds.overworld, worlds.end, END_PLATFORM)?;
    let policy = StaticPolicy::allow_all().players_only(worlds.end);

    let app = App::new(
        world.clone(),
        Arc::new(policy),
        Arc::new(MemorySnapshotStore::new()),
        Arc::new(SystemClock::new()),
        links,
        settings.clone(),
    );
    let teleport = &app.use_cases.teleport;
    let cooldown = Duration::from_secs(app.settings.cooldown_secs);

    let safe_spot = Position::centered_on(worlds.overworld, BlockPos::new(20, 64, 20));
    report(
        "command to open ground",
        teleport
            .teleport(TeleportRequest::new(steve, safe_spot, TeleportCause::Command))
            .await,
    );
    report(
        "second command right away",
        teleport
            .teleport(TeleportRequest::new(steve, safe_spot, TeleportCause::Command))
            .await,
    );
    tokio::time::sleep(cooldown).await;

    let lava = Position::centered_on(worlds.overworld, BlockPos::new(11, 64, 11));
    tracing::info!(can_teleport = teleport.can_teleport(steve, lava).await, "Pre-check for lava pool");
    report(
        "command into lava pool",
        teleport
            .teleport(TeleportRequest::new(steve, lava, TeleportCause::Command))
            .await,
    );
    tokio::time::sleep(cooldown).await;

    let portal = Position::new(worlds.overworld, 40.3, 64.0, -24.8)?;
    tracing::info!(destination = ?teleport.nether_destination(steve, &portal), "Nether portal preview");
    let in_nether = teleport
        .teleport_through_portal(steve, PortalKind::Nether, portal)
        .await;
    report("nether portal", in_nether.clone());
    tokio::time::sleep(cooldown).await;

    if let Some(here) = in_nether.approved_position() {
        report(
            "end portal inside the nether",
            teleport
                .teleport_through_portal(steve, PortalKind::End, *here)
                .await,
        );
        report(
            "nether portal back",
            teleport
                .teleport_through_portal(steve, PortalKind::Nether, *here)
                .await,
        );
        tokio::time::sleep(cooldown).await;
    }

    let gate_spot = Position::centered_on(worlds.overworld, BlockPos::new(0, 64, 0));
    report(
        "zombie at the end portal",
        teleport
            .teleport_through_portal(zombie, PortalKind::End, gate_spot)
            .await,
    );
    report(
        "end portal",
        teleport
            .teleport_through_portal(steve, PortalKind::End, gate_spot)
            .await,
    );

    let drifting = Position::new(worlds.overworld, -30.2, 90.0, 5.7)?;
    teleport.teleport_player(zombie, drifting);
    tokio::time::sleep(Duration::from_millis(200)).await;
    let zombie_id = zombie.id;
    let zombie_at = world.run(move |host| host.location(zombie_id)).await?;
    tracing::info!(position = ?zombie_at, "Zombie after background teleport");

    let found = teleport.find_safe(drifting).await;
    tracing::info!(origin = %drifting, found = %found, "find_safe");
    let spawn = teleport.spawn_location(steve.id, worlds.overworld).await?;
    tracing::info!(spawn = %spawn, "Steve's overworld spawn");

    world.shutdown();
    let joined = tokio::task::spawn_blocking(move || thread.join()).await?;
    tracing::info!(host_returned = joined.is_some(), "World context stopped");
    Ok(())
}

fn build_host(worlds: &DemoWorlds, steve: ActorRef, zombie: ActorRef) -> anyhow::Result<MemoryWorld> {
    let overworld_spawn = Position::centered_on(worlds.overworld, BlockPos::new(0, 64, 0));
    let nether_spawn = Position::centered_on(worlds.nether, BlockPos::new(0, 32, 0));
    let end_spawn = Position::centered_on(worlds.end, END_PLATFORM);

    let host = MemoryWorld::new()
        .with_world(WorldProfile::new(
            "world",
            DimensionKind::Overworld,
            overworld_spawn,
            -64,
            320,
        )?)
        .with_world(WorldProfile::new(
            "world_nether",
            DimensionKind::Nether,
            nether_spawn,
            0,
            128,
        )?)
        .with_world(
            WorldProfile::new("world_the_end", DimensionKind::End, end_spawn, 0, 256)?
                .with_respect_beds(false),
        )
        // Overworld ground with a lava pool.
        .with_fill(
            worlds.overworld,
            BlockPos::new(-64, 63, -64),
            BlockPos::new(64, 63, 64),
            Occupancy::SOLID,
        )
        .with_fill(
            worlds.overworld,
            BlockPos::new(10, 63, 10),
            BlockPos::new(12, 63, 12),
            Occupancy::HAZARD,
        )
        // Nether cavern floor well below portal height.
        .with_fill(
            worlds.nether,
            BlockPos::new(-16, 31, -16),
            BlockPos::new(16, 31, 16),
            Occupancy::SOLID,
        )
        .with_fill(
            worlds.end,
            END_PLATFORM.offset(-2, -1, -2),
            END_PLATFORM.offset(2, -1, 2),
            Occupancy::SOLID,
        )
        .with_actor(steve.id, overworld_spawn)
        .with_actor(
            zombie.id,
            Position::centered_on(worlds.overworld, BlockPos::new(-20, 64, -20)),
        )
        .with_bed(
            steve.id,
            Position::centered_on(worlds.overworld, BlockPos::new(-5, 64, 3)),
        );
    Ok(host)
}

fn report(step: &str, decision: TeleportDecision) {
    match decision {
        TeleportDecision::Approved { position } => {
            tracing::info!(step, position = %position, "Approved");
        }
        TeleportDecision::Denied { reason } => {
            tracing::info!(step, reason = %reason, "Denied");
        }
        TeleportDecision::Unsafe { reason } => {
            tracing::info!(step, reason = %reason, "Unsafe");
        }
    }
}

fn load_dotenv_from_repo_root() {
    let repo_root = std::path::Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("..")
        .join("..");

    // Prefer local overrides.
    for filename in [".env.local", ".env"] {
        let path = repo_root.join(filename);
        if path.exists() {
            let _ = dotenvy::from_path(path);
        }
    }
}
