//! Avatar Sync demo - renders a simulated remote session
//!
//! Runs a simulated server sending player updates at a fixed rate with network
//! jitter, and a render loop that interpolates every remote player each frame.

use std::time::Duration;

use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use avatar_sync::config::Config;
use avatar_sync::sim::SimulatedServer;
use avatar_sync::sync::RemoteEntities;
use avatar_sync::util::time::FrameTimer;
use avatar_sync::ws::{self, ProcessStats};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Load configuration
    let config = Config::from_env()?;

    // Initialize tracing
    init_tracing(&config.log_level);

    info!("Starting Avatar Sync demo");
    info!(
        delay_ms = config.interpolation.delay_ms,
        retention_ms = config.interpolation.retention_ms,
        capacity = config.interpolation.capacity,
        smoothing_rate = config.interpolation.smoothing_rate,
        "Interpolation settings"
    );

    let entities = RemoteEntities::new(config.interpolation);
    let (sender, session) = ws::channel(entities, ws::session::DEFAULT_CHANNEL_CAPACITY);

    let server = SimulatedServer::new(config.demo.clone());
    let server_handle = tokio::spawn(server.run(sender));

    tokio::select! {
        totals = render_loop(session, config.demo.frame_hz, server_handle) => {
            info!(
                messages = totals.messages,
                appended = totals.appended,
                unchanged = totals.unchanged,
                out_of_order = totals.out_of_order,
                rejected = totals.rejected,
                "Session finished"
            );
        }
        _ = shutdown_signal() => {}
    }

    info!("Demo shutdown complete");
    Ok(())
}

/// Drive the session at the frame rate until the server finishes
async fn render_loop(
    mut session: ws::ClientSession,
    frame_hz: u32,
    server_handle: tokio::task::JoinHandle<()>,
) -> ProcessStats {
    let frame_duration = Duration::from_micros(1_000_000 / frame_hz as u64);
    let mut frame_interval = interval(frame_duration);
    frame_interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

    let mut timer = FrameTimer::new();
    let mut totals = ProcessStats::default();
    let mut frame: u64 = 0;

    loop {
        frame_interval.tick().await;
        let dt = timer.tick();

        totals += session.process_messages();

        let poses = session.entities_mut().render_all(dt);
        frame += 1;

        // once a second
        if frame % frame_hz as u64 == 0 {
            for (id, pose) in &poses {
                debug!(
                    entity_id = %id,
                    x = pose.position.x,
                    y = pose.position.y,
                    z = pose.position.z,
                    rotation = pose.rotation,
                    animation = session.entities().animation_state(id).unwrap_or("none"),
                    buffered = session.entities().buffer_len(id).unwrap_or(0),
                    "Render pose"
                );
            }
            info!(frame, entities = poses.len(), "Rendering");
        }

        if server_handle.is_finished() && session.entities().is_empty() {
            break;
        }
    }

    totals
}

/// Initialize tracing/logging
fn init_tracing(log_level: &str) {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().with_target(true))
        .init();
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, starting graceful shutdown");
        }
        _ = terminate => {
            info!("Received terminate signal, starting graceful shutdown");
        }
    }
}
