//! Simulated remote session used by the demo binary
//!
//! Stands in for a real server connection: a fixed-rate tick loop moves a few
//! players around, encodes their state as wire frames and delivers them to a
//! [`SessionSender`] after a random delay, so frames can arrive late or out of
//! order.

use std::f32::consts::TAU;
use std::time::Duration;

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use tokio::time::{interval, sleep, MissedTickBehavior};
use tracing::{debug, info};
use uuid::Uuid;

use crate::config::DemoConfig;
use crate::util::time::unix_millis;
use crate::ws::protocol::{encode_server_msg, EntityState, PlayerInfo, ServerMsg};
use crate::ws::SessionSender;

/// A simulated player walking a circle, pausing now and then
#[derive(Debug, Clone)]
struct SimPlayer {
    user_id: Uuid,
    center: (f32, f32),
    radius: f32,
    /// Radians per second along the circle
    angular_speed: f32,
    phase: f32,
    /// Remaining pause, in seconds
    paused_for: f32,
    seq: u32,
}

impl SimPlayer {
    fn spawn(rng: &mut ChaCha8Rng) -> Self {
        Self {
            user_id: Uuid::new_v4(),
            center: (rng.gen_range(-50.0..50.0), rng.gen_range(-50.0..50.0)),
            radius: rng.gen_range(3.0..12.0),
            angular_speed: rng.gen_range(0.3..1.2),
            phase: rng.gen_range(0.0..TAU),
            paused_for: 0.0,
            seq: 0,
        }
    }

    fn position(&self) -> (f32, f32) {
        (
            self.center.0 + self.phase.cos() * self.radius,
            self.center.1 + self.phase.sin() * self.radius,
        )
    }

    /// Heading along the direction of travel
    fn heading(&self) -> f32 {
        self.phase + TAU / 4.0
    }

    fn step(&mut self, dt: f32, rng: &mut ChaCha8Rng) {
        if self.paused_for > 0.0 {
            self.paused_for -= dt;
        } else {
            self.phase = (self.phase + self.angular_speed * dt).rem_euclid(TAU);
            if rng.gen_bool(0.01) {
                self.paused_for = rng.gen_range(0.5..1.5);
            }
        }
    }

    fn info(&self, index: usize) -> PlayerInfo {
        let (x, z) = self.position();
        PlayerInfo {
            user_id: self.user_id,
            display_name: format!("Player_{}", index + 1),
            x,
            y: 0.0,
            z,
            rotation: self.heading(),
        }
    }

    fn state(&mut self) -> EntityState {
        self.seq += 1;
        let (x, z) = self.position();
        let animation = if self.paused_for > 0.0 { "idle" } else { "walk" };
        EntityState {
            user_id: self.user_id,
            x,
            y: 0.0,
            z,
            rotation: self.heading(),
            seq: Some(self.seq),
            animation: Some(animation.to_string()),
        }
    }
}

/// Fixed-rate simulated server feeding a client session
pub struct SimulatedServer {
    config: DemoConfig,
    players: Vec<SimPlayer>,
    rng: ChaCha8Rng,
    local_id: Uuid,
}

impl SimulatedServer {
    pub fn new(config: DemoConfig) -> Self {
        let seed = config.seed.unwrap_or_else(rand::random);
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        let players = (0..config.entities).map(|_| SimPlayer::spawn(&mut rng)).collect();

        info!(seed, entities = config.entities, "Simulated server created");

        Self {
            config,
            players,
            rng,
            local_id: Uuid::new_v4(),
        }
    }

    pub fn player_ids(&self) -> Vec<Uuid> {
        self.players.iter().map(|p| p.user_id).collect()
    }

    /// Run until `duration_secs` elapses or the session goes away
    pub async fn run(mut self, sender: SessionSender) {
        let welcome = ServerMsg::Welcome {
            user_id: self.local_id,
            server_time: unix_millis(),
        };
        if sender.send(welcome).await.is_err() {
            return;
        }

        for (index, player) in self.players.iter().enumerate() {
            let joined = ServerMsg::PlayerJoined {
                player: player.info(index),
            };
            if sender.send(joined).await.is_err() {
                return;
            }
        }

        let tick_duration = Duration::from_micros(1_000_000 / self.config.update_hz as u64);
        let dt = tick_duration.as_secs_f32();
        let total_ticks = self.config.duration_secs * self.config.update_hz as u64;

        let mut tick_interval = interval(tick_duration);
        tick_interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

        for tick in 0..total_ticks {
            tick_interval.tick().await;
            if sender.is_closed() {
                debug!(tick, "Session closed, stopping simulation");
                return;
            }

            for i in 0..self.players.len() {
                self.players[i].step(dt, &mut self.rng);
                let state = self.players[i].state();
                let frame = match encode_server_msg(&ServerMsg::EntityUpdate(state)) {
                    Ok(frame) => frame,
                    Err(e) => {
                        debug!(error = %e, "Failed to encode update");
                        continue;
                    }
                };

                let delay = Duration::from_millis(self.rng.gen_range(0..=self.config.jitter_ms));
                let sender = sender.clone();
                tokio::spawn(async move {
                    sleep(delay).await;
                    let _ = sender.send_text(&frame).await;
                });
            }
        }

        // in-flight updates would otherwise respawn players after they leave
        sleep(Duration::from_millis(self.config.jitter_ms + 1)).await;

        for player in &self.players {
            let left = ServerMsg::PlayerLeft {
                user_id: player.user_id,
                reason: "simulation ended".to_string(),
            };
            let _ = sender.send(left).await;
        }

        info!(ticks = total_ticks, "Simulated server finished");
    }
}
