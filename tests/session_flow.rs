//! Wire frames flowing from a network task into the render-side session

use uuid::Uuid;

use avatar_sync::sync::{InterpolationConfig, RemoteEntities};
use avatar_sync::util::time::ManualClock;
use avatar_sync::ws::{self, encode_server_msg, EntityState, PlayerInfo, ServerMsg};

fn state(user_id: Uuid, x: f32, seq: u32, animation: &str) -> EntityState {
    EntityState {
        user_id,
        x,
        y: 0.0,
        z: 0.0,
        rotation: 0.0,
        seq: Some(seq),
        animation: Some(animation.to_string()),
    }
}

#[tokio::test]
async fn reordered_frames_from_network_task_are_dropped() {
    let clock = ManualClock::new(0.0);
    let entities = RemoteEntities::with_clock(InterpolationConfig::default(), clock.clone());
    let (sender, mut session) = ws::channel(entities, 64);

    let me = Uuid::new_v4();
    let remote = Uuid::new_v4();

    let network_clock = clock.clone();
    let network = tokio::spawn(async move {
        let frames = vec![
            ServerMsg::Welcome {
                user_id: me,
                server_time: 0,
            },
            ServerMsg::PlayerJoined {
                player: PlayerInfo {
                    user_id: remote,
                    display_name: "Player_2".to_string(),
                    x: 0.0,
                    y: 0.0,
                    z: 0.0,
                    rotation: 0.0,
                },
            },
            ServerMsg::EntityUpdate(state(remote, 1.0, 1, "walk")),
            ServerMsg::EntityUpdate(state(remote, 3.0, 3, "walk")),
            // arrived late
            ServerMsg::EntityUpdate(state(remote, 2.0, 2, "walk")),
            ServerMsg::EntityUpdate(state(me, 9.0, 1, "run")),
        ];

        for frame in frames {
            let text = encode_server_msg(&frame).expect("encodes");
            sender.send_text(&text).await.expect("session open");
            network_clock.advance(10.0);
        }
        sender.send_text("{ garbage").await.expect("session open");
    });
    network.await.expect("network task");

    clock.advance(16.0);
    let stats = session.process_messages();

    assert_eq!(stats.messages, 6);
    assert_eq!(stats.spawned, 1);
    assert_eq!(stats.appended, 2);
    assert_eq!(stats.out_of_order, 1);
    assert_eq!(session.local_id(), Some(me));
    assert!(!session.entities().contains(&me));
    assert_eq!(session.entities().buffer_len(&remote), Some(2));
    assert_eq!(session.entities().animation_state(&remote), Some("walk"));

    // x=1 arrived at 20 ms and x=3 at 30 ms; render time 25 is halfway
    clock.set(125.0);
    let poses = session.frame(10.0);
    assert_eq!(poses.len(), 1);
    assert_eq!(poses[0].0, remote);
    assert!((poses[0].1.position.x - 2.0).abs() < 1e-3);
}

#[tokio::test]
async fn player_leaving_removes_interpolation_state() {
    let clock = ManualClock::new(0.0);
    let entities = RemoteEntities::with_clock(InterpolationConfig::default(), clock.clone());
    let (sender, mut session) = ws::channel(entities, 8);
    let remote = Uuid::new_v4();

    sender
        .send(ServerMsg::Snapshot {
            tick: 1,
            players: vec![state(remote, 1.0, 1, "idle")],
        })
        .await
        .expect("session open");
    session.process_messages();
    assert!(session.entities().contains(&remote));

    sender
        .send(ServerMsg::PlayerLeft {
            user_id: remote,
            reason: "disconnected".to_string(),
        })
        .await
        .expect("session open");
    let stats = session.process_messages();

    assert_eq!(stats.removed, 1);
    assert!(session.entities().is_empty());
    assert!(session.frame(1.0 / 60.0).is_empty());
}
