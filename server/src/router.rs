//! Inbound event routing
//!
//! Turns a raw text frame from a session into a typed [`ClientEvent`] and hands it
//! to the [`Arena`]. Parsing failures surface as [`ArenaError`] so the transport can
//! log and drop the event without touching game state.

use crate::error::ArenaError;
use crate::game::Arena;
use log::debug;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use shared::{
    Frame, Hit, Movement, ServerEvent, PLAYER_HIT, PLAYER_MOVEMENT, RESTART_GAME, SHOOT,
};

/// Events a client may send
#[derive(Debug, Clone, PartialEq)]
pub enum ClientEvent {
    PlayerMovement(Movement),
    Shoot(Map<String, Value>),
    PlayerHit(Hit),
    RestartGame,
}

impl ClientEvent {
    pub fn from_frame(frame: Frame) -> Result<Self, ArenaError> {
        match frame.event.as_str() {
            PLAYER_MOVEMENT => Ok(ClientEvent::PlayerMovement(payload(
                &frame.event,
                frame.data,
            )?)),
            SHOOT => Ok(ClientEvent::Shoot(payload(&frame.event, frame.data)?)),
            PLAYER_HIT => Ok(ClientEvent::PlayerHit(payload(&frame.event, frame.data)?)),
            RESTART_GAME => Ok(ClientEvent::RestartGame),
            _ => Err(ArenaError::UnknownEvent(frame.event)),
        }
    }
}

fn payload<T: DeserializeOwned>(event: &str, data: Value) -> Result<T, ArenaError> {
    serde_json::from_value(data).map_err(|source| ArenaError::MalformedPayload {
        event: event.to_string(),
        source,
    })
}

pub fn parse_frame(text: &str) -> Result<ClientEvent, ArenaError> {
    let frame: Frame = serde_json::from_str(text).map_err(ArenaError::MalformedFrame)?;
    ClientEvent::from_frame(frame)
}

/// Applies one client event from `sender` and returns what to broadcast.
///
/// `now` becomes the `timestamp` of any shot.
pub fn dispatch(
    arena: &mut Arena,
    sender: &str,
    event: ClientEvent,
    now: f64,
) -> Vec<ServerEvent> {
    match event {
        ClientEvent::PlayerMovement(movement) => arena.player_movement(sender, movement),
        ClientEvent::Shoot(shot) => arena.shoot(sender, shot, now),
        ClientEvent::PlayerHit(hit) => arena.player_hit(hit),
        ClientEvent::RestartGame => {
            debug!("Restart requested by {}", sender);
            arena.restart()
        }
    }
}

/// Parses and applies a raw text frame.
pub fn route(
    arena: &mut Arena,
    sender: &str,
    text: &str,
    now: f64,
) -> Result<Vec<ServerEvent>, ArenaError> {
    let event = parse_frame(text)?;
    Ok(dispatch(arena, sender, event, now))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use shared::PlayerMoved;

    fn arena_with(ids: &[&str]) -> Arena {
        let mut arena = Arena::new();
        for id in ids {
            arena.connect(id.to_string()).unwrap();
        }
        arena
    }

    #[test]
    fn test_parse_movement() {
        let event = parse_frame(r#"{"event":"playerMovement","data":{"x":5,"y":7}}"#).unwrap();
        assert_eq!(
            event,
            ClientEvent::PlayerMovement(Movement {
                x: 5.0,
                y: 7.0,
                block: false,
            })
        );
    }

    #[test]
    fn test_parse_restart_without_data() {
        let event = parse_frame(r#"{"event":"restartGame"}"#).unwrap();
        assert_eq!(event, ClientEvent::RestartGame);

        let event = parse_frame(r#"{"event":"restartGame","data":{"anything":1}}"#).unwrap();
        assert_eq!(event, ClientEvent::RestartGame);
    }

    #[test]
    fn test_parse_hit_keeps_shooter() {
        let event = parse_frame(
            r#"{"event":"playerHit","data":{"target":"b","damage":12,"shooter":"a"}}"#,
        )
        .unwrap();
        match event {
            ClientEvent::PlayerHit(hit) => {
                assert_eq!(hit.target_id(), Some("b"));
                assert_eq!(hit.damage, 12.0);
                assert_eq!(hit.shooter, Some(json!("a")));
            }
            other => panic!("Unexpected event {:?}", other),
        }
    }

    #[test]
    fn test_malformed_frame() {
        let result = parse_frame("not json");
        assert!(matches!(result, Err(ArenaError::MalformedFrame(_))));

        let result = parse_frame(r#"{"data":{}}"#);
        assert!(matches!(result, Err(ArenaError::MalformedFrame(_))));
    }

    #[test]
    fn test_movement_missing_coordinate() {
        let result = parse_frame(r#"{"event":"playerMovement","data":{"x":5}}"#);
        match result {
            Err(ArenaError::MalformedPayload { event, .. }) => assert_eq!(event, PLAYER_MOVEMENT),
            other => panic!("Unexpected result {:?}", other),
        }
    }

    #[test]
    fn test_shoot_requires_object() {
        let result = parse_frame(r#"{"event":"shoot","data":[1,2,3]}"#);
        assert!(matches!(result, Err(ArenaError::MalformedPayload { .. })));

        let result = parse_frame(r#"{"event":"shoot"}"#);
        assert!(matches!(result, Err(ArenaError::MalformedPayload { .. })));
    }

    #[test]
    fn test_unknown_event() {
        let result = parse_frame(r#"{"event":"teleport","data":{}}"#);
        assert!(matches!(result, Err(ArenaError::UnknownEvent(name)) if name == "teleport"));
    }

    #[test]
    fn test_route_malformed_leaves_state_alone() {
        let mut arena = arena_with(&["a"]);
        let before = arena.registry.snapshot();

        let frame = r#"{"event":"playerHit","data":{"target":"a","damage":"lots"}}"#;
        assert!(route(&mut arena, "a", frame, 0.0).is_err());
        assert_eq!(arena.registry.snapshot(), before);
    }

    #[test]
    fn test_route_shoot_uses_sender_and_clock() {
        let mut arena = arena_with(&["a"]);
        let events = route(&mut arena, "a", r#"{"event":"shoot","data":{"vx":1}}"#, 99.5).unwrap();

        match &events[..] {
            [ServerEvent::BulletShot(data)] => {
                assert_eq!(data["shooter"], "a");
                assert_eq!(data["timestamp"], 99.5);
            }
            other => panic!("Unexpected events {:?}", other),
        }
    }

    #[test]
    fn test_route_relays_numbers_exactly() {
        let mut arena = arena_with(&["a"]);

        let frame = r#"{"event":"shoot","data":{"vx":9.725204727747075,"vy":-2.3283064365386963e-10}}"#;
        let events = route(&mut arena, "a", frame, 0.0).unwrap();
        let text = serde_json::to_string(&events[0]).unwrap();
        assert!(text.contains(r#""vx":9.725204727747075"#));
        assert!(text.contains(r#""vy":-2.3283064365386963e-10"#));

        let frame = r#"{"event":"playerMovement","data":{"x":123.45678901234567,"y":0.1}}"#;
        let events = route(&mut arena, "a", frame, 0.0).unwrap();
        match &events[..] {
            [ServerEvent::PlayerMoved(moved)] => {
                assert_eq!(moved.x.to_bits(), 123.45678901234567f64.to_bits());
                assert_eq!(moved.y.to_bits(), 0.1f64.to_bits());
            }
            other => panic!("Unexpected events {:?}", other),
        }
        assert_eq!(arena.registry.get("a").unwrap().x.to_bits(), 123.45678901234567f64.to_bits());
    }

    #[test]
    fn test_route_shot_keeps_field_order() {
        let mut arena = arena_with(&["a"]);

        let frame = r#"{"event":"shoot","data":{"y":2,"x":1,"vy":0,"vx":10}}"#;
        let events = route(&mut arena, "a", frame, 5.0).unwrap();
        assert_eq!(
            serde_json::to_string(&events[0]).unwrap(),
            r#"{"event":"bulletShot","data":{"y":2,"x":1,"vy":0,"vx":10,"shooter":"a","timestamp":5.0}}"#
        );
    }

    #[test]
    fn test_route_null_block_still_moves() {
        let mut arena = arena_with(&["a"]);

        let frame = r#"{"event":"playerMovement","data":{"x":5,"y":6,"block":null}}"#;
        let events = route(&mut arena, "a", frame, 0.0).unwrap();
        assert_eq!(
            events,
            vec![ServerEvent::PlayerMoved(PlayerMoved {
                id: "a".to_string(),
                x: 5.0,
                y: 6.0,
                block: false,
            })]
        );
    }

    #[test]
    fn test_route_full_round() {
        let mut arena = arena_with(&["a", "b"]);

        let frame = r#"{"event":"playerHit","data":{"target":"a","damage":150}}"#;
        let events = route(&mut arena, "b", frame, 0.0).unwrap();
        assert_eq!(
            events,
            vec![
                ServerEvent::PlayerDied("a".to_string()),
                ServerEvent::GameOver("b".to_string()),
            ]
        );

        let events = route(&mut arena, "a", r#"{"event":"restartGame"}"#, 0.0).unwrap();
        match &events[..] {
            [ServerEvent::GameRestarted(players)] => {
                assert!(players.values().all(|p| p.alive && p.health == 100.0));
            }
            other => panic!("Unexpected events {:?}", other),
        }
    }
}
