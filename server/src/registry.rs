//! Session registry for the arena server
//!
//! This module owns the mapping from session id to player record, including:
//! - Player creation with spawn defaults when a session connects
//! - Removal when a session disconnects
//! - The process-wide player number counter
//!
//! Player numbers come from a running counter rather than the registry size, so a
//! number is never handed out twice even after players leave. Players are kept in
//! connect order, which is the order snapshots list them in.

use indexmap::IndexMap;
use log::info;
use shared::{Player, PlayerSnapshot, SessionId};

/// All players attached to a live session, keyed by session id
#[derive(Debug, Default)]
pub struct SessionRegistry {
    /// Player records indexed by the session that owns them
    players: IndexMap<SessionId, Player>,
    /// Number of players ever registered; the last number handed out
    player_count: u64,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a fresh player for the given session
    ///
    /// Returns the player's number, or None if the session is already registered.
    /// A rejected registration does not advance the counter.
    pub fn connect(&mut self, id: SessionId) -> Option<u64> {
        if self.players.contains_key(&id) {
            return None;
        }

        self.player_count += 1;
        let number = self.player_count;

        info!("Player {} joined as number {}", id, number);
        self.players.insert(id, Player::new(number));

        Some(number)
    }

    /// Removes a session's player
    ///
    /// Returns the removed record, or None if the id was never registered.
    /// Callers treat a missing id as a no-op.
    pub fn disconnect(&mut self, id: &str) -> Option<Player> {
        let removed = self.players.shift_remove(id);
        if let Some(player) = &removed {
            info!("Player {} (number {}) left", id, player.number);
        }
        removed
    }

    pub fn get(&self, id: &str) -> Option<&Player> {
        self.players.get(id)
    }

    pub fn get_mut(&mut self, id: &str) -> Option<&mut Player> {
        self.players.get_mut(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.players.contains_key(id)
    }

    pub fn players_mut(&mut self) -> impl Iterator<Item = &mut Player> {
        self.players.values_mut()
    }

    /// Ids of every player still alive
    pub fn alive_ids(&self) -> Vec<&SessionId> {
        self.players
            .iter()
            .filter(|(_, player)| player.alive)
            .map(|(id, _)| id)
            .collect()
    }

    /// Owned copy of the whole registry for broadcasting
    pub fn snapshot(&self) -> PlayerSnapshot {
        self.players.clone()
    }

    /// Returns the number of registered players
    pub fn len(&self) -> usize {
        self.players.len()
    }

    /// Returns true if no players are registered
    pub fn is_empty(&self) -> bool {
        self.players.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registry_creation() {
        let registry = SessionRegistry::new();
        assert!(registry.is_empty());
        assert_eq!(registry.len(), 0);
    }

    #[test]
    fn test_connect_assigns_defaults() {
        let mut registry = SessionRegistry::new();

        let number = registry.connect("a".to_string()).unwrap();
        assert_eq!(number, 1);

        let player = registry.get("a").unwrap();
        assert_eq!(*player, Player::new(1));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_numbers_never_reused() {
        let mut registry = SessionRegistry::new();
        let mut last = 0;

        for round in 0..5 {
            let id = format!("session-{}", round);
            let number = registry.connect(id.clone()).unwrap();
            assert!(number > last);
            last = number;

            if round % 2 == 0 {
                registry.disconnect(&id);
            }
        }

        assert_eq!(last, 5);
    }

    #[test]
    fn test_disconnect_first_keeps_second() {
        let mut registry = SessionRegistry::new();
        registry.connect("first".to_string());
        registry.connect("second".to_string());

        assert!(registry.disconnect("first").is_some());

        assert_eq!(registry.len(), 1);
        assert!(!registry.contains("first"));
        assert_eq!(registry.get("second").unwrap().number, 2);

        let number = registry.connect("third".to_string()).unwrap();
        assert_eq!(number, 3);
    }

    #[test]
    fn test_disconnect_unknown_is_noop() {
        let mut registry = SessionRegistry::new();
        registry.connect("a".to_string());

        assert!(registry.disconnect("ghost").is_none());
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_duplicate_connect_rejected() {
        let mut registry = SessionRegistry::new();
        registry.connect("a".to_string());
        registry.get_mut("a").unwrap().health = 40.0;

        assert!(registry.connect("a".to_string()).is_none());
        assert_eq!(registry.get("a").unwrap().health, 40.0);

        // Counter untouched by the rejected attempt
        assert_eq!(registry.connect("b".to_string()), Some(2));
    }

    #[test]
    fn test_alive_ids() {
        let mut registry = SessionRegistry::new();
        registry.connect("a".to_string());
        registry.connect("b".to_string());
        registry.get_mut("a").unwrap().alive = false;

        let alive = registry.alive_ids();
        assert_eq!(alive, vec![&"b".to_string()]);
    }

    #[test]
    fn test_snapshot_is_detached() {
        let mut registry = SessionRegistry::new();
        registry.connect("a".to_string());

        let snapshot = registry.snapshot();
        registry.get_mut("a").unwrap().x = 999.0;

        assert_eq!(snapshot["a"].x, 100.0);
    }

    #[test]
    fn test_snapshot_in_connect_order() {
        let mut registry = SessionRegistry::new();
        for id in ["zed", "amy", "moe", "bob"] {
            registry.connect(id.to_string());
        }
        registry.disconnect("amy");
        registry.connect("amy".to_string());

        let snapshot = registry.snapshot();
        let order: Vec<&str> = snapshot.keys().map(String::as_str).collect();
        assert_eq!(order, vec!["zed", "moe", "bob", "amy"]);
    }
}
