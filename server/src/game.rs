use crate::error::ArenaError;
use crate::registry::SessionRegistry;
use log::{debug, info};
use serde_json::{Map, Value};
use shared::{HealthUpdate, Hit, Movement, PlayerMoved, ServerEvent, SessionId};

/// Authoritative arena state.
///
/// Every handler applies one inbound event and returns the events to broadcast,
/// in order. Callers must serialize access; nothing in here locks.
#[derive(Debug, Default)]
pub struct Arena {
    pub registry: SessionRegistry,
}

impl Arena {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn connect(&mut self, id: SessionId) -> Result<Vec<ServerEvent>, ArenaError> {
        if self.registry.connect(id.clone()).is_none() {
            return Err(ArenaError::DuplicateSession(id));
        }

        Ok(vec![ServerEvent::CurrentPlayers(self.registry.snapshot())])
    }

    pub fn disconnect(&mut self, id: &str) -> Vec<ServerEvent> {
        self.registry.disconnect(id);
        vec![ServerEvent::PlayerDisconnected(id.to_string())]
    }

    /// Stores the reported position for a live player and echoes the request back.
    ///
    /// The echo is built from the payload, so unknown or dead senders still
    /// produce a `playerMoved` even though nothing was written.
    pub fn player_movement(&mut self, id: &str, movement: Movement) -> Vec<ServerEvent> {
        match self.registry.get_mut(id) {
            Some(player) if player.alive => {
                player.x = movement.x;
                player.y = movement.y;
                player.block = movement.block;
            }
            _ => debug!("Ignoring movement from {} (unknown or dead)", id),
        }

        vec![ServerEvent::PlayerMoved(PlayerMoved {
            id: id.to_string(),
            x: movement.x,
            y: movement.y,
            block: movement.block,
        })]
    }

    pub fn shoot(
        &self,
        id: &str,
        mut shot: Map<String, Value>,
        timestamp: f64,
    ) -> Vec<ServerEvent> {
        shot.insert("shooter".to_string(), Value::String(id.to_string()));
        shot.insert("timestamp".to_string(), Value::from(timestamp));
        debug!("Player {} fired", id);

        vec![ServerEvent::BulletShot(shot)]
    }

    /// Applies damage to a live target.
    ///
    /// Health is not clamped, so a lethal hit leaves it negative. Unknown or
    /// already dead targets produce no events at all.
    pub fn player_hit(&mut self, hit: Hit) -> Vec<ServerEvent> {
        let Some(target) = hit.target_id() else {
            return Vec::new();
        };

        let Some(player) = self.registry.get_mut(target) else {
            return Vec::new();
        };
        if !player.alive {
            return Vec::new();
        }

        player.health -= hit.damage;
        debug!(
            "Player {} hit for {} by {:?}, health now {}",
            target, hit.damage, hit.shooter, player.health
        );

        if player.health > 0.0 {
            return vec![ServerEvent::UpdateHealth(HealthUpdate {
                id: target.to_string(),
                health: player.health,
            })];
        }

        player.alive = false;
        info!("Player {} died", target);

        let mut events = vec![ServerEvent::PlayerDied(target.to_string())];
        events.extend(self.check_game_over());
        events
    }

    pub fn restart(&mut self) -> Vec<ServerEvent> {
        for player in self.registry.players_mut() {
            player.respawn();
        }
        info!("Game restarted with {} players", self.registry.len());

        vec![ServerEvent::GameRestarted(self.registry.snapshot())]
    }

    // Only runs after a death; a disconnect never ends the round
    fn check_game_over(&self) -> Option<ServerEvent> {
        match self.registry.alive_ids().as_slice() {
            [winner] => {
                info!("Game over, {} wins", winner);
                Some(ServerEvent::GameOver((*winner).clone()))
            }
            _ => None,
        }
    }
}
