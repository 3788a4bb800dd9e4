//! # Player Manager
//!
//! Tracks the player bound to each gameplay connection and queues the
//! join/move/leave events the server broadcasts as entity packets.

use std::collections::BTreeMap;

use uuid::Uuid;

use crate::connection::ConnectionId;
use crate::error::{NetError, NetResult};

/// A connected player.
#[derive(Clone, Debug, PartialEq)]
pub struct Player {
    /// Identity assigned during the handshake.
    pub id: Uuid,
    /// Name from the client hello.
    pub name: String,
    /// Owning connection.
    pub connection: ConnectionId,
    /// Last reported position.
    pub position: [f32; 3],
}

/// Change to the player set, in the order it happened.
#[derive(Clone, Debug, PartialEq)]
pub enum PlayerEvent {
    /// A player entered gameplay.
    Joined(Player),
    /// A player moved.
    Moved {
        /// Player identity.
        id: Uuid,
        /// Owning connection.
        connection: ConnectionId,
        /// New position.
        position: [f32; 3],
    },
    /// A player's connection closed.
    Left {
        /// Player identity.
        id: Uuid,
        /// The connection that closed.
        connection: ConnectionId,
    },
}

/// Players by connection.
pub struct PlayerManager {
    players: BTreeMap<ConnectionId, Player>,
    events: Vec<PlayerEvent>,
    max_players: usize,
}

impl PlayerManager {
    /// Creates an empty manager with room for `max_players`.
    #[must_use]
    pub fn new(max_players: usize) -> Self {
        Self {
            players: BTreeMap::new(),
            events: Vec::new(),
            max_players,
        }
    }

    /// Registers the player of `connection`.
    ///
    /// # Errors
    ///
    /// [`NetError::ServerFull`] at capacity, [`NetError::Handshake`] if the
    /// connection already has a player.
    pub fn add(&mut self, connection: ConnectionId, id: Uuid, name: String, position: [f32; 3]) -> NetResult<&Player> {
        if self.players.len() >= self.max_players {
            return Err(NetError::ServerFull(self.max_players));
        }
        if self.players.contains_key(&connection) {
            return Err(NetError::Handshake(format!("connection {connection} already has a player")));
        }
        let player = Player {
            id,
            name,
            connection,
            position,
        };
        tracing::info!(%connection, player = %player.name, %id, "player joined");
        self.events.push(PlayerEvent::Joined(player.clone()));
        Ok(self.players.entry(connection).or_insert(player))
    }

    /// Removes the player of `connection`, if any.
    pub fn remove_connection(&mut self, connection: ConnectionId) -> Option<Player> {
        let player = self.players.remove(&connection)?;
        tracing::info!(%connection, player = %player.name, "player left");
        self.events.push(PlayerEvent::Left {
            id: player.id,
            connection,
        });
        Some(player)
    }

    /// Updates a player's position. Returns false for unknown connections.
    pub fn move_player(&mut self, connection: ConnectionId, position: [f32; 3]) -> bool {
        let Some(player) = self.players.get_mut(&connection) else {
            return false;
        };
        if player.position != position {
            player.position = position;
            self.events.push(PlayerEvent::Moved {
                id: player.id,
                connection,
                position,
            });
        }
        true
    }

    /// The player of `connection`.
    #[must_use]
    pub fn get(&self, connection: ConnectionId) -> Option<&Player> {
        self.players.get(&connection)
    }

    /// Every player, ordered by connection.
    pub fn iter(&self) -> impl Iterator<Item = &Player> {
        self.players.values()
    }

    /// Takes the queued events.
    pub fn drain_events(&mut self) -> Vec<PlayerEvent> {
        std::mem::take(&mut self.events)
    }

    /// Number of players.
    #[must_use]
    pub fn len(&self) -> usize {
        self.players.len()
    }

    /// Returns true when nobody is connected.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.players.is_empty()
    }

    /// Player limit.
    #[must_use]
    pub const fn max_players(&self) -> usize {
        self.max_players
    }
}
