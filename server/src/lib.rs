//! # Arena Server Library
//!
//! This library provides the authoritative server for a small real-time arena
//! shooter. It tracks every connected player's position, health and alive state,
//! resolves hits, detects the last player standing, and relays every resulting
//! event to all connected clients.
//!
//! ## Core Responsibilities
//!
//! ### Session Lifecycle
//! Each WebSocket connection becomes a session with a random id. Connecting
//! registers a player at the spawn point with a sequential player number;
//! disconnecting removes it. Player numbers are never reused.
//!
//! ### Event Relay
//! Clients send named events (`playerMovement`, `shoot`, `playerHit`,
//! `restartGame`). The server applies them and broadcasts the outcome to every
//! session, including the sender. There is no per-client filtering.
//!
//! ### Combat and Win Detection
//! Hits subtract damage from a live target. A player whose health reaches zero
//! dies, and if exactly one player is left alive the round is over.
//!
//! ## Architecture Design
//!
//! ### Single Actor Loop
//! One task owns all game state and consumes a queue of session messages in
//! arrival order. Connection tasks never touch game state, so no handler ever
//! runs concurrently with another.
//!
//! ### Fire-and-Forget Broadcasts
//! Each session has a bounded outbound queue drained by its own writer task.
//! A full queue drops the frame for that session only.
//!
//! ## Module Organization
//!
//! ### Registry Module (`registry`)
//! Session id to player mapping and the player number counter.
//!
//! ### Game Module (`game`)
//! The [`game::Arena`] mutator: movement, shots, hits, restart and the win check.
//!
//! ### Router Module (`router`)
//! Parses raw frames into client events and dispatches them to the arena.
//!
//! ### Network Module (`network`)
//! WebSocket accept loop, per-session reader and writer tasks, and the actor loop.
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use server::network::{Server, ServerConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ServerConfig::default();
//!     let mut server = Server::bind(&config).await?;
//!     server.run().await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Security Considerations
//!
//! Positions and damage are taken from clients as reported. Nothing here bounds
//! movement or caps damage, so a modified client can teleport or one-shot
//! opponents.

pub mod error;
pub mod game;
pub mod network;
pub mod registry;
pub mod router;
pub mod utils;
