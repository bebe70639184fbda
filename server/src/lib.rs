//! # Arena Simulation Server Library
//!
//! This library provides the authoritative server for a top-down arena game.
//! It owns the canonical world, runs the fixed-step simulation and sends each
//! connected player the slice of the world it can see.
//!
//! ## Core Responsibilities
//!
//! ### Authoritative Simulation
//! Players, mobs and the petals players fire are all entities in one world.
//! Each tick resolves contact damage and pushes between them, advances every
//! entity and removes the ones that died. Clients only send intents (heading,
//! speed, attacking) and never positions.
//!
//! ### Interest Management
//! Every player sees the entities overlapping a fixed view rectangle around
//! it. Entities new to a view are sent in full, known ones only when they
//! changed, and entities leaving the view are reported as deleted.
//!
//! ### Zone Population
//! The world is split into horizontal zones, each with a weighted spawn table
//! and a density cap. Population control tops every zone back up one mob (or
//! one chain of segments) per tick.
//!
//! ## Architecture Design
//!
//! ### Single-Threaded Event Loop
//! All world state is owned by one task. Datagrams are applied between ticks
//! and the tick itself never yields, so the simulation needs no locking and
//! behaves the same given the same inputs and RNG seed.
//!
//! ### UDP-Based Communication
//! A connection is simply the remote socket address. Packets are bincode
//! encoded serde types from the `shared` crate; per-entity state travels as
//! cached byte payloads so each entity is serialized at most once per tick.
//!
//! ## Module Organization
//!
//! - `game`: [`game::GameState`] and the tick pipeline
//! - `router`: decoding and applying client messages
//! - `collision`: contact damage and push resolution
//! - `population`: per-zone spawning
//! - `replication`: per-player update building
//! - `entity`, `player`, `mob`: the entity model
//! - `id_allocator`, `registry`, `grid`, `dirty`: bookkeeping structures
//! - `client_manager`, `network`: the UDP transport
//! - `config`, `error`: command line configuration and error types
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use server::config::ServerConfig;
//! use server::game::WorldConfig;
//! use server::network::Server;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ServerConfig {
//!         tick_rate: 20,
//!         ..ServerConfig::default()
//!     };
//!
//!     // Binds the socket and validates the default zone table
//!     let mut server = Server::new(config, WorldConfig::default()).await?;
//!     server.run().await?;
//!
//!     Ok(())
//! }
//! ```

pub mod client_manager;
pub mod collision;
pub mod config;
pub mod dirty;
pub mod entity;
pub mod error;
pub mod game;
pub mod grid;
pub mod id_allocator;
pub mod mob;
pub mod network;
pub mod player;
pub mod population;
pub mod registry;
pub mod replication;
pub mod router;
