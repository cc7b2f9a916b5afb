//! Three-by-three capture card game: rule engine, game store, computer opponent, gauntlet
//! ladder, and a peer-replicated online mode with presence-based matchmaking.

pub mod game;
pub mod models;
pub mod online;
pub mod utils;
