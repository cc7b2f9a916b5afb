pub mod backend;
pub mod decks;
pub mod matchmaking;
pub mod memory;
pub mod rest;
pub mod snapshot;
pub mod sync;
