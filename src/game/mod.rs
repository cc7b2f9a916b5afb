pub mod catalog;
pub mod computer;
pub mod game_state;
pub mod gauntlet;
pub mod mechanics;
pub mod rules;
pub mod store;
