pub mod board;
pub mod card;
pub mod match_record;
pub mod presence;
pub mod profile;
pub mod settings;
