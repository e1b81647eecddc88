pub mod availability;
pub mod player;
pub mod power;
