pub mod battle;
pub mod catalog;
pub mod config;
pub mod opponent;
pub mod score;
