pub mod arena;
pub mod config;
pub mod db;
pub mod engine;
pub mod metrics;
pub mod registration;
pub mod session;
pub mod storage;
