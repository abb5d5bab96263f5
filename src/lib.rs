pub mod config;
pub mod debug;
pub mod gameplay;
pub mod states;
