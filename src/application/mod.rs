pub mod bootstrap;
pub mod calendar_import;
pub mod commands;
pub mod focus;
pub mod identity;
pub mod minigame;
pub mod rewards;
pub mod schedule;
