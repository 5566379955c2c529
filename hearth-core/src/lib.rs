pub mod command;
pub mod config;
pub mod model;
pub mod reducer;
pub mod state;

// Reset sequencer
pub mod schedule;
pub mod sequencer;

// Channels to the hub
pub mod dispatch;
