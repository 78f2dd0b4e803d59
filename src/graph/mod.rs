//! The exposure network handed to the engine.

pub mod network;
