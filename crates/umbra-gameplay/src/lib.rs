//! # Umbra Gameplay
//!
//! Gameplay systems for Umbra.
//!
//! This crate provides the simulation core behind the presentation layer:
//! - Enemy perception with gradual attention and full-detection latch
//! - Enemy behavior state machine (patrol/chase/attack/dead)
//! - Boss encounter with an ordered multi-ability attack sequence
//! - Player combo chain and stealth-kill resolver
//! - Player health, block window and ability cooldowns
//! - Global time-dilation broadcast coupling all of the above
//! - Event bus for inter-system communication
//!
//! Rendering, animation playback, audio, navigation and collision live
//! behind the narrow traits in [`world`]; the core runs on a single
//! simulation thread advanced by `on_simulation_tick`.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(clippy::unwrap_used)]

pub mod agent;
pub mod boss;
pub mod combo;
pub mod config;
pub mod dilation;
pub mod events;
pub mod flow;
pub mod perception;
pub mod player;
pub mod timer;
pub mod world;

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::agent::*;
    pub use crate::boss::*;
    pub use crate::combo::*;
    pub use crate::config::*;
    pub use crate::dilation::*;
    pub use crate::events::*;
    pub use crate::flow::*;
    pub use crate::perception::*;
    pub use crate::player::*;
    pub use crate::timer::*;
    pub use crate::world::*;
}

pub use prelude::*;
