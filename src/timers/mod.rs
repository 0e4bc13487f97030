//! Named cumulative timers for the per-iteration phases of the engine.

mod timers;
pub use timers::*;
