pub mod commitment;
pub mod engine;
pub mod payout;
pub mod types;

pub use engine::{AbandonedResolution, MinesEngine};
pub use types::{GameStatus, MinesSession, SeedPair, SessionView, DEFAULT_GRID_SIZE};
