//! Ladder core.
//!
//! The six-tier zig-zag book, stake sizing, trade verification, retry
//! discipline and the engine that ties them together each tick.

pub mod book;
pub mod engine;
pub mod liquidation;
pub mod retry;
pub mod stake;
pub mod verifier;

pub use book::{LadderBook, LadderPhase, Rung, Tier, Trigger};
pub use engine::{
    Collaborators, EngineSettings, EngineTiming, LadderEngine, LadderState, SkipReason,
    TickOutcome, TradeGate,
};
pub use retry::{RetryPolicy, StopToken};
pub use stake::{StakeCalculator, StakePercents};
pub use verifier::TradeVerifier;
