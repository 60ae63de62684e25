//! Strategy/Risk State Machine.
//!
//! A single simulated position is advanced once per indicator-ready bar
//! through flat/long/short/halted. The engine is synchronous and
//! single-threaded; each run owns a fresh [`SimulationState`].

pub mod loop_runner;
pub mod signals;
pub mod state;

pub use loop_runner::{run_simulation, step, SimulationInput, SimulationOutcome, SPREAD_PRICE_FLOOR};
pub use signals::{decide, pearson, raw_signals, resolve_mode, ActiveMode, Decision, DecisionContext, RawSignals};
pub use state::{Position, PositionState, SignalHistory, SimulationState};
