// Run state tracking

pub mod run_state;

pub use run_state::{RunState, RunStateMachine, Transition};
