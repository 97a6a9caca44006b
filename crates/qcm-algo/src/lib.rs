//! # qcm-algo: Congestion-Relief Optimization
//!
//! The algorithmic half of the toolkit:
//!
//! - [`qpso`] — the Quantum-behaved Particle Swarm Optimizer searching for
//!   generator-dispatch adjustments.
//! - [`control`] — the adaptive epoch loop that tunes the swarm's
//!   exploration coefficient from a bounded policy signal and feeds rewards
//!   back into the policy weights.
//! - [`evaluator`] — the [`GridEvaluator`] seam plus the bundled
//!   network-backed implementation.
//! - [`signal`] — the [`SignalSource`] seam plus a closed-form
//!   rotation-ladder policy.
//! - [`power_flow`] — the linearized flow approximation feeding loadings
//!   and voltages to the evaluator.
//!
//! The swarm and the loop are deliberately single-threaded: candidate
//! evaluation mutates one shared evaluator, with a snapshot/restore contract
//! keeping each candidate's fitness independent of evaluation order.

pub mod control;
pub mod evaluator;
pub mod power_flow;
pub mod qpso;
pub mod signal;

pub use control::{
    exploration_coefficient, ControlLoop, ControlLoopConfig, EpochRecord, LoopReport,
    RewardScaledUpdate, StopReason, WeightUpdate,
};
pub use evaluator::{congestion_voltage_reward, GridEvaluator, NetworkEvaluator, NetworkSnapshot};
pub use power_flow::{FlowSolution, LinearizedFlowSolver, PowerFlowError};
pub use qpso::{QpsoConfig, QpsoEngine};
pub use signal::{RotationLadderPolicy, SignalSource};
