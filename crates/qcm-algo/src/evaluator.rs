//! Dispatch evaluation against a grid model.
//!
//! [`GridEvaluator`] is the seam between the optimizer and whatever produces
//! grid observations: a state vector, an `apply` that mutates the dispatch,
//! and a scalar reward. The trait also carries a snapshot/restore contract so
//! fitness evaluation can be a pure function of a candidate action — the
//! control loop restores a baseline before every particle's apply instead of
//! letting each particle see the previous particle's grid.
//!
//! [`NetworkEvaluator`] is the bundled implementation over `qcm-core`
//! networks and the linearized flow approximation.

use crate::power_flow::{FlowSolution, LinearizedFlowSolver};
use qcm_core::{Network, Node, NodeIndex, QcmError, QcmResult};

/// Congestion/voltage penalty, negated so that higher is better.
///
/// `reward = -(0.7 * congestion + 0.3 * voltage_deviation)` where congestion
/// sums line loading in excess of 100% and voltage deviation sums per-unit
/// distance from 1.0.
pub fn congestion_voltage_reward(loadings_percent: &[f64], voltages_pu: &[f64]) -> f64 {
    let congestion: f64 = loadings_percent
        .iter()
        .map(|&l| qcm_core::Percent(l).overload())
        .sum();
    let voltage_deviation: f64 = voltages_pu
        .iter()
        .map(|&v| qcm_core::PerUnit(v).deviation_from_nominal())
        .sum();
    -(0.7 * congestion + 0.3 * voltage_deviation)
}

/// A grid that accepts dispatch adjustments and reports back.
pub trait GridEvaluator {
    /// Opaque saved state for restoring a baseline between evaluations.
    type Snapshot: Clone;

    /// Length of the dispatch-adjustment vector `apply` expects.
    fn action_len(&self) -> usize;

    /// Current observation vector. Fixed length for the evaluator's lifetime.
    fn state(&self) -> Vec<f64>;

    /// Apply a dispatch adjustment. Vectors shorter than [`action_len`]
    /// fail fast with a dimension error; excess elements are ignored.
    /// Solver failures are recoverable — callers assign worst-case fitness
    /// and continue.
    ///
    /// [`action_len`]: GridEvaluator::action_len
    fn apply(&mut self, action: &[f64]) -> QcmResult<()>;

    /// Reward for the current grid state (higher is better).
    fn reward(&mut self) -> QcmResult<f64>;

    /// Capture the current dispatch and solved state.
    fn snapshot(&self) -> Self::Snapshot;

    /// Return to a previously captured snapshot.
    fn restore(&mut self, snapshot: &Self::Snapshot);
}

/// Saved dispatch and flow state of a [`NetworkEvaluator`].
#[derive(Debug, Clone)]
pub struct NetworkSnapshot {
    dispatch: Vec<f64>,
    solution: FlowSolution,
}

/// [`GridEvaluator`] over a `qcm-core` network and the linearized flow
/// approximation.
///
/// The observation vector concatenates the first `feature_width` branch
/// loadings, divided by 100, with the first `feature_width` bus voltages.
pub struct NetworkEvaluator {
    network: Network,
    solver: LinearizedFlowSolver,
    gen_indices: Vec<NodeIndex>,
    feature_width: usize,
    solution: FlowSolution,
}

impl NetworkEvaluator {
    /// Build an evaluator and solve the initial flow.
    ///
    /// Fails if the network has fewer branches or buses than
    /// `feature_width`, has no generators, or the initial flow does not
    /// converge.
    pub fn new(network: Network, feature_width: usize) -> QcmResult<Self> {
        let gen_indices = network.gen_indices();
        if gen_indices.is_empty() {
            return Err(QcmError::Validation(
                "network has no dispatchable generators".into(),
            ));
        }
        if feature_width == 0 {
            return Err(QcmError::Config("feature width must be >= 1".into()));
        }
        let solver = LinearizedFlowSolver::new();
        let solution = solver.solve(&network)?;
        if solution.loading_percent.len() < feature_width || solution.vm_pu.len() < feature_width {
            return Err(QcmError::Config(format!(
                "feature width {} exceeds solved network size ({} branches, {} buses)",
                feature_width,
                solution.loading_percent.len(),
                solution.vm_pu.len()
            )));
        }
        Ok(Self {
            network,
            solver,
            gen_indices,
            feature_width,
            solution,
        })
    }

    /// Replace the flow solver (e.g. to tighten the iteration cap).
    pub fn with_solver(mut self, solver: LinearizedFlowSolver) -> QcmResult<Self> {
        self.solution = solver.solve(&self.network)?;
        self.solver = solver;
        Ok(self)
    }

    /// The wrapped network with the latest solved loadings written back.
    pub fn network(&mut self) -> &Network {
        self.solution.write_back(&mut self.network);
        &self.network
    }

    /// Observation length: loadings plus voltages.
    pub fn state_len(&self) -> usize {
        self.feature_width * 2
    }

    fn current_dispatch(&self) -> Vec<f64> {
        self.gen_indices
            .iter()
            .map(|&idx| match &self.network.graph[idx] {
                Node::Gen(gen) => gen.active_power.value(),
                _ => unreachable!("gen_indices only holds generator nodes"),
            })
            .collect()
    }

    fn set_dispatch(&mut self, dispatch: &[f64]) {
        for (&idx, &p_mw) in self.gen_indices.iter().zip(dispatch) {
            if let Node::Gen(gen) = &mut self.network.graph[idx] {
                gen.active_power = qcm_core::Megawatts(p_mw);
            }
        }
    }
}

impl GridEvaluator for NetworkEvaluator {
    type Snapshot = NetworkSnapshot;

    fn action_len(&self) -> usize {
        self.gen_indices.len()
    }

    fn state(&self) -> Vec<f64> {
        let mut state = Vec::with_capacity(self.feature_width * 2);
        state.extend(
            self.solution.loading_percent[..self.feature_width]
                .iter()
                .map(|l| l / 100.0),
        );
        state.extend_from_slice(&self.solution.vm_pu[..self.feature_width]);
        state
    }

    fn apply(&mut self, action: &[f64]) -> QcmResult<()> {
        if action.len() < self.gen_indices.len() {
            return Err(QcmError::Dimension(format!(
                "action has {} elements, evaluator expects {}",
                action.len(),
                self.gen_indices.len()
            )));
        }
        for (&idx, &adjustment) in self.gen_indices.iter().zip(action) {
            if let Node::Gen(gen) = &mut self.network.graph[idx] {
                gen.active_power =
                    (gen.active_power + qcm_core::Megawatts(adjustment)).clamp(gen.pmin, gen.pmax);
            }
        }
        self.solution = self.solver.solve(&self.network)?;
        Ok(())
    }

    fn reward(&mut self) -> QcmResult<f64> {
        Ok(congestion_voltage_reward(
            &self.solution.loading_percent,
            &self.solution.vm_pu,
        ))
    }

    fn snapshot(&self) -> NetworkSnapshot {
        NetworkSnapshot {
            dispatch: self.current_dispatch(),
            solution: self.solution.clone(),
        }
    }

    fn restore(&mut self, snapshot: &NetworkSnapshot) {
        self.set_dispatch(&snapshot.dispatch);
        self.solution = snapshot.solution.clone();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reward_matches_reference_vector() {
        // congestion = 5 + 0 + 20 = 25, deviation = 0.02 + 0.01 + 0.05 = 0.08
        let reward = congestion_voltage_reward(&[105.0, 98.0, 120.0], &[1.02, 0.99, 1.05]);
        assert!((reward - (-17.524)).abs() < 1e-9);
    }

    #[test]
    fn reward_is_zero_for_clean_grid() {
        let reward = congestion_voltage_reward(&[40.0, 80.0], &[1.0, 1.0]);
        assert_eq!(reward, 0.0);
    }

    #[test]
    fn reward_only_penalizes_excess_loading() {
        // Loading below 100% contributes nothing even close to the limit.
        let reward = congestion_voltage_reward(&[99.999], &[1.0]);
        assert_eq!(reward, 0.0);
    }
}
