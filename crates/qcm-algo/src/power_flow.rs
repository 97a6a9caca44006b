//! Linearized power-flow approximation.
//!
//! Produces per-branch loadings and per-bus voltage estimates for a
//! [`Network`]: a DC angle solve (Gauss-Seidel over the susceptance
//! equations) for branch flows, plus a resistive-drop estimate for voltage
//! magnitudes. It is intentionally lightweight; the point is a fast,
//! dispatch-sensitive congestion signal for the optimizer, not AC fidelity.
//!
//! The solver carries an iteration cap and divergence detection so that an
//! ill-conditioned case fails with [`PowerFlowError::ConvergenceFailure`]
//! instead of looping.

use qcm_core::{Branch, Bus, BusId, Edge, Network, Node};
use std::collections::HashMap;
use thiserror::Error;

/// Power-flow approximation errors
#[derive(Debug, Clone, Error)]
pub enum PowerFlowError {
    /// Input data validation error
    #[error("power flow data validation: {0}")]
    DataValidation(String),

    /// Convergence failure with residual info
    #[error("power flow failed to converge after {iterations} iterations (residual: {residual:.2e})")]
    ConvergenceFailure { iterations: usize, residual: f64 },
}

impl From<PowerFlowError> for qcm_core::QcmError {
    fn from(err: PowerFlowError) -> Self {
        match err {
            PowerFlowError::DataValidation(msg) => qcm_core::QcmError::Validation(msg),
            e @ PowerFlowError::ConvergenceFailure { .. } => {
                qcm_core::QcmError::Solver(e.to_string())
            }
        }
    }
}

/// Result of one flow solve.
///
/// `loading_percent` is ordered by `BranchId`, `vm_pu` by `BusId`, matching
/// the orderings [`Network::gen_indices`] uses for dispatch vectors.
#[derive(Debug, Clone)]
pub struct FlowSolution {
    /// Branch loading as percent of thermal rating, ordered by `BranchId`
    pub loading_percent: Vec<f64>,
    /// Bus voltage magnitude in per-unit, ordered by `BusId`
    pub vm_pu: Vec<f64>,
    /// Gauss-Seidel iterations used
    pub iterations: usize,
    /// Final angle mismatch
    pub max_mismatch: f64,
}

impl FlowSolution {
    /// Write loadings and voltages back into the network's bus/branch fields.
    ///
    /// Only in-service branches carry loadings, in the same `BranchId` order
    /// the solve used; out-of-service branches are left untouched.
    pub fn write_back(&self, network: &mut Network) {
        let mut branches: Vec<&mut Branch> = network
            .graph
            .edge_weights_mut()
            .map(|Edge::Branch(b)| b)
            .filter(|b| b.status)
            .collect();
        branches.sort_by_key(|b| b.id);
        for (pos, branch) in branches.into_iter().enumerate() {
            if let Some(&loading) = self.loading_percent.get(pos) {
                branch.loading_percent = qcm_core::Percent(loading);
            }
        }

        let mut buses: Vec<&mut Bus> = network
            .graph
            .node_weights_mut()
            .filter_map(|node| match node {
                Node::Bus(bus) => Some(bus),
                _ => None,
            })
            .collect();
        buses.sort_by_key(|b| b.id);
        for (pos, bus) in buses.into_iter().enumerate() {
            if let Some(&vm) = self.vm_pu.get(pos) {
                bus.voltage_pu = qcm_core::PerUnit(vm);
            }
        }
    }
}

/// Gauss-Seidel DC angle solver with a resistive voltage-drop estimate.
pub struct LinearizedFlowSolver {
    tolerance: f64,
    max_iterations: usize,
    base_mva: f64,
}

/// Residual above this is treated as divergence regardless of iteration count.
const DIVERGENCE_RESIDUAL: f64 = 1e6;

impl LinearizedFlowSolver {
    pub fn new() -> Self {
        Self {
            tolerance: 1e-8,
            max_iterations: 200,
            base_mva: 100.0,
        }
    }

    pub fn with_tolerance(mut self, tolerance: f64) -> Self {
        self.tolerance = tolerance;
        self
    }

    pub fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    pub fn with_base_mva(mut self, base_mva: f64) -> Self {
        self.base_mva = base_mva;
        self
    }

    /// Solve branch flows and voltage estimates for the current dispatch.
    pub fn solve(&self, network: &Network) -> Result<FlowSolution, PowerFlowError> {
        // Buses ordered by BusId; positions index the angle vector.
        let bus_indices = network.bus_indices();
        if bus_indices.is_empty() {
            return Err(PowerFlowError::DataValidation(
                "network has no buses".to_string(),
            ));
        }
        let mut bus_pos: HashMap<BusId, usize> = HashMap::with_capacity(bus_indices.len());
        for (pos, &idx) in bus_indices.iter().enumerate() {
            if let Node::Bus(bus) = &network.graph[idx] {
                bus_pos.insert(bus.id, pos);
            }
        }
        let n = bus_indices.len();

        // Net injections in per-unit: generation minus load at each bus.
        let mut injection = vec![0.0; n];
        let mut has_gen = false;
        for node in network.graph.node_weights() {
            match node {
                Node::Gen(gen) if gen.status => {
                    has_gen = true;
                    let pos = *bus_pos.get(&gen.bus).ok_or_else(|| {
                        PowerFlowError::DataValidation(format!(
                            "generator {} references unknown bus {}",
                            gen.name,
                            gen.bus.value()
                        ))
                    })?;
                    injection[pos] += gen.active_power.value() / self.base_mva;
                }
                Node::Load(load) => {
                    let pos = *bus_pos.get(&load.bus).ok_or_else(|| {
                        PowerFlowError::DataValidation(format!(
                            "load {} references unknown bus {}",
                            load.name,
                            load.bus.value()
                        ))
                    })?;
                    injection[pos] -= load.active_power.value() / self.base_mva;
                }
                _ => {}
            }
        }
        if !has_gen {
            return Err(PowerFlowError::DataValidation(
                "network has no in-service generators".to_string(),
            ));
        }

        // In-service branches ordered by BranchId.
        let mut branches: Vec<&Branch> = network
            .graph
            .edge_weights()
            .map(|Edge::Branch(b)| b)
            .filter(|b| b.status)
            .collect();
        branches.sort_by_key(|b| b.id);

        let mut links: Vec<(usize, usize, f64, f64)> = Vec::with_capacity(branches.len());
        for branch in &branches {
            if branch.reactance <= 0.0 {
                return Err(PowerFlowError::DataValidation(format!(
                    "branch {} has non-positive reactance",
                    branch.name
                )));
            }
            let from = *bus_pos.get(&branch.from_bus).ok_or_else(|| {
                PowerFlowError::DataValidation(format!(
                    "branch {} references unknown bus {}",
                    branch.name,
                    branch.from_bus.value()
                ))
            })?;
            let to = *bus_pos.get(&branch.to_bus).ok_or_else(|| {
                PowerFlowError::DataValidation(format!(
                    "branch {} references unknown bus {}",
                    branch.name,
                    branch.to_bus.value()
                ))
            })?;
            links.push((from, to, 1.0 / branch.reactance, branch.resistance));
        }

        // Diagonal susceptance sums and adjacency.
        let mut diag = vec![0.0; n];
        let mut adjacency: Vec<Vec<(usize, f64)>> = vec![Vec::new(); n];
        for &(from, to, b, _) in &links {
            diag[from] += b;
            diag[to] += b;
            adjacency[from].push((to, b));
            adjacency[to].push((from, b));
        }

        // First bus is slack; every other bus must have at least one branch.
        for (pos, &d) in diag.iter().enumerate().skip(1) {
            if d == 0.0 {
                return Err(PowerFlowError::DataValidation(format!(
                    "bus at position {pos} is isolated"
                )));
            }
        }

        // Gauss-Seidel angle sweep with the slack angle pinned at zero.
        let mut theta = vec![0.0; n];
        let mut residual = f64::INFINITY;
        let mut iterations = 0;
        while iterations < self.max_iterations {
            iterations += 1;
            residual = 0.0;
            for i in 1..n {
                let neighbor_sum: f64 = adjacency[i].iter().map(|&(j, b)| b * theta[j]).sum();
                let updated = (injection[i] + neighbor_sum) / diag[i];
                residual = residual.max((updated - theta[i]).abs());
                theta[i] = updated;
            }
            if !residual.is_finite() || residual > DIVERGENCE_RESIDUAL {
                return Err(PowerFlowError::ConvergenceFailure {
                    iterations,
                    residual,
                });
            }
            if residual < self.tolerance {
                break;
            }
        }
        if residual >= self.tolerance {
            return Err(PowerFlowError::ConvergenceFailure {
                iterations,
                residual,
            });
        }

        // Branch flows and loadings.
        let mut loading_percent = Vec::with_capacity(links.len());
        let mut drop_pu = vec![0.0; n];
        for (branch, &(from, to, b, r)) in branches.iter().zip(&links) {
            let flow_pu = b * (theta[from] - theta[to]);
            let flow_mw = flow_pu.abs() * self.base_mva;
            let rating = branch.rating.value();
            let loading = if rating.is_finite() && rating > 0.0 {
                flow_mw / rating * 100.0
            } else {
                0.0
            };
            loading_percent.push(loading);

            // Series resistive drop, split between the two ends.
            let drop = flow_pu.abs() * r / 2.0;
            drop_pu[from] += drop;
            drop_pu[to] += drop;
        }

        let vm_pu: Vec<f64> = drop_pu.iter().map(|d| 1.0 - d).collect();

        Ok(FlowSolution {
            loading_percent,
            vm_pu,
            iterations,
            max_mismatch: residual,
        })
    }
}

impl Default for LinearizedFlowSolver {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use qcm_core::{BranchId, Gen, GenId, Load, LoadId};

    fn radial_case(load_mw: f64, rating_mva: f64) -> Network {
        let mut network = Network::new();
        let b1 = network.add_bus(Bus::new(BusId::new(1), "Bus 1"));
        let b2 = network.add_bus(Bus::new(BusId::new(2), "Bus 2"));
        network.add_gen(
            Gen::new(GenId::new(1), "Gen 1", BusId::new(1))
                .with_p_limits(0.0, 200.0)
                .with_active_power(load_mw),
        );
        network.add_load(Load::new(
            LoadId::new(1),
            "Load 1",
            BusId::new(2),
            load_mw,
            0.0,
        ));
        network.add_branch(
            b1,
            b2,
            Branch::new(
                BranchId::new(1),
                "Line 1-2",
                BusId::new(1),
                BusId::new(2),
                0.02,
                0.1,
            )
            .with_rating(rating_mva),
        );
        network
    }

    #[test]
    fn radial_flow_matches_load() {
        let network = radial_case(50.0, 100.0);
        let solution = LinearizedFlowSolver::new().solve(&network).unwrap();
        // All demand flows over the single line: 50 MW on a 100 MVA rating.
        assert!((solution.loading_percent[0] - 50.0).abs() < 1e-6);
        assert_eq!(solution.vm_pu.len(), 2);
        assert!(solution.vm_pu.iter().all(|v| *v <= 1.0));
    }

    #[test]
    fn overload_reported_above_hundred_percent() {
        let network = radial_case(120.0, 100.0);
        let solution = LinearizedFlowSolver::new().solve(&network).unwrap();
        assert!(solution.loading_percent[0] > 100.0);
    }

    #[test]
    fn voltage_sags_with_flow() {
        let light = LinearizedFlowSolver::new()
            .solve(&radial_case(10.0, 100.0))
            .unwrap();
        let heavy = LinearizedFlowSolver::new()
            .solve(&radial_case(90.0, 100.0))
            .unwrap();
        assert!(heavy.vm_pu[1] < light.vm_pu[1]);
    }

    #[test]
    fn isolated_bus_is_rejected() {
        let mut network = radial_case(50.0, 100.0);
        network.add_bus(Bus::new(BusId::new(3), "Orphan"));
        let err = LinearizedFlowSolver::new().solve(&network).unwrap_err();
        assert!(matches!(err, PowerFlowError::DataValidation(_)));
    }

    #[test]
    fn non_positive_reactance_is_rejected() {
        let mut network = Network::new();
        let b1 = network.add_bus(Bus::new(BusId::new(1), "Bus 1"));
        let b2 = network.add_bus(Bus::new(BusId::new(2), "Bus 2"));
        network.add_gen(Gen::new(GenId::new(1), "Gen 1", BusId::new(1)));
        network.add_branch(
            b1,
            b2,
            Branch::new(
                BranchId::new(1),
                "Bad line",
                BusId::new(1),
                BusId::new(2),
                0.0,
                0.0,
            ),
        );
        let err = LinearizedFlowSolver::new().solve(&network).unwrap_err();
        assert!(matches!(err, PowerFlowError::DataValidation(_)));
    }

    #[test]
    fn iteration_cap_yields_convergence_failure() {
        // A meshed case cannot settle in a single sweep.
        let mut network = radial_case(50.0, 100.0);
        let b3 = network.add_bus(Bus::new(BusId::new(3), "Bus 3"));
        let buses = network.bus_indices();
        network.add_branch(
            buses[1],
            b3,
            Branch::new(
                BranchId::new(2),
                "Line 2-3",
                BusId::new(2),
                BusId::new(3),
                0.02,
                0.1,
            )
            .with_rating(100.0),
        );
        network.add_branch(
            buses[0],
            b3,
            Branch::new(
                BranchId::new(3),
                "Line 1-3",
                BusId::new(1),
                BusId::new(3),
                0.02,
                0.1,
            )
            .with_rating(100.0),
        );
        let err = LinearizedFlowSolver::new()
            .with_max_iterations(1)
            .solve(&network)
            .unwrap_err();
        assert!(matches!(err, PowerFlowError::ConvergenceFailure { .. }));
    }

    #[test]
    fn write_back_skips_out_of_service_branches() {
        // A dead branch with the lowest id must not absorb the first live
        // branch's loading or shift the rest out of alignment.
        let mut network = Network::new();
        let b1 = network.add_bus(Bus::new(BusId::new(1), "Bus 1"));
        let b2 = network.add_bus(Bus::new(BusId::new(2), "Bus 2"));
        let b3 = network.add_bus(Bus::new(BusId::new(3), "Bus 3"));
        network.add_gen(
            Gen::new(GenId::new(1), "Gen 1", BusId::new(1))
                .with_p_limits(0.0, 200.0)
                .with_active_power(120.0),
        );
        network.add_load(Load::new(LoadId::new(1), "Load 3", BusId::new(3), 120.0, 0.0));

        let mut dead = Branch::new(
            BranchId::new(1),
            "Dead 1-2",
            BusId::new(1),
            BusId::new(2),
            0.02,
            0.1,
        )
        .with_rating(100.0);
        dead.status = false;
        network.add_branch(b1, b2, dead);
        network.add_branch(
            b1,
            b2,
            Branch::new(
                BranchId::new(2),
                "Live 1-2",
                BusId::new(1),
                BusId::new(2),
                0.02,
                0.1,
            )
            .with_rating(100.0),
        );
        network.add_branch(
            b2,
            b3,
            Branch::new(
                BranchId::new(3),
                "Live 2-3",
                BusId::new(2),
                BusId::new(3),
                0.02,
                0.1,
            )
            .with_rating(100.0),
        );

        let solution = LinearizedFlowSolver::new().solve(&network).unwrap();
        // Two live branches, each carrying the full 120 MW transfer.
        assert_eq!(solution.loading_percent.len(), 2);
        solution.write_back(&mut network);

        let mut by_name: Vec<(&str, f64, bool)> = network
            .graph
            .edge_weights()
            .map(|Edge::Branch(b)| (b.name.as_str(), b.loading_percent.value(), b.status))
            .collect();
        by_name.sort_by_key(|(name, _, _)| *name);

        let (_, dead_loading, dead_status) = by_name[0];
        assert!(!dead_status);
        assert_eq!(dead_loading, 0.0, "out-of-service branch was assigned a loading");
        for &(name, loading, status) in &by_name[1..] {
            assert!(status);
            assert!(loading > 100.0, "{name} should carry the full transfer, got {loading}");
        }
    }

    #[test]
    fn write_back_updates_network_fields() {
        let mut network = radial_case(120.0, 100.0);
        let solution = LinearizedFlowSolver::new().solve(&network).unwrap();
        solution.write_back(&mut network);
        let overloaded = network
            .graph
            .edge_weights()
            .any(|Edge::Branch(b)| b.loading_percent.overload() > 0.0);
        assert!(overloaded);
    }
}
