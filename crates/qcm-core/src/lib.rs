//! # qcm-core: Grid Modeling Core
//!
//! Data structures shared by the congestion-management optimizer: a
//! graph-based network model, type-safe element IDs, unit newtypes, and the
//! unified error type.
//!
//! Networks are **undirected multigraphs** where buses, generators, and loads
//! are nodes and transmission branches are edges. Keeping topology explicit
//! makes the linearized power-flow approximation in `qcm-algo` a plain graph
//! traversal and lets scenario builders compose cases element by element.
//!
//! ```
//! use qcm_core::*;
//!
//! let mut network = Network::new();
//! let b1 = network.add_bus(Bus::new(BusId::new(1), "Bus 1"));
//! let b2 = network.add_bus(Bus::new(BusId::new(2), "Bus 2"));
//! network.add_gen(
//!     Gen::new(GenId::new(1), "Gen 1", BusId::new(1)).with_p_limits(0.0, 100.0),
//! );
//! network.add_load(Load::new(LoadId::new(1), "Load 1", BusId::new(2), 50.0, 10.0));
//! network.add_branch(
//!     b1,
//!     b2,
//!     Branch::new(BranchId::new(1), "Line 1-2", BusId::new(1), BusId::new(2), 0.01, 0.1)
//!         .with_rating(60.0),
//! );
//! assert_eq!(network.stats().num_buses, 2);
//! ```

use petgraph::{prelude::*, Undirected};
use serde::{Deserialize, Serialize};

pub mod error;
pub mod units;

pub use error::{QcmError, QcmResult};
pub use petgraph::graph::NodeIndex;
pub use units::{Megavars, MegavoltAmperes, Megawatts, PerUnit, Percent};

// Newtype wrappers for IDs for type safety
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BusId(usize);
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BranchId(usize);
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GenId(usize);
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LoadId(usize);

macro_rules! impl_id {
    ($type:ty) => {
        impl $type {
            #[inline]
            pub fn new(value: usize) -> Self {
                Self(value)
            }
            #[inline]
            pub fn value(&self) -> usize {
                self.0
            }
        }
    };
}

impl_id!(BusId);
impl_id!(BranchId);
impl_id!(GenId);
impl_id!(LoadId);

/// A network bus (connection point).
#[derive(Debug, Clone)]
pub struct Bus {
    pub id: BusId,
    pub name: String,
    /// Voltage magnitude in per-unit (updated by the flow approximation)
    pub voltage_pu: PerUnit,
}

impl Bus {
    pub fn new(id: BusId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            voltage_pu: PerUnit(1.0),
        }
    }
}

/// A dispatchable generator.
///
/// `active_power` is the current dispatch setpoint; the optimizer nudges it
/// within `[pmin, pmax]`.
#[derive(Debug, Clone)]
pub struct Gen {
    pub id: GenId,
    pub name: String,
    pub bus: BusId,
    /// Active power output (MW)
    pub active_power: Megawatts,
    /// Reactive power output (Mvar)
    pub reactive_power: Megavars,
    /// Minimum active power output
    pub pmin: Megawatts,
    /// Maximum active power output
    pub pmax: Megawatts,
    /// In-service status
    pub status: bool,
}

impl Gen {
    /// Create a new generator with unconstrained limits.
    pub fn new(id: GenId, name: impl Into<String>, bus: BusId) -> Self {
        Self {
            id,
            name: name.into(),
            bus,
            active_power: Megawatts(0.0),
            reactive_power: Megavars(0.0),
            pmin: Megawatts(0.0),
            pmax: Megawatts(f64::INFINITY),
            status: true,
        }
    }

    /// Set active power limits (in MW)
    pub fn with_p_limits(mut self, pmin: f64, pmax: f64) -> Self {
        self.pmin = Megawatts(pmin);
        self.pmax = Megawatts(pmax);
        self
    }

    /// Set the current dispatch setpoint (in MW)
    pub fn with_active_power(mut self, p_mw: f64) -> Self {
        self.active_power = Megawatts(p_mw);
        self
    }

    /// Set reactive power output (in Mvar)
    pub fn with_reactive_power(mut self, q_mvar: f64) -> Self {
        self.reactive_power = Megavars(q_mvar);
        self
    }
}

/// A fixed load.
#[derive(Debug, Clone)]
pub struct Load {
    pub id: LoadId,
    pub name: String,
    pub bus: BusId,
    /// Active power demand (MW)
    pub active_power: Megawatts,
    /// Reactive power demand (Mvar)
    pub reactive_power: Megavars,
}

impl Load {
    pub fn new(id: LoadId, name: impl Into<String>, bus: BusId, p_mw: f64, q_mvar: f64) -> Self {
        Self {
            id,
            name: name.into(),
            bus,
            active_power: Megawatts(p_mw),
            reactive_power: Megavars(q_mvar),
        }
    }
}

/// A transmission branch between two buses.
#[derive(Debug, Clone)]
pub struct Branch {
    pub id: BranchId,
    pub name: String,
    pub from_bus: BusId,
    pub to_bus: BusId,
    /// Series resistance (per-unit)
    pub resistance: f64,
    /// Series reactance (per-unit)
    pub reactance: f64,
    /// Thermal rating; loadings are reported relative to this
    pub rating: MegavoltAmperes,
    /// Loading as percent of rating (updated by the flow approximation)
    pub loading_percent: Percent,
    /// Operational status flag
    pub status: bool,
}

impl Branch {
    pub fn new(
        id: BranchId,
        name: impl Into<String>,
        from_bus: BusId,
        to_bus: BusId,
        resistance: f64,
        reactance: f64,
    ) -> Self {
        Self {
            id,
            name: name.into(),
            from_bus,
            to_bus,
            resistance,
            reactance,
            rating: MegavoltAmperes(f64::INFINITY),
            loading_percent: Percent(0.0),
            status: true,
        }
    }

    /// Attach a thermal rating in MVA.
    pub fn with_rating(mut self, rating_mva: f64) -> Self {
        self.rating = MegavoltAmperes(rating_mva);
        self
    }
}

/// Node variants of the network graph.
#[derive(Debug, Clone)]
pub enum Node {
    Bus(Bus),
    Gen(Gen),
    Load(Load),
}

/// Edge variants of the network graph.
#[derive(Debug, Clone)]
pub enum Edge {
    Branch(Branch),
}

/// The main network container.
///
/// Buses, generators, and loads are nodes; branches are edges between the
/// bus nodes they connect. Generators and loads attach to buses by `BusId`
/// rather than by graph edge, matching how case files reference them.
#[derive(Debug, Clone, Default)]
pub struct Network {
    pub graph: Graph<Node, Edge, Undirected>,
}

impl Network {
    pub fn new() -> Self {
        Self {
            graph: Graph::new_undirected(),
        }
    }

    /// Add a bus node, returning its graph index.
    pub fn add_bus(&mut self, bus: Bus) -> NodeIndex {
        self.graph.add_node(Node::Bus(bus))
    }

    /// Add a generator node, returning its graph index.
    pub fn add_gen(&mut self, gen: Gen) -> NodeIndex {
        self.graph.add_node(Node::Gen(gen))
    }

    /// Add a load node, returning its graph index.
    pub fn add_load(&mut self, load: Load) -> NodeIndex {
        self.graph.add_node(Node::Load(load))
    }

    /// Add a branch edge between two bus nodes.
    pub fn add_branch(&mut self, from: NodeIndex, to: NodeIndex, branch: Branch) -> EdgeIndex {
        self.graph.add_edge(from, to, Edge::Branch(branch))
    }

    /// Graph indices of all bus nodes, ordered by `BusId`.
    pub fn bus_indices(&self) -> Vec<NodeIndex> {
        let mut buses: Vec<(BusId, NodeIndex)> = self
            .graph
            .node_indices()
            .filter_map(|idx| match &self.graph[idx] {
                Node::Bus(bus) => Some((bus.id, idx)),
                _ => None,
            })
            .collect();
        buses.sort_by_key(|(id, _)| *id);
        buses.into_iter().map(|(_, idx)| idx).collect()
    }

    /// Graph indices of all generator nodes, ordered by `GenId`.
    ///
    /// Dispatch vectors index generators in this order, so it must be stable
    /// for a network's lifetime.
    pub fn gen_indices(&self) -> Vec<NodeIndex> {
        let mut gens: Vec<(GenId, NodeIndex)> = self
            .graph
            .node_indices()
            .filter_map(|idx| match &self.graph[idx] {
                Node::Gen(gen) => Some((gen.id, idx)),
                _ => None,
            })
            .collect();
        gens.sort_by_key(|(id, _)| *id);
        gens.into_iter().map(|(_, idx)| idx).collect()
    }

    /// Compute basic statistics about the network
    pub fn stats(&self) -> NetworkStats {
        let mut stats = NetworkStats::default();

        for node in self.graph.node_weights() {
            match node {
                Node::Bus(_) => stats.num_buses += 1,
                Node::Gen(g) => {
                    stats.num_gens += 1;
                    stats.total_gen_capacity_mw += g.pmax.value();
                }
                Node::Load(l) => {
                    stats.num_loads += 1;
                    stats.total_load_mw += l.active_power.value();
                }
            }
        }

        stats.num_branches = self.graph.edge_count();
        stats
    }
}

/// Summary counts and totals for a network.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NetworkStats {
    pub num_buses: usize,
    pub num_gens: usize,
    pub num_loads: usize,
    pub num_branches: usize,
    pub total_load_mw: f64,
    pub total_gen_capacity_mw: f64,
}

impl std::fmt::Display for NetworkStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} buses, {} branches, {} gens ({:.0} MW), {} loads ({:.0} MW)",
            self.num_buses,
            self.num_branches,
            self.num_gens,
            self.total_gen_capacity_mw,
            self.num_loads,
            self.total_load_mw
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn two_bus_network() -> Network {
        let mut network = Network::new();
        let b1 = network.add_bus(Bus::new(BusId::new(1), "Bus 1"));
        let b2 = network.add_bus(Bus::new(BusId::new(2), "Bus 2"));
        network.add_gen(
            Gen::new(GenId::new(1), "Gen 1", BusId::new(1))
                .with_p_limits(0.0, 100.0)
                .with_active_power(60.0),
        );
        network.add_load(Load::new(LoadId::new(1), "Load 1", BusId::new(2), 60.0, 10.0));
        network.add_branch(
            b1,
            b2,
            Branch::new(
                BranchId::new(1),
                "Line 1-2",
                BusId::new(1),
                BusId::new(2),
                0.01,
                0.1,
            )
            .with_rating(80.0),
        );
        network
    }

    #[test]
    fn stats_count_elements() {
        let stats = two_bus_network().stats();
        assert_eq!(stats.num_buses, 2);
        assert_eq!(stats.num_gens, 1);
        assert_eq!(stats.num_loads, 1);
        assert_eq!(stats.num_branches, 1);
        assert_eq!(stats.total_load_mw, 60.0);
        assert_eq!(stats.total_gen_capacity_mw, 100.0);
    }

    #[test]
    fn gen_indices_ordered_by_id() {
        let mut network = Network::new();
        network.add_bus(Bus::new(BusId::new(1), "Bus 1"));
        // Insert out of order
        network.add_gen(Gen::new(GenId::new(3), "G3", BusId::new(1)));
        network.add_gen(Gen::new(GenId::new(1), "G1", BusId::new(1)));
        network.add_gen(Gen::new(GenId::new(2), "G2", BusId::new(1)));

        let ids: Vec<usize> = network
            .gen_indices()
            .into_iter()
            .map(|idx| match &network.graph[idx] {
                Node::Gen(g) => g.id.value(),
                _ => unreachable!(),
            })
            .collect();
        assert_eq!(ids, vec![1, 2, 3]);
    }

    #[test]
    fn stats_display_is_compact() {
        let text = two_bus_network().stats().to_string();
        assert!(text.contains("2 buses"));
        assert!(text.contains("1 gens (100 MW)"));
    }

    #[test]
    fn id_serde_is_transparent() {
        let id = GenId::new(7);
        assert_eq!(serde_json::to_string(&id).unwrap(), "7");
    }
}
