//! Deterministic study cases.
//!
//! [`stress_case`] is the bundled congestion benchmark: a six-bus meshed
//! system where the cheap unit at bus 1 is dispatched well past what its
//! outgoing corridors can carry, so at least one line starts overloaded and
//! redispatch toward the remote units relieves it.

use qcm_core::{
    Branch, BranchId, Bus, BusId, Gen, GenId, Load, LoadId, Network, Node, NodeIndex, QcmError,
    QcmResult,
};

/// Six-bus meshed congestion case.
///
/// Bus 1 exports 160 MW through two corridors rated 150 MVA combined, which
/// forces an overload at the starting dispatch. Total generation matches
/// total load (210 MW).
pub fn stress_case() -> Network {
    let mut network = Network::new();

    let buses: Vec<NodeIndex> = (1..=6)
        .map(|i| network.add_bus(Bus::new(BusId::new(i), format!("Bus {i}"))))
        .collect();

    network.add_gen(
        Gen::new(GenId::new(1), "Gen 1", BusId::new(1))
            .with_p_limits(0.0, 200.0)
            .with_active_power(160.0),
    );
    network.add_gen(
        Gen::new(GenId::new(2), "Gen 2", BusId::new(3))
            .with_p_limits(0.0, 150.0)
            .with_active_power(30.0),
    );
    network.add_gen(
        Gen::new(GenId::new(3), "Gen 3", BusId::new(6))
            .with_p_limits(0.0, 100.0)
            .with_active_power(20.0),
    );

    network.add_load(Load::new(LoadId::new(1), "Load 2", BusId::new(2), 80.0, 15.0));
    network.add_load(Load::new(LoadId::new(2), "Load 4", BusId::new(4), 70.0, 12.0));
    network.add_load(Load::new(LoadId::new(3), "Load 5", BusId::new(5), 60.0, 10.0));

    let lines = [
        (1usize, 2usize, 0.02, 0.10, 80.0),
        (2, 3, 0.02, 0.10, 60.0),
        (1, 4, 0.03, 0.15, 70.0),
        (3, 4, 0.02, 0.12, 60.0),
        (4, 5, 0.02, 0.10, 60.0),
        (5, 6, 0.02, 0.10, 60.0),
        (2, 5, 0.04, 0.20, 50.0),
        (3, 6, 0.03, 0.15, 60.0),
    ];
    for (pos, &(from, to, r, x, rating)) in lines.iter().enumerate() {
        network.add_branch(
            buses[from - 1],
            buses[to - 1],
            Branch::new(
                BranchId::new(pos + 1),
                format!("Line {from}-{to}"),
                BusId::new(from),
                BusId::new(to),
                r,
                x,
            )
            .with_rating(rating),
        );
    }

    network
}

/// Attach a renewable injection at a bus, mirroring a static generator.
///
/// The wind farm participates in redispatch like any other unit, with its
/// nameplate as the upper limit.
pub fn attach_wind_farm(
    network: &mut Network,
    bus: BusId,
    p_mw: f64,
    q_mvar: f64,
) -> QcmResult<NodeIndex> {
    let bus_exists = network.graph.node_weights().any(|node| match node {
        Node::Bus(b) => b.id == bus,
        _ => false,
    });
    if !bus_exists {
        return Err(QcmError::Validation(format!(
            "cannot attach wind farm: bus {} not in network",
            bus.value()
        )));
    }
    let next_id = network
        .graph
        .node_weights()
        .filter_map(|node| match node {
            Node::Gen(g) => Some(g.id.value()),
            _ => None,
        })
        .max()
        .unwrap_or(0)
        + 1;
    let idx = network.add_gen(
        Gen::new(GenId::new(next_id), "Wind Farm", bus)
            .with_p_limits(0.0, p_mw)
            .with_active_power(p_mw)
            .with_reactive_power(q_mvar),
    );
    Ok(idx)
}
