//! Net resolution.
//!
//! Every port location and wire endpoint is a node; wire segments union
//! their two endpoints in a disjoint-set forest, and each resulting set is
//! one net. A net's value is the `combine` of every strong driver touching
//! it, with weak drivers (pull resistors) filling in bits left floating.
//!
//! Each net lists the components that read it in placement order. When
//! several nets change in one propagation step, their readers are woken
//! net by net in the order the changing events were scheduled.

use std::collections::HashMap;

use crate::circuit::Circuit;
use crate::component::Strength;
use crate::geometry::Location;
use crate::types::{ComponentId, NetId, PortRef};
use crate::value::Value;

/// Disjoint-set forest with path compression and union by rank.
#[derive(Clone, Debug, Default)]
pub struct UnionFind {
    parent: Vec<usize>,
    rank: Vec<u8>,
}

impl UnionFind {
    /// Creates `n` singleton sets.
    pub fn new(n: usize) -> Self {
        Self {
            parent: (0..n).collect(),
            rank: vec![0; n],
        }
    }

    /// Adds a singleton set and returns its element.
    pub fn make_set(&mut self) -> usize {
        let id = self.parent.len();
        self.parent.push(id);
        self.rank.push(0);
        id
    }

    /// Representative of `x`'s set.
    pub fn find(&mut self, x: usize) -> usize {
        let mut root = x;
        while self.parent[root] != root {
            root = self.parent[root];
        }
        let mut cur = x;
        while self.parent[cur] != root {
            let next = self.parent[cur];
            self.parent[cur] = root;
            cur = next;
        }
        root
    }

    /// Merges the sets of `a` and `b`. Returns false if already merged.
    pub fn union(&mut self, a: usize, b: usize) -> bool {
        let ra = self.find(a);
        let rb = self.find(b);
        if ra == rb {
            return false;
        }
        match self.rank[ra].cmp(&self.rank[rb]) {
            std::cmp::Ordering::Less => self.parent[ra] = rb,
            std::cmp::Ordering::Greater => self.parent[rb] = ra,
            std::cmp::Ordering::Equal => {
                self.parent[rb] = ra;
                self.rank[ra] += 1;
            }
        }
        true
    }

    /// Number of elements.
    pub fn len(&self) -> usize {
        self.parent.len()
    }

    /// True if there are no elements.
    pub fn is_empty(&self) -> bool {
        self.parent.is_empty()
    }
}

/// One electrically connected set of ports and wire endpoints.
#[derive(Clone, Debug, Default)]
pub struct Net {
    /// Locations belonging to the net, in discovery order
    pub locations: Vec<Location>,
    /// Every port attached to the net
    pub endpoints: Vec<PortRef>,
    /// Strong driving ports
    pub drivers: Vec<PortRef>,
    /// Weak driving ports
    pub weak_drivers: Vec<PortRef>,
    /// Components to wake when the value changes, unique, in placement order
    pub readers: Vec<ComponentId>,
    /// Distinct port widths seen on the net, in discovery order
    pub widths: Vec<u8>,
}

impl Net {
    /// The net's width; bare wires with no ports are one bit wide.
    pub fn width(&self) -> u8 {
        self.widths.first().copied().unwrap_or(1)
    }

    /// True if ports of different widths share the net.
    pub fn has_width_conflict(&self) -> bool {
        self.widths.len() > 1
    }
}

/// Result of resolving one net.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Resolution {
    /// The shared value
    pub value: Value,
    /// True if strong drivers disagreed somewhere
    pub conflict: bool,
}

/// The nets of one circuit at one topology version.
#[derive(Clone, Debug, Default)]
pub struct Netlist {
    version: u64,
    nets: Vec<Net>,
    port_net: HashMap<PortRef, NetId>,
    location_net: HashMap<Location, NetId>,
}

impl Netlist {
    /// Partitions the circuit's ports and wires into nets.
    pub fn build(circuit: &Circuit) -> Self {
        let mut forest = UnionFind::default();
        let mut node_of: HashMap<Location, usize> = HashMap::new();
        let mut order: Vec<Location> = Vec::new();
        let mut node = |loc: Location, forest: &mut UnionFind| -> usize {
            *node_of.entry(loc).or_insert_with(|| {
                order.push(loc);
                forest.make_set()
            })
        };

        let mut ports = Vec::new();
        for placed in circuit.components() {
            for (index, desc) in placed.component.ports().iter().enumerate() {
                let loc = placed.location.offset_by(desc.offset);
                let n = node(loc, &mut forest);
                ports.push((PortRef::new(placed.id, index), n, desc.clone()));
            }
        }
        for wire in circuit.wires() {
            let a = node(wire.a, &mut forest);
            let b = node(wire.b, &mut forest);
            forest.union(a, b);
        }

        let mut nets: Vec<Net> = Vec::new();
        let mut net_of_root: HashMap<usize, NetId> = HashMap::new();
        let mut location_net = HashMap::new();
        for (i, loc) in order.iter().enumerate() {
            let root = forest.find(i);
            let net = *net_of_root.entry(root).or_insert_with(|| {
                nets.push(Net::default());
                nets.len() - 1
            });
            nets[net].locations.push(*loc);
            location_net.insert(*loc, net);
        }

        let mut port_net = HashMap::new();
        for (port, n, desc) in ports {
            let id = net_of_root[&forest.find(n)];
            let net = &mut nets[id];
            net.endpoints.push(port);
            if !net.widths.contains(&desc.width) {
                net.widths.push(desc.width);
            }
            if desc.direction.can_drive() {
                match desc.strength {
                    Strength::Strong => net.drivers.push(port),
                    Strength::Weak => net.weak_drivers.push(port),
                }
            }
            if desc.direction.is_sensitive() && !net.readers.contains(&port.component) {
                net.readers.push(port.component);
            }
            port_net.insert(port, id);
        }
        tracing::debug!(
            circuit = circuit.name(),
            version = circuit.version(),
            nets = nets.len(),
            "rebuilt netlist"
        );

        Self {
            version: circuit.version(),
            nets,
            port_net,
            location_net,
        }
    }

    /// Topology version the netlist was built from.
    pub fn version(&self) -> u64 {
        self.version
    }

    /// All nets, indexed by `NetId`.
    pub fn nets(&self) -> &[Net] {
        &self.nets
    }

    /// Looks up a net.
    pub fn net(&self, id: NetId) -> Option<&Net> {
        self.nets.get(id)
    }

    /// Number of nets.
    pub fn len(&self) -> usize {
        self.nets.len()
    }

    /// True if the circuit has no ports or wires.
    pub fn is_empty(&self) -> bool {
        self.nets.is_empty()
    }

    /// Net a port belongs to.
    pub fn net_of_port(&self, port: PortRef) -> Option<NetId> {
        self.port_net.get(&port).copied()
    }

    /// Net passing through a location.
    pub fn net_at(&self, loc: Location) -> Option<NetId> {
        self.location_net.get(&loc).copied()
    }

    /// Computes a net's value from the current port drives.
    ///
    /// Ports with no recorded drive count as floating. A net with a width
    /// conflict resolves to all `E`.
    pub fn resolve(&self, id: NetId, drives: &HashMap<PortRef, Value>) -> Resolution {
        let Some(net) = self.nets.get(id) else {
            return Resolution { value: Value::UNKNOWN, conflict: false };
        };
        let width = net.width();
        if net.has_width_conflict() {
            return Resolution { value: Value::error(width), conflict: false };
        }

        let fold = |ports: &[PortRef]| -> (Value, u64) {
            let mut acc = Value::unknown(width);
            let mut driver_errors = 0;
            for value in ports.iter().filter_map(|p| drives.get(p)) {
                driver_errors |= value.error_mask();
                acc = acc.combine(value).unwrap_or_else(|_| Value::error(width));
            }
            (acc, driver_errors)
        };

        let (mut value, driver_errors) = fold(&net.drivers);
        let conflict = value.error_mask() & !driver_errors != 0;
        if !net.weak_drivers.is_empty() && !value.is_fully_defined() {
            let (weak, _) = fold(&net.weak_drivers);
            value = value.pull_toward(&weak).unwrap_or_else(|_| Value::error(width));
        }
        Resolution { value, conflict }
    }
}
