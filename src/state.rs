//! Per-instance circuit state.
//!
//! A `CircuitState` holds the live values of one instantiation of a circuit
//! definition: the resolved value of every net, the value each driving port
//! currently asserts, and each component's private data. Sub-circuit
//! instances keep their own nested `CircuitState` in their private data
//! slot, so the states form a tree mirroring the instantiation hierarchy
//! and two placements of the same definition never share values.

use std::any::Any;
use std::collections::{HashMap, HashSet};

use crate::circuit::Circuit;
use crate::component::ComponentData;
use crate::components::subcircuit::SubcircuitData;
use crate::diagnostics::Diagnostic;
use crate::net::{Netlist, Resolution};
use crate::types::{ComponentId, InstancePath, NetId, PortRef};
use crate::value::Value;

/// Live simulation state of one circuit instance.
#[derive(Default)]
pub struct CircuitState {
    path: InstancePath,
    netlist: Netlist,
    synced_version: Option<u64>,
    net_values: Vec<Value>,
    drives: HashMap<PortRef, Value>,
    data: HashMap<ComponentId, ComponentData>,
    dirty: Vec<ComponentId>,
    dirty_set: HashSet<ComponentId>,
    reported_config: HashMap<ComponentId, String>,
}

impl CircuitState {
    /// State for the root circuit.
    pub fn root() -> Self {
        Self::default()
    }

    /// State for the sub-circuit instance `component` placed inside the
    /// state at `parent`.
    pub fn nested(parent: &[ComponentId], component: ComponentId) -> Self {
        let mut path = parent.to_vec();
        path.push(component);
        Self { path, ..Self::default() }
    }

    /// Instantiation path of this state; empty for the root.
    pub fn path(&self) -> &[ComponentId] {
        &self.path
    }

    /// Path of the parent state, `None` for the root.
    pub fn parent_path(&self) -> Option<&[ComponentId]> {
        self.path.split_last().map(|(_, parent)| parent)
    }

    /// The netlist currently in use.
    pub fn netlist(&self) -> &Netlist {
        &self.netlist
    }

    /// True if the netlist matches the circuit's topology version.
    pub fn is_synced(&self, circuit: &Circuit) -> bool {
        self.synced_version == Some(circuit.version())
    }

    /// Rebuilds nets if the circuit changed since the last sync.
    ///
    /// Drives and private data of surviving components are kept, values of
    /// every net are recomputed, and every component is marked for
    /// propagation. Returns true if a rebuild happened.
    pub fn sync(&mut self, circuit: &Circuit, diagnostics: &mut Vec<Diagnostic>) -> bool {
        if self.is_synced(circuit) {
            return false;
        }

        let netlist = Netlist::build(circuit);
        self.drives.retain(|port, _| netlist.net_of_port(*port).is_some());
        self.data.retain(|id, _| circuit.component(*id).is_some());
        self.reported_config.retain(|id, _| circuit.component(*id).is_some());

        self.net_values = (0..netlist.len())
            .map(|net| netlist.resolve(net, &self.drives).value)
            .collect();

        for (net_id, net) in netlist.nets().iter().enumerate() {
            if net.has_width_conflict() {
                diagnostics.push(Diagnostic::WidthConflict {
                    path: self.path.clone(),
                    net: net_id,
                    widths: net.widths.clone(),
                });
            }
        }

        for placed in circuit.components() {
            match placed.component.config_error() {
                Some(message) => {
                    if self.reported_config.get(&placed.id).map(String::as_str) != Some(message) {
                        self.reported_config.insert(placed.id, message.to_string());
                        diagnostics.push(Diagnostic::ConfigurationError {
                            path: self.path.clone(),
                            component: placed.id,
                            message: message.to_string(),
                        });
                    }
                }
                None => {
                    self.reported_config.remove(&placed.id);
                }
            }
            self.mark_dirty(placed.id);
        }

        self.netlist = netlist;
        self.synced_version = Some(circuit.version());
        true
    }

    /// Resolved value of a net.
    pub fn net_value(&self, net: NetId) -> Option<Value> {
        self.net_values.get(net).copied()
    }

    /// Resolved values of all nets, indexed by `NetId`.
    pub fn net_values(&self) -> &[Value] {
        &self.net_values
    }

    /// Value visible at a port of the given width.
    ///
    /// Ports on a net with a width conflict see all `E`.
    pub fn port_value(&self, port: PortRef, width: u8) -> Value {
        let Some(net_id) = self.netlist.net_of_port(port) else {
            return Value::unknown(width);
        };
        match (self.netlist.net(net_id), self.net_values.get(net_id)) {
            (Some(net), Some(value)) if !net.has_width_conflict() && value.width() == width => *value,
            (Some(net), _) if net.has_width_conflict() => Value::error(width),
            _ => Value::unknown(width),
        }
    }

    /// Value currently asserted by a driving port.
    pub fn drive(&self, port: PortRef) -> Option<Value> {
        self.drives.get(&port).copied()
    }

    /// Records a port's new drive. Returns the affected net if the drive
    /// actually changed.
    pub fn apply_drive(&mut self, port: PortRef, value: Value) -> Option<NetId> {
        let net = self.netlist.net_of_port(port)?;
        if self.drives.get(&port) == Some(&value) {
            return None;
        }
        self.drives.insert(port, value);
        Some(net)
    }

    /// Re-resolves a net. Returns the resolution if the value changed.
    pub fn recompute(&mut self, net: NetId) -> Option<Resolution> {
        let resolution = self.netlist.resolve(net, &self.drives);
        let slot = self.net_values.get_mut(net)?;
        if *slot == resolution.value {
            return None;
        }
        *slot = resolution.value;
        Some(resolution)
    }

    /// Private data of a component.
    pub fn data(&self, id: ComponentId) -> Option<&(dyn Any + Send)> {
        self.data.get(&id).map(|d| d.as_ref())
    }

    /// Mutable private data of a component.
    pub fn data_mut(&mut self, id: ComponentId) -> Option<&mut (dyn Any + Send)> {
        self.data.get_mut(&id).map(|d| d.as_mut())
    }

    /// Replaces a component's private data.
    pub fn set_data(&mut self, id: ComponentId, data: ComponentData) {
        self.data.insert(id, data);
    }

    /// Temporarily removes a component's data so it can be lent out.
    pub(crate) fn take_data(&mut self, id: ComponentId) -> Option<ComponentData> {
        self.data.remove(&id)
    }

    /// Returns data taken with [`take_data`](Self::take_data).
    pub(crate) fn restore_data(&mut self, id: ComponentId, data: Option<ComponentData>) {
        if let Some(data) = data {
            self.data.insert(id, data);
        }
    }

    /// Queues a component for propagation at the current time.
    pub fn mark_dirty(&mut self, id: ComponentId) {
        if self.dirty_set.insert(id) {
            self.dirty.push(id);
        }
    }

    /// True if some component awaits propagation.
    pub fn has_dirty(&self) -> bool {
        !self.dirty.is_empty()
    }

    /// Takes the queued components in the order they were marked.
    pub(crate) fn take_dirty(&mut self) -> Vec<ComponentId> {
        self.dirty_set.clear();
        std::mem::take(&mut self.dirty)
    }

    /// Clears every net, drive and private data. The next sync rebuilds
    /// the netlist and marks every component for propagation.
    pub fn reset(&mut self) {
        self.net_values.iter_mut().for_each(|v| *v = Value::unknown(v.width()));
        self.drives.clear();
        self.data.clear();
        self.dirty.clear();
        self.dirty_set.clear();
        self.synced_version = None;
    }

    /// Nested state of the sub-circuit instance `id`.
    pub fn child(&self, id: ComponentId) -> Option<&CircuitState> {
        self.data
            .get(&id)
            .and_then(|d| d.downcast_ref::<SubcircuitData>())
            .map(|sub| &sub.state)
    }

    /// Mutable nested state of the sub-circuit instance `id`.
    pub fn child_mut(&mut self, id: ComponentId) -> Option<&mut CircuitState> {
        self.data
            .get_mut(&id)
            .and_then(|d| d.downcast_mut::<SubcircuitData>())
            .map(|sub| &mut sub.state)
    }

    /// Follows a relative instantiation path down the tree.
    pub fn descendant(&self, path: &[ComponentId]) -> Option<&CircuitState> {
        path.iter().try_fold(self, |state, id| state.child(*id))
    }

    /// Ids of sub-circuit instances with live nested states, sorted.
    pub fn children(&self) -> Vec<ComponentId> {
        let mut ids: Vec<_> = self
            .data
            .iter()
            .filter(|(_, d)| d.is::<SubcircuitData>())
            .map(|(id, _)| *id)
            .collect();
        ids.sort_unstable();
        ids
    }
}

impl std::fmt::Debug for CircuitState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CircuitState")
            .field("path", &self.path)
            .field("nets", &self.net_values.len())
            .field("drives", &self.drives.len())
            .field("data", &self.data.len())
            .field("dirty", &self.dirty)
            .finish()
    }
}
