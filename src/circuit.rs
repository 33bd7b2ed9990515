//! Circuit definitions: placed components and wire segments.
//!
//! A `Circuit` is pure topology. It carries a version counter that every
//! edit bumps; circuit states compare it against the version their netlist
//! was built from and rebuild lazily, instead of being notified through
//! listeners.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::component::Component;
use crate::components::wiring::Pin;
use crate::error::{SimError, SimResult};
use crate::geometry::{Bounds, Location};
use crate::types::ComponentId;

/// A component placed at an anchor location.
#[derive(Clone, Debug)]
pub struct Placed {
    /// Stable id within the circuit
    pub id: ComponentId,
    /// Anchor location; port offsets are relative to it
    pub location: Location,
    /// The component itself, shared with any clones of the circuit
    pub component: Arc<dyn Component>,
}

impl Placed {
    /// Absolute location of port `port`.
    pub fn port_location(&self, port: usize) -> Option<Location> {
        self.component
            .ports()
            .get(port)
            .map(|desc| self.location.offset_by(desc.offset))
    }

    /// Absolute placement bounds.
    pub fn bounds(&self) -> Bounds {
        self.component.bounds().translate(self.location.x, self.location.y)
    }
}

/// A wire segment joining two locations.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Wire {
    pub a: Location,
    pub b: Location,
}

impl Wire {
    /// Creates a wire; endpoint order is normalised.
    pub fn new(a: Location, b: Location) -> Self {
        if b < a {
            Self { a: b, b: a }
        } else {
            Self { a, b }
        }
    }
}

/// A circuit definition.
#[derive(Clone, Debug)]
pub struct Circuit {
    name: String,
    components: BTreeMap<ComponentId, Placed>,
    wires: Vec<Wire>,
    next_id: ComponentId,
    version: u64,
}

impl Circuit {
    /// Creates an empty circuit.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            components: BTreeMap::new(),
            wires: Vec::new(),
            next_id: 1,
            version: 0,
        }
    }

    /// The circuit's name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Topology version; changes on every edit.
    pub fn version(&self) -> u64 {
        self.version
    }

    fn touch(&mut self) {
        self.version += 1;
    }

    /// Places a component and returns its id.
    pub fn add(&mut self, location: Location, component: impl Component + 'static) -> ComponentId {
        self.add_shared(location, Arc::new(component))
    }

    /// Places an already shared component and returns its id.
    pub fn add_shared(&mut self, location: Location, component: Arc<dyn Component>) -> ComponentId {
        let id = self.next_id;
        self.next_id += 1;
        self.components.insert(id, Placed { id, location, component });
        self.touch();
        id
    }

    /// Removes a component. Wires touching its ports stay in place.
    pub fn remove(&mut self, id: ComponentId) -> Option<Placed> {
        let removed = self.components.remove(&id);
        if removed.is_some() {
            self.touch();
        }
        removed
    }

    /// Swaps in a reconfigured component at the same id and location,
    /// e.g. after an attribute change.
    pub fn replace(&mut self, id: ComponentId, component: Arc<dyn Component>) -> SimResult<()> {
        let placed = self
            .components
            .get_mut(&id)
            .ok_or(SimError::UnknownComponent(id))?;
        placed.component = component;
        self.touch();
        Ok(())
    }

    /// Adds a wire segment. Returns false if it already exists.
    pub fn add_wire(&mut self, a: Location, b: Location) -> bool {
        let wire = Wire::new(a, b);
        if self.wires.contains(&wire) {
            return false;
        }
        self.wires.push(wire);
        self.touch();
        true
    }

    /// Removes a wire segment. Returns false if it did not exist.
    pub fn remove_wire(&mut self, a: Location, b: Location) -> bool {
        let wire = Wire::new(a, b);
        let before = self.wires.len();
        self.wires.retain(|w| *w != wire);
        let removed = self.wires.len() != before;
        if removed {
            self.touch();
        }
        removed
    }

    /// Wires port `from.1` of component `from.0` to port `to.1` of
    /// component `to.0`.
    pub fn connect(&mut self, from: (ComponentId, usize), to: (ComponentId, usize)) -> SimResult<()> {
        let a = self.port_location(from.0, from.1)?;
        let b = self.port_location(to.0, to.1)?;
        self.add_wire(a, b);
        Ok(())
    }

    /// Absolute location of a component's port.
    pub fn port_location(&self, id: ComponentId, port: usize) -> SimResult<Location> {
        let placed = self.components.get(&id).ok_or(SimError::UnknownComponent(id))?;
        placed
            .port_location(port)
            .ok_or(SimError::UndeclaredPort { component: id, port })
    }

    /// Looks up a placed component.
    pub fn component(&self, id: ComponentId) -> Option<&Placed> {
        self.components.get(&id)
    }

    /// Placed components in id order.
    pub fn components(&self) -> impl Iterator<Item = &Placed> {
        self.components.values()
    }

    /// Number of placed components.
    pub fn component_count(&self) -> usize {
        self.components.len()
    }

    /// All wire segments.
    pub fn wires(&self) -> &[Wire] {
        &self.wires
    }

    /// Union of all component bounds.
    pub fn bounds(&self) -> Bounds {
        self.components
            .values()
            .map(Placed::bounds)
            .reduce(|a, b| a.union(&b))
            .unwrap_or_default()
    }

    fn pins(&self, output: bool) -> Vec<(ComponentId, &Pin)> {
        self.components
            .values()
            .filter_map(|p| {
                p.component
                    .as_any()
                    .downcast_ref::<Pin>()
                    .filter(|pin| pin.is_output() == output)
                    .map(|pin| (p.id, pin))
            })
            .collect()
    }

    /// Input pins in id order; these become a sub-circuit's input ports.
    pub fn input_pins(&self) -> Vec<(ComponentId, &Pin)> {
        self.pins(false)
    }

    /// Output pins in id order; these become a sub-circuit's output ports.
    pub fn output_pins(&self) -> Vec<(ComponentId, &Pin)> {
        self.pins(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::components::gates::NotGate;

    #[test]
    fn test_add_and_remove_bumps_version() {
        let mut circuit = Circuit::new("main");
        assert_eq!(circuit.version(), 0);

        let a = circuit.add(Location::new(0, 0), Pin::input(1));
        let b = circuit.add(Location::new(50, 0), NotGate::new(1, 1));
        assert_eq!((a, b), (1, 2));
        assert_eq!(circuit.version(), 2);

        assert!(circuit.remove(a).is_some());
        assert!(circuit.remove(a).is_none());
        assert_eq!(circuit.version(), 3);
        assert_eq!(circuit.component_count(), 1);
    }

    #[test]
    fn test_wires_are_deduplicated() {
        let mut circuit = Circuit::new("main");
        let a = Location::new(0, 0);
        let b = Location::new(10, 0);
        assert!(circuit.add_wire(a, b));
        assert!(!circuit.add_wire(b, a));
        assert_eq!(circuit.wires().len(), 1);
        assert!(circuit.remove_wire(b, a));
        assert!(!circuit.remove_wire(a, b));
    }

    #[test]
    fn test_connect_uses_port_locations() {
        let mut circuit = Circuit::new("main");
        let pin = circuit.add(Location::new(0, 0), Pin::input(1));
        let not = circuit.add(Location::new(60, 0), NotGate::new(1, 1));
        circuit.connect((pin, 0), (not, 0)).unwrap();

        let wire = circuit.wires()[0];
        assert_eq!(wire.a, Location::new(0, 0));
        assert_eq!(wire.b, circuit.port_location(not, 0).unwrap());
        assert!(circuit.connect((pin, 3), (not, 0)).is_err());
        assert!(circuit.connect((99, 0), (not, 0)).is_err());
    }

    #[test]
    fn test_pin_interface_order() {
        let mut circuit = Circuit::new("sub");
        let out = circuit.add(Location::new(100, 0), Pin::output(1));
        let in_b = circuit.add(Location::new(0, 20), Pin::input(4));
        let in_a = circuit.add(Location::new(0, 0), Pin::input(1));

        let inputs: Vec<_> = circuit.input_pins().into_iter().map(|(id, _)| id).collect();
        let outputs: Vec<_> = circuit.output_pins().into_iter().map(|(id, _)| id).collect();
        assert_eq!(inputs, vec![in_b, in_a]);
        assert_eq!(outputs, vec![out]);
    }
}
