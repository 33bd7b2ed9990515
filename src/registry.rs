//! Component factory registry for dynamic component creation.
//!
//! The registry allows component kinds to be registered by name, so a host
//! can build circuits from type names and attribute sets without knowing
//! the concrete types.
//!
//! Factories never fail. An attribute set that does not describe a valid
//! component yields a component whose
//! [`config_error`](crate::component::Component::config_error) explains the
//! problem; the simulator reports it once and treats the component as
//! driving `E`.
//!
//! # Example
//!
//! ```
//! use kairo::registry::create_default_registry;
//! use kairo::attrs::AttributeSet;
//!
//! let registry = create_default_registry();
//! let attrs = AttributeSet::new().with("inputs", 3).with("delay", 2);
//! let gate = registry.create("AND Gate", &attrs).unwrap();
//! assert_eq!(gate.ports().len(), 4);
//! assert!(gate.config_error().is_none());
//! ```

use std::any::Any;
use std::collections::HashMap;
use std::sync::Arc;

use crate::attrs::AttributeSet;
use crate::circuit::Circuit;
use crate::component::{Component, PortDesc, PropagateContext};
use crate::components::{
    Buffer, Clock, Constant, ControlledBuffer, DFlipFlop, Gate, GateOp, NotGate, Pin, Probe,
    PullResistor, Subcircuit, TtlKind, TtlQuadGate,
};
use crate::error::{SimError, SimResult};
use crate::types::SimTime;
use crate::value::{Bit, Value};

/// Type alias for component factory functions.
pub type ComponentFactory = Arc<dyn Fn(&AttributeSet) -> Arc<dyn Component> + Send + Sync>;

/// A registry for component factories.
#[derive(Default)]
pub struct ComponentRegistry {
    factories: HashMap<String, ComponentFactory>,
}

impl ComponentRegistry {
    /// Creates a new empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a component factory with the given name.
    ///
    /// A factory registered under an existing name replaces it.
    pub fn register<F>(&mut self, name: impl Into<String>, factory: F)
    where
        F: Fn(&AttributeSet) -> Arc<dyn Component> + Send + Sync + 'static,
    {
        self.factories.insert(name.into(), Arc::new(factory));
    }

    /// Registers a circuit definition under its own name so it can be
    /// instantiated as a sub-circuit. The `delay` attribute sets the
    /// instance's boundary delay.
    pub fn register_subcircuit(&mut self, circuit: Arc<Circuit>) {
        let name = circuit.name().to_string();
        self.register(name.clone(), move |attrs| {
            build(&name, || {
                let delay: SimTime = attrs.parse_or("delay", 0)?;
                Ok(Arc::new(Subcircuit::with_delay(Arc::clone(&circuit), delay)))
            })
        });
    }

    /// Creates a component by type name.
    pub fn create(&self, type_name: &str, attrs: &AttributeSet) -> SimResult<Arc<dyn Component>> {
        self.factories
            .get(type_name)
            .map(|f| f(attrs))
            .ok_or_else(|| SimError::UnknownType(type_name.to_string()))
    }

    /// Returns true if a type is registered.
    pub fn contains(&self, type_name: &str) -> bool {
        self.factories.contains_key(type_name)
    }

    /// Returns the number of registered types.
    pub fn len(&self) -> usize {
        self.factories.len()
    }

    /// Returns true if no types are registered.
    pub fn is_empty(&self) -> bool {
        self.factories.is_empty()
    }

    /// Registered type names, sorted.
    pub fn type_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.factories.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Unregisters a component type.
    pub fn unregister(&mut self, type_name: &str) -> bool {
        self.factories.remove(type_name).is_some()
    }

    /// Clears all registered types.
    pub fn clear(&mut self) {
        self.factories.clear();
    }
}

impl std::fmt::Debug for ComponentRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ComponentRegistry")
            .field("registered_types", &self.type_names())
            .finish()
    }
}

/// Stand-in for a component whose attributes could not be parsed.
#[derive(Debug)]
struct Misconfigured {
    type_name: String,
    message: String,
}

impl Component for Misconfigured {
    fn name(&self) -> &str {
        &self.type_name
    }

    fn ports(&self) -> &[PortDesc] {
        &[]
    }

    fn config_error(&self) -> Option<&str> {
        Some(&self.message)
    }

    fn propagate(&self, _ctx: &mut PropagateContext<'_>) -> SimResult<()> {
        Ok(())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

fn build(
    type_name: &str,
    f: impl FnOnce() -> Result<Arc<dyn Component>, String>,
) -> Arc<dyn Component> {
    f().unwrap_or_else(|message| {
        Arc::new(Misconfigured {
            type_name: type_name.to_string(),
            message,
        })
    })
}

fn parse_bit(attrs: &AttributeSet, key: &str, default: Bit) -> Result<Bit, String> {
    match attrs.get(key) {
        None => Ok(default),
        Some(raw) => {
            let mut chars = raw.trim().chars();
            match (chars.next().and_then(Bit::from_char), chars.next()) {
                (Some(bit), None) => Ok(bit),
                _ => Err(format!("attribute `{key}` has invalid value {raw:?}")),
            }
        }
    }
}

/// Creates a default registry with the built-in component types.
///
/// Includes `Pin`, `Constant`, `Pull Resistor`, `Probe`, the six
/// multi-input gates (`AND Gate` .. `XNOR Gate`), `NOT Gate`, `Buffer`,
/// `Controlled Buffer`, `Clock`, `D Flip-Flop` and the `7408`, `7432` and
/// `7486` packages.
///
/// Recognised attributes are `width`, `delay`, `inputs` (gates), `output`
/// and `label` (pins), `value` (constants), `pull` (pull resistors) and
/// `high`/`low` (clocks).
pub fn create_default_registry() -> ComponentRegistry {
    let mut registry = ComponentRegistry::new();

    registry.register("Pin", |attrs| {
        build("Pin", || {
            let width: u8 = attrs.parse_or("width", 1)?;
            let output: bool = attrs.parse_or("output", false)?;
            let mut pin = if output { Pin::output(width) } else { Pin::input(width) };
            if let Some(label) = attrs.get("label") {
                pin = pin.with_label(label);
            }
            Ok(Arc::new(pin))
        })
    });

    registry.register("Constant", |attrs| {
        build("Constant", || {
            let value: Value = attrs.parse_or("value", Value::TRUE)?;
            Ok(Arc::new(Constant::new(value)))
        })
    });

    registry.register("Pull Resistor", |attrs| {
        build("Pull Resistor", || {
            let width: u8 = attrs.parse_or("width", 1)?;
            let pull = parse_bit(attrs, "pull", Bit::Zero)?;
            Ok(Arc::new(PullResistor::new(pull, width)))
        })
    });

    registry.register("Probe", |attrs| {
        build("Probe", || Ok(Arc::new(Probe::new(attrs.parse_or("width", 1)?))))
    });

    for op in GateOp::ALL {
        registry.register(op.name(), move |attrs| {
            build(op.name(), || {
                let width: u8 = attrs.parse_or("width", 1)?;
                let inputs: usize = attrs.parse_or("inputs", 2)?;
                let delay: SimTime = attrs.parse_or("delay", 1)?;
                Ok(Arc::new(Gate::new(op, width, inputs, delay)))
            })
        });
    }

    registry.register("NOT Gate", |attrs| {
        build("NOT Gate", || {
            Ok(Arc::new(NotGate::new(attrs.parse_or("width", 1)?, attrs.parse_or("delay", 1)?)))
        })
    });

    registry.register("Buffer", |attrs| {
        build("Buffer", || {
            Ok(Arc::new(Buffer::new(attrs.parse_or("width", 1)?, attrs.parse_or("delay", 1)?)))
        })
    });

    registry.register("Controlled Buffer", |attrs| {
        build("Controlled Buffer", || {
            Ok(Arc::new(ControlledBuffer::new(
                attrs.parse_or("width", 1)?,
                attrs.parse_or("delay", 1)?,
            )))
        })
    });

    registry.register("Clock", |attrs| {
        build("Clock", || {
            Ok(Arc::new(Clock::new(attrs.parse_or("high", 1)?, attrs.parse_or("low", 1)?)))
        })
    });

    registry.register("D Flip-Flop", |attrs| {
        build("D Flip-Flop", || {
            Ok(Arc::new(DFlipFlop::new(attrs.parse_or("width", 1)?, attrs.parse_or("delay", 1)?)))
        })
    });

    for kind in [TtlKind::Ttl7408, TtlKind::Ttl7432, TtlKind::Ttl7486] {
        registry.register(kind.part_number(), move |_| {
            Arc::new(TtlQuadGate::new(kind)) as Arc<dyn Component>
        });
    }

    registry
}
