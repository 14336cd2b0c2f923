//! Circuit definitions and the design container.

use indexmap::IndexMap;

use crate::component::{Component, ComponentKind};
use crate::geom::WireSegment;

/// One circuit definition: a sheet of wires and components.
#[derive(Clone, Debug, Default)]
pub struct Circuit {
    /// Definition name; must be unique across the design.
    pub name: String,
    /// Drawn wire segments.
    pub wires: Vec<WireSegment>,
    /// Placed component instances.
    pub components: Vec<Component>,
}

impl Circuit {
    /// Create an empty definition.
    pub fn new(name: impl Into<String>) -> Self {
        Circuit {
            name: name.into(),
            wires: Vec::new(),
            components: Vec::new(),
        }
    }

    /// Add a wire segment; returns `self` for chaining.
    pub fn with_wire(mut self, wire: WireSegment) -> Self {
        self.wires.push(wire);
        self
    }

    /// Add a component; returns `self` for chaining.
    pub fn with_component(mut self, comp: Component) -> Self {
        self.components.push(comp);
        self
    }

    /// Names of the child circuit definitions instantiated on this sheet,
    /// in placement order, with duplicates.
    pub fn child_circuits(&self) -> impl Iterator<Item = &str> {
        self.components.iter().filter_map(|c| match &c.kind {
            ComponentKind::Subcircuit { circuit, .. } => Some(circuit.as_str()),
            _ => None,
        })
    }
}

/// A complete design: every circuit definition, keyed by name.
///
/// Insertion order is preserved so builds and reports are deterministic.
#[derive(Clone, Debug, Default)]
pub struct Design {
    circuits: IndexMap<String, Circuit>,
}

impl Design {
    /// An empty design.
    pub fn new() -> Self {
        Design::default()
    }

    /// Insert or replace a circuit definition.
    pub fn add_circuit(&mut self, circuit: Circuit) {
        self.circuits.insert(circuit.name.clone(), circuit);
    }

    /// Look up a definition by name.
    pub fn circuit(&self, name: &str) -> Option<&Circuit> {
        self.circuits.get(name)
    }

    /// All definitions in insertion order.
    pub fn circuits(&self) -> impl Iterator<Item = &Circuit> {
        self.circuits.values()
    }

    /// Names of the definitions that directly instantiate `name`.
    pub fn embedders(&self, name: &str) -> Vec<&str> {
        self.circuits
            .values()
            .filter(|c| c.child_circuits().any(|child| child == name))
            .map(|c| c.name.as_str())
            .collect()
    }
}

/// A structural mutation of the schematic model. Each event names the
/// affected circuit definition; the DRC engine reacts by invalidating the
/// cached netlist of that definition and of every ancestor embedding it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CircuitEvent {
    /// A component was added to the named circuit.
    ComponentAdded(String),
    /// A component was removed from the named circuit.
    ComponentRemoved(String),
    /// A component's attributes changed in the named circuit.
    ComponentChanged(String),
    /// The named circuit was cleared wholesale.
    Cleared(String),
    /// The named circuit was invalidated for an external reason.
    Invalidated(String),
}

impl CircuitEvent {
    /// The circuit definition the event refers to.
    pub fn circuit(&self) -> &str {
        match self {
            CircuitEvent::ComponentAdded(name)
            | CircuitEvent::ComponentRemoved(name)
            | CircuitEvent::ComponentChanged(name)
            | CircuitEvent::Cleared(name)
            | CircuitEvent::Invalidated(name) => name,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::component::PinDescriptor;

    #[test]
    fn embedders_follow_subcircuit_references() {
        let mut design = Design::new();
        design.add_circuit(Circuit::new("leaf"));
        design.add_circuit(Circuit::new("mid").with_component(Component::subcircuit(
            "leaf",
            "u1",
            Vec::<(String, PinDescriptor)>::new(),
        )));
        design.add_circuit(Circuit::new("top").with_component(Component::subcircuit(
            "mid",
            "u2",
            Vec::<(String, PinDescriptor)>::new(),
        )));
        assert_eq!(design.embedders("leaf"), vec!["mid"]);
        assert_eq!(design.embedders("mid"), vec!["top"]);
        assert!(design.embedders("top").is_empty());
    }
}
