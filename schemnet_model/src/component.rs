//! Component instances and their pin descriptors.

use crate::geom::Location;
use crate::splitter::SplitterSpec;

/// Electrical direction of one component pin.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum PinDirection {
    /// The pin consumes a value from the net (sink).
    Input,
    /// The pin drives a value onto the net (source).
    Output,
    /// The pin may do either; only legal on kinds that opt in.
    Bidirectional,
}

impl PinDirection {
    /// True for `Input` and `Bidirectional`.
    pub fn is_input(self) -> bool {
        matches!(self, PinDirection::Input | PinDirection::Bidirectional)
    }

    /// True for `Output` and `Bidirectional`.
    pub fn is_output(self) -> bool {
        matches!(self, PinDirection::Output | PinDirection::Bidirectional)
    }
}

/// Which side of the enclosing circuit a port component represents.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum PortKind {
    /// Circuit input: the port drives the circuit-internal net.
    Input,
    /// Circuit output: the port consumes from the circuit-internal net.
    Output,
}

/// One pin of a component: where it touches the schematic, its direction
/// and its bit width. Width 0 means "adapts to the net" and never takes
/// part in width propagation.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PinDescriptor {
    /// Grid location the pin touches.
    pub location: Location,
    /// Direction seen from the component.
    pub direction: PinDirection,
    /// Bit width; 0 = undetermined.
    pub width: u32,
}

impl PinDescriptor {
    /// Create a pin descriptor.
    pub const fn new(location: Location, direction: PinDirection, width: u32) -> Self {
        PinDescriptor {
            location,
            direction,
            width,
        }
    }
}

/// Timing attributes of a clock generator. Clock components with equal
/// parameters are folded onto one clock id during clock-tree construction.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ClockParams {
    /// Ticks the output stays high.
    pub high: u32,
    /// Ticks the output stays low.
    pub low: u32,
}

/// Hidden-port counts of an IO-mapped component (buttons, LEDs, ...).
/// These feed the hierarchical bubble numbering.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct MapInfo {
    /// Hidden input ports contributed by the component.
    pub in_ports: u32,
    /// Hidden output ports contributed by the component.
    pub out_ports: u32,
    /// Hidden inout ports contributed by the component.
    pub inout_ports: u32,
}

/// What a component instance is, as far as netlist construction cares.
#[derive(Clone, Debug, PartialEq)]
pub enum ComponentKind {
    /// A port of the enclosing circuit.
    Pin(PortKind),
    /// A clock generator.
    Clock(ClockParams),
    /// A named virtual wire; the label is the tunnel name.
    Tunnel,
    /// A bus splitter with a fixed bit map.
    Splitter(SplitterSpec),
    /// A simulation probe; transparent for synthesis.
    Probe,
    /// An instance of another circuit definition.
    Subcircuit {
        /// Name of the child circuit definition.
        circuit: String,
        /// Child port labels, parallel to the instance pins.
        pin_labels: Vec<String>,
    },
    /// Any ordinary synthesisable component (gates, registers, ...).
    Gate {
        /// HDL entity name of the component kind.
        name: String,
    },
}

/// A placed component instance.
#[derive(Clone, Debug, PartialEq)]
pub struct Component {
    /// What the component is.
    pub kind: ComponentKind,
    /// User label; significance depends on the kind (tunnel name, port
    /// name, instance name).
    pub label: String,
    /// Pins in declaration order.
    pub pins: Vec<PinDescriptor>,
    /// False when no HDL generator exists for the kind.
    pub hdl_supported: bool,
    /// True when DRC demands a non-empty, unique label.
    pub requires_label: bool,
    /// True when the component needs the FPGA global clock resource.
    pub requires_global_clock: bool,
    /// True when the component can drive a floating (tri-state) output.
    pub three_state: bool,
    /// True when bidirectional pins are legal on this component.
    pub supports_bidirectional: bool,
    /// Hidden-port counts for IO-mapped components.
    pub map_info: Option<MapInfo>,
}

impl Component {
    fn base(kind: ComponentKind, label: impl Into<String>, pins: Vec<PinDescriptor>) -> Self {
        Component {
            kind,
            label: label.into(),
            pins,
            hdl_supported: true,
            requires_label: false,
            requires_global_clock: false,
            three_state: false,
            supports_bidirectional: false,
            map_info: None,
        }
    }

    /// An ordinary synthesisable component.
    pub fn gate(name: impl Into<String>, label: impl Into<String>, pins: Vec<PinDescriptor>) -> Self {
        Component::base(ComponentKind::Gate { name: name.into() }, label, pins)
    }

    /// A circuit input port: drives the internal net at `location`.
    pub fn input_port(label: impl Into<String>, location: Location, width: u32) -> Self {
        let mut comp = Component::base(
            ComponentKind::Pin(PortKind::Input),
            label,
            vec![PinDescriptor::new(location, PinDirection::Output, width)],
        );
        comp.requires_label = true;
        comp
    }

    /// A circuit output port: consumes the internal net at `location`.
    pub fn output_port(label: impl Into<String>, location: Location, width: u32) -> Self {
        let mut comp = Component::base(
            ComponentKind::Pin(PortKind::Output),
            label,
            vec![PinDescriptor::new(location, PinDirection::Input, width)],
        );
        comp.requires_label = true;
        comp
    }

    /// A clock generator with a single 1-bit output.
    pub fn clock(label: impl Into<String>, location: Location, params: ClockParams) -> Self {
        Component::base(
            ComponentKind::Clock(params),
            label,
            vec![PinDescriptor::new(location, PinDirection::Output, 1)],
        )
    }

    /// A tunnel; the label is the tunnel name, `width` 0 adapts to the net.
    pub fn tunnel(name: impl Into<String>, location: Location, width: u32) -> Self {
        Component::base(
            ComponentKind::Tunnel,
            name,
            vec![PinDescriptor::new(location, PinDirection::Input, width)],
        )
    }

    /// A probe; ignored by netlist construction.
    pub fn probe(location: Location, width: u32) -> Self {
        Component::base(
            ComponentKind::Probe,
            "",
            vec![PinDescriptor::new(location, PinDirection::Input, width)],
        )
    }

    /// A splitter. Pin 0 is the combined end at `combined`; the fan ends
    /// follow in `fans` order, widths derived from the spec.
    pub fn splitter(combined: Location, fans: Vec<Location>, spec: SplitterSpec) -> Self {
        debug_assert_eq!(fans.len(), spec.fan_count() as usize);
        let mut pins = vec![PinDescriptor::new(
            combined,
            PinDirection::Bidirectional,
            spec.bus_width(),
        )];
        for (fan, loc) in fans.into_iter().enumerate() {
            pins.push(PinDescriptor::new(
                loc,
                PinDirection::Bidirectional,
                spec.fan_width(fan as u8),
            ));
        }
        Component::base(ComponentKind::Splitter(spec), "", pins)
    }

    /// A sub-circuit instance. Each entry of `pins` pairs the child port
    /// label with the pin geometry on this instance.
    pub fn subcircuit(
        circuit: impl Into<String>,
        label: impl Into<String>,
        pins: Vec<(String, PinDescriptor)>,
    ) -> Self {
        let (pin_labels, descriptors) = pins.into_iter().unzip();
        let mut comp = Component::base(
            ComponentKind::Subcircuit {
                circuit: circuit.into(),
                pin_labels,
            },
            label,
            descriptors,
        );
        comp.requires_label = true;
        comp
    }

    /// Attach hidden-port counts; also makes the label mandatory, since
    /// mapped components are addressed by hierarchy path.
    pub fn with_map_info(mut self, info: MapInfo) -> Self {
        self.map_info = Some(info);
        self.requires_label = true;
        self
    }

    /// Mark the component as having no HDL generator.
    pub fn unsupported(mut self) -> Self {
        self.hdl_supported = false;
        self
    }

    /// Mark the component as a tri-state driver.
    pub fn with_three_state(mut self) -> Self {
        self.three_state = true;
        self
    }

    /// Mark the component as needing the FPGA global clock.
    pub fn with_global_clock_requirement(mut self) -> Self {
        self.requires_global_clock = true;
        self
    }

    /// Allow bidirectional pins on this component.
    pub fn with_bidirectional_support(mut self) -> Self {
        self.supports_bidirectional = true;
        self
    }

    /// HDL entity name of the component kind, used for label collision
    /// checks.
    pub fn hdl_name(&self) -> &str {
        match &self.kind {
            ComponentKind::Gate { name } => name,
            ComponentKind::Subcircuit { circuit, .. } => circuit,
            ComponentKind::Pin(_) => "Pin",
            ComponentKind::Clock(_) => "Clock",
            ComponentKind::Tunnel => "Tunnel",
            ComponentKind::Splitter(_) => "Splitter",
            ComponentKind::Probe => "Probe",
        }
    }

    /// True for splitters.
    pub fn is_splitter(&self) -> bool {
        matches!(self.kind, ComponentKind::Splitter(_))
    }

    /// True for sub-circuit instances.
    pub fn is_subcircuit(&self) -> bool {
        matches!(self.kind, ComponentKind::Subcircuit { .. })
    }

    /// The splitter spec, for splitter components.
    pub fn splitter_spec(&self) -> Option<&SplitterSpec> {
        match &self.kind {
            ComponentKind::Splitter(spec) => Some(spec),
            _ => None,
        }
    }
}
