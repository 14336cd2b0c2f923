//! The per-circuit netlist and the checks that run on it.

use std::collections::{HashMap, HashSet};

use schemnet_model::{ClockParams, Location, MapInfo, SplitterSpec, WireSegment, correct_label};

use crate::builder;
use crate::clock::ClockTreeFactory;
use crate::connection::{CompId, ConnectionPoint, NetlistComponent};
use crate::diag::{DrcDiagnostic, MarkMask, Reporter, Severity};
use crate::error::NetlistError;
use crate::net::{Net, NetId};

/// A splitter's geometry and bit map, captured at build time so that the
/// hidden-connection searches need no access to the schematic model.
#[derive(Clone, Debug)]
pub struct SplitterShape {
    comp: CompId,
    bus: Location,
    fans: Vec<Location>,
    spec: SplitterSpec,
}

impl SplitterShape {
    pub(crate) fn new(comp: CompId, bus: Location, fans: Vec<Location>, spec: SplitterSpec) -> Self {
        SplitterShape {
            comp,
            bus,
            fans,
            spec,
        }
    }

    /// The model component index.
    pub fn comp(&self) -> CompId {
        self.comp
    }

    /// Location of the combined (bus) end.
    pub fn bus_location(&self) -> Location {
        self.bus
    }

    /// Location of fan end `fan`.
    pub fn fan_location(&self, fan: u8) -> Option<Location> {
        self.fans.get(fan as usize).copied()
    }

    /// The bit map.
    pub fn spec(&self) -> &SplitterSpec {
        &self.spec
    }

    pub(crate) fn same_geometry(&self, other: &SplitterShape) -> bool {
        self.bus == other.bus && self.fans == other.fans
    }
}

/// A clock generator found during classification.
#[derive(Clone, Debug)]
pub struct ClockGenerator {
    pub(crate) params: ClockParams,
    pub(crate) comp: NetlistComponent,
}

impl ClockGenerator {
    /// Timing parameters of the generator.
    pub fn params(&self) -> ClockParams {
        self.params
    }

    /// The generator's netlist component.
    pub fn component(&self) -> &NetlistComponent {
        &self.comp
    }
}

/// The complete netlist of one circuit definition: the net arena, the
/// classified components, and the clock trees traced through it.
#[derive(Clone, Debug)]
pub struct CircuitNetlist {
    pub(crate) circuit_name: String,
    pub(crate) nets: Vec<Net>,
    pub(crate) components: Vec<NetlistComponent>,
    pub(crate) sub_circuits: Vec<NetlistComponent>,
    pub(crate) clock_generators: Vec<ClockGenerator>,
    pub(crate) input_ports: Vec<NetlistComponent>,
    pub(crate) output_ports: Vec<NetlistComponent>,
    pub(crate) splitters: Vec<SplitterShape>,
    pub(crate) clock_trees: ClockTreeFactory,
    pub(crate) requires_global_clock: bool,
    pub(crate) local_bubbles: MapInfo,
}

impl CircuitNetlist {
    pub(crate) fn new(circuit_name: String, nets: Vec<Net>, splitters: Vec<SplitterShape>, requires_global_clock: bool) -> Self {
        CircuitNetlist {
            circuit_name,
            nets,
            components: Vec::new(),
            sub_circuits: Vec::new(),
            clock_generators: Vec::new(),
            input_ports: Vec::new(),
            output_ports: Vec::new(),
            splitters,
            clock_trees: ClockTreeFactory::new(),
            requires_global_clock,
            local_bubbles: MapInfo::default(),
        }
    }

    /// Name of the circuit definition this netlist was built from.
    pub fn circuit_name(&self) -> &str {
        &self.circuit_name
    }

    /// The net arena.
    pub fn nets(&self) -> &[Net] {
        &self.nets
    }

    /// Net `id`.
    pub fn net(&self, id: NetId) -> Option<&Net> {
        self.nets.get(id)
    }

    /// The net touching `loc`, if any.
    pub fn find_connected_net(&self, loc: Location) -> Option<NetId> {
        builder::find_net_at(&self.nets, loc)
    }

    /// Ordinary synthesisable components.
    pub fn components(&self) -> &[NetlistComponent] {
        &self.components
    }

    /// Sub-circuit instances.
    pub fn sub_circuits(&self) -> &[NetlistComponent] {
        &self.sub_circuits
    }

    /// Clock generators.
    pub fn clock_generators(&self) -> &[ClockGenerator] {
        &self.clock_generators
    }

    /// Input port components, in placement order.
    pub fn input_ports(&self) -> &[NetlistComponent] {
        &self.input_ports
    }

    /// Output port components, in placement order.
    pub fn output_ports(&self) -> &[NetlistComponent] {
        &self.output_ports
    }

    /// Splitters that survived the build.
    pub fn splitters(&self) -> &[SplitterShape] {
        &self.splitters
    }

    /// Clock trees traced through this circuit.
    pub fn clock_trees(&self) -> &ClockTreeFactory {
        &self.clock_trees
    }

    /// True when some component in the circuit needs the FPGA global clock.
    pub fn requires_global_clock(&self) -> bool {
        self.requires_global_clock
    }

    /// Total hidden-port counts of this definition, filled in by the
    /// hierarchy pass.
    pub fn local_bubbles(&self) -> MapInfo {
        self.local_bubbles
    }

    /// Index of the port named `label`. Input ports and output ports each
    /// count from zero; the caller disambiguates through the end direction.
    pub fn port_index(&self, label: &str) -> Option<usize> {
        let wanted = correct_label(label);
        if let Some(idx) = self.input_ports.iter().position(|p| p.label() == wanted) {
            return Some(idx);
        }
        self.output_ports.iter().position(|p| p.label() == wanted)
    }

    /// Input port `index`.
    pub fn input_pin(&self, index: usize) -> Option<&NetlistComponent> {
        self.input_ports.get(index)
    }

    /// Output port `index`.
    pub fn output_pin(&self, index: usize) -> Option<&NetlistComponent> {
        self.output_ports.get(index)
    }

    /// The connection point on the sub-circuit instance labelled `label`
    /// whose output end maps to child port `port_index`, bit `bit`.
    pub fn connection_for_subcircuit_output(
        &self,
        label: &str,
        port_index: usize,
        bit: u16,
    ) -> Option<ConnectionPoint> {
        let wanted = correct_label(label);
        for sub in &self.sub_circuits {
            if sub.label() != wanted {
                continue;
            }
            for end in sub.ends() {
                if !end.is_output() || u32::from(bit) >= end.width() {
                    continue;
                }
                if let Some(point) = end.get(bit)
                    && point.child_port() == Some(port_index)
                {
                    return Some(point.clone());
                }
            }
        }
        None
    }

    /// All sinks reachable from (`net`, `bit`), following splitters across
    /// bus boundaries. With `is_source_net` the direct sinks of the
    /// starting net itself are left out.
    pub fn hidden_sinks(&self, net: NetId, bit: u16, is_source_net: bool) -> Vec<ConnectionPoint> {
        let mut visited = HashSet::new();
        builder::hidden_sinks(&self.nets, &self.splitters, net, bit, &mut visited, is_source_net)
    }

    /// Number of single-bit root nets.
    pub fn number_of_nets(&self) -> usize {
        self.nets.iter().filter(|n| n.is_root() && !n.is_bus()).count()
    }

    /// Number of multi-bit root nets.
    pub fn number_of_busses(&self) -> usize {
        self.nets.iter().filter(|n| n.is_root() && n.is_bus()).count()
    }

    /// Check every root net for multiple drivers; diagnostics go to the
    /// reporter. Returns true when a short circuit was found.
    ///
    /// A single-bit net fed from several splitter fan ends is only a short
    /// circuit when those fan ends resolve to different physical sources;
    /// when they all trace back to the same driver the redundant entries
    /// are dropped instead.
    pub fn has_short_circuits(&mut self, reporter: &mut dyn Reporter) -> Result<bool, NetlistError> {
        let mut found_any = false;
        for id in 0..self.nets.len() {
            if !self.nets[id].is_root() {
                continue;
            }
            if self.nets[id].has_short_circuit() {
                let mut diag = DrcDiagnostic::new(
                    self.circuit_name.clone(),
                    "multiple drivers are connected to the same net",
                    Severity::Fatal,
                    MarkMask::WIRE,
                );
                diag.add_wires(self.nets[id].segments());
                reporter.add_error(diag);
                found_any = true;
            } else if self.nets[id].width() == 1 && self.nets[id].source_nets(0).len() > 1 {
                let source_points: Vec<ConnectionPoint> = self.nets[id].source_nets(0).to_vec();
                let mut segments: HashSet<WireSegment> = self.nets[id].segments().collect();
                let mut known_sources: HashMap<CompId, u16> = HashMap::new();
                let mut found = false;
                let mut diag = DrcDiagnostic::new(
                    self.circuit_name.clone(),
                    "multiple drivers are connected to the same net",
                    Severity::Fatal,
                    MarkMask::WIRE | MarkMask::INSTANCE,
                );
                for point in source_points {
                    let net = point.parent_net().ok_or(NetlistError::UnboundConnection)?;
                    let bit = point.parent_bit();
                    let mut visited = HashSet::new();
                    if !builder::has_hidden_source(
                        &self.nets,
                        &self.splitters,
                        Some((id, 0)),
                        (net, bit),
                        &mut visited,
                        None,
                    ) {
                        continue;
                    }
                    let mut visited = HashSet::new();
                    let Some(source) = builder::hidden_source(
                        &self.nets,
                        &self.splitters,
                        Some((id, 0)),
                        (net, bit),
                        &mut visited,
                        &mut segments,
                        None,
                    )?
                    else {
                        return Ok(true);
                    };
                    let comp = source.point().comp();
                    diag.add_wires(segments.iter().copied());
                    diag.add_instance(comp);
                    let index = source.bit();
                    found |= known_sources.get(&comp).is_some_and(|&prev| prev != index)
                        || !known_sources.is_empty();
                    known_sources.insert(comp, index);
                }
                if found {
                    found_any = true;
                    reporter.add_error(diag);
                } else {
                    self.nets[id].cleanup_source_nets(0);
                }
            }
        }
        Ok(found_any)
    }

    /// Warn about sources that drive nothing and sinks that nothing drives.
    pub fn report_sinks_without_source(&self, reporter: &mut dyn Reporter) {
        let mut orphaned: HashSet<ConnectionPoint> =
            self.nets.iter().filter(|n| n.is_root()).flat_map(Net::sinks).cloned().collect();
        for (id, net) in self.nets.iter().enumerate() {
            if !net.is_root() {
                continue;
            }
            for bit in 0..net.width() as u16 {
                if !net.has_bit_source(bit) {
                    continue;
                }
                let sinks = net.bit_sinks(bit);
                let mut has_sink = !sinks.is_empty();
                for sink in sinks {
                    orphaned.remove(sink);
                }
                let hidden = self.hidden_sinks(id, bit, true);
                has_sink |= !hidden.is_empty();
                for sink in &hidden {
                    orphaned.remove(sink);
                }
                if !has_sink {
                    let mut warn = DrcDiagnostic::new(
                        self.circuit_name.clone(),
                        "a source drives a net that has no sinks",
                        Severity::Normal,
                        MarkMask::WIRE,
                    );
                    warn.add_wires(net.segments());
                    reporter.add_warning(warn);
                }
            }
        }
        for sink in orphaned {
            let mut warn = DrcDiagnostic::new(
                self.circuit_name.clone(),
                "a sink is connected to a net without a source",
                Severity::Severe,
                MarkMask::INSTANCE | MarkMask::WIRE,
            );
            warn.add_instance(sink.comp());
            if let Some(net) = sink.parent_net().and_then(|n| self.nets.get(n)) {
                warn.add_wires(net.segments());
            }
            reporter.add_warning(warn);
        }
    }

    /// Warn about unconnected component inputs and floating circuit ports.
    pub fn report_unconnected_pins(&self, reporter: &mut dyn Reporter) {
        let open_input = |comp: &NetlistComponent| {
            (0..comp.nr_of_ends()).any(|j| comp.is_end_input(j) && !comp.is_end_connected(j))
        };
        for comp in &self.components {
            if open_input(comp) {
                let mut warn = DrcDiagnostic::new(
                    self.circuit_name.clone(),
                    "a component has unconnected input pins",
                    Severity::Normal,
                    MarkMask::INSTANCE,
                );
                warn.add_instance(comp.comp());
                reporter.add_warning(warn);
            }
        }
        for comp in &self.sub_circuits {
            if open_input(comp) {
                let mut warn = DrcDiagnostic::new(
                    self.circuit_name.clone(),
                    "a sub-circuit has unconnected input pins",
                    Severity::Severe,
                    MarkMask::INSTANCE,
                );
                warn.add_instance(comp.comp());
                reporter.add_warning(warn);
            }
        }
        let all_open = |comp: &NetlistComponent| {
            (0..comp.nr_of_ends()).any(|j| !comp.is_end_connected(j))
        };
        for (ports, message) in [
            (&self.input_ports, "an input port of the circuit is not connected"),
            (&self.output_ports, "an output port of the circuit is not connected"),
        ] {
            for comp in ports {
                if all_open(comp) {
                    let mut warn = DrcDiagnostic::new(
                        self.circuit_name.clone(),
                        message,
                        Severity::Normal,
                        MarkMask::INSTANCE,
                    );
                    warn.add_instance(comp.comp());
                    reporter.add_warning(warn);
                }
            }
        }
    }
}
