//! Per-pin, per-bit references into the net arena, and the component
//! wrapper that carries them.

use std::collections::HashMap;

use schemnet_model::{Location, MapInfo};

use crate::net::NetId;

/// Index of a component inside its circuit's component list.
pub type CompId = usize;

/// One bit of one pin, resolved to a bit of a root net.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct ConnectionPoint {
    comp: CompId,
    net: Option<NetId>,
    bit: u16,
    child_port: Option<usize>,
}

impl ConnectionPoint {
    /// An unresolved point owned by `comp`.
    pub fn new(comp: CompId) -> Self {
        ConnectionPoint {
            comp,
            net: None,
            bit: 0,
            child_port: None,
        }
    }

    /// Bind the point to `bit` of root net `net`.
    pub fn set_parent_net(&mut self, net: NetId, bit: u16) {
        self.net = Some(net);
        self.bit = bit;
    }

    /// The root net, once resolved.
    pub fn parent_net(&self) -> Option<NetId> {
        self.net
    }

    /// The bit on the root net.
    pub fn parent_bit(&self) -> u16 {
        self.bit
    }

    /// The owning component.
    pub fn comp(&self) -> CompId {
        self.comp
    }

    /// Record which port of the child definition this pin bit maps to.
    pub fn set_child_port(&mut self, index: usize) {
        self.child_port = Some(index);
    }

    /// Child-definition port index, for sub-circuit instance pins.
    pub fn child_port(&self) -> Option<usize> {
        self.child_port
    }
}

/// The per-bit connection points of one component pin.
#[derive(Clone, Debug)]
pub struct ConnectionEnd {
    points: Vec<ConnectionPoint>,
    is_output: bool,
    width: u32,
    location: Location,
}

impl ConnectionEnd {
    /// An end with `width` unresolved points.
    pub fn new(comp: CompId, is_output: bool, width: u32, location: Location) -> Self {
        ConnectionEnd {
            points: (0..width).map(|_| ConnectionPoint::new(comp)).collect(),
            is_output,
            width,
            location,
        }
    }

    /// True when the pin drives the net.
    pub fn is_output(&self) -> bool {
        self.is_output
    }

    /// Pin width.
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Pin location on the schematic.
    pub fn location(&self) -> Location {
        self.location
    }

    /// Point for local `bit`.
    pub fn get(&self, bit: u16) -> Option<&ConnectionPoint> {
        self.points.get(bit as usize)
    }

    /// Mutable point for local `bit`.
    pub fn get_mut(&mut self, bit: u16) -> Option<&mut ConnectionPoint> {
        self.points.get_mut(bit as usize)
    }

    /// True when at least one bit resolved to a net.
    pub fn is_connected(&self) -> bool {
        self.points.iter().any(|p| p.parent_net().is_some())
    }
}

/// Contiguous bubble-id range handed to one instance.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct BubbleRange {
    /// First id of the range.
    pub start: usize,
    /// Number of ids in the range.
    pub count: usize,
}

impl BubbleRange {
    /// One past the last id.
    pub fn end(&self) -> usize {
        self.start + self.count
    }

    /// True when the two ranges share at least one id.
    pub fn overlaps(&self, other: &BubbleRange) -> bool {
        self.count > 0 && other.count > 0 && self.start < other.end() && other.start < self.end()
    }
}

/// Input/output/inout bubble ranges of one instance.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct BubbleRanges {
    /// Hidden input ports.
    pub input: BubbleRange,
    /// Hidden output ports.
    pub output: BubbleRange,
    /// Hidden inout ports.
    pub inout: BubbleRange,
}

/// A component instance as seen by the netlist: its resolved pin ends plus
/// the hierarchy bookkeeping hung off it.
#[derive(Clone, Debug)]
pub struct NetlistComponent {
    comp: CompId,
    label: String,
    ends: Vec<ConnectionEnd>,
    child_circuit: Option<String>,
    map_info: Option<MapInfo>,
    local_bubbles: BubbleRanges,
    global_bubbles: HashMap<Vec<String>, BubbleRanges>,
}

impl NetlistComponent {
    /// Wrap component `comp` with its prepared ends.
    pub fn new(comp: CompId, label: String, ends: Vec<ConnectionEnd>) -> Self {
        NetlistComponent {
            comp,
            label,
            ends,
            child_circuit: None,
            map_info: None,
            local_bubbles: BubbleRanges::default(),
            global_bubbles: HashMap::new(),
        }
    }

    /// Record the child definition for a sub-circuit instance.
    pub fn with_child_circuit(mut self, name: impl Into<String>) -> Self {
        self.child_circuit = Some(name.into());
        self
    }

    /// Attach hidden-port counts.
    pub fn with_map_info(mut self, info: MapInfo) -> Self {
        self.map_info = Some(info);
        self
    }

    /// The model component index.
    pub fn comp(&self) -> CompId {
        self.comp
    }

    /// Corrected instance label.
    pub fn label(&self) -> &str {
        &self.label
    }

    /// Child circuit definition name, for sub-circuit instances.
    pub fn child_circuit(&self) -> Option<&str> {
        self.child_circuit.as_deref()
    }

    /// Hidden-port counts, for IO-mapped components.
    pub fn map_info(&self) -> Option<MapInfo> {
        self.map_info
    }

    /// Number of pin ends.
    pub fn nr_of_ends(&self) -> usize {
        self.ends.len()
    }

    /// Pin end `index`.
    pub fn end(&self, index: usize) -> Option<&ConnectionEnd> {
        self.ends.get(index)
    }

    /// Mutable pin end `index`.
    pub fn end_mut(&mut self, index: usize) -> Option<&mut ConnectionEnd> {
        self.ends.get_mut(index)
    }

    /// All pin ends.
    pub fn ends(&self) -> &[ConnectionEnd] {
        &self.ends
    }

    /// True when end `index` is an input pin.
    pub fn is_end_input(&self, index: usize) -> bool {
        self.ends.get(index).is_some_and(|e| !e.is_output())
    }

    /// True when end `index` resolved to at least one net.
    pub fn is_end_connected(&self, index: usize) -> bool {
        self.ends.get(index).is_some_and(ConnectionEnd::is_connected)
    }

    /// Local bit index (within whichever end carries it) of the point
    /// bound to (`net`, `bit`).
    pub fn connection_bit_index(&self, net: NetId, bit: u16) -> Option<u16> {
        for end in &self.ends {
            for local in 0..end.width() as u16 {
                if let Some(point) = end.get(local)
                    && point.parent_net() == Some(net)
                    && point.parent_bit() == bit
                {
                    return Some(local);
                }
            }
        }
        None
    }

    /// Assign the instance's local bubble ranges.
    pub fn set_local_bubbles(&mut self, ranges: BubbleRanges) {
        self.local_bubbles = ranges;
    }

    /// Local bubble ranges.
    pub fn local_bubbles(&self) -> BubbleRanges {
        self.local_bubbles
    }

    /// Assign the global bubble ranges for one hierarchy path.
    pub fn add_global_bubbles(&mut self, path: Vec<String>, ranges: BubbleRanges) {
        self.global_bubbles.insert(path, ranges);
    }

    /// Global bubble ranges for `path`.
    pub fn global_bubbles(&self, path: &[String]) -> Option<BubbleRanges> {
        self.global_bubbles.get(path).copied()
    }

    /// All assigned global ranges, keyed by hierarchy path.
    pub fn all_global_bubbles(&self) -> impl Iterator<Item = (&Vec<String>, BubbleRanges)> {
        self.global_bubbles.iter().map(|(k, v)| (k, *v))
    }
}
