//! The electrical node/bus container.

use std::collections::HashSet;

use schemnet_model::{Location, WireSegment, correct_label};

use crate::connection::ConnectionPoint;

/// Index of a [`Net`] inside its circuit's net arena.
pub type NetId = usize;

/// One electrically connected node or bus, built from raw wire segments.
///
/// A net with a parent is a slice of a wider bus behind a splitter; all
/// numbering questions must be answered by walking to the root net first.
#[derive(Clone, Debug, Default)]
pub struct Net {
    connected: HashSet<Location>,
    unconnected: HashSet<Location>,
    segments: HashSet<WireSegment>,
    width: u32,
    parent: Option<NetId>,
    parent_bits: Vec<u16>,
    forced_root: bool,
    tunnels: HashSet<String>,
    sources: Vec<Vec<ConnectionPoint>>,
    sinks: Vec<Vec<ConnectionPoint>>,
    source_nets: Vec<Vec<ConnectionPoint>>,
    sink_nets: Vec<Vec<ConnectionPoint>>,
}

impl Net {
    /// An empty net.
    pub fn new() -> Self {
        Net::default()
    }

    /// A trivial net covering a single point where two pins touch with no
    /// wire in between. The point counts as connected from the start.
    pub fn single_point(loc: Location, width: u32) -> Self {
        let mut net = Net::new();
        net.connected.insert(loc);
        net.width = width;
        net
    }

    /// Absorb a wire segment. A point already known to the net becomes a
    /// junction (connected); a fresh point starts out dangling.
    pub fn add_segment(&mut self, segment: WireSegment) {
        for point in segment.endpoints() {
            if self.unconnected.remove(&point) || self.connected.contains(&point) {
                self.connected.insert(point);
            } else {
                self.unconnected.insert(point);
            }
        }
        self.segments.insert(segment);
    }

    /// True when the net touches `loc`, dangling or not.
    pub fn contains(&self, loc: Location) -> bool {
        self.connected.contains(&loc) || self.unconnected.contains(&loc)
    }

    /// The wire segments forming the net.
    pub fn segments(&self) -> impl Iterator<Item = WireSegment> + '_ {
        self.segments.iter().copied()
    }

    /// Record a pin width touching the net. Width 0 never participates.
    /// Returns false on a conflicting non-zero width.
    pub fn set_width(&mut self, width: u32) -> bool {
        if width == 0 {
            return true;
        }
        if self.width == 0 {
            self.width = width;
            return true;
        }
        self.width == width
    }

    /// Current bit width (0 = undetermined).
    pub fn width(&self) -> u32 {
        self.width
    }

    /// True for nets wider than one bit.
    pub fn is_bus(&self) -> bool {
        self.width > 1
    }

    /// Fold `other` into this net. Fails on a non-zero width conflict, in
    /// which case `self` is left untouched.
    pub fn merge(&mut self, other: &Net) -> bool {
        if self.width != 0 && other.width != 0 && self.width != other.width {
            return false;
        }
        self.width = self.width.max(other.width);
        for &point in &other.connected {
            self.unconnected.remove(&point);
            self.connected.insert(point);
        }
        for &point in &other.unconnected {
            if self.contains(point) {
                self.unconnected.remove(&point);
                self.connected.insert(point);
            } else {
                self.unconnected.insert(point);
            }
        }
        self.segments.extend(other.segments.iter().copied());
        self.tunnels.extend(other.tunnels.iter().cloned());
        true
    }

    /// Attach a tunnel name (normalised) to the net.
    pub fn add_tunnel(&mut self, name: &str) {
        self.tunnels.insert(correct_label(name));
    }

    /// True when at least one tunnel touches the net.
    pub fn has_tunnel(&self) -> bool {
        !self.tunnels.is_empty()
    }

    /// True when the (normalised) tunnel name is attached to this net.
    pub fn contains_tunnel(&self, name: &str) -> bool {
        self.tunnels.contains(&correct_label(name))
    }

    /// The tunnel names attached to this net.
    pub fn tunnel_names(&self) -> impl Iterator<Item = &str> {
        self.tunnels.iter().map(String::as_str)
    }

    /// True when the net answers numbering questions itself: it has no
    /// parent bus, or implicit bit-folding was ruled out for it.
    pub fn is_root(&self) -> bool {
        self.parent.is_none() || self.forced_root
    }

    /// True when implicit bit-folding was ruled out for this net.
    pub fn is_forced_root(&self) -> bool {
        self.forced_root
    }

    /// Rule out implicit bit-folding; the net's bits will be resolved
    /// through explicit splitter tracing instead.
    pub fn force_root(&mut self) {
        self.forced_root = true;
    }

    /// Make `parent` this net's parent bus. Fails when a parent is already
    /// set or the net was forced root.
    pub fn set_parent(&mut self, parent: NetId) -> bool {
        if self.parent.is_some() || self.forced_root {
            return false;
        }
        self.parent = Some(parent);
        true
    }

    /// The parent bus, if any.
    pub fn parent(&self) -> Option<NetId> {
        self.parent
    }

    /// Append the next parent-bus bit index; call once per local bit in
    /// ascending local order.
    pub fn add_parent_bit(&mut self, parent_bit: u16) {
        self.parent_bits.push(parent_bit);
    }

    /// Parent-bus bit index of local `bit`.
    pub fn parent_bit(&self, bit: u16) -> Option<u16> {
        self.parent_bits.get(bit as usize).copied()
    }

    /// Size the per-bit source/sink tables; root nets only.
    pub fn init_source_sinks(&mut self) {
        let bits = self.width as usize;
        self.sources = vec![Vec::new(); bits];
        self.sinks = vec![Vec::new(); bits];
        self.source_nets = vec![Vec::new(); bits];
        self.sink_nets = vec![Vec::new(); bits];
    }

    /// Register a direct driver of `bit`.
    pub fn add_source(&mut self, bit: u16, point: ConnectionPoint) {
        if let Some(list) = self.sources.get_mut(bit as usize) {
            list.push(point);
        }
    }

    /// Register a direct consumer of `bit`.
    pub fn add_sink(&mut self, bit: u16, point: ConnectionPoint) {
        if let Some(list) = self.sinks.get_mut(bit as usize) {
            list.push(point);
        }
    }

    /// Register a splitter-derived driver of `bit`.
    pub fn add_source_net(&mut self, bit: u16, point: ConnectionPoint) {
        if let Some(list) = self.source_nets.get_mut(bit as usize) {
            list.push(point);
        }
    }

    /// Register a splitter-derived consumer of `bit`.
    pub fn add_sink_net(&mut self, bit: u16, point: ConnectionPoint) {
        if let Some(list) = self.sink_nets.get_mut(bit as usize) {
            list.push(point);
        }
    }

    /// True when `bit` has at least one direct driver.
    pub fn has_bit_source(&self, bit: u16) -> bool {
        self.sources
            .get(bit as usize)
            .is_some_and(|l| !l.is_empty())
    }

    /// True when `bit` has at least one direct consumer.
    pub fn has_bit_sinks(&self, bit: u16) -> bool {
        self.sinks.get(bit as usize).is_some_and(|l| !l.is_empty())
    }

    /// Direct drivers of `bit`.
    pub fn bit_sources(&self, bit: u16) -> &[ConnectionPoint] {
        self.sources.get(bit as usize).map_or(&[], Vec::as_slice)
    }

    /// Direct consumers of `bit`.
    pub fn bit_sinks(&self, bit: u16) -> &[ConnectionPoint] {
        self.sinks.get(bit as usize).map_or(&[], Vec::as_slice)
    }

    /// Splitter-derived drivers of `bit`.
    pub fn source_nets(&self, bit: u16) -> &[ConnectionPoint] {
        self.source_nets.get(bit as usize).map_or(&[], Vec::as_slice)
    }

    /// Splitter-derived consumers of `bit`.
    pub fn sink_nets(&self, bit: u16) -> &[ConnectionPoint] {
        self.sink_nets.get(bit as usize).map_or(&[], Vec::as_slice)
    }

    /// Drop all but the first splitter-derived driver of `bit`; used once
    /// the drivers were proven to be the same physical source.
    pub fn cleanup_source_nets(&mut self, bit: u16) {
        if let Some(list) = self.source_nets.get_mut(bit as usize) {
            list.truncate(1);
        }
    }

    /// True when some bit carries more than one direct driver.
    pub fn has_short_circuit(&self) -> bool {
        self.sources.iter().any(|l| l.len() > 1)
    }

    /// All direct consumers over all bits.
    pub fn sinks(&self) -> impl Iterator<Item = &ConnectionPoint> {
        self.sinks.iter().flatten()
    }

    /// True when the net covers no points at all.
    pub fn is_empty(&self) -> bool {
        self.connected.is_empty() && self.unconnected.is_empty()
    }
}
