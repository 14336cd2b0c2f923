//! Clock sources and the per-circuit clock trees.
//!
//! Clock generators with identical timing parameters anywhere in the
//! hierarchy collapse onto one clock id; each circuit then keeps, per
//! clock id and per instantiation path, the set of net bits that carry
//! that clock.

use std::collections::HashSet;

use schemnet_model::ClockParams;

use crate::net::NetId;

/// Design-wide registry of distinct clock sources.
#[derive(Clone, Debug, Default)]
pub struct ClockSourceContainer {
    sources: Vec<ClockParams>,
    requires_fpga_global_clock: bool,
}

impl ClockSourceContainer {
    /// An empty registry.
    pub fn new() -> Self {
        ClockSourceContainer::default()
    }

    /// Id for `params`, registering it on first sight. Equal parameters
    /// always yield the same id.
    pub fn clock_id(&mut self, params: ClockParams) -> usize {
        if let Some(id) = self.sources.iter().position(|p| *p == params) {
            return id;
        }
        self.sources.push(params);
        self.sources.len() - 1
    }

    /// Id for `params` without registering.
    pub fn lookup(&self, params: ClockParams) -> Option<usize> {
        self.sources.iter().position(|p| *p == params)
    }

    /// Number of distinct clock sources seen so far.
    pub fn nr_of_sources(&self) -> usize {
        self.sources.len()
    }

    /// Timing parameters of clock `id`.
    pub fn params(&self, id: usize) -> Option<ClockParams> {
        self.sources.get(id).copied()
    }

    /// Request the dedicated FPGA global clock resource.
    pub fn set_requires_fpga_global_clock(&mut self) {
        self.requires_fpga_global_clock = true;
    }

    /// True when some component asked for the FPGA global clock.
    pub fn requires_fpga_global_clock(&self) -> bool {
        self.requires_fpga_global_clock
    }

    /// Forget everything; used when a DRC run starts over.
    pub fn clear(&mut self) {
        self.sources.clear();
        self.requires_fpga_global_clock = false;
    }
}

/// The net bits of one circuit, under one instantiation path, carrying one
/// clock.
#[derive(Clone, Debug)]
pub struct ClockTree {
    path: Vec<String>,
    source_id: usize,
    entries: HashSet<(NetId, u16)>,
    pin_entries: HashSet<(NetId, u16)>,
}

impl ClockTree {
    fn new(path: Vec<String>, source_id: usize) -> Self {
        ClockTree {
            path,
            source_id,
            entries: HashSet::new(),
            pin_entries: HashSet::new(),
        }
    }

    /// The instantiation path this tree belongs to.
    pub fn path(&self) -> &[String] {
        &self.path
    }

    /// The clock id this tree carries.
    pub fn source_id(&self) -> usize {
        self.source_id
    }

    /// Record that (`net`, `bit`) carries the clock. `via_pin` marks bits
    /// the clock reaches through a circuit port rather than directly.
    pub fn add(&mut self, net: NetId, bit: u16, via_pin: bool) {
        self.entries.insert((net, bit));
        if via_pin {
            self.pin_entries.insert((net, bit));
        }
    }

    /// True when (`net`, `bit`) carries the clock.
    pub fn contains(&self, net: NetId, bit: u16) -> bool {
        self.entries.contains(&(net, bit))
    }

    /// All clock-carrying bits.
    pub fn entries(&self) -> impl Iterator<Item = (NetId, u16)> + '_ {
        self.entries.iter().copied()
    }

    /// The bits the clock reaches through a circuit port rather than from
    /// a generator placed in this circuit.
    pub fn pin_entries(&self) -> impl Iterator<Item = (NetId, u16)> + '_ {
        self.pin_entries.iter().copied()
    }

    /// True when (`net`, `bit`) receives the clock through a circuit port.
    pub fn is_pin_entry(&self, net: NetId, bit: u16) -> bool {
        self.pin_entries.contains(&(net, bit))
    }
}

/// Per-circuit collection of clock trees, one per (path, clock id) pair.
#[derive(Clone, Debug, Default)]
pub struct ClockTreeFactory {
    trees: Vec<ClockTree>,
}

impl ClockTreeFactory {
    /// An empty factory.
    pub fn new() -> Self {
        ClockTreeFactory::default()
    }

    fn tree_mut(&mut self, path: &[String], source_id: usize) -> &mut ClockTree {
        if let Some(idx) = self
            .trees
            .iter()
            .position(|t| t.source_id == source_id && t.path == path)
        {
            return &mut self.trees[idx];
        }
        self.trees.push(ClockTree::new(path.to_vec(), source_id));
        let last = self.trees.len() - 1;
        &mut self.trees[last]
    }

    /// Mark (`net`, `bit`) as carrying clock `source_id` under `path`.
    pub fn add_clock_net(
        &mut self,
        path: &[String],
        source_id: usize,
        net: NetId,
        bit: u16,
        via_pin: bool,
    ) {
        self.tree_mut(path, source_id).add(net, bit, via_pin);
    }

    /// The clock id carried by (`net`, `bit`) under `path`, if any.
    pub fn clock_source_id(&self, path: &[String], net: NetId, bit: u16) -> Option<usize> {
        self.trees
            .iter()
            .find(|t| t.path == path && t.contains(net, bit))
            .map(ClockTree::source_id)
    }

    /// The clock id carried by (`net`, `bit`) under any path. Well-formed
    /// designs give the same answer for every path.
    pub fn any_clock_source_id(&self, net: NetId, bit: u16) -> Option<usize> {
        self.trees
            .iter()
            .find(|t| t.contains(net, bit))
            .map(ClockTree::source_id)
    }

    /// All trees built so far.
    pub fn trees(&self) -> &[ClockTree] {
        &self.trees
    }

    /// Drop every tree; used before re-tracing.
    pub fn clean(&mut self) {
        self.trees.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn equal_params_share_one_id() {
        let mut sources = ClockSourceContainer::new();
        let a = sources.clock_id(ClockParams { high: 1, low: 1 });
        let b = sources.clock_id(ClockParams { high: 4, low: 4 });
        let c = sources.clock_id(ClockParams { high: 1, low: 1 });
        assert_eq!(a, c);
        assert_ne!(a, b);
        assert_eq!(sources.nr_of_sources(), 2);
    }

    #[test]
    fn trees_are_keyed_by_path_and_source() {
        let mut factory = ClockTreeFactory::new();
        let top = vec!["top".to_string()];
        let inst = vec!["top".to_string(), "u1".to_string()];
        factory.add_clock_net(&top, 0, 3, 0, false);
        factory.add_clock_net(&inst, 0, 1, 0, true);
        assert_eq!(factory.clock_source_id(&top, 3, 0), Some(0));
        assert_eq!(factory.clock_source_id(&inst, 3, 0), None);
        assert_eq!(factory.clock_source_id(&inst, 1, 0), Some(0));
        assert_eq!(factory.any_clock_source_id(1, 0), Some(0));

        let inst_tree = factory.trees().iter().find(|t| t.path() == inst).unwrap();
        assert!(inst_tree.is_pin_entry(1, 0));
        assert_eq!(inst_tree.pin_entries().count(), 1);
        let top_tree = factory.trees().iter().find(|t| t.path() == top).unwrap();
        assert!(!top_tree.is_pin_entry(3, 0));

        factory.clean();
        assert!(factory.trees().is_empty());
    }
}
