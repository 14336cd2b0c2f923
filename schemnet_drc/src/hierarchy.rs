//! Cross-hierarchy passes: bubble numbering, clock tracing and the
//! mappable-resource tree.
//!
//! These walk the cached netlists by circuit name. The instantiation path
//! (the chain of corrected instance labels from the top) keys everything
//! that is per-instance; the circuit name keys everything that is
//! per-definition.

use std::collections::{HashMap, HashSet};

use schemnet_model::MapInfo;
use tracing::debug;

use crate::connection::{BubbleRange, BubbleRanges, CompId, ConnectionPoint};
use crate::engine::DrcEngine;
use crate::error::NetlistError;
use crate::net::NetId;

/// One IO component that must be mapped to a board resource, addressed by
/// its instantiation path.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MappedResource {
    /// Circuit definition the component lives in.
    pub circuit: String,
    /// The component's index within that circuit.
    pub comp: CompId,
}

impl DrcEngine {
    /// Number the hidden IO bubbles of the whole hierarchy below `name`.
    ///
    /// Local ranges restart at zero for every circuit definition; global
    /// ranges are handed out fresh for every instantiation path, so two
    /// instances of the same definition get disjoint global ids. A
    /// definition is descended only once; later instances reuse its local
    /// layout and only re-enumerate the global ids.
    pub(crate) fn construct_hierarchy_tree(
        &mut self,
        visited: &mut HashSet<String>,
        name: &str,
        path: Vec<String>,
        mut g_in: usize,
        mut g_out: usize,
        mut g_io: usize,
    ) -> Result<(), NetlistError> {
        let subs = {
            let netlist = self
                .netlists
                .get_mut(name)
                .ok_or_else(|| NetlistError::missing_netlist(name))?;
            netlist.local_bubbles = MapInfo::default();
            let mut subs = Vec::new();
            for (index, sub) in netlist.sub_circuits.iter().enumerate() {
                let child = sub
                    .child_circuit()
                    .ok_or_else(|| NetlistError::BrokenHierarchy(name.to_string()))?;
                subs.push((index, sub.label().to_string(), child.to_string()));
            }
            subs
        };
        for (index, label, child) in subs {
            let mut child_path = path.clone();
            child_path.push(label);
            let first_time = visited.insert(child.clone());
            if first_time {
                self.construct_hierarchy_tree(
                    visited,
                    &child,
                    child_path.clone(),
                    g_in,
                    g_out,
                    g_io,
                )?;
            }
            let child_bubbles = self
                .netlists
                .get(&child)
                .ok_or_else(|| NetlistError::missing_netlist(&child))?
                .local_bubbles;
            {
                let netlist = self
                    .netlists
                    .get_mut(name)
                    .ok_or_else(|| NetlistError::missing_netlist(name))?;
                let local = netlist.local_bubbles;
                let comp = netlist
                    .sub_circuits
                    .get_mut(index)
                    .ok_or_else(|| NetlistError::BrokenHierarchy(name.to_string()))?;
                comp.set_local_bubbles(ranges(
                    local.in_ports as usize,
                    local.out_ports as usize,
                    local.inout_ports as usize,
                    child_bubbles,
                ));
                comp.add_global_bubbles(
                    child_path.clone(),
                    ranges(g_in, g_out, g_io, child_bubbles),
                );
                netlist.local_bubbles.in_ports += child_bubbles.in_ports;
                netlist.local_bubbles.out_ports += child_bubbles.out_ports;
                netlist.local_bubbles.inout_ports += child_bubbles.inout_ports;
            }
            if !first_time {
                self.enumerate_global_bubble_tree(&child, child_path, g_in, g_out, g_io)?;
            }
            g_in += child_bubbles.in_ports as usize;
            g_out += child_bubbles.out_ports as usize;
            g_io += child_bubbles.inout_ports as usize;
        }

        let mapped = {
            let netlist = self
                .netlists
                .get(name)
                .ok_or_else(|| NetlistError::missing_netlist(name))?;
            netlist
                .components
                .iter()
                .enumerate()
                .filter_map(|(index, comp)| {
                    comp.map_info().map(|info| (index, comp.label().to_string(), info))
                })
                .collect::<Vec<_>>()
        };
        for (index, label, info) in mapped {
            let mut comp_path = path.clone();
            comp_path.push(label);
            let netlist = self
                .netlists
                .get_mut(name)
                .ok_or_else(|| NetlistError::missing_netlist(name))?;
            let local = netlist.local_bubbles;
            let comp = netlist
                .components
                .get_mut(index)
                .ok_or_else(|| NetlistError::BrokenHierarchy(name.to_string()))?;
            comp.set_local_bubbles(ranges(
                local.in_ports as usize,
                local.out_ports as usize,
                local.inout_ports as usize,
                info,
            ));
            comp.add_global_bubbles(comp_path, ranges(g_in, g_out, g_io, info));
            netlist.local_bubbles.in_ports += info.in_ports;
            netlist.local_bubbles.out_ports += info.out_ports;
            netlist.local_bubbles.inout_ports += info.inout_ports;
            g_in += info.in_ports as usize;
            g_out += info.out_ports as usize;
            g_io += info.inout_ports as usize;
        }
        Ok(())
    }

    /// Re-enumerate the global bubble ids of an already-visited definition
    /// for a new instantiation path. The local layout stays untouched;
    /// every instance offsets it by its own fresh global start ids.
    fn enumerate_global_bubble_tree(
        &mut self,
        name: &str,
        path: Vec<String>,
        start_in: usize,
        start_out: usize,
        start_io: usize,
    ) -> Result<(), NetlistError> {
        let subs = {
            let netlist = self
                .netlists
                .get(name)
                .ok_or_else(|| NetlistError::missing_netlist(name))?;
            let mut subs = Vec::new();
            for sub in &netlist.sub_circuits {
                let child = sub
                    .child_circuit()
                    .ok_or_else(|| NetlistError::BrokenHierarchy(name.to_string()))?;
                subs.push((sub.label().to_string(), child.to_string(), sub.local_bubbles()));
            }
            subs
        };
        for (label, child, local) in subs {
            let mut child_path = path.clone();
            child_path.push(label);
            self.enumerate_global_bubble_tree(
                &child,
                child_path,
                start_in + local.input.start,
                start_out + local.output.start,
                start_io + local.inout.start,
            )?;
        }
        let netlist = self
            .netlists
            .get_mut(name)
            .ok_or_else(|| NetlistError::missing_netlist(name))?;
        for comp in netlist.components.iter_mut() {
            let Some(info) = comp.map_info() else {
                continue;
            };
            let mut comp_path = path.clone();
            comp_path.push(comp.label().to_string());
            let local = comp.local_bubbles();
            comp.add_global_bubbles(
                comp_path,
                ranges(
                    start_in + local.input.start,
                    start_out + local.output.start,
                    start_io + local.inout.start,
                    info,
                ),
            );
        }
        Ok(())
    }

    /// Collect every mappable IO component below `name`, keyed by its
    /// instantiation path. On the top level the circuit's own ports are
    /// mappable as well.
    pub fn mappable_resources(
        &self,
        name: &str,
        hierarchy: Vec<String>,
        toplevel: bool,
    ) -> Result<HashMap<Vec<String>, MappedResource>, NetlistError> {
        let netlist = self
            .netlists
            .get(name)
            .ok_or_else(|| NetlistError::missing_netlist(name))?;
        let mut out = HashMap::new();
        for sub in netlist.sub_circuits() {
            let child = sub
                .child_circuit()
                .ok_or_else(|| NetlistError::BrokenHierarchy(name.to_string()))?;
            let mut sub_path = hierarchy.clone();
            sub_path.push(sub.label().to_string());
            out.extend(self.mappable_resources(child, sub_path, false)?);
        }
        for comp in netlist.components() {
            if comp.map_info().is_some() {
                let mut comp_path = hierarchy.clone();
                comp_path.push(comp.label().to_string());
                out.insert(
                    comp_path,
                    MappedResource {
                        circuit: name.to_string(),
                        comp: comp.comp(),
                    },
                );
            }
        }
        if toplevel {
            for comp in netlist.input_ports().iter().chain(netlist.output_ports()) {
                let mut comp_path = hierarchy.clone();
                comp_path.push(comp.label().to_string());
                out.insert(
                    comp_path,
                    MappedResource {
                        circuit: name.to_string(),
                        comp: comp.comp(),
                    },
                );
            }
        }
        Ok(out)
    }

    /// Register every clock generator in the hierarchy below the last
    /// entry of `chain` and trace its net through the levels.
    ///
    /// `chain` holds the circuit names from the top down to the current
    /// level; `path` holds the instance labels and is one entry shorter.
    pub(crate) fn mark_clock_source_components(
        &mut self,
        chain: Vec<String>,
        path: Vec<String>,
    ) -> Result<(), NetlistError> {
        let name = chain
            .last()
            .cloned()
            .ok_or_else(|| NetlistError::BrokenHierarchy(String::new()))?;
        let subs = {
            let netlist = self
                .netlists
                .get(&name)
                .ok_or_else(|| NetlistError::missing_netlist(&name))?;
            let mut subs = Vec::new();
            for sub in netlist.sub_circuits() {
                let child = sub
                    .child_circuit()
                    .ok_or_else(|| NetlistError::BrokenHierarchy(name.clone()))?;
                subs.push((sub.label().to_string(), child.to_string()));
            }
            subs
        };
        for (label, child) in subs {
            let mut sub_chain = chain.clone();
            sub_chain.push(child);
            let mut sub_path = path.clone();
            sub_path.push(label);
            self.mark_clock_source_components(sub_chain, sub_path)?;
        }

        let (requires_global, generators) = {
            let netlist = self
                .netlists
                .get(&name)
                .ok_or_else(|| NetlistError::missing_netlist(&name))?;
            let generators: Vec<_> = netlist
                .clock_generators()
                .iter()
                .map(|generator| {
                    let comp = generator.component();
                    let connection = comp
                        .end(0)
                        .and_then(|end| end.get(0))
                        .and_then(|point| point.parent_net().map(|net| (net, point.parent_bit())));
                    let width = comp.end(0).map_or(0, |end| end.width());
                    (
                        generator.params(),
                        comp.label().to_string(),
                        comp.nr_of_ends(),
                        width,
                        connection,
                    )
                })
                .collect();
            (netlist.requires_global_clock(), generators)
        };
        if requires_global {
            self.clock_sources.set_requires_fpga_global_clock();
        }
        for (params, label, nr_of_ends, width, connection) in generators {
            if nr_of_ends != 1 || width != 1 {
                return Err(NetlistError::MalformedClockSource(label));
            }
            let Some((net, bit)) = connection else {
                continue;
            };
            let id = self.clock_sources.clock_id(params);
            debug!(circuit = name.as_str(), clock = id, "tracing clock net");
            self.netlists
                .get_mut(&name)
                .ok_or_else(|| NetlistError::missing_netlist(&name))?
                .clock_trees
                .add_clock_net(&path, id, net, bit, false);
            self.trace_clock_net(&chain, &path, net, bit, id, false)?;
        }
        Ok(())
    }

    /// Mark every sink reachable from (`net`, `bit`) as clocked by `id`,
    /// descending into sub-circuits and climbing out through output ports.
    fn trace_clock_net(
        &mut self,
        chain: &[String],
        path: &[String],
        net: NetId,
        bit: u16,
        id: usize,
        is_pin_source: bool,
    ) -> Result<(), NetlistError> {
        let name = chain
            .last()
            .ok_or_else(|| NetlistError::BrokenHierarchy(String::new()))?
            .clone();
        let points = self
            .netlists
            .get(&name)
            .ok_or_else(|| NetlistError::missing_netlist(&name))?
            .hidden_sinks(net, bit, false);
        for point in points {
            let point_net = point.parent_net().ok_or(NetlistError::UnboundConnection)?;
            let point_bit = point.parent_bit();
            {
                let netlist = self
                    .netlists
                    .get_mut(&name)
                    .ok_or_else(|| NetlistError::missing_netlist(&name))?;
                netlist
                    .clock_trees
                    .add_clock_net(path, id, point_net, point_bit, is_pin_source);
            }
            let is_sub = self
                .netlists
                .get(&name)
                .ok_or_else(|| NetlistError::missing_netlist(&name))?
                .sub_circuits()
                .iter()
                .any(|sub| sub.comp() == point.comp());
            if is_sub {
                self.trace_down_subcircuit(chain, path, &point, id)?;
            }
            // the top level has no enclosing circuit to climb into
            if path.is_empty() {
                continue;
            }
            let out_port = {
                let netlist = self
                    .netlists
                    .get(&name)
                    .ok_or_else(|| NetlistError::missing_netlist(&name))?;
                netlist
                    .output_ports()
                    .iter()
                    .position(|port| port.comp() == point.comp())
                    .map(|index| {
                        let bit_index = netlist.output_ports()[index]
                            .connection_bit_index(point_net, point_bit);
                        (index, bit_index)
                    })
            };
            if let Some((port_index, bit_index)) = out_port {
                let bit_index = bit_index.ok_or(NetlistError::UnboundConnection)?;
                let parent_name = chain
                    .len()
                    .checked_sub(2)
                    .and_then(|i| chain.get(i))
                    .ok_or_else(|| NetlistError::BrokenHierarchy(name.clone()))?;
                let instance_label = path
                    .last()
                    .ok_or_else(|| NetlistError::BrokenHierarchy(name.clone()))?;
                let parent_point = self
                    .netlists
                    .get(parent_name)
                    .ok_or_else(|| NetlistError::missing_netlist(parent_name))?
                    .connection_for_subcircuit_output(instance_label, port_index, bit_index)
                    .ok_or_else(|| NetlistError::BrokenHierarchy(parent_name.clone()))?;
                if let Some(up_net) = parent_point.parent_net() {
                    let up_bit = parent_point.parent_bit();
                    let parent_path = &path[..path.len() - 1];
                    let parent_chain = &chain[..chain.len() - 1];
                    self.netlists
                        .get_mut(parent_name)
                        .ok_or_else(|| NetlistError::missing_netlist(parent_name))?
                        .clock_trees
                        .add_clock_net(parent_path, id, up_net, up_bit, true);
                    self.trace_clock_net(parent_chain, parent_path, up_net, up_bit, id, true)?;
                }
            }
        }
        Ok(())
    }

    /// Follow a clock into a sub-circuit instance through the child input
    /// port the sink point was annotated with.
    fn trace_down_subcircuit(
        &mut self,
        chain: &[String],
        path: &[String],
        point: &ConnectionPoint,
        id: usize,
    ) -> Result<(), NetlistError> {
        let name = chain
            .last()
            .ok_or_else(|| NetlistError::BrokenHierarchy(String::new()))?;
        let child_port = point.child_port().ok_or(NetlistError::UnannotatedChildPort)?;
        let point_net = point.parent_net().ok_or(NetlistError::UnboundConnection)?;
        let (label, child, bit_index) = {
            let netlist = self
                .netlists
                .get(name)
                .ok_or_else(|| NetlistError::missing_netlist(name))?;
            let sub = netlist
                .sub_circuits()
                .iter()
                .find(|sub| sub.comp() == point.comp())
                .ok_or_else(|| NetlistError::BrokenHierarchy(name.clone()))?;
            let child = sub
                .child_circuit()
                .ok_or_else(|| NetlistError::BrokenHierarchy(name.clone()))?;
            let bit_index = sub
                .connection_bit_index(point_net, point.parent_bit())
                .ok_or(NetlistError::UnboundConnection)?;
            (sub.label().to_string(), child.to_string(), bit_index)
        };
        let sub_point = {
            let child_netlist = self
                .netlists
                .get(&child)
                .ok_or_else(|| NetlistError::missing_netlist(&child))?;
            let pin = child_netlist
                .input_pin(child_port)
                .ok_or_else(|| NetlistError::BrokenHierarchy(child.clone()))?;
            pin.end(0)
                .and_then(|end| end.get(bit_index))
                .cloned()
                .ok_or_else(|| NetlistError::BrokenHierarchy(child.clone()))?
        };
        if let Some(sub_net) = sub_point.parent_net() {
            let sub_bit = sub_point.parent_bit();
            let mut child_path = path.to_vec();
            child_path.push(label);
            let mut child_chain = chain.to_vec();
            child_chain.push(child.clone());
            self.netlists
                .get_mut(&child)
                .ok_or_else(|| NetlistError::missing_netlist(&child))?
                .clock_trees
                .add_clock_net(&child_path, id, sub_net, sub_bit, true);
            self.trace_clock_net(&child_chain, &child_path, sub_net, sub_bit, id, true)?;
        }
        Ok(())
    }
}

fn ranges(start_in: usize, start_out: usize, start_io: usize, counts: MapInfo) -> BubbleRanges {
    BubbleRanges {
        input: BubbleRange {
            start: start_in,
            count: counts.in_ports as usize,
        },
        output: BubbleRange {
            start: start_out,
            count: counts.out_ports as usize,
        },
        inout: BubbleRange {
            start: start_io,
            count: counts.inout_ports as usize,
        },
    }
}
