//! Netlist construction: from wires and components to a [`CircuitNetlist`].
//!
//! The build runs in a fixed pass order. Wires are flooded into nets, pin
//! widths are marked, tunnels merge nets, splitters establish the bus
//! hierarchy, and finally every component pin is resolved to a bit of a
//! root net. Nets are only ever removed before the first [`NetId`] escapes
//! this module, so the ids handed out during classification stay valid.

use std::collections::{HashMap, HashSet};

use indexmap::IndexMap;
use schemnet_model::{
    Circuit, Component, ComponentKind, Location, PinDirection, PortKind, WireSegment,
    correct_label,
};
use tracing::debug;

use crate::connection::{CompId, ConnectionEnd, ConnectionPoint, NetlistComponent};
use crate::diag::{DrcDiagnostic, MarkMask, Reporter, Severity};
use crate::error::NetlistError;
use crate::net::{Net, NetId};
use crate::netlist::{CircuitNetlist, ClockGenerator, SplitterShape};

/// A resolved driver found by a hidden-source search: the direct source
/// point and the bit index at which it was found.
#[derive(Clone, Debug)]
pub(crate) struct SourceInfo {
    point: ConnectionPoint,
    bit: u16,
}

impl SourceInfo {
    /// The direct driver.
    pub(crate) fn point(&self) -> &ConnectionPoint {
        &self.point
    }

    /// Bit index on the driver's net.
    pub(crate) fn bit(&self) -> u16 {
        self.bit
    }
}

/// Build the netlist for `circuit`. The netlists of all instantiated child
/// circuits must already be present in `children`.
///
/// Returns `Ok(None)` when a design rule violation was reported and the
/// build was abandoned; `Err` only on broken internal bookkeeping.
pub fn generate(
    circuit: &Circuit,
    children: &IndexMap<String, CircuitNetlist>,
    reporter: &mut dyn Reporter,
) -> Result<Option<CircuitNetlist>, NetlistError> {
    let name = circuit.name.as_str();
    debug!(circuit = name, "building netlist");

    let mut nets = flood_fill_wires(&circuit.wires);

    let mut splitters: Vec<SplitterShape> = Vec::new();
    let mut tunnels: Vec<CompId> = Vec::new();
    let mut io_diag = DrcDiagnostic::new(
        name,
        "a bidirectional pin sits on a component that does not support it",
        Severity::Fatal,
        MarkMask::INSTANCE,
    );
    let mut width_diag = DrcDiagnostic::new(
        name,
        "pins of different bit widths are connected to the same net",
        Severity::Fatal,
        MarkMask::WIRE,
    );
    for (id, comp) in circuit.components.iter().enumerate() {
        let mut ignore = false;
        match &comp.kind {
            ComponentKind::Probe => continue,
            ComponentKind::Splitter(spec) => {
                let mut pins = comp.pins.iter().map(|p| p.location);
                if let Some(bus) = pins.next() {
                    splitters.push(SplitterShape::new(id, bus, pins.collect(), spec.clone()));
                }
                ignore = true;
            }
            ComponentKind::Tunnel => {
                tunnels.push(id);
                ignore = true;
            }
            _ => {}
        }
        for pin in &comp.pins {
            if !ignore
                && pin.direction == PinDirection::Bidirectional
                && !comp.supports_bidirectional
            {
                io_diag.add_instance(id);
            }
            for net in nets.iter_mut() {
                if net.contains(pin.location) && !net.set_width(pin.width) {
                    width_diag.add_wires(net.segments());
                }
            }
        }
    }
    let mut failed = false;
    for diag in [io_diag, width_diag] {
        if diag.has_marks() {
            reporter.add_error(diag);
            failed = true;
        }
    }
    if failed {
        return Ok(None);
    }

    // Pins of two components may touch without any wire in between; such
    // points become single-point nets of their own.
    let mut points: HashMap<Location, u32> = HashMap::new();
    let mut mismatch = DrcDiagnostic::new(
        name,
        "pins of different bit widths touch at the same point",
        Severity::Fatal,
        MarkMask::INSTANCE,
    );
    for (id, comp) in circuit.components.iter().enumerate() {
        for pin in &comp.pins {
            match points.get(&pin.location) {
                Some(&width) => {
                    if nets.iter().any(|n| n.contains(pin.location)) {
                        continue;
                    }
                    if width == pin.width {
                        nets.push(Net::single_point(pin.location, width));
                    } else {
                        mismatch.add_instance(id);
                    }
                }
                None => {
                    points.insert(pin.location, pin.width);
                }
            }
        }
    }
    if mismatch.has_marks() {
        reporter.add_error(mismatch);
        return Ok(None);
    }

    if !merge_tunnels(circuit, &tunnels, &mut nets, reporter) {
        return Ok(None);
    }

    drop_duplicate_splitters(name, &mut splitters, reporter);

    // Nets whose width never got marked carry no signal at all.
    let mut empty_diag = DrcDiagnostic::new(
        name,
        "nets without any connection are ignored",
        Severity::Normal,
        MarkMask::WIRE,
    );
    nets.retain(|net| {
        if net.width() == 0 {
            empty_diag.add_wires(net.segments());
            false
        } else {
            true
        }
    });
    if empty_diag.has_marks() {
        reporter.add_warning(empty_diag);
    }

    collapse_degenerate_splitters(name, &mut splitters, &mut nets, reporter)?;

    attach_splitter_parents(name, &splitters, &mut nets, reporter)?;

    for net in nets.iter_mut() {
        if net.is_root() {
            net.init_source_sinks();
        }
    }

    let requires_global_clock = circuit.components.iter().any(|c| c.requires_global_clock);
    let mut netlist = CircuitNetlist::new(name.to_string(), nets, splitters, requires_global_clock);
    for (id, comp) in circuit.components.iter().enumerate() {
        match &comp.kind {
            ComponentKind::Probe | ComponentKind::Tunnel | ComponentKind::Splitter(_) => {}
            ComponentKind::Subcircuit {
                circuit: child,
                pin_labels,
            } => process_subcircuit(&mut netlist, children, id, comp, child, pin_labels)?,
            ComponentKind::Gate { .. } if !comp.hdl_supported && comp.map_info.is_none() => {}
            _ => process_normal(&mut netlist, id, comp)?,
        }
    }

    resolve_forced_roots(&mut netlist)?;

    Ok(Some(netlist))
}

/// Partition the wire segments into connected nets.
fn flood_fill_wires(wires: &[WireSegment]) -> Vec<Net> {
    let mut remaining: Vec<WireSegment> = wires.to_vec();
    let mut nets = Vec::new();
    while let Some(seed) = remaining.pop() {
        let mut net = Net::new();
        net.add_segment(seed);
        loop {
            let mut grew = false;
            remaining.retain(|segment| {
                if segment.endpoints().iter().any(|&p| net.contains(p)) {
                    net.add_segment(*segment);
                    grew = true;
                    false
                } else {
                    true
                }
            });
            if !grew {
                break;
            }
        }
        if !net.is_empty() {
            nets.push(net);
        }
    }
    nets
}

/// Attach tunnel names to the nets they touch, then merge every pair of
/// nets sharing a name. Returns false when a merge hit a width conflict.
fn merge_tunnels(
    circuit: &Circuit,
    tunnels: &[CompId],
    nets: &mut Vec<Net>,
    reporter: &mut dyn Reporter,
) -> bool {
    let mut tunnels_present = false;
    for &id in tunnels {
        let Some(comp) = circuit.components.get(id) else {
            continue;
        };
        for pin in &comp.pins {
            for net in nets.iter_mut() {
                if net.contains(pin.location) {
                    net.add_tunnel(&comp.label);
                    tunnels_present = true;
                }
            }
        }
    }
    if !tunnels_present {
        return true;
    }
    let mut merge_diag = DrcDiagnostic::new(
        circuit.name.clone(),
        "a tunnel joins nets of different bit widths",
        Severity::Fatal,
        MarkMask::WIRE,
    );
    let mut i = 0;
    while i < nets.len() {
        let mut merged = false;
        if nets[i].has_tunnel() {
            for j in (i + 1)..nets.len() {
                let shares = nets[i].tunnel_names().any(|t| nets[j].contains_tunnel(t));
                if shares {
                    let donor = nets[i].clone();
                    if !nets[j].merge(&donor) {
                        merge_diag.add_wires(nets[j].segments().chain(nets[i].segments()));
                    }
                    merged = true;
                    break;
                }
            }
        }
        if merged {
            nets.remove(i);
        } else {
            i += 1;
        }
    }
    if merge_diag.has_marks() {
        reporter.add_error(merge_diag);
        return false;
    }
    true
}

/// Two splitters drawn on top of each other route the same bits twice;
/// only one of them survives.
fn drop_duplicate_splitters(
    name: &str,
    splitters: &mut Vec<SplitterShape>,
    reporter: &mut dyn Reporter,
) {
    let mut i = 0;
    while i < splitters.len() {
        let dupe = splitters[i + 1..].iter().any(|other| other.same_geometry(&splitters[i]));
        if dupe {
            let mut warn = DrcDiagnostic::new(
                name,
                "two identical splitters overlap; one of them is ignored",
                Severity::Severe,
                MarkMask::INSTANCE,
            );
            warn.add_instance(splitters[i].comp());
            reporter.add_warning(warn);
            splitters.remove(i);
        } else {
            i += 1;
        }
    }
}

/// A splitter whose widest fan equals its bus width routes all bits to one
/// end; the two nets are simply the same and get merged.
fn collapse_degenerate_splitters(
    name: &str,
    splitters: &mut Vec<SplitterShape>,
    nets: &mut Vec<Net>,
    reporter: &mut dyn Reporter,
) -> Result<(), NetlistError> {
    let mut i = 0;
    while i < splitters.len() {
        let spec = splitters[i].spec();
        let mut max_width = 0;
        let mut max_fan = 0u8;
        for fan in 0..spec.fan_count() {
            let width = spec.fan_width(fan);
            if width > max_width {
                max_width = width;
                max_fan = fan;
            }
        }
        if spec.bus_width() != max_width {
            i += 1;
            continue;
        }
        let bus_loc = splitters[i].bus_location();
        let bus_net = nets.iter().position(|n| n.contains(bus_loc));
        let fan_net = splitters[i]
            .fan_location(max_fan)
            .and_then(|loc| nets.iter().position(|n| n.contains(loc)));
        match (bus_net, fan_net) {
            (Some(bus), Some(fan)) if bus != fan => {
                let donor = nets[fan].clone();
                if !nets[bus].merge(&donor) {
                    return Err(NetlistError::SplitterMergeConflict(bus_loc));
                }
                nets.remove(fan);
            }
            (Some(_), Some(_)) => {}
            _ => {
                let mut warn = DrcDiagnostic::new(
                    name,
                    "a pass-through splitter is not connected on both sides",
                    Severity::Severe,
                    MarkMask::INSTANCE,
                );
                warn.add_instance(splitters[i].comp());
                reporter.add_warning(warn);
            }
        }
        splitters.remove(i);
    }
    Ok(())
}

/// Hang each fan-end net below its bus net. A net reachable from more than
/// one splitter cannot be folded implicitly; it is forced root and gets
/// resolved through explicit tracing later.
fn attach_splitter_parents(
    name: &str,
    splitters: &[SplitterShape],
    nets: &mut [Net],
    reporter: &mut dyn Reporter,
) -> Result<(), NetlistError> {
    for shape in splitters {
        let spec = shape.spec();
        let root = find_net_at(nets, shape.bus_location())
            .ok_or(NetlistError::MissingBusNet(shape.bus_location()))?;
        let mut unconnected = false;
        let mut connected_unrouted = false;
        for fan in 0..spec.fan_count() {
            let Some(loc) = shape.fan_location(fan) else {
                unconnected = true;
                continue;
            };
            let Some(connected) = find_net_at(nets, loc) else {
                unconnected = true;
                continue;
            };
            connected_unrouted |= spec.fan_is_unrouted(fan);
            if connected == root {
                // a fan wired back onto its own bus cannot be parented
                nets[connected].force_root();
            } else if !nets[connected].set_parent(root) {
                nets[connected].force_root();
            }
            for bit in 0..spec.bus_width() as u16 {
                if spec.fan_of_bit(bit) == Some(fan) {
                    nets[connected].add_parent_bit(bit);
                }
            }
        }
        if unconnected {
            let mut warn = DrcDiagnostic::new(
                name,
                "a splitter has unconnected fan ends",
                Severity::Normal,
                MarkMask::INSTANCE,
            );
            warn.add_instance(shape.comp());
            reporter.add_warning(warn);
        }
        if connected_unrouted {
            let mut warn = DrcDiagnostic::new(
                name,
                "a wire is connected to a splitter end that carries no bits",
                Severity::Severe,
                MarkMask::INSTANCE,
            );
            warn.add_instance(shape.comp());
            reporter.add_warning(warn);
        }
    }
    Ok(())
}

fn process_normal(
    netlist: &mut CircuitNetlist,
    id: CompId,
    comp: &Component,
) -> Result<(), NetlistError> {
    let mut ends: Vec<ConnectionEnd> = comp
        .pins
        .iter()
        .map(|pin| {
            ConnectionEnd::new(
                id,
                matches!(pin.direction, PinDirection::Output),
                pin.width,
                pin.location,
            )
        })
        .collect();
    for (pin_id, pin) in comp.pins.iter().enumerate() {
        let Some(connection) = find_net_at(&netlist.nets, pin.location) else {
            continue;
        };
        let is_sink = pin.direction.is_input();
        let root = root_net(&netlist.nets, connection);
        for bit in 0..pin.width as u16 {
            let root_bit = root_net_index(&netlist.nets, connection, bit).ok_or(
                NetlistError::MissingRootBit {
                    location: pin.location,
                    bit,
                },
            )?;
            if let Some(end) = ends.get_mut(pin_id)
                && let Some(point) = end.get_mut(bit)
            {
                point.set_parent_net(root, root_bit);
                let snapshot = point.clone();
                if is_sink {
                    netlist.nets[root].add_sink(root_bit, snapshot);
                } else {
                    netlist.nets[root].add_source(root_bit, snapshot);
                }
            }
        }
    }
    let wrapped = NetlistComponent::new(id, correct_label(&comp.label), ends);
    match &comp.kind {
        ComponentKind::Clock(params) => netlist.clock_generators.push(ClockGenerator {
            params: *params,
            comp: wrapped,
        }),
        ComponentKind::Pin(PortKind::Input) => netlist.input_ports.push(wrapped),
        ComponentKind::Pin(PortKind::Output) => netlist.output_ports.push(wrapped),
        _ => {
            let wrapped = match comp.map_info {
                Some(info) => wrapped.with_map_info(info),
                None => wrapped,
            };
            netlist.components.push(wrapped);
        }
    }
    Ok(())
}

fn process_subcircuit(
    netlist: &mut CircuitNetlist,
    children: &IndexMap<String, CircuitNetlist>,
    id: CompId,
    comp: &Component,
    child_name: &str,
    pin_labels: &[String],
) -> Result<(), NetlistError> {
    let child = children
        .get(child_name)
        .ok_or_else(|| NetlistError::missing_netlist(child_name))?;
    let mut ends: Vec<ConnectionEnd> = comp
        .pins
        .iter()
        .map(|pin| {
            ConnectionEnd::new(
                id,
                matches!(pin.direction, PinDirection::Output),
                pin.width,
                pin.location,
            )
        })
        .collect();
    for (pin_id, (pin, port_label)) in comp.pins.iter().zip(pin_labels).enumerate() {
        let sub_port = child
            .port_index(port_label)
            .ok_or_else(|| NetlistError::UnknownChildPort {
                label: correct_label(port_label),
                child: child_name.to_string(),
            })?;
        match find_net_at(&netlist.nets, pin.location) {
            Some(connection) => {
                let is_sink = pin.direction.is_input();
                let root = root_net(&netlist.nets, connection);
                for bit in 0..pin.width as u16 {
                    let root_bit = root_net_index(&netlist.nets, connection, bit).ok_or(
                        NetlistError::MissingRootBit {
                            location: pin.location,
                            bit,
                        },
                    )?;
                    if let Some(end) = ends.get_mut(pin_id)
                        && let Some(point) = end.get_mut(bit)
                    {
                        point.set_parent_net(root, root_bit);
                        point.set_child_port(sub_port);
                        let snapshot = point.clone();
                        if is_sink {
                            netlist.nets[root].add_sink(root_bit, snapshot);
                        } else {
                            netlist.nets[root].add_source(root_bit, snapshot);
                        }
                    }
                }
            }
            None => {
                if let Some(end) = ends.get_mut(pin_id) {
                    for bit in 0..pin.width as u16 {
                        if let Some(point) = end.get_mut(bit) {
                            point.set_child_port(sub_port);
                        }
                    }
                }
            }
        }
    }
    let wrapped = NetlistComponent::new(id, correct_label(&comp.label), ends)
        .with_child_circuit(child_name);
    netlist.sub_circuits.push(wrapped);
    Ok(())
}

/// Resolve the per-bit drivers and consumers of every forced-root net by
/// tracing through the splitters that touch it.
fn resolve_forced_roots(netlist: &mut CircuitNetlist) -> Result<(), NetlistError> {
    for t in 0..netlist.nets.len() {
        if !netlist.nets[t].is_forced_root() {
            continue;
        }
        for bit in 0..netlist.nets[t].width() as u16 {
            for s in 0..netlist.splitters.len() {
                let shape = &netlist.splitters[s];
                let spec = shape.spec().clone();
                let bus = find_net_at(&netlist.nets, shape.bus_location())
                    .ok_or(NetlistError::MissingBusNet(shape.bus_location()))?;
                let comp = shape.comp();
                let bus_location = shape.bus_location();
                for fan in 0..spec.fan_count() {
                    if spec.fan_is_unrouted(fan) {
                        continue;
                    }
                    let Some(loc) = netlist.splitters[s].fan_location(fan) else {
                        continue;
                    };
                    if !netlist.nets[t].contains(loc) {
                        continue;
                    }
                    let fan_bits = spec.fan_bits(fan);
                    let Some(&bus_bit) = fan_bits.get(bit as usize) else {
                        continue;
                    };
                    let mut root = bus;
                    let mut root_bit = bus_bit;
                    while !netlist.nets[root].is_root() {
                        root_bit = netlist.nets[root].parent_bit(root_bit).ok_or(
                            NetlistError::MissingRootBit {
                                location: bus_location,
                                bit: root_bit,
                            },
                        )?;
                        match netlist.nets[root].parent() {
                            Some(parent) => root = parent,
                            None => break,
                        }
                    }
                    let mut point = ConnectionPoint::new(comp);
                    point.set_parent_net(root, root_bit);
                    let mut is_sink = true;
                    if !netlist.nets[t].has_bit_source(bit) {
                        let mut visited = HashSet::new();
                        if has_hidden_source(
                            &netlist.nets,
                            &netlist.splitters,
                            Some((t, bit)),
                            (root, root_bit),
                            &mut visited,
                            Some(s),
                        ) {
                            is_sink = false;
                        }
                    }
                    if is_sink {
                        netlist.nets[t].add_sink_net(bit, point);
                    } else {
                        netlist.nets[t].add_source_net(bit, point);
                    }
                }
            }
        }
    }
    Ok(())
}

/// The net touching `loc`, if any.
pub(crate) fn find_net_at(nets: &[Net], loc: Location) -> Option<NetId> {
    nets.iter().position(|net| net.contains(loc))
}

/// Walk the parent chain up to the root net. A forced-root net stops the
/// walk even when it still carries a parent reference.
pub(crate) fn root_net(nets: &[Net], mut id: NetId) -> NetId {
    while let Some(net) = nets.get(id) {
        if net.is_root() {
            break;
        }
        match net.parent() {
            Some(parent) => id = parent,
            None => break,
        }
    }
    id
}

/// Fold a local bit index through the parent chain up to the root net.
pub(crate) fn root_net_index(nets: &[Net], mut id: NetId, mut bit: u16) -> Option<u16> {
    while let Some(net) = nets.get(id) {
        if net.is_root() {
            return Some(bit);
        }
        bit = net.parent_bit(bit)?;
        id = net.parent()?;
    }
    None
}

/// All sinks reachable from (`net`, `bit`), crossing splitters in both
/// directions. Visited (net, bit) pairs are tracked to cut cycles.
pub(crate) fn hidden_sinks(
    nets: &[Net],
    splitters: &[SplitterShape],
    net: NetId,
    bit: u16,
    visited: &mut HashSet<(NetId, u16)>,
    is_source_net: bool,
) -> Vec<ConnectionPoint> {
    let mut result = Vec::new();
    if !visited.insert((net, bit)) {
        return result;
    }
    let Some(this) = nets.get(net) else {
        return result;
    };
    if this.has_bit_sinks(bit) && !is_source_net && this.is_root() {
        result.extend(this.bit_sinks(bit).iter().cloned());
    }
    for shape in splitters {
        let spec = shape.spec();
        if this.contains(shape.bus_location())
            && let Some(fan) = spec.fan_of_bit(bit)
            && let Some(local) = spec.fan_local_index(bit)
            && let Some(loc) = shape.fan_location(fan)
            && let Some(slave) = find_net_at(nets, loc)
        {
            result.extend(hidden_sinks(nets, splitters, slave, local, visited, false));
        }
        for fan in 0..spec.fan_count() {
            if spec.fan_is_unrouted(fan) {
                continue;
            }
            let Some(loc) = shape.fan_location(fan) else {
                continue;
            };
            if !this.contains(loc) {
                continue;
            }
            let fan_bits = spec.fan_bits(fan);
            let Some(&bus_bit) = fan_bits.get(bit as usize) else {
                continue;
            };
            if let Some(root) = find_net_at(nets, shape.bus_location()) {
                result.extend(hidden_sinks(nets, splitters, root, bus_bit, visited, false));
            }
        }
    }
    result
}

/// Find the direct driver feeding (`net`, `bit`) through any chain of
/// splitters. Wire segments of every net crossed are collected so a
/// diagnostic can mark the whole path.
pub(crate) fn hidden_source(
    nets: &[Net],
    splitters: &[SplitterShape],
    from: Option<(NetId, u16)>,
    at: (NetId, u16),
    visited: &mut HashSet<(NetId, u16)>,
    segments: &mut HashSet<WireSegment>,
    ignore: Option<usize>,
) -> Result<Option<SourceInfo>, NetlistError> {
    if let Some(src) = from
        && !visited.insert(src)
    {
        return Ok(None);
    }
    let (net, bit) = at;
    if !visited.insert((net, bit)) {
        return Ok(None);
    }
    let Some(this) = nets.get(net) else {
        return Ok(None);
    };
    segments.extend(this.segments());
    if this.has_bit_source(bit) {
        let sources = this.bit_sources(bit);
        if sources.len() != 1 {
            return Err(NetlistError::MultipleDirectSources);
        }
        return Ok(sources.first().cloned().map(|point| SourceInfo { point, bit }));
    }
    for (idx, shape) in splitters.iter().enumerate() {
        if ignore == Some(idx) {
            continue;
        }
        let spec = shape.spec();
        if this.contains(shape.bus_location())
            && let Some(fan) = spec.fan_of_bit(bit)
            && let Some(local) = spec.fan_local_index(bit)
            && let Some(loc) = shape.fan_location(fan)
            && let Some(slave) = find_net_at(nets, loc)
            && let Some(found) = hidden_source(
                nets,
                splitters,
                None,
                (slave, local),
                visited,
                segments,
                Some(idx),
            )?
        {
            return Ok(Some(found));
        }
        for fan in 0..spec.fan_count() {
            let Some(loc) = shape.fan_location(fan) else {
                continue;
            };
            if !this.contains(loc) {
                continue;
            }
            let fan_bits = spec.fan_bits(fan);
            let Some(&bus_bit) = fan_bits.get(bit as usize) else {
                continue;
            };
            if let Some(root) = find_net_at(nets, shape.bus_location())
                && let Some(found) = hidden_source(
                    nets,
                    splitters,
                    None,
                    (root, bus_bit),
                    visited,
                    segments,
                    Some(idx),
                )?
            {
                return Ok(Some(found));
            }
        }
    }
    Ok(None)
}

/// Like [`hidden_source`] but only answers whether a driver exists.
pub(crate) fn has_hidden_source(
    nets: &[Net],
    splitters: &[SplitterShape],
    from: Option<(NetId, u16)>,
    at: (NetId, u16),
    visited: &mut HashSet<(NetId, u16)>,
    ignore: Option<usize>,
) -> bool {
    if let Some(src) = from
        && !visited.insert(src)
    {
        return false;
    }
    let (net, bit) = at;
    if !visited.insert((net, bit)) {
        return false;
    }
    let Some(this) = nets.get(net) else {
        return false;
    };
    if this.has_bit_source(bit) {
        return true;
    }
    for (idx, shape) in splitters.iter().enumerate() {
        if ignore == Some(idx) {
            continue;
        }
        let spec = shape.spec();
        if this.contains(shape.bus_location())
            && let Some(fan) = spec.fan_of_bit(bit)
            && let Some(local) = spec.fan_local_index(bit)
            && let Some(loc) = shape.fan_location(fan)
            && let Some(slave) = find_net_at(nets, loc)
            && has_hidden_source(nets, splitters, None, (slave, local), visited, Some(idx))
        {
            return true;
        }
        for fan in 0..spec.fan_count() {
            let Some(loc) = shape.fan_location(fan) else {
                continue;
            };
            if !this.contains(loc) {
                continue;
            }
            let fan_bits = spec.fan_bits(fan);
            let Some(&bus_bit) = fan_bits.get(bit as usize) else {
                continue;
            };
            if let Some(root) = find_net_at(nets, shape.bus_location())
                && has_hidden_source(nets, splitters, None, (root, bus_bit), visited, Some(idx))
            {
                return true;
            }
        }
    }
    false
}
