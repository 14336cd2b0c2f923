//! The design rule check engine: per-circuit checks, netlist caching and
//! invalidation.

use std::collections::{HashMap, HashSet};
use std::ops::{BitOr, BitOrAssign};

use indexmap::IndexMap;
use itertools::Itertools;
use schemnet_model::{CircuitEvent, Design, correct_label, is_correct_label};
use tracing::debug;

use crate::builder;
use crate::clock::ClockSourceContainer;
use crate::connection::CompId;
use crate::diag::{DrcDiagnostic, MarkMask, Reporter, Severity};
use crate::error::NetlistError;
use crate::netlist::CircuitNetlist;

/// Outcome of a design rule check, as a bitmask so partial results
/// combine.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct DrcStatus(u8);

impl DrcStatus {
    /// All checks passed; the cached netlist is valid.
    pub const PASSED: DrcStatus = DrcStatus(0);
    /// Components are missing mandatory labels.
    pub const ANNOTATE_REQUIRED: DrcStatus = DrcStatus(1);
    /// A rule violation blocks netlist use.
    pub const ERROR: DrcStatus = DrcStatus(2);
    /// The circuit changed since the last check.
    pub const REQUIRED: DrcStatus = DrcStatus(4);

    /// True when no failure bit is set.
    pub fn is_passed(self) -> bool {
        self.0 == 0
    }

    /// True when annotation is needed.
    pub fn requires_annotation(self) -> bool {
        self.0 & DrcStatus::ANNOTATE_REQUIRED.0 != 0
    }

    /// True when a blocking violation was found.
    pub fn is_error(self) -> bool {
        self.0 & DrcStatus::ERROR.0 != 0
    }

    /// True when the check must be rerun.
    pub fn requires_check(self) -> bool {
        self.0 & DrcStatus::REQUIRED.0 != 0
    }
}

impl Default for DrcStatus {
    fn default() -> Self {
        DrcStatus::REQUIRED
    }
}

impl BitOr for DrcStatus {
    type Output = DrcStatus;

    fn bitor(self, rhs: DrcStatus) -> DrcStatus {
        DrcStatus(self.0 | rhs.0)
    }
}

impl BitOrAssign for DrcStatus {
    fn bitor_assign(&mut self, rhs: DrcStatus) {
        self.0 |= rhs.0;
    }
}

/// Design-wide DRC driver. Netlists are cached per circuit definition and
/// only rebuilt after [`DrcEngine::invalidate`] marked them stale.
#[derive(Debug, Default)]
pub struct DrcEngine {
    pub(crate) netlists: IndexMap<String, CircuitNetlist>,
    pub(crate) status: HashMap<String, DrcStatus>,
    pub(crate) clock_sources: ClockSourceContainer,
}

impl DrcEngine {
    /// An engine with no cached results.
    pub fn new() -> Self {
        DrcEngine::default()
    }

    /// The most recently built netlist of `name`, if one is cached. A
    /// cached netlist can outlive a failed top-level check, so gate on
    /// [`DrcEngine::status`] when validity matters.
    pub fn netlist(&self, name: &str) -> Option<&CircuitNetlist> {
        self.netlists.get(name)
    }

    /// The recorded status of `name`; never-checked circuits report
    /// [`DrcStatus::REQUIRED`].
    pub fn status(&self, name: &str) -> DrcStatus {
        self.status.get(name).copied().unwrap_or_default()
    }

    /// The design-wide clock source registry.
    pub fn clock_sources(&self) -> &ClockSourceContainer {
        &self.clock_sources
    }

    /// Run the full design rule check with `top` as the top-level circuit.
    ///
    /// Child circuits are checked bottom-up and their netlists cached;
    /// circuits whose status is still `PASSED` are not rebuilt. On the top
    /// level the clock trees and the hierarchical bubble numbering are
    /// reconstructed and the design must expose at least one pin or
    /// mappable IO component.
    pub fn design_rule_check(
        &mut self,
        design: &Design,
        top: &str,
        reporter: &mut dyn Reporter,
    ) -> Result<DrcStatus, NetlistError> {
        let mut seen = HashSet::new();
        for circuit in design.circuits() {
            if circuit.name.is_empty() {
                reporter.add_fatal("a circuit definition has an empty name".to_string());
                return Ok(DrcStatus::ERROR);
            }
            if !seen.insert(circuit.name.to_lowercase()) {
                reporter.add_fatal(format!(
                    "multiple circuit definitions share the name {:?}",
                    circuit.name
                ));
                return Ok(DrcStatus::ERROR);
            }
        }
        if design.circuit(top).is_none() {
            return Err(NetlistError::unknown_circuit(top));
        }

        let status = self.check_circuit(design, top, reporter)?;
        if !status.is_passed() {
            return Ok(status);
        }

        for netlist in self.netlists.values_mut() {
            netlist.clock_trees.clean();
        }
        self.clock_sources.clear();
        self.mark_clock_source_components(vec![top.to_string()], Vec::new())?;

        let mut visited = HashSet::new();
        self.construct_hierarchy_tree(&mut visited, top, Vec::new(), 0, 0, 0)?;

        let top_netlist = self
            .netlists
            .get(top)
            .ok_or_else(|| NetlistError::missing_netlist(top))?;
        let bubbles = top_netlist.local_bubbles();
        let ports = top_netlist.input_ports().len()
            + top_netlist.output_ports().len()
            + (bubbles.in_ports + bubbles.out_ports + bubbles.inout_ports) as usize;
        if ports == 0 {
            reporter.add_fatal(format!(
                "circuit {top:?} has no input/output pins and no mappable IO; there is nothing to build"
            ));
            self.status.insert(top.to_string(), DrcStatus::ERROR);
            return Ok(DrcStatus::ERROR);
        }
        Ok(DrcStatus::PASSED)
    }

    fn check_circuit(
        &mut self,
        design: &Design,
        name: &str,
        reporter: &mut dyn Reporter,
    ) -> Result<DrcStatus, NetlistError> {
        if self.status.get(name).copied() == Some(DrcStatus::PASSED)
            && self.netlists.contains_key(name)
        {
            debug!(circuit = name, "reusing cached netlist");
            return Ok(DrcStatus::PASSED);
        }
        let circuit = design
            .circuit(name)
            .ok_or_else(|| NetlistError::unknown_circuit(name))?;

        for child in circuit.child_circuits().unique() {
            let child_status = self.check_circuit(design, child, reporter)?;
            if !child_status.is_passed() {
                self.status.insert(name.to_string(), DrcStatus::REQUIRED);
                return Ok(DrcStatus::ERROR);
            }
        }

        let mut status = DrcStatus::PASSED;
        let comp_names: HashSet<String> = circuit
            .components
            .iter()
            .map(|c| c.hdl_name().to_uppercase())
            .collect();
        let mut labels: HashMap<String, CompId> = HashMap::new();
        let mut no_label = DrcDiagnostic::new(
            name,
            "components that must be annotated are missing a label",
            Severity::Fatal,
            MarkMask::INSTANCE,
        );
        let mut name_is_label = DrcDiagnostic::new(
            name,
            "a label collides with a component or circuit name",
            Severity::Fatal,
            MarkMask::INSTANCE | MarkMask::LABEL,
        );
        let mut invalid_label = DrcDiagnostic::new(
            name,
            "a label is not a valid identifier",
            Severity::Fatal,
            MarkMask::INSTANCE | MarkMask::LABEL,
        );
        let mut duplicate_label = DrcDiagnostic::new(
            name,
            "two components carry the same label",
            Severity::Fatal,
            MarkMask::INSTANCE | MarkMask::LABEL,
        );
        let mut tristate = DrcDiagnostic::new(
            name,
            "tri-state drivers cannot be synthesised",
            Severity::Fatal,
            MarkMask::INSTANCE,
        );
        let mut unsupported = DrcDiagnostic::new(
            name,
            "components without a synthesisable counterpart are present",
            Severity::Fatal,
            MarkMask::INSTANCE,
        );
        for (id, comp) in circuit.components.iter().enumerate() {
            if !comp.hdl_supported {
                unsupported.add_instance(id);
                status |= DrcStatus::ERROR;
            }
            if comp.requires_label {
                let label = correct_label(&comp.label).to_uppercase();
                if label.is_empty() {
                    no_label.add_instance(id);
                    status |= DrcStatus::ANNOTATE_REQUIRED;
                } else {
                    if comp_names.contains(&label) {
                        name_is_label.add_instance(id);
                        status |= DrcStatus::ERROR;
                    }
                    if !is_correct_label(&label) {
                        invalid_label.add_instance(id);
                        status |= DrcStatus::ERROR;
                    }
                    if let Some(&other) = labels.get(&label) {
                        duplicate_label.add_instance(id);
                        duplicate_label.add_instance(other);
                        status |= DrcStatus::ERROR;
                    } else {
                        labels.insert(label, id);
                    }
                }
            }
            if comp.three_state {
                tristate.add_instance(id);
                status |= DrcStatus::ERROR;
            }
        }
        for diag in [
            no_label,
            name_is_label,
            invalid_label,
            duplicate_label,
            tristate,
            unsupported,
        ] {
            if diag.has_marks() {
                reporter.add_error(diag);
            }
        }
        if !status.is_passed() {
            self.status.insert(name.to_string(), status);
            return Ok(status);
        }

        reporter.add_info(format!("building the netlist for {name:?}"));
        let Some(mut netlist) = builder::generate(circuit, &self.netlists, reporter)? else {
            self.status.insert(name.to_string(), DrcStatus::ERROR);
            return Ok(DrcStatus::ERROR);
        };
        if netlist.has_short_circuits(reporter)? {
            self.status.insert(name.to_string(), DrcStatus::ERROR);
            return Ok(DrcStatus::ERROR);
        }
        netlist.report_sinks_without_source(reporter);
        netlist.report_unconnected_pins(reporter);
        reporter.add_info(format!(
            "circuit {name:?} has {} nets and {} busses",
            netlist.number_of_nets(),
            netlist.number_of_busses()
        ));
        reporter.add_info(format!("DRC passed for circuit {name:?}"));
        self.netlists.insert(name.to_string(), netlist);
        self.status.insert(name.to_string(), DrcStatus::PASSED);
        Ok(DrcStatus::PASSED)
    }

    /// React to a schematic mutation by invalidating the affected circuit.
    pub fn notify(&mut self, design: &Design, event: &CircuitEvent) {
        self.invalidate(design, event.circuit());
    }

    /// Drop the cached netlist of `name` and of every circuit embedding
    /// it, directly or transitively; their next check rebuilds from
    /// scratch.
    pub fn invalidate(&mut self, design: &Design, name: &str) {
        let mut stack = vec![name.to_string()];
        let mut seen = HashSet::new();
        while let Some(current) = stack.pop() {
            if !seen.insert(current.clone()) {
                continue;
            }
            debug!(circuit = current.as_str(), "invalidating cached netlist");
            self.status.insert(current.clone(), DrcStatus::REQUIRED);
            self.netlists.shift_remove(&current);
            for embedder in design.embedders(&current) {
                stack.push(embedder.to_string());
            }
        }
    }
}
