//! Structured DRC diagnostics and the reporter seam.

use std::ops::BitOr;

use schemnet_model::WireSegment;
use tracing::{error, info, warn};

use crate::connection::CompId;

/// How serious a diagnostic is.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Severity {
    /// Informational; never blocks anything.
    Normal,
    /// Strong advisory; the design is suspicious but buildable.
    Severe,
    /// Rule violation; the enclosing DRC fails.
    Fatal,
}

/// Bitmask telling a UI how to highlight the offending elements.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct MarkMask(u8);

impl MarkMask {
    /// Nothing to highlight.
    pub const NONE: MarkMask = MarkMask(0);
    /// Outline the component instances.
    pub const INSTANCE: MarkMask = MarkMask(1);
    /// Highlight the component labels.
    pub const LABEL: MarkMask = MarkMask(2);
    /// Highlight the wire segments.
    pub const WIRE: MarkMask = MarkMask(4);

    /// True when `other`'s bits are all set in `self`.
    pub fn contains(self, other: MarkMask) -> bool {
        self.0 & other.0 == other.0
    }
}

impl BitOr for MarkMask {
    type Output = MarkMask;

    fn bitor(self, rhs: MarkMask) -> MarkMask {
        MarkMask(self.0 | rhs.0)
    }
}

/// One diagnostic: a message, a severity, and the schematic elements a UI
/// should mark. Diagnostics are accumulated per check so the user sees
/// every offender of one rule in a single report.
#[derive(Clone, Debug)]
pub struct DrcDiagnostic {
    circuit: String,
    message: String,
    severity: Severity,
    mark: MarkMask,
    instances: Vec<CompId>,
    wires: Vec<WireSegment>,
}

impl DrcDiagnostic {
    /// A diagnostic with no marked elements yet.
    pub fn new(
        circuit: impl Into<String>,
        message: impl Into<String>,
        severity: Severity,
        mark: MarkMask,
    ) -> Self {
        DrcDiagnostic {
            circuit: circuit.into(),
            message: message.into(),
            severity,
            mark,
            instances: Vec::new(),
            wires: Vec::new(),
        }
    }

    /// Mark one component instance.
    pub fn add_instance(&mut self, comp: CompId) {
        if !self.instances.contains(&comp) {
            self.instances.push(comp);
        }
    }

    /// Mark a set of wire segments.
    pub fn add_wires(&mut self, wires: impl IntoIterator<Item = WireSegment>) {
        for wire in wires {
            if !self.wires.contains(&wire) {
                self.wires.push(wire);
            }
        }
    }

    /// True once at least one element has been marked.
    pub fn has_marks(&self) -> bool {
        !self.instances.is_empty() || !self.wires.is_empty()
    }

    /// The circuit definition the diagnostic belongs to.
    pub fn circuit(&self) -> &str {
        &self.circuit
    }

    /// Human-readable rule description.
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Severity of the rule.
    pub fn severity(&self) -> Severity {
        self.severity
    }

    /// Highlight mask for the UI.
    pub fn mark(&self) -> MarkMask {
        self.mark
    }

    /// Marked component instances.
    pub fn instances(&self) -> &[CompId] {
        &self.instances
    }

    /// Marked wire segments.
    pub fn wires(&self) -> &[WireSegment] {
        &self.wires
    }
}

/// Sink for everything the DRC wants to tell the user.
pub trait Reporter {
    /// Progress / statistics messages.
    fn add_info(&mut self, message: String);
    /// Non-blocking diagnostics.
    fn add_warning(&mut self, diag: DrcDiagnostic);
    /// Blocking diagnostics.
    fn add_error(&mut self, diag: DrcDiagnostic);
    /// Fatal conditions without marked elements.
    fn add_fatal(&mut self, message: String);
}

/// Reporter that forwards everything to `tracing`.
#[derive(Debug, Default)]
pub struct LogReporter;

impl Reporter for LogReporter {
    fn add_info(&mut self, message: String) {
        info!("{message}");
    }

    fn add_warning(&mut self, diag: DrcDiagnostic) {
        warn!(circuit = diag.circuit(), "{}", diag.message());
    }

    fn add_error(&mut self, diag: DrcDiagnostic) {
        error!(circuit = diag.circuit(), "{}", diag.message());
    }

    fn add_fatal(&mut self, message: String) {
        error!("{message}");
    }
}

/// Reporter that keeps everything for inspection; used by tests.
#[derive(Debug, Default)]
pub struct CollectingReporter {
    /// Informational messages, in emission order.
    pub infos: Vec<String>,
    /// Warnings, in emission order.
    pub warnings: Vec<DrcDiagnostic>,
    /// Errors, in emission order.
    pub errors: Vec<DrcDiagnostic>,
    /// Fatal messages, in emission order.
    pub fatals: Vec<String>,
}

impl CollectingReporter {
    /// A fresh, empty reporter.
    pub fn new() -> Self {
        CollectingReporter::default()
    }

    /// Errors whose message contains `needle`.
    pub fn errors_containing(&self, needle: &str) -> Vec<&DrcDiagnostic> {
        self.errors
            .iter()
            .filter(|d| d.message().contains(needle))
            .collect()
    }

    /// Warnings whose message contains `needle`.
    pub fn warnings_containing(&self, needle: &str) -> Vec<&DrcDiagnostic> {
        self.warnings
            .iter()
            .filter(|d| d.message().contains(needle))
            .collect()
    }
}

impl Reporter for CollectingReporter {
    fn add_info(&mut self, message: String) {
        self.infos.push(message);
    }

    fn add_warning(&mut self, diag: DrcDiagnostic) {
        self.warnings.push(diag);
    }

    fn add_error(&mut self, diag: DrcDiagnostic) {
        self.errors.push(diag);
    }

    fn add_fatal(&mut self, message: String) {
        self.fatals.push(message);
    }
}
