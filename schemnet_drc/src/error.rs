//! Internal invariant failures of the netlist builder.
//!
//! These are not user rule violations; those travel as [`DrcDiagnostic`]s
//! to the reporter. A `NetlistError` means the builder's own bookkeeping
//! broke down (or an upstream model handed us something structurally
//! impossible) and the build for the affected circuit must be abandoned.
//!
//! [`DrcDiagnostic`]: crate::diag::DrcDiagnostic

use schemnet_model::Location;
use thiserror::Error;

/// Fatal conditions that abort netlist construction for one circuit.
#[derive(Debug, Error)]
pub enum NetlistError {
    /// A splitter's combined end sits on no net.
    #[error("splitter at {0} has no net on its combined end")]
    MissingBusNet(Location),

    /// Merging the two sides of a pass-through splitter hit nets of
    /// different widths.
    #[error("pass-through splitter at {0} bridges nets of different widths")]
    SplitterMergeConflict(Location),

    /// A bit index could not be folded through the parent chain.
    #[error("no root-net bit index for bit {bit} of the pin at {location}")]
    MissingRootBit {
        /// Pin location.
        location: Location,
        /// Local bit index that failed to resolve.
        bit: u16,
    },

    /// A sub-circuit instance pin names a port the child does not have.
    #[error("sub-circuit pin label {label:?} matches no port of {child:?}")]
    UnknownChildPort {
        /// Corrected pin label on the instance.
        label: String,
        /// Child circuit definition name.
        child: String,
    },

    /// A sub-circuit instance references a definition that was never built.
    #[error("no netlist exists for circuit {0:?}")]
    MissingNetlist(String),

    /// The design has no definition under the requested name.
    #[error("no circuit definition named {0:?}")]
    UnknownCircuit(String),

    /// A net bit carries more than one direct driver where exactly one was
    /// required.
    #[error("multiple direct drivers found on one net bit")]
    MultipleDirectSources,

    /// A clock generator with other than one single-bit output pin.
    #[error("clock generator {0:?} has a malformed output pin")]
    MalformedClockSource(String),

    /// A sub-circuit connection point was never annotated with its child
    /// port index.
    #[error("sub-circuit port is not annotated with a child port index")]
    UnannotatedChildPort,

    /// A connection point that should have been resolved carries no net.
    #[error("connection point has no parent net")]
    UnboundConnection,

    /// A hierarchy walk stepped onto a level that has no netlist
    /// counterpart.
    #[error("hierarchy walk left the known netlists at {0:?}")]
    BrokenHierarchy(String),
}

impl NetlistError {
    /// Convenience constructor for [`NetlistError::MissingNetlist`].
    pub fn missing_netlist(name: impl Into<String>) -> Self {
        NetlistError::MissingNetlist(name.into())
    }

    /// Convenience constructor for [`NetlistError::UnknownCircuit`].
    pub fn unknown_circuit(name: impl Into<String>) -> Self {
        NetlistError::UnknownCircuit(name.into())
    }
}
