//! Netlist construction and design rule checking for `schemnet` designs.
//!
//! The entry point is [`DrcEngine::design_rule_check`]: it checks a design
//! bottom-up from a chosen top-level circuit, builds a [`CircuitNetlist`]
//! per definition, traces the clock nets across the hierarchy and numbers
//! the hidden IO bubbles of every instance. Results are cached per
//! definition until [`DrcEngine::invalidate`] (or a [`CircuitEvent`]
//! through [`DrcEngine::notify`]) marks them stale.
//!
//! Rule violations and advisories are delivered through the [`Reporter`]
//! trait; [`NetlistError`] is reserved for internal invariant failures.
//!
//! [`CircuitEvent`]: schemnet_model::CircuitEvent

mod builder;
mod clock;
mod connection;
mod diag;
mod engine;
mod error;
mod hierarchy;
mod net;
mod netlist;

pub use crate::clock::{ClockSourceContainer, ClockTree, ClockTreeFactory};
pub use crate::connection::{
    BubbleRange, BubbleRanges, CompId, ConnectionEnd, ConnectionPoint, NetlistComponent,
};
pub use crate::diag::{
    CollectingReporter, DrcDiagnostic, LogReporter, MarkMask, Reporter, Severity,
};
pub use crate::engine::{DrcEngine, DrcStatus};
pub use crate::error::NetlistError;
pub use crate::hierarchy::MappedResource;
pub use crate::net::{Net, NetId};
pub use crate::netlist::{CircuitNetlist, ClockGenerator, SplitterShape};
