//! Schematic model consumed by the netlist builder and DRC engine.
//!
//! This crate only describes circuits: wire segments, component instances
//! with their pin descriptors, splitter bit maps and nested sub-circuit
//! references. All electrical interpretation (net formation, bit
//! resolution, rule checking) lives in `schemnet_drc`.

mod circuit;
mod component;
mod geom;
mod label;
mod splitter;

pub use crate::circuit::{Circuit, CircuitEvent, Design};
pub use crate::component::{
    ClockParams, Component, ComponentKind, MapInfo, PinDescriptor, PinDirection, PortKind,
};
pub use crate::geom::{Location, WireSegment};
pub use crate::label::{correct_label, is_correct_label};
pub use crate::splitter::SplitterSpec;
