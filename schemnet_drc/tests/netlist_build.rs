#![allow(missing_docs)]

use std::sync::Once;

use rstest::rstest;
use schemnet_drc::{CollectingReporter, DrcEngine, DrcStatus};
use schemnet_model::{
    Circuit, Component, Design, Location, PinDescriptor, PinDirection, SplitterSpec, WireSegment,
};

static INIT: Once = Once::new();

fn init_tracing() {
    INIT.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    });
}

fn loc(x: i32, y: i32) -> Location {
    Location::new(x, y)
}

fn seg(x1: i32, y1: i32, x2: i32, y2: i32) -> WireSegment {
    WireSegment::new(loc(x1, y1), loc(x2, y2))
}

fn pin(x: i32, y: i32, direction: PinDirection, width: u32) -> PinDescriptor {
    PinDescriptor::new(loc(x, y), direction, width)
}

fn run(design: &Design, top: &str) -> (DrcStatus, DrcEngine, CollectingReporter) {
    init_tracing();
    let mut engine = DrcEngine::new();
    let mut reporter = CollectingReporter::new();
    let status = engine
        .design_rule_check(design, top, &mut reporter)
        .unwrap();
    (status, engine, reporter)
}

#[test]
fn wires_partition_into_nets() {
    let circuit = Circuit::new("top")
        .with_wire(seg(0, 0, 10, 0))
        .with_wire(seg(10, 0, 20, 0))
        .with_wire(seg(50, 0, 60, 0))
        .with_component(Component::input_port("a", loc(0, 0), 1))
        .with_component(Component::gate(
            "Buffer",
            "",
            vec![
                pin(20, 0, PinDirection::Input, 1),
                pin(50, 0, PinDirection::Output, 1),
            ],
        ))
        .with_component(Component::output_port("y", loc(60, 0), 1));
    let mut design = Design::new();
    design.add_circuit(circuit);

    let (status, engine, reporter) = run(&design, "top");
    assert_eq!(status, DrcStatus::PASSED);
    assert!(reporter.errors.is_empty());
    assert!(reporter.warnings.is_empty());

    let netlist = engine.netlist("top").unwrap();
    assert_eq!(netlist.nets().len(), 2);
    assert_eq!(netlist.number_of_nets(), 2);
    assert_eq!(netlist.number_of_busses(), 0);
    let joined = netlist.find_connected_net(loc(0, 0)).unwrap();
    assert_eq!(netlist.find_connected_net(loc(20, 0)), Some(joined));
    assert_ne!(netlist.find_connected_net(loc(50, 0)), Some(joined));
}

#[test]
fn touching_pins_form_a_single_point_net() {
    let circuit = Circuit::new("top")
        .with_component(Component::input_port("a", loc(0, 0), 1))
        .with_component(Component::output_port("y", loc(0, 0), 1));
    let mut design = Design::new();
    design.add_circuit(circuit);

    let (status, engine, reporter) = run(&design, "top");
    assert_eq!(status, DrcStatus::PASSED);
    assert!(reporter.warnings.is_empty());
    let netlist = engine.netlist("top").unwrap();
    assert_eq!(netlist.nets().len(), 1);
    assert_eq!(netlist.number_of_nets(), 1);
}

#[test]
fn tunnels_merge_nets_transitively() {
    let circuit = Circuit::new("top")
        .with_wire(seg(0, 0, 10, 0))
        .with_wire(seg(50, 50, 60, 50))
        .with_wire(seg(100, 100, 110, 100))
        .with_component(Component::input_port("a", loc(0, 0), 1))
        .with_component(Component::tunnel("t", loc(10, 0), 0))
        .with_component(Component::tunnel("t", loc(50, 50), 0))
        .with_component(Component::tunnel("u", loc(60, 50), 0))
        .with_component(Component::tunnel("u", loc(100, 100), 0))
        .with_component(Component::output_port("y", loc(110, 100), 1));
    let mut design = Design::new();
    design.add_circuit(circuit);

    let (status, engine, reporter) = run(&design, "top");
    assert_eq!(status, DrcStatus::PASSED);
    assert!(reporter.errors.is_empty());
    let netlist = engine.netlist("top").unwrap();
    assert_eq!(netlist.nets().len(), 1);
    let net = netlist.find_connected_net(loc(0, 0)).unwrap();
    assert_eq!(netlist.find_connected_net(loc(110, 100)), Some(net));
}

#[test]
fn conflicting_pin_widths_are_fatal() {
    let circuit = Circuit::new("top")
        .with_wire(seg(0, 0, 10, 0))
        .with_component(Component::input_port("a", loc(0, 0), 1))
        .with_component(Component::output_port("y", loc(10, 0), 2));
    let mut design = Design::new();
    design.add_circuit(circuit);

    let (status, engine, reporter) = run(&design, "top");
    assert!(status.is_error());
    assert!(!reporter.errors_containing("different bit widths").is_empty());
    assert!(engine.netlist("top").is_none());
}

#[test]
fn splitter_fans_map_onto_bus_bits() {
    let circuit = Circuit::new("top")
        .with_wire(seg(0, 0, 20, 0))
        .with_wire(seg(40, 20, 60, 20))
        .with_wire(seg(40, 40, 60, 40))
        .with_component(Component::input_port("data", loc(0, 0), 4))
        .with_component(Component::splitter(
            loc(20, 0),
            vec![loc(40, 20), loc(40, 40)],
            SplitterSpec::even(4, 2),
        ))
        .with_component(Component::output_port("lo", loc(60, 20), 2))
        .with_component(Component::output_port("hi", loc(60, 40), 2));
    let mut design = Design::new();
    design.add_circuit(circuit);

    let (status, engine, reporter) = run(&design, "top");
    assert_eq!(status, DrcStatus::PASSED);
    assert!(reporter.warnings.is_empty());

    let netlist = engine.netlist("top").unwrap();
    assert_eq!(netlist.number_of_busses(), 1);
    assert_eq!(netlist.number_of_nets(), 0);

    let bus = netlist.find_connected_net(loc(0, 0)).unwrap();
    let lo = netlist.find_connected_net(loc(60, 20)).unwrap();
    let hi = netlist.find_connected_net(loc(60, 40)).unwrap();
    assert_eq!(netlist.net(lo).unwrap().parent(), Some(bus));
    assert_eq!(netlist.net(lo).unwrap().parent_bit(0), Some(0));
    assert_eq!(netlist.net(lo).unwrap().parent_bit(1), Some(1));
    assert_eq!(netlist.net(hi).unwrap().parent_bit(0), Some(2));
    assert_eq!(netlist.net(hi).unwrap().parent_bit(1), Some(3));
}

#[rstest]
#[case(2)]
#[case(3)]
fn multiple_direct_drivers_are_a_short_circuit(#[case] drivers: usize) {
    let mut circuit = Circuit::new("top")
        .with_component(Component::output_port("y", loc(100, 0), 1));
    for i in 0..drivers {
        let x = i as i32 * 10;
        circuit = circuit
            .with_wire(seg(x, 0, x + 10, 0))
            .with_component(Component::input_port(format!("d{i}"), loc(x, 0), 1));
    }
    circuit = circuit.with_wire(seg(drivers as i32 * 10, 0, 100, 0));
    let mut design = Design::new();
    design.add_circuit(circuit);

    let (status, _, reporter) = run(&design, "top");
    assert!(status.is_error());
    assert!(!reporter.errors_containing("multiple drivers").is_empty());
}

#[test]
fn drivers_met_through_splitters_are_a_short_circuit() {
    // Two buses, each with its own driver, split onto the same 1-bit net.
    let spec = SplitterSpec::new(vec![Some(0), Some(1)], 2);
    let circuit = Circuit::new("top")
        .with_wire(seg(0, 0, 20, 0))
        .with_wire(seg(0, 100, 20, 100))
        .with_wire(seg(40, 0, 40, 100))
        .with_wire(seg(40, 20, 60, 20))
        .with_wire(seg(40, 120, 60, 120))
        .with_component(Component::input_port("d1", loc(0, 0), 2))
        .with_component(Component::input_port("d2", loc(0, 100), 2))
        .with_component(Component::splitter(
            loc(20, 0),
            vec![loc(40, 0), loc(40, 20)],
            spec.clone(),
        ))
        .with_component(Component::splitter(
            loc(20, 100),
            vec![loc(40, 100), loc(40, 120)],
            spec,
        ))
        .with_component(Component::output_port("o1", loc(60, 20), 1))
        .with_component(Component::output_port("o2", loc(60, 120), 1));
    let mut design = Design::new();
    design.add_circuit(circuit);

    let (status, _, reporter) = run(&design, "top");
    assert!(status.is_error());
    assert!(!reporter.errors_containing("multiple drivers").is_empty());
}

#[test]
fn a_pass_through_splitter_merges_its_nets() {
    // both bus bits route to the single fan, so the splitter is a no-op
    let circuit = Circuit::new("top")
        .with_wire(seg(0, 0, 20, 0))
        .with_wire(seg(20, 20, 40, 20))
        .with_component(Component::input_port("d", loc(0, 0), 2))
        .with_component(Component::splitter(
            loc(20, 0),
            vec![loc(20, 20)],
            SplitterSpec::new(vec![Some(0), Some(0)], 1),
        ))
        .with_component(Component::output_port("y", loc(40, 20), 2));
    let mut design = Design::new();
    design.add_circuit(circuit);

    let (status, engine, reporter) = run(&design, "top");
    assert_eq!(status, DrcStatus::PASSED);
    assert!(reporter.warnings.is_empty());

    let netlist = engine.netlist("top").unwrap();
    assert!(netlist.splitters().is_empty());
    assert_eq!(netlist.nets().len(), 1);
    assert_eq!(netlist.number_of_busses(), 1);
    let net = netlist.find_connected_net(loc(0, 0)).unwrap();
    assert_eq!(netlist.find_connected_net(loc(40, 20)), Some(net));
}

#[test]
fn a_half_connected_pass_through_splitter_is_severe() {
    let circuit = Circuit::new("top")
        .with_wire(seg(0, 0, 20, 0))
        .with_component(Component::input_port("d", loc(0, 0), 2))
        .with_component(Component::splitter(
            loc(20, 0),
            vec![loc(20, 20)],
            SplitterSpec::new(vec![Some(0), Some(0)], 1),
        ));
    let mut design = Design::new();
    design.add_circuit(circuit);

    let (status, engine, reporter) = run(&design, "top");
    assert_eq!(status, DrcStatus::PASSED);
    assert!(!reporter.warnings_containing("not connected on both sides").is_empty());
    assert!(engine.netlist("top").unwrap().splitters().is_empty());
}

#[test]
fn a_tunnel_joining_different_widths_is_fatal() {
    let circuit = Circuit::new("top")
        .with_wire(seg(0, 0, 10, 0))
        .with_wire(seg(0, 40, 10, 40))
        .with_component(Component::input_port("a", loc(0, 0), 1))
        .with_component(Component::input_port("b", loc(0, 40), 2))
        .with_component(Component::tunnel("t", loc(10, 0), 0))
        .with_component(Component::tunnel("t", loc(10, 40), 0));
    let mut design = Design::new();
    design.add_circuit(circuit);

    let (status, engine, reporter) = run(&design, "top");
    assert!(status.is_error());
    assert!(!reporter.errors_containing("tunnel joins").is_empty());
    assert!(engine.netlist("top").is_none());
}

#[test]
fn a_wire_on_a_bitless_splitter_end_is_severe() {
    // fan 1 exists in the splitter's geometry but routes no bus bits; a
    // wire still reaches it because it spans both fan ends
    let circuit = Circuit::new("top")
        .with_wire(seg(0, 0, 20, 0))
        .with_wire(seg(20, 20, 20, 40))
        .with_component(Component::input_port("d", loc(0, 0), 1))
        .with_component(Component::splitter(
            loc(20, 0),
            vec![loc(20, 20), loc(20, 40)],
            SplitterSpec::new(vec![Some(0)], 2),
        ))
        .with_component(Component::output_port("y", loc(20, 40), 1));
    let mut design = Design::new();
    design.add_circuit(circuit);

    let (status, engine, reporter) = run(&design, "top");
    assert_eq!(status, DrcStatus::PASSED);
    assert!(reporter.errors.is_empty());
    assert!(!reporter.warnings_containing("carries no bits").is_empty());

    // reaching the same net from two fan ends rules out implicit folding
    let netlist = engine.netlist("top").unwrap();
    let fan_net = netlist.find_connected_net(loc(20, 40)).unwrap();
    assert!(netlist.net(fan_net).unwrap().is_forced_root());
}

#[test]
fn a_sink_without_a_source_is_severe() {
    let circuit = Circuit::new("top")
        .with_wire(seg(0, 0, 10, 0))
        .with_component(Component::output_port("y", loc(10, 0), 1));
    let mut design = Design::new();
    design.add_circuit(circuit);

    let (status, _, reporter) = run(&design, "top");
    assert_eq!(status, DrcStatus::PASSED);
    assert!(!reporter.warnings_containing("without a source").is_empty());
}

#[test]
fn a_source_without_sinks_is_reported() {
    let circuit = Circuit::new("top")
        .with_wire(seg(0, 0, 10, 0))
        .with_component(Component::input_port("a", loc(0, 0), 1));
    let mut design = Design::new();
    design.add_circuit(circuit);

    let (status, _, reporter) = run(&design, "top");
    assert_eq!(status, DrcStatus::PASSED);
    assert!(!reporter.warnings_containing("no sinks").is_empty());
}

#[test]
fn overlapping_splitters_and_empty_nets_are_advisory() {
    let spec = SplitterSpec::new(vec![Some(0), Some(1)], 2);
    let circuit = Circuit::new("top")
        .with_wire(seg(0, 0, 20, 0))
        .with_wire(seg(40, 0, 60, 0))
        .with_wire(seg(40, 20, 60, 20))
        .with_wire(seg(200, 200, 210, 200))
        .with_component(Component::input_port("d", loc(0, 0), 2))
        .with_component(Component::splitter(
            loc(20, 0),
            vec![loc(40, 0), loc(40, 20)],
            spec.clone(),
        ))
        .with_component(Component::splitter(
            loc(20, 0),
            vec![loc(40, 0), loc(40, 20)],
            spec,
        ))
        .with_component(Component::output_port("o1", loc(60, 0), 1))
        .with_component(Component::output_port("o2", loc(60, 20), 1));
    let mut design = Design::new();
    design.add_circuit(circuit);

    let (status, engine, reporter) = run(&design, "top");
    assert_eq!(status, DrcStatus::PASSED);
    assert!(!reporter.warnings_containing("overlap").is_empty());
    assert!(!reporter.warnings_containing("without any connection").is_empty());
    // the wire at (200, 200) carried no signal and was dropped
    let netlist = engine.netlist("top").unwrap();
    assert_eq!(netlist.find_connected_net(loc(200, 200)), None);
    assert_eq!(netlist.splitters().len(), 1);
}
