#![allow(missing_docs)]

use std::sync::Once;

use schemnet_drc::{BubbleRange, CollectingReporter, DrcEngine, DrcStatus, NetlistError};
use schemnet_model::{
    Circuit, CircuitEvent, ClockParams, Component, Design, Location, MapInfo, PinDescriptor,
    PinDirection, WireSegment,
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

/// A pass-through circuit with one input and one output port, plus a top
/// level instantiating it once.
fn two_level_design() -> Design {
    let leaf = Circuit::new("leaf")
        .with_wire(seg(0, 0, 10, 0))
        .with_component(Component::input_port("a", loc(0, 0), 1))
        .with_component(Component::output_port("y", loc(10, 0), 1));
    let top = Circuit::new("top")
        .with_wire(seg(0, 0, 20, 0))
        .with_wire(seg(40, 0, 60, 0))
        .with_component(Component::input_port("tin", loc(0, 0), 1))
        .with_component(Component::subcircuit(
            "leaf",
            "u1",
            vec![
                ("a".to_string(), pin(20, 0, PinDirection::Input, 1)),
                ("y".to_string(), pin(40, 0, PinDirection::Output, 1)),
            ],
        ))
        .with_component(Component::output_port("tout", loc(60, 0), 1));
    let mut design = Design::new();
    design.add_circuit(leaf);
    design.add_circuit(top);
    design
}

#[test]
fn label_rules_combine_into_the_status() {
    let circuit = Circuit::new("top")
        .with_component(Component::input_port("x", loc(0, 0), 1))
        .with_component(Component::input_port("x", loc(10, 0), 1))
        .with_component(Component::input_port("", loc(20, 0), 1))
        .with_component(Component::input_port("1bad", loc(30, 0), 1))
        .with_component(Component::input_port("Pin", loc(40, 0), 1));
    let mut design = Design::new();
    design.add_circuit(circuit);

    let (status, engine, reporter) = run(&design, "top");
    assert!(status.is_error());
    assert!(status.requires_annotation());
    assert!(!reporter.errors_containing("missing a label").is_empty());
    assert!(!reporter.errors_containing("same label").is_empty());
    assert!(!reporter.errors_containing("not a valid identifier").is_empty());
    assert!(!reporter.errors_containing("collides").is_empty());
    assert!(engine.netlist("top").is_none());
}

#[test]
fn duplicate_circuit_names_are_fatal() {
    let mut design = Design::new();
    design.add_circuit(Circuit::new("Main"));
    design.add_circuit(Circuit::new("main"));

    let (status, _, reporter) = run(&design, "Main");
    assert!(status.is_error());
    assert!(!reporter.fatals.is_empty());
}

#[test]
fn an_unknown_top_level_is_an_error() {
    init_tracing();
    let mut engine = DrcEngine::new();
    let mut reporter = CollectingReporter::new();
    let err = engine
        .design_rule_check(&Design::new(), "nope", &mut reporter)
        .unwrap_err();
    assert!(matches!(err, NetlistError::UnknownCircuit(_)));
}

#[test]
fn a_top_level_without_io_is_rejected() {
    let circuit = Circuit::new("top")
        .with_wire(seg(0, 0, 10, 0))
        .with_component(Component::gate(
            "Buffer",
            "",
            vec![
                pin(0, 0, PinDirection::Output, 1),
                pin(10, 0, PinDirection::Input, 1),
            ],
        ));
    let mut design = Design::new();
    design.add_circuit(circuit);

    let (status, engine, reporter) = run(&design, "top");
    assert!(status.is_error());
    assert!(engine.status("top").is_error());
    assert!(reporter.fatals.iter().any(|m| m.contains("no input/output pins")));
    // the build itself succeeded; only the top-level check failed
    assert!(engine.netlist("top").is_some());
}

#[test]
fn passing_netlists_are_cached_until_invalidated() {
    let design = two_level_design();
    let mut engine = DrcEngine::new();
    init_tracing();

    let mut first = CollectingReporter::new();
    let status = engine.design_rule_check(&design, "top", &mut first).unwrap();
    assert_eq!(status, DrcStatus::PASSED);
    assert_eq!(first.infos.iter().filter(|m| m.contains("building")).count(), 2);

    let mut second = CollectingReporter::new();
    let status = engine.design_rule_check(&design, "top", &mut second).unwrap();
    assert_eq!(status, DrcStatus::PASSED);
    assert_eq!(second.infos.iter().filter(|m| m.contains("building")).count(), 0);

    engine.invalidate(&design, "leaf");
    assert!(engine.status("leaf").requires_check());
    assert!(engine.status("top").requires_check());
    assert!(engine.netlist("leaf").is_none());
    assert!(engine.netlist("top").is_none());

    let mut third = CollectingReporter::new();
    let status = engine.design_rule_check(&design, "top", &mut third).unwrap();
    assert_eq!(status, DrcStatus::PASSED);
    assert_eq!(third.infos.iter().filter(|m| m.contains("building")).count(), 2);
}

#[test]
fn rebuilding_after_invalidation_yields_the_same_structure() {
    let design = two_level_design();
    init_tracing();
    let mut engine = DrcEngine::new();
    let mut reporter = CollectingReporter::new();
    engine.design_rule_check(&design, "top", &mut reporter).unwrap();

    let snapshot: Vec<_> = ["leaf", "top"]
        .iter()
        .map(|name| {
            let netlist = engine.netlist(name).unwrap();
            let nets: Vec<_> = netlist
                .nets()
                .iter()
                .map(|net| (net.width(), net.is_root()))
                .collect();
            (
                nets,
                netlist.sub_circuits().len(),
                netlist.input_ports().len(),
                netlist.output_ports().len(),
            )
        })
        .collect();

    engine.invalidate(&design, "leaf");
    let mut reporter = CollectingReporter::new();
    let status = engine.design_rule_check(&design, "top", &mut reporter).unwrap();
    assert_eq!(status, DrcStatus::PASSED);

    for (name, before) in ["leaf", "top"].iter().zip(&snapshot) {
        let netlist = engine.netlist(name).unwrap();
        let nets: Vec<_> = netlist
            .nets()
            .iter()
            .map(|net| (net.width(), net.is_root()))
            .collect();
        assert_eq!(nets, before.0);
        assert_eq!(netlist.sub_circuits().len(), before.1);
        assert_eq!(netlist.input_ports().len(), before.2);
        assert_eq!(netlist.output_ports().len(), before.3);
    }
}

#[test]
fn events_invalidate_only_the_affected_subtree() {
    let design = two_level_design();
    let mut engine = DrcEngine::new();
    init_tracing();
    let mut reporter = CollectingReporter::new();
    engine.design_rule_check(&design, "top", &mut reporter).unwrap();

    engine.notify(&design, &CircuitEvent::ComponentChanged("top".to_string()));
    assert!(engine.status("top").requires_check());
    assert!(engine.status("leaf").is_passed());
    assert!(engine.netlist("leaf").is_some());
}

#[test]
fn a_clock_is_traced_into_subcircuits() {
    let blinker = Circuit::new("blinker")
        .with_wire(seg(0, 0, 20, 0))
        .with_wire(seg(40, 0, 60, 0))
        .with_component(Component::input_port("ck", loc(0, 0), 1))
        .with_component(Component::gate(
            "Register",
            "",
            vec![
                pin(20, 0, PinDirection::Input, 1),
                pin(40, 0, PinDirection::Output, 1),
            ],
        ))
        .with_component(Component::output_port("q", loc(60, 0), 1));
    let top = Circuit::new("top")
        .with_wire(seg(0, 0, 20, 0))
        .with_wire(seg(40, 0, 60, 0))
        .with_component(Component::clock(
            "clk",
            loc(0, 0),
            ClockParams { high: 1, low: 1 },
        ))
        .with_component(Component::subcircuit(
            "blinker",
            "u1",
            vec![
                ("ck".to_string(), pin(20, 0, PinDirection::Input, 1)),
                ("q".to_string(), pin(40, 0, PinDirection::Output, 1)),
            ],
        ))
        .with_component(Component::output_port("out", loc(60, 0), 1));
    let mut design = Design::new();
    design.add_circuit(blinker);
    design.add_circuit(top);

    let (status, engine, _) = run(&design, "top");
    assert_eq!(status, DrcStatus::PASSED);
    assert_eq!(engine.clock_sources().nr_of_sources(), 1);

    let top_netlist = engine.netlist("top").unwrap();
    let clock_net = top_netlist.find_connected_net(loc(0, 0)).unwrap();
    assert_eq!(top_netlist.clock_trees().clock_source_id(&[], clock_net, 0), Some(0));

    let child = engine.netlist("blinker").unwrap();
    let child_net = child.find_connected_net(loc(0, 0)).unwrap();
    let path = ["u1".to_string()];
    assert_eq!(child.clock_trees().clock_source_id(&path, child_net, 0), Some(0));
    assert_eq!(child.clock_trees().any_clock_source_id(child_net, 0), Some(0));
}

#[test]
fn a_clock_climbs_out_through_output_ports() {
    let generator = Circuit::new("gen")
        .with_wire(seg(0, 0, 20, 0))
        .with_component(Component::clock(
            "cg",
            loc(0, 0),
            ClockParams { high: 4, low: 4 },
        ))
        .with_component(Component::output_port("cko", loc(20, 0), 1));
    let top = Circuit::new("top")
        .with_wire(seg(0, 0, 20, 0))
        .with_wire(seg(40, 0, 60, 0))
        .with_component(Component::subcircuit(
            "gen",
            "g1",
            vec![("cko".to_string(), pin(0, 0, PinDirection::Output, 1))],
        ))
        .with_component(Component::gate(
            "Register",
            "",
            vec![
                pin(20, 0, PinDirection::Input, 1),
                pin(40, 0, PinDirection::Output, 1),
            ],
        ))
        .with_component(Component::output_port("y", loc(60, 0), 1));
    let mut design = Design::new();
    design.add_circuit(generator);
    design.add_circuit(top);

    let (status, engine, _) = run(&design, "top");
    assert_eq!(status, DrcStatus::PASSED);
    assert_eq!(engine.clock_sources().nr_of_sources(), 1);

    let gen_netlist = engine.netlist("gen").unwrap();
    let gen_net = gen_netlist.find_connected_net(loc(0, 0)).unwrap();
    let path = ["g1".to_string()];
    assert_eq!(gen_netlist.clock_trees().clock_source_id(&path, gen_net, 0), Some(0));

    let top_netlist = engine.netlist("top").unwrap();
    let top_net = top_netlist.find_connected_net(loc(0, 0)).unwrap();
    assert_eq!(top_netlist.clock_trees().clock_source_id(&[], top_net, 0), Some(0));

    // inside "gen" the clock comes straight from the generator; in "top"
    // it arrives through the instance's output port
    let gen_tree = gen_netlist
        .clock_trees()
        .trees()
        .iter()
        .find(|t| t.path() == path.as_slice())
        .unwrap();
    assert!(!gen_tree.is_pin_entry(gen_net, 0));
    let top_tree = top_netlist
        .clock_trees()
        .trees()
        .iter()
        .find(|t| t.path().is_empty())
        .unwrap();
    assert!(top_tree.is_pin_entry(top_net, 0));
}

/// Three-level design with a mapped IO component instantiated twice
/// through one intermediate circuit.
fn bubble_design() -> Design {
    let io = Circuit::new("io")
        .with_wire(seg(10, 0, 0, 0))
        .with_component(Component::input_port("d", loc(10, 0), 1))
        .with_component(
            Component::gate("Led", "led1", vec![pin(0, 0, PinDirection::Input, 1)]).with_map_info(
                MapInfo {
                    in_ports: 1,
                    out_ports: 0,
                    inout_ports: 0,
                },
            ),
        );
    let pair = Circuit::new("pair")
        .with_wire(seg(0, 0, 20, 0))
        .with_wire(seg(20, 0, 20, 40))
        .with_component(Component::input_port("x", loc(0, 0), 1))
        .with_component(Component::subcircuit(
            "io",
            "a",
            vec![("d".to_string(), pin(20, 0, PinDirection::Input, 1))],
        ))
        .with_component(Component::subcircuit(
            "io",
            "b",
            vec![("d".to_string(), pin(20, 40, PinDirection::Input, 1))],
        ));
    let top = Circuit::new("top")
        .with_wire(seg(10, 0, 0, 0))
        .with_component(Component::input_port("tin", loc(10, 0), 1))
        .with_component(Component::subcircuit(
            "pair",
            "p",
            vec![("x".to_string(), pin(0, 0, PinDirection::Input, 1))],
        ));
    let mut design = Design::new();
    design.add_circuit(io);
    design.add_circuit(pair);
    design.add_circuit(top);
    design
}

#[test]
fn bubble_numbering_separates_instances() {
    let design = bubble_design();
    let (status, engine, _) = run(&design, "top");
    assert_eq!(status, DrcStatus::PASSED);

    let pair = engine.netlist("pair").unwrap();
    let a = &pair.sub_circuits()[0];
    let b = &pair.sub_circuits()[1];
    assert_eq!(a.local_bubbles().input, BubbleRange { start: 0, count: 1 });
    assert_eq!(b.local_bubbles().input, BubbleRange { start: 1, count: 1 });

    let path_a = ["p".to_string(), "a".to_string()];
    let path_b = ["p".to_string(), "b".to_string()];
    assert_eq!(
        a.global_bubbles(&path_a).unwrap().input,
        BubbleRange { start: 0, count: 1 }
    );
    assert_eq!(
        b.global_bubbles(&path_b).unwrap().input,
        BubbleRange { start: 1, count: 1 }
    );

    // the shared definition carries one global range per instantiation path
    let io = engine.netlist("io").unwrap();
    let led = &io.components()[0];
    let led_a = ["p".to_string(), "a".to_string(), "led1".to_string()];
    let led_b = ["p".to_string(), "b".to_string(), "led1".to_string()];
    assert_eq!(led.global_bubbles(&led_a).unwrap().input.start, 0);
    assert_eq!(led.global_bubbles(&led_b).unwrap().input.start, 1);

    assert_eq!(engine.netlist("top").unwrap().local_bubbles().in_ports, 2);
}

#[test]
fn mappable_resources_cover_the_whole_hierarchy() {
    let design = bubble_design();
    let (status, engine, _) = run(&design, "top");
    assert_eq!(status, DrcStatus::PASSED);

    let resources = engine.mappable_resources("top", Vec::new(), true).unwrap();
    assert_eq!(resources.len(), 3);
    let led_a = vec!["p".to_string(), "a".to_string(), "led1".to_string()];
    assert_eq!(resources.get(&led_a).unwrap().circuit, "io");
    assert!(resources.contains_key(&["p".to_string(), "b".to_string(), "led1".to_string()].to_vec()));
    assert!(resources.contains_key(&["tin".to_string()].to_vec()));
}
