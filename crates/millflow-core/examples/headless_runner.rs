//! Headless runner: a small stock-preparation line driven from the terminal.
//!
//! Loads species from embedded JSON, wires
//! Source + Tank -> Pump -> Hydrocyclone -> (Splitter -> 2 Sinks, Sink),
//! runs a few iterations and prints every readout after each one.
//!
//! Run with: `RUST_LOG=millflow_core=debug cargo run -p millflow-core --example headless_runner`

use millflow_core::data_loader::load_config_json;
use millflow_core::fixed::{Fixed64, fixed64_to_f64};
use millflow_core::simulation::Simulation;
use millflow_core::socket::Capacity;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

const CONFIG: &str = r#"{
    "species": [
        { "name": "water", "density": 997.5, "phase": "liquid" },
        { "name": "fiber", "density": 1200, "phase": "solid" },
        { "name": "air", "density": 1.2, "phase": "gas" }
    ],
    "scheduling": "topological"
}"#;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let loaded = load_config_json(CONFIG)?;
    let registry = Arc::new(loaded.species.build());
    let water = registry.id_of("water").ok_or("water not registered")?;
    let fiber = registry.id_of("fiber").ok_or("fiber not registered")?;
    let mut sim = Simulation::new(registry, loaded.config);

    // --- Step 1: Units ---

    let stock = sim.add_source(
        "stock",
        Capacity::from_f64(60.0)?,
        4,
        Some(&[(water, Fixed64::from_num(0.96)), (fiber, Fixed64::from_num(0.04))]),
    )?;
    let dilution = sim.add_tank("dilution", 5, Some(&[(water, Fixed64::ONE)]))?;
    let pump = sim.add_pump("fan pump", Capacity::from_f64(100.0)?);
    let cleaner = sim.add_hydrocyclone(
        "cleaner",
        Capacity::Unbounded,
        Fixed64::from_num(0.1),
        Fixed64::from_num(0.3),
    )?;
    let header = sim.add_splitter("header", Capacity::Unbounded, Fixed64::from_num(0.5))?;
    let machine_a = sim.add_sink("machine A", Capacity::Unbounded);
    let machine_b = sim.add_sink("machine B", Capacity::Unbounded);
    let sewer = sim.add_sink("sewer", Capacity::Unbounded);

    // --- Step 2: Streams, each with a readout ---

    let wiring = [
        ("stock", stock, 0, pump, 0),
        ("dilution", dilution, 0, pump, 1),
        ("feed", pump, 0, cleaner, 0),
        ("accepts", cleaner, 0, header, 0),
        ("rejects", cleaner, 1, sewer, 0),
        ("to A", header, 0, machine_a, 0),
        ("to B", header, 1, machine_b, 0),
    ];
    for (label, from, from_index, to, to_index) in wiring {
        let stream = sim
            .connect(from, from_index, to, to_index)
            .ok_or("incompatible sockets")?;
        let readout = sim.add_readout(label, None);
        sim.connect_readout(readout, stream);
    }

    // --- Step 3: Run ---

    for _ in 0..5 {
        sim.run();
        println!("--- iteration {} ---", sim.iteration());
        for (_, readout) in sim.readouts() {
            println!("  {}", readout.text());
        }
        let report = sim.last_report();
        println!(
            "  generated {:.3}, consumed {:.3}, flow errors {}",
            fixed64_to_f64(report.generated),
            fixed64_to_f64(report.consumed),
            report.flow_errors
        );
    }

    Ok(())
}
