// SPDX-License-Identifier: MIT OR Apache-2.0
//! Headless patchwork host.
//!
//! Builds a small patch, wires it up with simulated mouse gestures and runs
//! a few frames of the host loop: drain deletions, update, draw.
//!
//! Usage: `patchwork_demo [config.ron]`

use egui::{Key, PointerButton, Pos2};
use patchwork_graph::kinds::create_builtin_registry;
use patchwork_graph::{Patchbay, PatchbayConfig, PortId};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

/// Frames to run before and after the deletion
const FRAMES: usize = 3;

fn main() {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("patchwork_graph=debug,patchwork_demo=info"));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting patchwork demo v{}", env!("CARGO_PKG_VERSION"));

    if let Err(e) = run() {
        tracing::error!("Demo failed: {e}");
        std::process::exit(1);
    }
}

fn load_config() -> Result<PatchbayConfig, Box<dyn std::error::Error>> {
    let Some(path) = std::env::args().nth(1) else {
        return Ok(PatchbayConfig::default());
    };
    let source = std::fs::read_to_string(&path)?;
    let config = PatchbayConfig::from_ron(&source)?;
    tracing::info!("Loaded config from {path}");
    Ok(config)
}

fn run() -> Result<(), Box<dyn std::error::Error>> {
    let config = load_config().unwrap_or_else(|e| {
        tracing::warn!("Falling back to default config: {e}");
        PatchbayConfig::default()
    });

    let registry = create_builtin_registry();
    let mut bay = Patchbay::new(config);
    let root = bay.scene().root();

    let source = bay.spawn_named(&registry, "Position", root, Pos2::new(200.0, 200.0))?;
    let near = bay.spawn_named(&registry, "Print", root, Pos2::new(200.0, 300.0))?;
    let far = bay.spawn_named(&registry, "Print", root, Pos2::new(300.0, 300.0))?;

    // Drag a cord from the Position output to each Print input
    for target in [near, far] {
        let from = bay
            .port_position(PortId::output(source, 0))
            .ok_or("source output port missing")?;
        let to = bay
            .port_position(PortId::input(target, 0))
            .ok_or("print input port missing")?;
        bay.mouse_pressed(from, PointerButton::Primary);
        bay.mouse_dragged(to, PointerButton::Primary);
        bay.mouse_released(to, PointerButton::Primary);
    }
    tracing::info!("Patched {} cords", bay.cord_count());

    for frame in 0..FRAMES {
        step(&mut bay, frame);
    }

    // Move the source; the printers follow on the next update
    bay.set_position(source, Pos2::new(120.0, 80.0))?;

    // Focus the far printer by clicking its label, then delete it
    let label = bay
        .port_position(PortId::input(far, 0))
        .ok_or("print input port missing")?
        + egui::vec2(0.0, 8.0);
    bay.mouse_pressed(label, PointerButton::Primary);
    bay.mouse_released(label, PointerButton::Primary);
    if bay.key_pressed(Key::Delete) {
        tracing::info!("Marked {far:?} for deletion");
    }

    for frame in FRAMES..2 * FRAMES {
        step(&mut bay, frame);
    }

    tracing::info!(
        "Done: {} patchers, {} cords",
        bay.patcher_count(),
        bay.cord_count()
    );
    Ok(())
}

/// One host frame
fn step(bay: &mut Patchbay, frame: usize) {
    let destroyed = bay.delete_queue();
    if destroyed > 0 {
        tracing::info!("Frame {frame}: destroyed {destroyed} patcher(s)");
    }

    bay.update();
    let list = bay.draw();

    let labels: Vec<&str> = bay.patchers().map(|(_, p)| p.text()).collect();
    tracing::info!(
        "Frame {frame}: {} draw commands, labels {labels:?}",
        list.len()
    );
}
