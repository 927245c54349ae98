//! World inspection command.

use std::path::Path;

use zonestream::debug::format_size;
use zonestream::registry::ZoneRegistry;
use zonestream::WorldDefinition;

use crate::error::CliError;

/// Print a world's zones, transitions and connected sets.
pub fn run(world: &Path, depth: usize) -> Result<(), CliError> {
    let registry = WorldDefinition::from_path(world)?.into_registry()?;
    print!("{}", render(&registry, depth));
    Ok(())
}

fn render(registry: &ZoneRegistry, depth: usize) -> String {
    let mut out = String::new();
    let zones = registry.zones();
    let total: u64 = zones.iter().map(|z| z.size_bytes()).sum();

    out.push_str(&format!(
        "Zones ({}, {} if all resident)\n",
        zones.len(),
        format_size(total)
    ));
    for zone in &zones {
        let anchor = zone
            .anchor
            .map(|a| format!("  at {}", a))
            .unwrap_or_default();
        out.push_str(&format!(
            "  {:<16} {:<8} {:>10}  {}{}\n",
            zone.id.as_str(),
            zone.size.as_str(),
            format_size(zone.size_bytes()),
            zone.display_name(),
            anchor
        ));
    }

    let transitions = registry.transitions();
    out.push_str(&format!("\nTransitions ({})\n", transitions.len()));
    for transition in &transitions {
        let zones: Vec<&str> = transition.zones.iter().map(|z| z.as_str()).collect();
        let lock = match (&transition.required_item, transition.locked) {
            (Some(item), true) => format!("  [requires {}]", item),
            (None, true) => "  [locked]".to_string(),
            _ => String::new(),
        };
        let load = if transition.kind.defers_load() {
            "deferred"
        } else {
            "immediate"
        };
        out.push_str(&format!(
            "  {:<16} {:<9} {:<9} {}{}\n",
            transition.id.as_str(),
            transition.kind.name(),
            load,
            zones.join(" <-> "),
            lock
        ));
    }

    out.push_str(&format!("\nConnected within {} transition(s)\n", depth));
    for zone in &zones {
        let connected: Vec<String> = registry
            .connected_zones(&zone.id, depth)
            .into_iter()
            .filter(|z| z != &zone.id)
            .map(|z| z.to_string())
            .collect();
        let listing = if connected.is_empty() {
            "(isolated)".to_string()
        } else {
            connected.join(", ")
        };
        out.push_str(&format!("  {:<16} {}\n", zone.id.as_str(), listing));
    }

    out
}
