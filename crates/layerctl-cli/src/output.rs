//! Output renderers and formatting helpers for CLI commands.

use std::fmt::Write as _;

use anyhow::anyhow;
use layerctl_config::{ConfigSnapshot, LayerSnapshot, LayerStats};
use serde::Serialize;

use crate::cli::OutputFormat;
use crate::client::{CliError, CliResult};

fn print_json<T: Serialize>(value: &T) -> CliResult<()> {
    let text = serde_json::to_string_pretty(value)
        .map_err(|err| CliError::failure(anyhow!("failed to format JSON: {err}")))?;
    println!("{text}");
    Ok(())
}

pub(crate) fn render_config_snapshot(
    snapshot: &ConfigSnapshot,
    format: OutputFormat,
) -> CliResult<()> {
    match format {
        OutputFormat::Json => print_json(snapshot),
        OutputFormat::Table => {
            print!("{}", config_table(snapshot));
            Ok(())
        }
    }
}

pub(crate) fn render_layer(layer: &LayerSnapshot, format: OutputFormat) -> CliResult<()> {
    match format {
        OutputFormat::Json => print_json(layer),
        OutputFormat::Table => {
            print!("{}", layer_detail(layer));
            Ok(())
        }
    }
}

pub(crate) fn render_stats(stats: &LayerStats, format: OutputFormat) -> CliResult<()> {
    match format {
        OutputFormat::Json => print_json(stats),
        OutputFormat::Table => {
            print!("{}", stats_table(stats));
            Ok(())
        }
    }
}

#[must_use]
pub(crate) fn config_table(snapshot: &ConfigSnapshot) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "revision: {}", snapshot.revision);
    let _ = writeln!(out, "global: {}", on_off(snapshot.global_enabled));
    let _ = writeln!(out, "updated: {}", snapshot.updated_at.to_rfc3339());
    let _ = writeln!(
        out,
        "{:>3} {:<24} {:<7} {:<9} {:>9} {:>5}",
        "KEY", "NAME", "ENABLED", "EFFECTIVE", "THRESHOLD", "MAX"
    );
    for layer in snapshot.layers.values() {
        let name = if layer.mandatory {
            format!("{} *", layer.name)
        } else {
            layer.name.clone()
        };
        let _ = writeln!(
            out,
            "{:>3} {:<24} {:<7} {:<9} {:>9.2} {:>5}",
            layer.key.get(),
            name,
            on_off(layer.enabled),
            on_off(layer.effective_enabled),
            layer.confidence_threshold,
            layer.max_results
        );
    }
    out
}

#[must_use]
pub(crate) fn layer_detail(layer: &LayerSnapshot) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "key: {}", layer.key.get());
    let _ = writeln!(out, "name: {}", layer.name);
    let _ = writeln!(out, "description: {}", layer.description);
    let _ = writeln!(out, "mandatory: {}", layer.mandatory);
    let _ = writeln!(out, "enabled: {}", on_off(layer.enabled));
    let _ = writeln!(out, "effective: {}", on_off(layer.effective_enabled));
    let _ = writeln!(out, "threshold: {:.2}", layer.confidence_threshold);
    let _ = writeln!(out, "max results: {}", layer.max_results);
    if !layer.knowledge_sources.is_empty() {
        let _ = writeln!(out, "sources: {}", layer.knowledge_sources.join(", "));
    }
    out
}

#[must_use]
pub(crate) fn stats_table(stats: &LayerStats) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "revision: {}", stats.revision);
    let _ = writeln!(out, "global: {}", on_off(stats.global_enabled));
    let _ = writeln!(out, "layers: {}", stats.total_layers);
    let _ = writeln!(out, "enabled: {}", stats.layers_enabled);
    let _ = writeln!(out, "disabled: {}", stats.layers_disabled);
    let _ = writeln!(out, "effective: {}", stats.layers_effective);
    out
}

const fn on_off(flag: bool) -> &'static str {
    if flag { "on" } else { "off" }
}
