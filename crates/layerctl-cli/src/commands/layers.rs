use layerctl_config::{ConfigSnapshot, LayerSnapshot, LayerStats};

use crate::cli::OutputFormat;
use crate::client::{AppContext, CliResult};
use crate::output::{render_config_snapshot, render_layer, render_stats};

const CONFIG_PATH: &str = "/admin/layers/config";
const TOGGLE_GLOBAL_PATH: &str = "/admin/layers/toggle-global";
const RESET_PATH: &str = "/admin/layers/reset-defaults";
const STATS_PATH: &str = "/admin/layers/stats";

fn layer_path(key: i64, action: &str) -> String {
    format!("/admin/layers/layer/{key}/{action}")
}

pub(crate) async fn handle_config_get(ctx: &AppContext, format: OutputFormat) -> CliResult<()> {
    let snapshot: ConfigSnapshot = ctx.get_json(CONFIG_PATH).await?;
    render_config_snapshot(&snapshot, format)
}

pub(crate) async fn handle_layer_show(
    ctx: &AppContext,
    key: i64,
    format: OutputFormat,
) -> CliResult<()> {
    let layer: LayerSnapshot = ctx.get_json(&layer_path(key, "config")).await?;
    render_layer(&layer, format)
}

pub(crate) async fn handle_layer_toggle(
    ctx: &AppContext,
    key: i64,
    enabled: bool,
    format: OutputFormat,
) -> CliResult<()> {
    let action = if enabled { "enable" } else { "disable" };
    let snapshot: ConfigSnapshot = ctx.post_json(&layer_path(key, action), &[]).await?;
    render_config_snapshot(&snapshot, format)
}

pub(crate) async fn handle_layer_threshold(
    ctx: &AppContext,
    key: i64,
    value: f64,
    format: OutputFormat,
) -> CliResult<()> {
    let snapshot: ConfigSnapshot = ctx
        .post_json(&layer_path(key, "threshold"), &[("value", value.to_string())])
        .await?;
    render_config_snapshot(&snapshot, format)
}

pub(crate) async fn handle_global_toggle(
    ctx: &AppContext,
    enabled: bool,
    format: OutputFormat,
) -> CliResult<()> {
    let snapshot: ConfigSnapshot = ctx
        .post_json(TOGGLE_GLOBAL_PATH, &[("enabled", enabled.to_string())])
        .await?;
    render_config_snapshot(&snapshot, format)
}

pub(crate) async fn handle_reset(ctx: &AppContext, format: OutputFormat) -> CliResult<()> {
    let snapshot: ConfigSnapshot = ctx.post_json(RESET_PATH, &[]).await?;
    render_config_snapshot(&snapshot, format)
}

pub(crate) async fn handle_stats(ctx: &AppContext, format: OutputFormat) -> CliResult<()> {
    let stats: LayerStats = ctx.get_json(STATS_PATH).await?;
    render_stats(&stats, format)
}
