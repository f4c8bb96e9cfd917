//! Command-line client for interacting with a layer control plane instance.

use clap::{Args, Parser, Subcommand, ValueEnum};
use url::Url;
use uuid::Uuid;

use crate::client::{AppContext, CliResult, build_client, parse_url};
use crate::commands::layers::{
    handle_config_get, handle_global_toggle, handle_layer_show, handle_layer_threshold,
    handle_layer_toggle, handle_reset, handle_stats,
};

const DEFAULT_TIMEOUT_SECS: u64 = 10;
const DEFAULT_API_URL: &str = "http://127.0.0.1:7070";

/// Parses CLI arguments and executes the requested command. Returns the process exit code.
pub async fn run() -> i32 {
    let cli = Cli::parse();
    let request_id = Uuid::new_v4().to_string();

    match dispatch(cli, &request_id).await {
        Ok(()) => 0,
        Err(err) => {
            eprintln!("error: {}", err.display_message());
            err.exit_code()
        }
    }
}

async fn dispatch(cli: Cli, request_id: &str) -> CliResult<()> {
    let ctx = AppContext {
        client: build_client(cli.timeout, request_id)?,
        base_url: cli.api_url,
        admin_key: cli.admin_key,
    };
    let format = cli.output;

    match cli.command {
        Command::Config(ConfigCommand::Get) => handle_config_get(&ctx, format).await,
        Command::Layer(layer) => match layer {
            LayerCommand::Show(args) => handle_layer_show(&ctx, args.key, format).await,
            LayerCommand::Enable(args) => handle_layer_toggle(&ctx, args.key, true, format).await,
            LayerCommand::Disable(args) => {
                handle_layer_toggle(&ctx, args.key, false, format).await
            }
            LayerCommand::Threshold(args) => {
                handle_layer_threshold(&ctx, args.key, args.value, format).await
            }
        },
        Command::Global { state } => {
            handle_global_toggle(&ctx, matches!(state, GlobalState::On), format).await
        }
        Command::Reset => handle_reset(&ctx, format).await,
        Command::Stats => handle_stats(&ctx, format).await,
    }
}

#[derive(Parser)]
#[command(
    name = "layerctl",
    about = "Administrative CLI for the layer configuration control plane"
)]
struct Cli {
    #[arg(
        long,
        global = true,
        env = "LAYERCTL_API_URL",
        value_parser = parse_url,
        default_value = DEFAULT_API_URL
    )]
    api_url: Url,
    #[arg(long, global = true, env = "LAYERCTL_ADMIN_KEY", hide_env_values = true)]
    admin_key: Option<String>,
    #[arg(
        long,
        global = true,
        env = "LAYERCTL_HTTP_TIMEOUT_SECS",
        default_value_t = DEFAULT_TIMEOUT_SECS
    )]
    timeout: u64,
    #[arg(
        long = "output",
        alias = "format",
        global = true,
        value_enum,
        default_value_t = OutputFormat::Table,
        help = "Select output format for commands that render structured data"
    )]
    output: OutputFormat,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Inspect the full layer configuration.
    #[command(subcommand)]
    Config(ConfigCommand),
    /// Inspect or change a single layer.
    #[command(subcommand)]
    Layer(LayerCommand),
    /// Turn the global switch on or off.
    Global {
        #[arg(value_enum)]
        state: GlobalState,
    },
    /// Restore the default layer table.
    Reset,
    /// Show aggregate layer counts.
    Stats,
}

#[derive(Subcommand)]
enum ConfigCommand {
    Get,
}

#[derive(Subcommand)]
enum LayerCommand {
    Show(LayerKeyArgs),
    Enable(LayerKeyArgs),
    Disable(LayerKeyArgs),
    Threshold(LayerThresholdArgs),
}

#[derive(Args)]
struct LayerKeyArgs {
    #[arg(help = "Layer key", allow_negative_numbers = true)]
    key: i64,
}

#[derive(Args)]
struct LayerThresholdArgs {
    #[arg(help = "Layer key", allow_negative_numbers = true)]
    key: i64,
    #[arg(help = "Confidence threshold", allow_negative_numbers = true)]
    value: f64,
}

#[derive(Copy, Clone, Debug, ValueEnum)]
enum GlobalState {
    On,
    Off,
}

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, ValueEnum)]
pub(crate) enum OutputFormat {
    #[default]
    Table,
    Json,
}
