use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::Result;
use clap::{Parser, Subcommand};
use otter_bridge::{
    BridgeConfig, CycleDetection, HostFixture, HostHeap, LocalRef, Marshaller, Realm, inspect,
};
use tracing_subscriber::filter::EnvFilter;

mod config;

#[derive(Parser)]
#[command(name = "otter-bridge", version, about = "Convert host values into JavaScript values")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Convert a JSON host value fixture and print the result
    Convert {
        fixture: PathBuf,
        /// Config file (defaults to the nearest otter-bridge.toml)
        #[arg(long)]
        config: Option<PathBuf>,
        /// Maximum container nesting, 0 for unlimited
        #[arg(long)]
        max_depth: Option<usize>,
        /// Detect cycles through every enclosing container
        #[arg(long)]
        ancestors: bool,
    },
}

fn main() -> Result<ExitCode> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("warn".parse()?))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Convert {
            fixture,
            config,
            max_depth,
            ancestors,
        } => convert_fixture(fixture, config, max_depth, ancestors),
    }
}

fn convert_fixture(
    fixture: PathBuf,
    config_path: Option<PathBuf>,
    max_depth: Option<usize>,
    ancestors: bool,
) -> Result<ExitCode> {
    let mut config = config::load_config(config_path.as_deref())?;
    if let Some(depth) = max_depth {
        config = config.max_depth(Some(depth));
    }
    if ancestors {
        config = config.cycle_detection(CycleDetection::Ancestors);
    }

    match run_fixture(&fixture, config)? {
        Outcome::Value(text) => {
            println!("{text}");
            Ok(ExitCode::SUCCESS)
        }
        Outcome::Uncaught(text) => {
            eprintln!("{text}");
            Ok(ExitCode::FAILURE)
        }
    }
}

/// Rendered result of converting one fixture
#[derive(Debug, PartialEq, Eq)]
enum Outcome {
    Value(String),
    Uncaught(String),
}

fn run_fixture(fixture: &Path, config: BridgeConfig) -> Result<Outcome> {
    let heap = HostHeap::new();
    let realm = Realm::new();
    let root = HostFixture::from_file(fixture)?.build(&heap)?;
    let root = root.map(|r| LocalRef::new(&heap, heap.local(r)));

    match Marshaller::with_config(&heap, &realm, config).convert(root.as_deref()) {
        Ok(value) => Ok(Outcome::Value(inspect(&value))),
        Err(_) => {
            let error = realm
                .take_exception()
                .ok_or_else(|| anyhow::anyhow!("conversion failed without an exception"))?;
            let field = |key: &str| {
                error
                    .get(key)
                    .and_then(|v| v.as_str().map(str::to_string))
                    .unwrap_or_default()
            };
            Ok(Outcome::Uncaught(format!(
                "Uncaught {}: {}",
                field("name"),
                field("message")
            )))
        }
    }
}
