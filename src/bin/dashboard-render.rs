use std::fs;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use tracing::{error, info};

use dashboard_renderer::logging::init_logging;
use dashboard_renderer::views::PluginSet;
use dashboard_renderer::{Dashboard, DashboardError, Engine};

fn parse_engine(s: &str) -> Result<Engine, String> {
    s.parse::<Engine>().map_err(|e| e.message().to_string())
}

/// One `--patch-target`: leaf address segments.
#[derive(Clone, Debug)]
struct PatchTarget(Vec<String>);

fn parse_target(s: &str) -> Result<PatchTarget, String> {
    Ok(PatchTarget(s.split(',').map(|segment| segment.trim().to_string()).collect()))
}

#[derive(Parser)]
#[command(version, about)]
struct Args {
    /// Dashboard configuration file, `.json` or `.toml`
    config: PathBuf,

    /// Directory the pages are written to
    #[arg(short, long, default_value = "docs/modules/ROOT")]
    output_dir: PathBuf,

    /// Remove the output directory before rendering
    #[arg(long)]
    clean: bool,

    /// Print the dashboard structure instead of rendering it
    #[arg(long)]
    print: bool,

    /// Write a Graphviz DOT export of the dashboard to this file
    #[arg(long)]
    dot: Option<PathBuf>,

    /// How views are materialized: `tree` or `graph`
    #[arg(long, default_value = "tree", value_parser = parse_engine)]
    engine: Engine,

    /// Count leaves below every page before rendering
    #[arg(long)]
    aggregate: bool,

    /// JSON patch files merged into the targeted leaves
    #[arg(long, num_args = 1..)]
    patch: Vec<PathBuf>,

    /// Comma separated leaf address, e.g. `gaya,toolbox,latest`
    #[arg(long, num_args = 1.., value_parser = parse_target)]
    patch_target: Vec<PatchTarget>,

    /// Template data key the patches are stored under
    #[arg(long, default_value = "plots")]
    patch_prefix: String,

    /// Also write patches back to the leaf data files
    #[arg(long)]
    save_patches: bool,
}

fn run(args: Args) -> Result<(), DashboardError> {
    let mut dashboard = Dashboard::from_config_path(&args.config, args.engine, PluginSet::new())?;

    if !args.patch.is_empty() {
        let targets: Vec<Vec<String>> = args.patch_target.iter().map(|t| t.0.clone()).collect();
        dashboard.patch_template_info(&args.patch, &targets, &args.patch_prefix, args.save_patches)?;
    }

    if let Some(dot_path) = &args.dot {
        fs::write(dot_path, dashboard.to_dot())?;
        info!("Wrote {}", dot_path.display());
    }

    if args.print {
        print!("{}", dashboard.print());
        return Ok(());
    }

    if args.aggregate {
        let totals = dashboard.aggregate();
        info!("Aggregated: {}", totals);
    }

    dashboard.render(&args.output_dir, args.clean)
}

fn main() -> ExitCode {
    init_logging();
    let args = Args::parse();

    match run(args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{}", e);
            ExitCode::FAILURE
        }
    }
}
