//! Kanvas CLI - resolve, validate and export Kubernetes manifests built on a node canvas

use clap::{Parser, Subcommand};
use miette::Result;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

mod commands;
mod display;
mod error;
mod exit_codes;
mod util;

use commands::lint::LintOptions;
use error::CliError;

#[derive(Parser)]
#[command(name = "kanvas")]
#[command(author = "Kanvas Contributors")]
#[command(version)]
#[command(about = "Resolve, validate and export Kubernetes manifests built on a node canvas", long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable debug output
    #[arg(long, global = true)]
    debug: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the documents a graph snapshot resolves to
    Resolve {
        /// Graph snapshot (YAML or JSON)
        graph: PathBuf,

        /// Write one file per document into this directory
        #[arg(short, long)]
        output_dir: Option<PathBuf>,

        /// Print a JSON array instead of a YAML stream
        #[arg(long)]
        json: bool,
    },

    /// Validate a graph snapshot
    Lint {
        /// Graph snapshot (YAML or JSON)
        graph: PathBuf,

        /// Target Kubernetes version (overrides kanvas.yaml)
        #[arg(long, env = "KANVAS_KUBE_VERSION")]
        kube_version: Option<String>,

        /// Schema catalog for the target version
        #[arg(short, long)]
        schema: Option<PathBuf>,

        /// Project configuration (default: kanvas.yaml next to the snapshot)
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Silence a rule by id (repeatable)
        #[arg(long = "ignore")]
        ignore: Vec<String>,

        /// Output warnings as JSON
        #[arg(long)]
        json: bool,

        /// Strict mode - fail on any warning
        #[arg(long)]
        strict: bool,
    },

    /// Write the resolved documents as a bundle archive
    Export {
        /// Graph snapshot (YAML or JSON)
        graph: PathBuf,

        /// Archive path
        #[arg(short, long)]
        output: PathBuf,

        /// Bundle name (default: snapshot file stem)
        #[arg(long)]
        name: Option<String>,
    },

    /// Check a bundle archive against its MANIFEST
    Verify {
        /// Archive path
        archive: PathBuf,
    },

    /// Show which node holds a field of a resolved document
    Owner {
        /// Graph snapshot (YAML or JSON)
        graph: PathBuf,

        /// Resource node id
        node: String,

        /// Field path inside the resolved document (e.g. spec.template.spec.containers[0].image)
        path: String,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

fn init_tracing(debug: bool) {
    let default = if debug { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    // Diagnostics go to stderr; stdout carries documents and reports
    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .try_init();
}

fn main() -> Result<()> {
    // Setup miette for nice error display
    miette::set_panic_hook();
    let report_panic = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info| {
        // Rule panics are caught and logged by the engine
        if !kanvas_engine::rules::in_rule_check() {
            report_panic(info);
        }
    }));

    let cli = Cli::parse();
    init_tracing(cli.debug);

    let result = match cli.command {
        Commands::Resolve {
            graph,
            output_dir,
            json,
        } => commands::resolve::run(&graph, output_dir.as_deref(), json),

        Commands::Lint {
            graph,
            kube_version,
            schema,
            config,
            ignore,
            json,
            strict,
        } => commands::lint::run(
            &graph,
            &LintOptions {
                kube_version,
                schema,
                config,
                ignore,
                json,
                strict,
            },
        ),

        Commands::Export {
            graph,
            output,
            name,
        } => commands::export::run(&graph, &output, name.as_deref()),

        Commands::Verify { archive } => commands::verify::run(&archive),

        Commands::Owner {
            graph,
            node,
            path,
            json,
        } => commands::owner::run(&graph, &node, &path, json),
    };

    // CLI errors carry their own exit code
    if let Err(report) = &result {
        if let Some(err) = report.downcast_ref::<CliError>() {
            eprintln!("{:?}", report);
            std::process::exit(err.exit_code());
        }
    }
    result
}
