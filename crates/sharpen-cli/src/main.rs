use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

use sharpen::{generation_time, run, BuildOptions};
use sharpen_core::Diagnostic;

#[derive(Parser)]
#[command(name = "sharpen")]
#[command(about = "Translate TypeScript declaration trees into C# source", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Enable debug output
    #[arg(short, long, global = true)]
    debug: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Transpile a project and publish the C# tree
    Build {
        #[command(flatten)]
        project: ProjectArgs,

        /// Output directory (defaults to [project] output_dir)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Transpile and report diagnostics without writing output
    Check {
        #[command(flatten)]
        project: ProjectArgs,
    },
}

#[derive(Args)]
struct ProjectArgs {
    /// Directory holding *.ast.json declaration trees
    #[arg(short, long)]
    input: PathBuf,

    /// Project manifest (defaults to ./sharpen.toml when present)
    #[arg(short, long)]
    manifest: Option<PathBuf>,

    /// Root namespace, overriding the manifest
    #[arg(long)]
    root_namespace: Option<String>,

    /// Print diagnostics as JSON lines
    #[arg(long)]
    json_diagnostics: bool,

    /// Fixed generation timestamp for reproducible output
    #[arg(long, env = "SOURCE_DATE_EPOCH")]
    source_date_epoch: Option<i64>,
}

fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    let level = if cli.debug {
        "trace"
    } else if cli.verbose {
        "debug"
    } else {
        "info"
    };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level)))
        .with_target(cli.debug)
        .with_writer(std::io::stderr)
        .init();

    let (project, output, check_only) = match cli.command {
        Commands::Build { project, output } => (project, output, false),
        Commands::Check { project } => (project, None, true),
    };

    let options = BuildOptions {
        input: project.input,
        output,
        manifest: project.manifest,
        root_namespace: project.root_namespace,
        generated_at: generation_time(project.source_date_epoch)?,
        check_only,
    };
    let outcome = run(&options)?;

    for diagnostic in &outcome.diagnostics {
        print_diagnostic(diagnostic, project.json_diagnostics)?;
    }

    let errors = outcome.error_count();
    info!(
        files = outcome.files.len(),
        errors,
        warnings = outcome.diagnostics.len() - errors,
        "done"
    );
    Ok(if outcome.is_success() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

fn print_diagnostic(diagnostic: &Diagnostic, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string(diagnostic)?);
    } else {
        eprintln!("{}", diagnostic);
    }
    Ok(())
}
