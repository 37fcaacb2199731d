//! Library interface for the sharpen CLI

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use chrono::{DateTime, Utc};
use sharpen_codegen::{TranspileOutcome, Transpiler};
use sharpen_core::{SharpenManifest, SourceUnit};
use tracing::{debug, info, warn};
use walkdir::WalkDir;

/// Suffix of the declaration-tree files a front end writes per source file
pub const AST_SUFFIX: &str = ".ast.json";

/// Manifest picked up from the working directory when none is named
pub const DEFAULT_MANIFEST: &str = "sharpen.toml";

#[derive(Debug, Clone)]
pub struct BuildOptions {
    /// Directory holding `*.ast.json` files
    pub input: PathBuf,
    /// Output root; falls back to the manifest's `output_dir`
    pub output: Option<PathBuf>,
    pub manifest: Option<PathBuf>,
    pub root_namespace: Option<String>,
    pub generated_at: DateTime<Utc>,
    /// Transpile and report without writing anything
    pub check_only: bool,
}

/// Every `*.ast.json` under `input`, parsed and sorted by unit path
pub fn load_units(input: &Path) -> Result<Vec<SourceUnit>> {
    if !input.is_dir() {
        bail!("input directory {} does not exist", input.display());
    }
    let mut units = Vec::new();
    for entry in WalkDir::new(input).sort_by_file_name() {
        let entry = entry.with_context(|| format!("failed to walk {}", input.display()))?;
        let is_ast = entry.file_type().is_file()
            && entry.file_name().to_string_lossy().ends_with(AST_SUFFIX);
        if !is_ast {
            continue;
        }
        let content = std::fs::read_to_string(entry.path())
            .with_context(|| format!("failed to read {}", entry.path().display()))?;
        let unit = SourceUnit::from_json(&content)
            .with_context(|| format!("failed to parse {}", entry.path().display()))?;
        debug!(path = %unit.display_path(), "loaded unit");
        units.push(unit);
    }
    units.sort_by(|a, b| a.path.cmp(&b.path));
    Ok(units)
}

/// The named manifest, else `sharpen.toml` in the working directory if
/// present, else defaults
pub fn load_manifest(explicit: Option<&Path>) -> Result<SharpenManifest> {
    let manifest = match explicit {
        Some(path) => SharpenManifest::from_file(path)
            .with_context(|| format!("failed to load manifest {}", path.display()))?,
        None if Path::new(DEFAULT_MANIFEST).is_file() => SharpenManifest::from_file(DEFAULT_MANIFEST)
            .with_context(|| format!("failed to load {}", DEFAULT_MANIFEST))?,
        None => SharpenManifest::default(),
    };
    for warning in manifest.validate() {
        warn!("{}", warning);
    }
    Ok(manifest)
}

/// Timestamp for generated headers: `SOURCE_DATE_EPOCH` seconds when given
pub fn generation_time(source_date_epoch: Option<i64>) -> Result<DateTime<Utc>> {
    match source_date_epoch {
        Some(secs) => DateTime::<Utc>::from_timestamp(secs, 0)
            .with_context(|| format!("SOURCE_DATE_EPOCH {} is out of range", secs)),
        None => {
            let now = Utc::now();
            DateTime::<Utc>::from_timestamp(now.timestamp(), 0)
                .context("system clock is out of range")
        }
    }
}

pub fn run(options: &BuildOptions) -> Result<TranspileOutcome> {
    let manifest = load_manifest(options.manifest.as_deref())?;
    let config = manifest
        .config_builder(options.root_namespace.as_deref())
        .generated_at(options.generated_at)
        .build()
        .context("invalid configuration")?;

    let units = load_units(&options.input)?;
    info!(
        units = units.len(),
        root_namespace = config.root_namespace(),
        "starting transpile"
    );

    let transpiler = Transpiler::new(&config);
    let outcome = if options.check_only {
        transpiler.transpile(&units)?
    } else {
        let output = options
            .output
            .clone()
            .or_else(|| manifest.project.output_dir.clone())
            .context("no output directory: pass --output or set [project] output_dir")?;
        let outcome = transpiler
            .build(&units, &output)
            .with_context(|| format!("failed to build into {}", output.display()))?;
        info!(output = %output.display(), files = outcome.files.len(), "wrote output tree");
        outcome
    };
    Ok(outcome)
}
