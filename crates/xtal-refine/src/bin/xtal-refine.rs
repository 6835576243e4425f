//! xtal-refine CLI: inspect parameter layouts and apply optimizer shifts.

use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};

use xtal_refine::config::RefineConfig;
use xtal_refine::driver::{resolve_output, run_and_write};
use xtal_refine::error::{RefineError, RefineResult};
use xtal_refine::packing::ParameterLayout;
use xtal_refine::selection::SelectionMask;
use xtal_refine::streaming::StreamEmitter;
use xtal_refine::vector_io::read_vector;

#[derive(Parser)]
#[command(
    name = "xtal-refine",
    version,
    about = "Flat parameter vector tool for crystal structure refinement",
    after_long_help = "\
EXAMPLES:
  # Show how sites map onto the flat vector:
  xtal-refine layout -c model.json

  # Apply an optimizer step, refining only sites and occupancies:
  xtal-refine apply -c model.json -s step.txt --select site,occupancy -o shifted.json"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    #[arg(long, global = true)]
    /// Enable NDJSON streaming progress events to stderr
    stream: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the flat vector length and the offset of every field.
    Layout {
        #[arg(short, long)]
        config: PathBuf,
        /// Override the config's selection, e.g. "site,u_iso".
        #[arg(long)]
        select: Option<String>,
    },
    /// Apply a flat shift vector and write the shifted model.
    Apply {
        #[arg(short, long)]
        config: PathBuf,
        /// Shift vector file; defaults to the config's `shifts` entry.
        #[arg(short, long)]
        shifts: Option<PathBuf>,
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Write mean displacements (square-root u_iso refinement) here.
        #[arg(long)]
        means: Option<PathBuf>,
        #[arg(long)]
        select: Option<String>,
        /// Process sites in parallel.
        #[arg(long)]
        parallel: bool,
    },
}

fn main() {
    let cli = Cli::parse();
    let emitter = StreamEmitter::new(cli.stream);
    let result = match cli.command {
        Commands::Layout { config, select } => run_layout(&config, select.as_deref()),
        Commands::Apply {
            config,
            shifts,
            output,
            means,
            select,
            parallel,
        } => run_apply_cmd(
            &config,
            shifts.as_deref(),
            output.as_deref(),
            means.as_deref(),
            select.as_deref(),
            parallel,
            emitter,
        ),
    };
    if let Err(e) = result {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}

fn load_config(path: &Path, select: Option<&str>) -> RefineResult<RefineConfig> {
    let mut cfg = RefineConfig::load(path)?;
    if let Some(select) = select {
        cfg.selection = select.parse::<SelectionMask>()?;
    }
    Ok(cfg)
}

fn run_layout(path: &Path, select: Option<&str>) -> RefineResult<()> {
    let cfg = load_config(path, select)?.normalized()?;
    let cell = cfg.cell.unit_cell()?;
    let layout = ParameterLayout::new(&cfg.sites, cfg.selection);
    if layout.mask().is_empty() {
        eprintln!("warning: no parameter class selected; the flat vector is empty");
    }
    println!("selection: {}", layout.mask());
    println!("sites: {}", layout.n_sites());
    println!("parameters: {}", layout.total());
    for (idx, site) in cfg.sites.iter().enumerate() {
        let range = layout.site_range(idx).unwrap_or_default();
        let fields: Vec<String> = layout
            .site_fields(idx)
            .iter()
            .map(|(field, offset)| format!("{}={}", field.as_str(), offset))
            .collect();
        println!(
            "{:>6} {:<8} u_eq={:<10.5} [{:>6}, {:>6}) {}",
            idx,
            site.label,
            site.displacement.u_iso_or_equiv(&cell),
            range.start,
            range.end,
            fields.join(" ")
        );
    }
    Ok(())
}

fn run_apply_cmd(
    path: &Path,
    shifts: Option<&Path>,
    output: Option<&Path>,
    means: Option<&Path>,
    select: Option<&str>,
    parallel: bool,
    emitter: StreamEmitter,
) -> RefineResult<()> {
    let mut cfg = load_config(path, select)?;
    cfg.parallel |= parallel;
    let shifts_path = match (shifts, &cfg.shifts) {
        (Some(p), _) => p.to_path_buf(),
        (None, Some(p)) => PathBuf::from(p),
        (None, None) => {
            return Err(RefineError::Invalid(
                "no shift vector given (use --shifts or the config's 'shifts')".into(),
            ))
        }
    };
    let shift_values = read_vector(&shifts_path)?;
    let output_spec = resolve_output(cfg.output.as_ref(), output, means)?;
    let applied = run_and_write(
        &cfg,
        Some(path),
        &shift_values,
        output_spec.as_ref(),
        emitter,
    )?;
    if output_spec.is_none() {
        let json = serde_json::to_string_pretty(&applied.sites)
            .map_err(|e| RefineError::Parse(format!("json encode error: {e}")))?;
        println!("{json}");
    }
    Ok(())
}
