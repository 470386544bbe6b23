//! cellforge CLI - turns spreadsheets into command-line programs

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use cellforge::prelude::*;
use cellforge::{cell_label, EvalStep};
use clap::{ArgAction, Args, Parser, Subcommand};

#[derive(Parser)]
#[command(name = "cellforge")]
#[command(
    author,
    version,
    about = "Turn a spreadsheet's formulas into CSV tables and a standalone program",
    args_conflicts_with_subcommands = true
)]
struct Cli {
    /// More log output (-v info, -vv debug); RUST_LOG overrides
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Option<Commands>,

    /// `cellforge <INPUT>` is `cellforge convert <INPUT>`
    #[command(flatten)]
    convert: ConvertArgs,
}

#[derive(Subcommand)]
enum Commands {
    /// Write formula tables and a generated program (the default)
    Convert(ConvertArgs),

    /// Show sheets, used ranges and formula counts
    Info {
        /// Input spreadsheet file (xlsx, xlsm, csv)
        input: PathBuf,
    },

    /// Print the order in which formulas are calculated
    Deps {
        /// Input spreadsheet file
        input: PathBuf,
    },

    /// Calculate the workbook and print every formula's value
    Eval {
        /// Input spreadsheet file
        input: PathBuf,

        /// Only this sheet
        #[arg(short, long)]
        sheet: Option<String>,

        /// What to do with circular references
        #[arg(long, value_name = "reject|flag|iterate")]
        circular: Option<CircularMode>,
    },
}

#[derive(Args, Default)]
struct ConvertArgs {
    /// Input spreadsheet file (xlsx, xlsm, csv)
    input: Option<PathBuf>,

    /// Directory receiving `<file stem>/` (default: outputs)
    #[arg(short, long)]
    output_dir: Option<PathBuf>,

    /// TOML configuration file; flags override it
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// What to do with circular references
    #[arg(long, value_name = "reject|flag|iterate")]
    circular: Option<CircularMode>,

    /// Iteration cap per cycle when iterating
    #[arg(long, value_parser = clap::value_parser!(u32).range(1..))]
    max_iterations: Option<u32>,

    /// Skip the `<sheet>_values.csv` tables
    #[arg(long)]
    no_values: bool,

    /// Skip the generated program
    #[arg(long)]
    no_codegen: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match cli.command.unwrap_or(Commands::Convert(cli.convert)) {
        Commands::Convert(args) => run_convert(&args),
        Commands::Info { input } => show_info(&input),
        Commands::Deps { input } => show_deps(&input),
        Commands::Eval {
            input,
            sheet,
            circular,
        } => show_values(&input, sheet.as_deref(), circular),
    }
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_timestamp(None)
        .init();
}

fn open(input: &Path) -> Result<Workbook> {
    Workbook::open(input).with_context(|| format!("Failed to open '{}'", input.display()))
}

/// Configuration file first, then the flags on top
fn load_config(args: &ConvertArgs) -> Result<ConvertConfig> {
    let mut config = match &args.config {
        Some(path) => ConvertConfig::from_file(path)
            .with_context(|| format!("Failed to load config '{}'", path.display()))?,
        None => ConvertConfig::default(),
    };

    if let Some(dir) = &args.output_dir {
        config.output_dir = dir.clone();
    }
    if let Some(mode) = args.circular {
        config.calculation.circular = mode;
    }
    if let Some(n) = args.max_iterations {
        config.calculation.max_iterations = n;
    }
    if args.no_values {
        config.export.values = false;
    }
    if args.no_codegen {
        config.codegen.enabled = false;
    }
    log::debug!("configuration: {:?}", config);
    Ok(config)
}

fn run_convert(args: &ConvertArgs) -> Result<()> {
    let Some(input) = &args.input else {
        bail!("No input file given (see `cellforge --help`)");
    };
    let config = load_config(args)?;

    let report = convert(input, &config)
        .with_context(|| format!("Failed to convert '{}'", input.display()))?;

    let stats = &report.stats;
    println!(
        "Converted '{}' into {}",
        input.display(),
        report.output_dir.display()
    );
    println!(
        "  {} formulas calculated, {} errors, {} unparseable, {} cycles",
        stats.cells_calculated, stats.errors, stats.parse_failures, stats.cycles
    );
    if stats.cycles > 0 && config.calculation.circular == CircularMode::Iterate {
        println!(
            "  iteration {} after {} sweeps",
            if stats.converged { "converged" } else { "did not converge" },
            stats.iterations
        );
    }
    for file in &report.files {
        println!("  wrote {}", file.display());
    }
    if !report.frozen.is_empty() {
        println!("  {} formulas keep their converted value:", report.frozen.len());
        for cell in &report.frozen {
            println!("    {}: {}", cell.cell, cell.reason);
        }
    }

    Ok(())
}

fn show_info(input: &Path) -> Result<()> {
    let workbook = open(input)?;

    println!("File: {}", input.display());
    println!("Sheets: {}", workbook.sheet_count());

    for (i, sheet) in workbook.worksheets().enumerate() {
        println!();
        println!("  Sheet {}: \"{}\"", i, sheet.name());
        match sheet.used_range() {
            Some(range) => println!(
                "    Used range: {} ({} rows x {} columns)",
                range,
                range.row_count(),
                range.col_count()
            ),
            None => println!("    Used range: empty"),
        }
        println!("    Formulas: {}", sheet.formula_count());
    }

    let names = workbook.named_ranges();
    if !names.is_empty() {
        println!();
        println!("Defined names: {}", names.len());
        for name in names.iter() {
            println!("  {} = {}", name.name, name.refers_to);
        }
    }

    Ok(())
}

fn show_deps(input: &Path) -> Result<()> {
    let workbook = open(input)?;
    let graph = FormulaGraph::build(&workbook);

    for step in graph.evaluation_order() {
        match step {
            EvalStep::Cell(key) => {
                let precedents: Vec<String> = graph
                    .graph()
                    .precedents(key)
                    .map(|p| cell_label(&workbook, p))
                    .collect();
                if precedents.is_empty() {
                    println!("{}", cell_label(&workbook, key));
                } else {
                    println!(
                        "{} <- {}",
                        cell_label(&workbook, key),
                        precedents.join(", ")
                    );
                }
            }
            EvalStep::Cycle(keys) => {
                let members: Vec<String> = keys.iter().map(|k| cell_label(&workbook, *k)).collect();
                println!("cycle: {}", members.join(", "));
            }
        }
    }

    Ok(())
}

fn show_values(input: &Path, sheet: Option<&str>, circular: Option<CircularMode>) -> Result<()> {
    let mut workbook = open(input)?;

    let only = match sheet {
        Some(name) => Some(
            workbook
                .sheet_index(name)
                .with_context(|| format!("Sheet '{}' not found", name))?,
        ),
        None => None,
    };

    let options = CalculationOptions {
        circular: circular.unwrap_or_default(),
        ..Default::default()
    };
    workbook
        .calculate_with_options(&options)
        .context("Failed to calculate formulas")?;

    for (i, ws) in workbook.worksheets().enumerate() {
        if only.map_or(false, |idx| idx != i) {
            continue;
        }
        for (row, col, _) in ws.formula_cells() {
            let key = cellforge::CellKey::new(i, row, col);
            println!(
                "{} = {}",
                cell_label(&workbook, key),
                ws.get_calculated_value_at(row, col)
            );
        }
    }

    Ok(())
}
