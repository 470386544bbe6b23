//! End-to-end conversion of one spreadsheet file

use std::fs;
use std::path::{Path, PathBuf};

use cellforge_core::Workbook;

use crate::calculation::{calculate_graph, CalculationStats};
use crate::codegen::{generate_program, FrozenCell};
use crate::config::ConvertConfig;
use crate::error::{ConvertError, Result};
use crate::export::{export_tables, ExportOptions};
use crate::graph::FormulaGraph;
use crate::inventory::FormulaInventory;
use crate::WorkbookExt;

/// What [`convert`] produced
#[derive(Debug, Clone)]
pub struct ConversionReport {
    /// `<output_dir>/<file stem>`
    pub output_dir: PathBuf,
    /// Every file written, tables first
    pub files: Vec<PathBuf>,
    pub stats: CalculationStats,
    /// Formulas the generated program does not recompute
    pub frozen: Vec<FrozenCell>,
}

/// Load `path`, calculate it, and write the formula tables and the
/// generated program below `config.output_dir`
pub fn convert<P: AsRef<Path>>(path: P, config: &ConvertConfig) -> Result<ConversionReport> {
    let path = path.as_ref();
    let mut workbook = Workbook::open(path)?;
    log::info!(
        "loaded {}: {} sheets, {} formulas",
        path.display(),
        workbook.sheet_count(),
        workbook.formula_count()
    );
    for sheet in workbook.worksheets() {
        log::info!("sheet '{}': {} cells", sheet.name(), sheet.cell_count());
    }
    convert_workbook(&mut workbook, path, config)
}

/// [`convert`] for a workbook already in memory; `path` names the outputs
pub fn convert_workbook(
    workbook: &mut Workbook,
    path: &Path,
    config: &ConvertConfig,
) -> Result<ConversionReport> {
    if workbook.formula_count() == 0 {
        return Err(ConvertError::NoFormulas(path.to_path_buf()));
    }

    let options = config.calculation.options();
    let graph = FormulaGraph::build(workbook);
    let stats = calculate_graph(workbook, &graph, &options)?;

    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "workbook".to_string());
    let output_dir = config.output_dir.join(&stem);
    fs::create_dir_all(&output_dir)?;

    let inventory = FormulaInventory::from_workbook(workbook);
    let export_options = ExportOptions {
        values: config.export.values,
        delimiter: config.export.delimiter as u8,
    };
    let mut files = export_tables(workbook, &inventory, &output_dir, &export_options)?;

    let mut frozen = Vec::new();
    if config.codegen.enabled {
        let source_file = path
            .file_name()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        let program = generate_program(workbook, &graph, &options, &stem, &source_file);

        let program_path = output_dir.join(&config.codegen.file_name);
        fs::write(&program_path, &program.source)?;
        log::info!(
            "wrote {} ({} formulas translated, {} frozen)",
            program_path.display(),
            program.translated,
            program.frozen.len()
        );
        files.push(program_path);
        frozen = program.frozen;
    }

    Ok(ConversionReport {
        output_dir,
        files,
        stats,
        frozen,
    })
}
