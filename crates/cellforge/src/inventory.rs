//! Formula inventory: one record per formula cell

use cellforge_core::Workbook;
use cellforge_formula::{collect_references, format_reference_list, parse_formula};

/// One formula cell as listed in the exported tables
#[derive(Debug, Clone, PartialEq)]
pub struct FormulaRecord {
    /// A1 address of the cell, without the sheet
    pub cell: String,
    /// Formula text with its leading `=`
    pub formula: String,
    /// What the formula reads (`A1, B2:C3`), or `None`
    pub references: String,
    /// Computed value as displayed; empty before calculation
    pub value: String,
}

impl FormulaRecord {
    /// The record as a table row, in [`SheetInventory::HEADER`] order
    pub fn to_row(&self) -> Vec<&str> {
        vec![
            self.cell.as_str(),
            self.formula.as_str(),
            self.references.as_str(),
            self.value.as_str(),
        ]
    }
}

/// The formula records of one sheet, row-major
#[derive(Debug, Clone, PartialEq)]
pub struct SheetInventory {
    pub sheet: String,
    pub records: Vec<FormulaRecord>,
}

impl SheetInventory {
    pub const HEADER: [&'static str; 4] = ["Cell", "Formula", "Referenced Cells", "Value"];
}

/// Formula records of every sheet that has formulas, in sheet order
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FormulaInventory {
    pub sheets: Vec<SheetInventory>,
}

impl FormulaInventory {
    pub fn from_workbook(workbook: &Workbook) -> Self {
        let sheets = workbook
            .worksheets()
            .filter_map(|sheet| {
                let records: Vec<FormulaRecord> = sheet
                    .formula_cells()
                    .map(|(row, col, formula)| {
                        // Unparseable formulas are still listed, without references
                        let references = parse_formula(formula)
                            .map(|ast| format_reference_list(&collect_references(&ast)))
                            .unwrap_or_else(|_| format_reference_list(&[]));
                        FormulaRecord {
                            cell: cellforge_core::CellAddress::new(row, col).to_string(),
                            formula: formula.to_string(),
                            references,
                            value: sheet.get_calculated_value_at(row, col).to_string(),
                        }
                    })
                    .collect();

                if records.is_empty() {
                    log::info!("sheet '{}' has no formulas", sheet.name());
                    return None;
                }
                Some(SheetInventory {
                    sheet: sheet.name().to_string(),
                    records,
                })
            })
            .collect();

        Self { sheets }
    }

    pub fn formula_count(&self) -> usize {
        self.sheets.iter().map(|s| s.records.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.sheets.is_empty()
    }
}
