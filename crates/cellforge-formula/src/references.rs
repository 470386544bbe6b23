//! References read by a formula

use std::collections::HashSet;
use std::fmt;

use cellforge_core::{CellAddress, CellRange};

use crate::ast::{write_sheet_prefix, FormulaExpr};

/// A cell, range or defined name that a formula reads
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reference {
    Cell {
        sheet: Option<String>,
        address: CellAddress,
    },
    Range {
        sheet: Option<String>,
        range: CellRange,
    },
    Name(String),
}

impl Reference {
    /// Sheet the reference is qualified with, if any
    pub fn sheet(&self) -> Option<&str> {
        match self {
            Reference::Cell { sheet, .. } | Reference::Range { sheet, .. } => sheet.as_deref(),
            Reference::Name(_) => None,
        }
    }
}

impl fmt::Display for Reference {
    /// `$` anchors are dropped: they matter to copying, not to what is read
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Reference::Cell { sheet, address } => {
                if let Some(sheet) = sheet {
                    write_sheet_prefix(f, sheet)?;
                }
                f.write_str(&address.to_relative_string())
            }
            Reference::Range { sheet, range } => {
                if let Some(sheet) = sheet {
                    write_sheet_prefix(f, sheet)?;
                }
                match range.line_label() {
                    Some(label) => f.write_str(&label.replace('$', "")),
                    None => write!(
                        f,
                        "{}:{}",
                        range.start.to_relative_string(),
                        range.end.to_relative_string()
                    ),
                }
            }
            Reference::Name(name) => f.write_str(name),
        }
    }
}

/// Distinct references of `expr` in order of first appearance
///
/// Two references are the same when they render the same, so `A1` and
/// `$A$1` count once.
///
/// # Example
/// ```rust
/// use cellforge_formula::{collect_references, parse_formula};
///
/// let ast = parse_formula("=A1+SUM(B1:B3)*$A$1+Rate").unwrap();
/// let refs: Vec<String> = collect_references(&ast).iter().map(|r| r.to_string()).collect();
/// assert_eq!(refs, vec!["A1", "B1:B3", "Rate"]);
/// ```
pub fn collect_references(expr: &FormulaExpr) -> Vec<Reference> {
    let mut seen = HashSet::new();
    let mut refs = Vec::new();

    expr.walk(&mut |node| {
        let reference = match node {
            FormulaExpr::CellRef(r) => Reference::Cell {
                sheet: r.sheet.clone(),
                address: r.address,
            },
            FormulaExpr::RangeRef(r) => Reference::Range {
                sheet: r.sheet.clone(),
                range: r.range,
            },
            FormulaExpr::NameRef(name) => Reference::Name(name.clone()),
            _ => return,
        };
        if seen.insert(reference.to_string().to_lowercase()) {
            refs.push(reference);
        }
    });

    refs
}

/// Render references the way the formula inventory lists them
pub fn format_reference_list(refs: &[Reference]) -> String {
    if refs.is_empty() {
        return "None".to_string();
    }
    refs.iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse_formula;
    use pretty_assertions::assert_eq;

    fn refs_of(formula: &str) -> Vec<String> {
        let ast = parse_formula(formula).unwrap();
        collect_references(&ast)
            .iter()
            .map(ToString::to_string)
            .collect()
    }

    #[test]
    fn test_first_appearance_order() {
        assert_eq!(
            refs_of("=C3+IF(A1>0,B2:C4,A1)+'My Sheet'!A1"),
            vec!["C3", "A1", "B2:C4", "'My Sheet'!A1"]
        );
    }

    #[test]
    fn test_sheet_qualified_is_distinct() {
        assert_eq!(refs_of("=A1+Data!A1+data!$A$1"), vec!["A1", "Data!A1"]);
    }

    #[test]
    fn test_whole_columns_and_rows() {
        assert_eq!(
            refs_of("=SUM(A:A)+SUM($A:$A)+COUNT(Data!2:$4)"),
            vec!["A:A", "Data!2:4"]
        );
    }

    #[test]
    fn test_names_and_literals() {
        assert_eq!(refs_of("=TaxRate*Price"), vec!["TaxRate", "Price"]);
        assert!(refs_of("=1+2").is_empty());
    }

    #[test]
    fn test_format_reference_list() {
        let ast = parse_formula("=A1+B2:C3").unwrap();
        assert_eq!(format_reference_list(&collect_references(&ast)), "A1, B2:C3");
        assert_eq!(format_reference_list(&[]), "None");
    }
}
