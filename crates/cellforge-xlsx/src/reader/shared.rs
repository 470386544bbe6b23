//! Shared formula expansion
//!
//! A shared formula is written once on its anchor cell
//! (`<f t="shared" si="0" ref="B1:B9">A1*2</f>`); the other cells only
//! carry the group index (`<f t="shared" si="0"/>`). Each follower gets the
//! anchor formula with its relative references moved by the follower's
//! offset from the anchor.

use std::collections::HashMap;

use cellforge_core::CellAddress;
use cellforge_formula::{parse_expression_text, FormulaExpr};

struct Anchor {
    address: CellAddress,
    text: String,
    parsed: Option<FormulaExpr>,
}

/// Anchors of one worksheet's shared formula groups, keyed by `si`
#[derive(Default)]
pub(crate) struct SharedFormulas {
    anchors: HashMap<u32, Anchor>,
}

impl SharedFormulas {
    /// Remember the anchor of group `si`
    pub(crate) fn insert_anchor(&mut self, si: u32, address: CellAddress, text: &str) {
        let parsed = match parse_expression_text(text) {
            Ok(expr) => Some(expr),
            Err(e) => {
                log::warn!(
                    "shared formula {} at {} does not parse ({}); followers copy it verbatim",
                    si,
                    address,
                    e
                );
                None
            }
        };
        self.anchors.insert(
            si,
            Anchor {
                address,
                text: text.to_string(),
                parsed,
            },
        );
    }

    /// Formula text (without `=`) of a follower of group `si` at `address`
    pub(crate) fn follower_text(&self, si: u32, address: CellAddress) -> Option<String> {
        let anchor = self.anchors.get(&si)?;
        let Some(parsed) = &anchor.parsed else {
            return Some(anchor.text.clone());
        };
        let drow = i64::from(address.row) - i64::from(anchor.address.row);
        let dcol = i64::from(address.col) - i64::from(anchor.address.col);
        Some(parsed.shifted(drow, dcol).to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn addr(s: &str) -> CellAddress {
        CellAddress::parse(s).unwrap()
    }

    #[test]
    fn test_follower_shifts_relative_references() {
        let mut shared = SharedFormulas::default();
        shared.insert_anchor(0, addr("B1"), "A1*2+$C$1");

        assert_eq!(shared.follower_text(0, addr("B2")).unwrap(), "A2*2+$C$1");
        assert_eq!(shared.follower_text(0, addr("C5")).unwrap(), "B5*2+$C$1");
        assert_eq!(shared.follower_text(1, addr("B2")), None);
    }

    #[test]
    fn test_follower_of_ranges_and_mixed_references() {
        let mut shared = SharedFormulas::default();
        shared.insert_anchor(3, addr("D2"), "SUM(A2:C2)*$A1");

        assert_eq!(shared.follower_text(3, addr("D4")).unwrap(), "SUM(A4:C4)*$A3");
    }

    #[test]
    fn test_follower_of_whole_columns_and_rows() {
        let mut shared = SharedFormulas::default();
        shared.insert_anchor(0, addr("B1"), "SUM(A:A)+COUNT(1:1)");

        assert_eq!(shared.follower_text(0, addr("C3")).unwrap(), "SUM(B:B)+COUNT(3:3)");
    }

    #[test]
    fn test_unparseable_anchor_is_copied() {
        let mut shared = SharedFormulas::default();
        shared.insert_anchor(0, addr("A1"), "SUM(Sheet1!A1:Sheet2!A1)");
        assert_eq!(
            shared.follower_text(0, addr("A2")).unwrap(),
            "SUM(Sheet1!A1:Sheet2!A1)"
        );
    }
}
