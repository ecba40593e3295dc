//! Case bookkeeping for switch statements.
//!
//! Case labels map to instruction offsets relative to the switch body's
//! scope begin. Dispatch-table codegen requires the labels to form a
//! contiguous integer range; anything else is reported as unsupported by
//! the statement generator.

use anyhow::Result;
use lex::Loc;
use std::collections::BTreeMap;
use vm::Number;

use crate::error::sema_bail;

#[derive(Default)]
pub struct SwitchStmt {
    // case value -> instruction offset from the switch scope's begin
    cases: BTreeMap<i64, u32>,
    has_float_label: bool,
    default_offset: Option<u32>,
}

impl SwitchStmt {
    pub fn new() -> Self {
        SwitchStmt::default()
    }

    pub fn add_case(&mut self, value: Number, loc: Loc) -> Result<()> {
        if value.is_float() {
            self.has_float_label = true;
            return Ok(());
        }
        if self.cases.insert(value.int_value(), 0).is_some() {
            sema_bail!(loc, "duplicate case value {}", value);
        }
        Ok(())
    }

    pub fn set_case_offset(&mut self, value: Number, offset: u32) {
        let slot = self
            .cases
            .get_mut(&value.int_value())
            .expect("case not collected during the scan pass");
        *slot = offset;
    }

    pub fn case_offset(&self, value: i64) -> u32 {
        *self.cases.get(&value).expect("unknown case value")
    }

    pub fn case_count(&self) -> usize {
        self.cases.len()
    }

    /// True when the case labels form a contiguous, non-floating integer
    /// range. An empty set does not qualify: there are no bounds.
    pub fn is_sequential(&self) -> bool {
        if self.cases.is_empty() || self.has_float_label {
            return false;
        }
        let mut expected = None;
        for &v in self.cases.keys() {
            if let Some(e) = expected {
                if v != e {
                    return false;
                }
            }
            expected = Some(v + 1);
        }
        true
    }

    pub fn bounds(&self) -> (i64, i64) {
        assert!(self.is_sequential(), "bounds of a non-sequential switch");
        let min = *self.cases.keys().next().unwrap();
        let max = *self.cases.keys().next_back().unwrap();
        (min, max)
    }

    pub fn default_offset(&self) -> Option<u32> {
        self.default_offset
    }

    pub fn set_default_offset(&mut self, offset: u32) {
        self.default_offset = Some(offset);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sequential_detection() {
        let loc = Loc::default();
        let mut sw = SwitchStmt::new();
        assert!(!sw.is_sequential());
        sw.add_case(Number::Int(1), loc).unwrap();
        sw.add_case(Number::Int(0), loc).unwrap();
        sw.add_case(Number::Int(2), loc).unwrap();
        assert!(sw.is_sequential());
        assert_eq!(sw.bounds(), (0, 2));
        sw.add_case(Number::Int(5), loc).unwrap();
        assert!(!sw.is_sequential());
    }

    #[test]
    fn duplicate_case_is_an_error() {
        let loc = Loc::default();
        let mut sw = SwitchStmt::new();
        sw.add_case(Number::Int(3), loc).unwrap();
        assert!(sw.add_case(Number::Int(3), loc).is_err());
    }

    #[test]
    fn float_labels_disqualify() {
        let loc = Loc::default();
        let mut sw = SwitchStmt::new();
        sw.add_case(Number::Int(0), loc).unwrap();
        sw.add_case(Number::Float(1.0), loc).unwrap();
        assert!(!sw.is_sequential());
    }
}
