//! Shift Flags Detector
//!
//! Flag constants (those listed in a `flag = true` typedef) are easier to
//! keep distinct when written as shifts. A constant initialized with a
//! literal power of two gets a warning and a fix:
//!
//! ```java
//! public static final int FLAG_FOCUSED = 16;   // Consider declaring this constant using 1 << 4 instead
//! ```

use super::Detector;
use crate::analysis::annotations::AnnotationKey;
use crate::analysis::constraints::AnnotationConstraint;
use crate::analysis::walker::UnitContext;
use crate::analysis::{Finding, Issue, LintFix};
use crate::ast::{ExprKind, Literal};
use crate::graph::FieldId;
use std::collections::HashSet;

pub struct ShiftFlagsDetector;

impl ShiftFlagsDetector {
    pub fn new() -> Self {
        Self
    }

    fn check_field(&self, cx: &UnitContext<'_, '_>, field: FieldId, out: &mut Vec<Finding>) {
        let decl = cx.index.field(field);
        let Some(init) = &decl.initializer else {
            return;
        };
        let (value, long) = match init.kind {
            ExprKind::Literal(Literal::Int(v)) => (v, false),
            ExprKind::Literal(Literal::Long(v)) => (v, true),
            _ => return,
        };
        if value < 2 || value & (value - 1) != 0 {
            return;
        }
        let shift = value.trailing_zeros();
        let long = long || shift >= 31;
        let op = if cx.is_kotlin() { "shl" } else { "<<" };
        let suggested = format!("1 {} {}", op, shift);
        let replacement = if long {
            format!("1L {} {}", op, shift)
        } else {
            suggested.clone()
        };
        out.push(
            Finding::new(
                Issue::ShiftFlags,
                cx.location(init.span),
                format!("Consider declaring this constant using {} instead", suggested),
            )
            .with_fix(LintFix::replace(
                format!("Replace with {}", replacement),
                init.span,
                replacement,
            )),
        );
    }
}

impl Default for ShiftFlagsDetector {
    fn default() -> Self {
        Self::new()
    }
}

impl Detector for ShiftFlagsDetector {
    fn issues(&self) -> &'static [Issue] {
        &[Issue::ShiftFlags]
    }

    fn check_unit(&self, cx: &UnitContext<'_, '_>, out: &mut Vec<Finding>) {
        let mut seen = HashSet::new();
        let mut fields: Vec<FieldId> = cx
            .table
            .entries()
            .filter(|(_, r)| matches!(r.key, AnnotationKey::IntDef | AnnotationKey::LongDef))
            .filter_map(|(_, r)| match &r.constraint {
                AnnotationConstraint::Typedef(typedef) if typedef.flag => Some(typedef),
                _ => None,
            })
            .flat_map(|typedef| typedef.values.iter().filter_map(|v| v.field))
            .filter(|field| cx.index.class(field.class).unit == cx.unit_index)
            .filter(|field| seen.insert(*field))
            .collect();
        fields.sort_by_key(|f| (f.class.0, f.index));
        for field in fields {
            self.check_field(cx, field, out);
        }
    }
}
