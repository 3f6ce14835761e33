//! Unique Constants Detector
//!
//! Reports typedef declarations listing two constants with the same value,
//! or the same constant twice.
//!
//! ```java
//! public static final int A = 1;
//! public static final int B = 1;
//!
//! @IntDef({A, B})   // Constants B and A specify the same exact value (1)
//! @interface Mode {}
//! ```
//!
//! Duplicates are allowed when exactly one of the two constants is
//! deprecated, when one is declared as an alias of the other (`B = A`), or
//! when they share a name but live in different classes.

use super::Detector;
use crate::analysis::annotations::AnnotationKey;
use crate::analysis::constraints::{same_value, AnnotationConstraint, TypedefConstraint, TypedefValue};
use crate::analysis::walker::UnitContext;
use crate::analysis::{Env, Finding, Issue};
use crate::ast::ExprKind;
use crate::graph::{FieldId, Scope};

pub struct UniqueConstantsDetector;

impl UniqueConstantsDetector {
    pub fn new() -> Self {
        Self
    }

    fn check_typedef(&self, cx: &UnitContext<'_, '_>, typedef: &TypedefConstraint, out: &mut Vec<Finding>) {
        for (j, current) in typedef.values.iter().enumerate() {
            for previous in &typedef.values[..j] {
                if current.field.is_some() && current.field == previous.field {
                    out.push(
                        Finding::new(
                            Issue::UniqueConstants,
                            cx.location(current.span),
                            format!("Constant `{}` has already been included", current.written),
                        )
                        .with_secondary(cx.location(previous.span).with_message("Previous occurrence")),
                    );
                    break;
                }
                if !same_value(&current.value, &previous.value) || is_exempt(cx, current, previous) {
                    continue;
                }
                out.push(
                    Finding::new(
                        Issue::UniqueConstants,
                        cx.location(current.span),
                        format!(
                            "Constants `{}` and `{}` specify the same exact value ({}); this is usually a cut & paste or merge error",
                            current.written,
                            previous.written,
                            current.value.display()
                        ),
                    )
                    .with_secondary(cx.location(previous.span).with_message("Previous same value")),
                );
                break;
            }
        }
    }
}

impl Default for UniqueConstantsDetector {
    fn default() -> Self {
        Self::new()
    }
}

fn is_exempt(cx: &UnitContext<'_, '_>, a: &TypedefValue, b: &TypedefValue) -> bool {
    let (Some(fa), Some(fb)) = (a.field, b.field) else {
        return false;
    };
    let index = cx.index;
    let (da, db) = (index.field(fa), index.field(fb));
    if da.is_deprecated() != db.is_deprecated() {
        return true;
    }
    if da.name == db.name && fa.class != fb.class {
        return true;
    }
    aliases(cx, fa, fb) || aliases(cx, fb, fa)
}

/// `field` is initialized with a plain reference to `target`
fn aliases(cx: &UnitContext<'_, '_>, field: FieldId, target: FieldId) -> bool {
    let Some(init) = &cx.index.field(field).initializer else {
        return false;
    };
    if !matches!(init.skip_parens().kind, ExprKind::Name(_) | ExprKind::Select { .. }) {
        return false;
    }
    let scope = Scope::new(cx.index.class(field.class).unit, Some(field.class));
    cx.evaluator().resolve_field(init, &Env::new(scope)) == Some(target)
}

impl Detector for UniqueConstantsDetector {
    fn issues(&self) -> &'static [Issue] {
        &[Issue::UniqueConstants]
    }

    fn check_unit(&self, cx: &UnitContext<'_, '_>, out: &mut Vec<Finding>) {
        for (_, resolved) in cx.table.entries() {
            if resolved.unit != cx.unit_index
                || !matches!(
                    resolved.key,
                    AnnotationKey::IntDef | AnnotationKey::LongDef | AnnotationKey::StringDef
                )
            {
                continue;
            }
            if let AnnotationConstraint::Typedef(typedef) = &resolved.constraint {
                self.check_typedef(cx, typedef, out);
            }
        }
    }
}
