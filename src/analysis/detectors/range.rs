//! Range Detector
//!
//! Checks values flowing into `@IntRange`, `@FloatRange` and `@Size`
//! parameters, fields, locals and method returns.
//!
//! ## Examples
//!
//! ```java
//! void setAlpha(@IntRange(from = 0, to = 255) int alpha) { }
//!
//! setAlpha(300);        // Value must be ≤ 255 (was 300)
//!
//! void setPair(@Size(2) int[] pair) { }
//!
//! setPair(new int[] { 1, 2, 3 });   // Expected size 2 (was 3)
//! ```
//!
//! When the value is not known exactly, the detector compares the range the
//! value was declared or guarded with against the required range and reports
//! when it can escape on either edge:
//!
//! ```java
//! void caller(@IntRange(from = 0, to = 500) int value) {
//!     setAlpha(value);  // Value must be ≥ 0 and ≤ 255 but `value` can be > 255
//! }
//! ```
//!
//! Conditional arguments are checked branch by branch; array initializers
//! element by element.

use super::Detector;
use crate::analysis::annotations::ValueConstraints;
use crate::analysis::constraints::{FloatRangeConstraint, IntRangeConstraint};
use crate::analysis::walker::{CallSite, UnitContext, ValueSite};
use crate::analysis::{Env, Finding, Issue, SymbolicValue, ValueRange};
use crate::ast::{Expr, ExprKind};
use crate::graph::DeclRef;

pub struct RangeDetector;

impl RangeDetector {
    pub fn new() -> Self {
        Self
    }

    fn check_expr<'a>(
        &self,
        cx: &UnitContext<'_, 'a>,
        constraints: &ValueConstraints<'_>,
        expr: &Expr,
        env: &Env<'a>,
        out: &mut Vec<Finding>,
    ) {
        match &expr.kind {
            ExprKind::Paren(inner) => self.check_expr(cx, constraints, inner, env, out),
            ExprKind::Conditional {
                cond,
                then_expr,
                else_expr,
            } => match cx.evaluator().evaluate(cond, env) {
                SymbolicValue::Bool(true) => self.check_expr(cx, constraints, then_expr, env, out),
                SymbolicValue::Bool(false) => self.check_expr(cx, constraints, else_expr, env, out),
                _ => {
                    self.check_expr(cx, constraints, then_expr, env, out);
                    self.check_expr(cx, constraints, else_expr, env, out);
                }
            },
            _ => self.check_single(cx, constraints, expr, env, out),
        }
    }

    fn check_single<'a>(
        &self,
        cx: &UnitContext<'_, 'a>,
        constraints: &ValueConstraints<'_>,
        expr: &Expr,
        env: &Env<'a>,
        out: &mut Vec<Finding>,
    ) {
        let value = cx.evaluator().evaluate(expr, env);

        if let Some(size) = constraints.size {
            let message = match value.size() {
                Some(actual) => {
                    let unit = if matches!(value, SymbolicValue::Str(_)) {
                        "length"
                    } else {
                        "size"
                    };
                    size.check(actual as i64, unit)
                }
                None => cx.declared_source(expr, env).and_then(|source| {
                    let declared = source.constraints(cx.table);
                    let other = declared.size?;
                    (!size.contains(other))
                        .then(|| size.describe_delta(other, expr.selector_name()))
                }),
            };
            if let Some(message) = message {
                out.push(Finding::new(Issue::Range, cx.location(expr.span), message));
            }
        }

        let int_range = constraints.int_range.filter(|_| constraints.typedef.is_none());
        if int_range.is_none() && constraints.float_range.is_none() {
            return;
        }

        // Element-wise for array-typed targets
        let items = match &expr.kind {
            ExprKind::ArrayInit(items) => Some(items),
            ExprKind::NewArray {
                init: Some(items), ..
            } => Some(items),
            _ => None,
        };
        if let Some(items) = items {
            let scalar = ValueConstraints {
                size: None,
                ..*constraints
            };
            for item in items {
                self.check_expr(cx, &scalar, item, env, out);
            }
            return;
        }
        if let SymbolicValue::Array(elements) = &value {
            for element in elements {
                if let Some(message) = self.violation(int_range, constraints.float_range, element) {
                    out.push(Finding::new(Issue::Range, cx.location(expr.span), message));
                }
            }
            return;
        }

        if let Some(message) = self.violation(int_range, constraints.float_range, &value) {
            out.push(Finding::new(Issue::Range, cx.location(expr.span), message));
            return;
        }

        if value.is_exact_number() {
            return;
        }
        let label = expr.selector_name();
        let actual = match &value {
            SymbolicValue::Range(range) if !(range.inferred && range.is_infinite()) => {
                Some(range.clone())
            }
            SymbolicValue::Range(_) => None,
            _ => cx.declared_source(expr, env).and_then(|source| {
                let declared = source.constraints(cx.table);
                declared
                    .int_range
                    .map(|range| ValueRange::integer(range.from, range.to))
                    .or_else(|| declared.float_range.map(range_of_float))
            }),
        };
        let Some(actual) = actual else {
            return;
        };
        let message = if let Some(required) = int_range {
            (!required.contains(&actual)).then(|| required.describe_delta(&actual, label))
        } else if let Some(required) = constraints.float_range {
            (!required.contains(&actual)).then(|| required.describe_delta(&actual, label))
        } else {
            None
        };
        if let Some(message) = message {
            out.push(Finding::new(Issue::Range, cx.location(expr.span), message));
        }
    }

    fn violation(
        &self,
        int_range: Option<&IntRangeConstraint>,
        float_range: Option<&FloatRangeConstraint>,
        value: &SymbolicValue,
    ) -> Option<String> {
        if let Some(range) = int_range {
            if value.is_integral() {
                return range.check(value);
            }
        }
        float_range.and_then(|range| range.check(value))
    }
}

impl Default for RangeDetector {
    fn default() -> Self {
        Self::new()
    }
}

fn range_of_float(constraint: &FloatRangeConstraint) -> ValueRange {
    let mut range = ValueRange::new(constraint.from, constraint.to, false);
    range.min_inclusive = constraint.from_inclusive;
    range.max_inclusive = constraint.to_inclusive;
    range
}

impl Detector for RangeDetector {
    fn issues(&self) -> &'static [Issue] {
        &[Issue::Range]
    }

    fn check_call<'a>(&self, cx: &UnitContext<'_, 'a>, site: &CallSite<'_, 'a>, out: &mut Vec<Finding>) {
        let Some(method) = site.callee.method() else {
            return;
        };
        let vararg_count = site.vararg_count();
        let mut varargs_checked = false;
        for arg in &site.args {
            let constraints = cx.table.value_constraints(DeclRef::Param(method, arg.param));
            if constraints.is_empty() {
                continue;
            }
            if !arg.vararg {
                self.check_expr(cx, &constraints, arg.expr, site.env, out);
                continue;
            }

            // A single array argument passed to a varargs parameter is the array itself
            let is_array = vararg_count == 1
                && matches!(
                    arg.expr.skip_parens().kind,
                    ExprKind::NewArray { .. } | ExprKind::ArrayInit(_)
                );
            if is_array {
                self.check_expr(cx, &constraints, arg.expr, site.env, out);
                continue;
            }
            if let Some(size) = constraints.size {
                if !varargs_checked {
                    varargs_checked = true;
                    if let Some(message) = size.check(vararg_count as i64, "size") {
                        let span = site
                            .args
                            .iter()
                            .filter(|a| a.vararg)
                            .map(|a| a.expr.span)
                            .reduce(|a, b| a.to(b))
                            .unwrap_or(site.name_span);
                        out.push(Finding::new(Issue::Range, cx.location(span), message));
                    }
                }
            }
            let scalar = ValueConstraints {
                size: None,
                ..constraints
            };
            if !scalar.is_empty() {
                self.check_expr(cx, &scalar, arg.expr, site.env, out);
            }
        }
    }

    fn check_value<'a>(&self, cx: &UnitContext<'_, 'a>, site: &ValueSite<'_, 'a>, out: &mut Vec<Finding>) {
        let constraints = site.constraints;
        if constraints.int_range.is_none()
            && constraints.float_range.is_none()
            && constraints.size.is_none()
        {
            return;
        }
        self.check_expr(cx, &constraints, site.expr, site.env, out);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::detectors::test_support::messages;

    fn java(body: &str) -> Vec<String> {
        let source = format!(
            r#"
package test.pkg;
import androidx.annotation.IntRange;
import androidx.annotation.FloatRange;
import androidx.annotation.Size;
public class RangeTest {{
    static void printInt(@IntRange(from = 4, to = 7) int value) {{}}
    static void printFloat(@FloatRange(from = 2.5, to = 7.0, fromInclusive = false, toInclusive = false) float value) {{}}
    static void printNegative(@FloatRange(from = -90.0, to = 90.0) double value) {{}}
    static void printExact(@Size(5) int[] value) {{}}
    static void printMin(@Size(min = 4) String value) {{}}
    static void printMax(@Size(max = 6) int[] value) {{}}
    static void printMultiple(@Size(multiple = 3) int[] value) {{}}
    static void printVarargs(@Size(2) int... values) {{}}
    static void printRanged(@IntRange(from = 3, to = 6) int value) {{}}
{}
}}
"#,
            body
        );
        messages("src/main/java/test/pkg/RangeTest.java", &source, Box::new(RangeDetector::new()))
    }

    #[test]
    fn test_int_range_bounds() {
        let found = java(
            r#"
    void test() {
        printInt(3);
        printInt(4);
        printInt(5);
        printInt(7);
        printInt(8);
    }
"#,
        );
        assert_eq!(
            found,
            vec!["Value must be ≥ 4 (was 3)", "Value must be ≤ 7 (was 8)"]
        );
    }

    #[test]
    fn test_float_range_exclusive_and_negative() {
        let found = java(
            r#"
    void test() {
        printFloat(2.5f);
        printFloat(7.1f);
        printFloat(3.0f);
        printNegative(-150.0);
        printNegative(-45.0);
    }
"#,
        );
        assert_eq!(
            found,
            vec![
                "Value must be > 2.5 (was 2.5)",
                "Value must be < 7.0 (was 7.1)",
                "Value must be ≥ -90.0 (was -150.0)",
            ]
        );
    }

    #[test]
    fn test_sizes() {
        let found = java(
            r#"
    void test() {
        printExact(new int[] {1, 2, 3, 4});
        printExact(new int[] {1, 2, 3, 4, 5});
        printMin("abc");
        printMin("abcd");
        printMax(new int[] {1, 2, 3, 4, 5, 6, 7});
        printMultiple(new int[] {1, 2, 3, 4});
        printMultiple(new int[] {1, 2, 3, 4, 5, 6});
        printVarargs(1, 2, 3);
        printVarargs(1, 2);
    }
"#,
        );
        assert_eq!(
            found,
            vec![
                "Expected size 5 (was 4)",
                "Expected length ≥ 4 (was 3)",
                "Expected size ≤ 6 (was 7)",
                "Expected size to be a multiple of 3 (was 4 and should be either 3 or 6)",
                "Expected size 2 (was 3)",
            ]
        );
    }

    #[test]
    fn test_conditional_checks_each_branch() {
        let found = java(
            r#"
    void test(boolean flag) {
        printInt(flag ? 5 : 9);
        printInt(true ? 5 : 9);
    }
"#,
        );
        assert_eq!(found, vec!["Value must be ≤ 7 (was 9)"]);
    }

    #[test]
    fn test_overlapping_declared_ranges() {
        let found = java(
            r#"
    void test(@IntRange(to = 5) int atMost5, @IntRange(from = 4, to = 5) int inside) {
        printRanged(atMost5);
        printRanged(inside);
    }
"#,
        );
        assert_eq!(
            found,
            vec!["Value must be ≥ 3 and ≤ 6 but `atMost5` can be < 3"]
        );
    }

    #[test]
    fn test_open_ended_declared_range_fits() {
        let found = java(
            r#"
    static void atLeast3(@IntRange(from = 3) int value) {}
    void test(@IntRange(from = 5) int x, @IntRange(to = 5) int y) {
        atLeast3(x);
        atLeast3(y);
    }
"#,
        );
        assert_eq!(found, vec!["Value must be ≥ 3 but `y` can be < 3"]);
    }

    #[test]
    fn test_overflowing_remainder_is_unknown() {
        let found = java(
            r#"
    static void printLong(@IntRange(from = 0) long value) {}
    void test(long x) {
        printLong((x * (1L << 63)) % -1L);
        printLong((x * 4L) % 2L - 1L);
    }
"#,
        );
        assert_eq!(found, vec!["Value must be ≥ 0 (was -1)"]);
    }

    #[test]
    fn test_guarded_local_is_narrowed() {
        let found = java(
            r#"
    void test(int x) {
        if (x >= 4 && x <= 6) {
            printInt(x);
        }
        if (x > 0) {
            printInt(x);
        }
        printInt(x);
    }
"#,
        );
        // Open-ended guards never prove a violation
        assert!(found.is_empty(), "{:?}", found);
    }

    #[test]
    fn test_flow_uses_nearest_assignment() {
        let found = java(
            r#"
    void test(boolean c) {
        int alpha = 1;
        printInt(alpha);
        alpha = 5;
        printInt(alpha);
        int beta = -1;
        if (c) {
            beta = 5;
            printInt(beta);
        }
    }
"#,
        );
        assert_eq!(found, vec!["Value must be ≥ 4 (was 1)"]);
    }

    #[test]
    fn test_annotated_field_assignment_and_return() {
        let source = r#"
package test.pkg;
import androidx.annotation.IntRange;
public class Holder {
    @IntRange(from = 0, to = 10)
    private int level = 20;

    void update() {
        level = -1;
        level = 5;
    }

    @IntRange(from = 1)
    int count() {
        return 0;
    }
}
"#;
        let found = messages(
            "src/main/java/test/pkg/Holder.java",
            source,
            Box::new(RangeDetector::new()),
        );
        assert_eq!(
            found,
            vec![
                "Value must be ≤ 10 (was 20)",
                "Value must be ≥ 0 (was -1)",
                "Value must be ≥ 1 (was 0)",
            ]
        );
    }

    #[test]
    fn test_kotlin_call() {
        let source = r#"
package test.pkg

import androidx.annotation.IntRange

fun printInt(@IntRange(from = 4, to = 7) value: Int) {}

fun test() {
    printInt(3)
    printInt(5)
}
"#;
        let found = messages(
            "src/main/java/test/pkg/test.kt",
            source,
            Box::new(RangeDetector::new()),
        );
        assert_eq!(found, vec!["Value must be ≥ 4 (was 3)"]);
    }
}
