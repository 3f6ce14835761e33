//! Switch IntDef Detector
//!
//! A `switch` (or Kotlin `when`) over a value carrying a typedef should
//! handle every constant of the typedef:
//!
//! ```java
//! switch (getVisibility()) {    // missing case GONE
//!     case VISIBLE: ...
//!     case INVISIBLE: ...
//! }
//! ```
//!
//! A `default`/`else` branch silences the missing cases. Labels that are not
//! one of the constants (or an alias with the same value) are reported on
//! their own; literal labels are reported as well.

use super::Detector;
use crate::analysis::constraints::{same_value, TypedefConstraint};
use crate::analysis::walker::{SwitchSite, UnitContext};
use crate::analysis::{Env, Finding, Issue, SymbolicValue};
use crate::ast::{Expr, ExprKind};

const MAX_TRACE_DEPTH: usize = 4;

pub struct SwitchIntDefDetector;

impl SwitchIntDefDetector {
    pub fn new() -> Self {
        Self
    }
}

impl Default for SwitchIntDefDetector {
    fn default() -> Self {
        Self::new()
    }
}

/// Typedef of the switch subject, following plain locals to their source
fn subject_typedef<'t, 'a>(
    cx: &'t UnitContext<'_, 'a>,
    expr: &Expr,
    env: &Env<'a>,
    depth: usize,
) -> Option<TypedefConstraint> {
    if depth > MAX_TRACE_DEPTH {
        return None;
    }
    if let ExprKind::Name(name) = &expr.skip_parens().kind {
        if let Some(fact) = env.get(name) {
            if fact.annotations.is_empty() && fact.param.is_none() {
                return fact
                    .source
                    .and_then(|source| subject_typedef(cx, source, env, depth + 1));
            }
        }
    }
    let source = cx.declared_source(expr, env)?;
    let constraints = source.constraints(cx.table);
    constraints.typedef.cloned()
}

fn expected_list(typedef: &TypedefConstraint) -> String {
    let mut names: Vec<&str> = typedef.values.iter().map(|v| v.written.as_str()).collect();
    names.sort_unstable();
    names.dedup();
    names.join(", ")
}

impl Detector for SwitchIntDefDetector {
    fn issues(&self) -> &'static [Issue] {
        &[Issue::SwitchIntDef]
    }

    fn check_switch<'a>(&self, cx: &UnitContext<'_, 'a>, site: &SwitchSite<'_, 'a>, out: &mut Vec<Finding>) {
        let switch = site.switch;
        let Some(subject) = &switch.subject else {
            return;
        };
        if switch.cases.is_empty() {
            return;
        }
        let Some(typedef) = subject_typedef(cx, subject, site.env, 0) else {
            return;
        };
        let evaluator = cx.evaluator();

        let mut covered: Vec<SymbolicValue> = Vec::new();
        let mut covered_fields = Vec::new();
        for label in switch.cases.iter().flat_map(|c| c.labels.iter()) {
            let value = evaluator.evaluate(label, site.env);
            if label.is_literal() {
                out.push(Finding::new(
                    Issue::SwitchIntDef,
                    cx.location(label.span),
                    format!(
                        "Don't use a constant here; expected one of: {}",
                        expected_list(&typedef)
                    ),
                ));
                covered.push(value);
                continue;
            }
            let Some(field) = cx.resolve_field_ref(label, site.env) else {
                covered.push(value);
                continue;
            };
            if typedef.allows_field(field) {
                covered_fields.push(field);
                covered.push(value);
                continue;
            }
            if typedef.entry_with_value(&value).is_some() {
                covered.push(value);
                continue;
            }
            if !value.is_unknown() {
                out.push(Finding::new(
                    Issue::SwitchIntDef,
                    cx.location(label.span),
                    format!(
                        "Unexpected constant; expected one of: {}",
                        expected_list(&typedef)
                    ),
                ));
            }
        }

        if switch.cases.iter().any(|c| c.is_default) {
            return;
        }
        let mut missing: Vec<&str> = typedef
            .values
            .iter()
            .filter(|entry| {
                let by_field = entry.field.is_some_and(|f| covered_fields.contains(&f));
                let by_value = covered.iter().any(|v| same_value(v, &entry.value));
                !by_field && !by_value
            })
            .map(|entry| entry.written.as_str())
            .collect();
        if missing.is_empty() {
            return;
        }
        missing.sort_unstable();
        missing.dedup();
        out.push(Finding::new(
            Issue::SwitchIntDef,
            cx.location(switch.keyword_span),
            format!(
                "Switch statement on an `{}` with known associated constant missing case {}",
                typedef.kind.type_name(),
                missing.join(", ")
            ),
        ));
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
import androidx.annotation.IntDef;
public class Sw {{
    public static final int A = 0;
    public static final int B = 1;
    public static final int C = 2;
    public static final int OTHER = 5;
    public static final int ALIAS = B;
    @IntDef({{A, B, C}}) @interface Mode {{}}
    @Mode int getMode() {{ return A; }}
{}
}}
"#,
            body
        );
        messages("src/main/java/test/pkg/Sw.java", &source, Box::new(SwitchIntDefDetector::new()))
    }

    #[test]
    fn test_missing_case() {
        let found = java(
            r#"
    void test(@Mode int m) {
        switch (m) {
            case A: break;
            case B: break;
        }
    }
"#,
        );
        assert_eq!(
            found,
            vec!["Switch statement on an `int` with known associated constant missing case C"]
        );
    }

    #[test]
    fn test_default_and_empty_switch_are_quiet() {
        let found = java(
            r#"
    void test(@Mode int m) {
        switch (m) {
            case A: break;
            default: break;
        }
        switch (m) {
        }
    }
"#,
        );
        assert!(found.is_empty(), "{:?}", found);
    }

    #[test]
    fn test_alias_covers_value() {
        let found = java(
            r#"
    void test() {
        switch (getMode()) {
            case A:
            case ALIAS:
            case C:
                break;
        }
        int local = getMode();
        switch (local) {
            case A: break;
        }
    }
"#,
        );
        assert_eq!(
            found,
            vec!["Switch statement on an `int` with known associated constant missing case B, C"]
        );
    }

    #[test]
    fn test_unexpected_and_literal_labels() {
        let found = java(
            r#"
    void test(@Mode int m) {
        switch (m) {
            case A: case B: case C: case OTHER: break;
        }
        switch (m) {
            case 0: case B: case C: break;
        }
    }
"#,
        );
        assert_eq!(
            found,
            vec![
                "Unexpected constant; expected one of: A, B, C",
                "Don't use a constant here; expected one of: A, B, C",
            ]
        );
    }

    #[test]
    fn test_kotlin_when() {
        let source = r#"
package test.pkg

import androidx.annotation.IntDef

const val A = 0
const val B = 1

@IntDef(A, B)
annotation class Mode

fun test(@Mode mode: Int) {
    when (mode) {
        A -> println("a")
    }
    when (mode) {
        A -> println("a")
        else -> println("other")
    }
}
"#;
        let found = messages(
            "src/main/java/test/pkg/when.kt",
            source,
            Box::new(SwitchIntDefDetector::new()),
        );
        assert_eq!(
            found,
            vec!["Switch statement on an `int` with known associated constant missing case B"]
        );
    }
}
