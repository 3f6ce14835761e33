//! Annotation Usage Detector
//!
//! Validates the annotations themselves rather than the code using them:
//! inverted ranges, negative or inconsistent sizes, int typedefs placed on
//! `String` declarations, and `@RestrictTo` without a usable scope.

use super::Detector;
use crate::analysis::annotations::{AnnotationKey, ResolvedAnnotation};
use crate::analysis::constraints::{AnnotationConstraint, RestrictScope, TypedefKind};
use crate::analysis::walker::UnitContext;
use crate::analysis::{Finding, Issue};
use crate::ast::TypeRef;
use crate::graph::{DeclRef, DeclarationIndex};

pub struct AnnotationUsageDetector;

impl AnnotationUsageDetector {
    pub fn new() -> Self {
        Self
    }
}

impl Default for AnnotationUsageDetector {
    fn default() -> Self {
        Self::new()
    }
}

/// Declared type of an annotated field, method return or parameter
fn declared_type<'a>(index: &DeclarationIndex<'a>, decl: DeclRef) -> Option<&'a TypeRef> {
    match decl {
        DeclRef::Class(_) => None,
        DeclRef::Field(field) => index.field(field).ty.as_ref(),
        DeclRef::Method(method) => index.method(method).return_type.as_ref(),
        DeclRef::Param(method, param) => index.method(method).params.get(param)?.ty.as_ref(),
    }
}

fn problem(decl: DeclRef, resolved: &ResolvedAnnotation<'_>, ty: Option<&TypeRef>) -> Option<&'static str> {
    let on_string = ty.is_some_and(|t| t.is_string());
    match &resolved.constraint {
        AnnotationConstraint::IntRange(range) => {
            if on_string {
                return Some("This annotation does not apply for type String; expected int or long");
            }
            (range.from > range.to)
                .then_some("Invalid range: the `from` attribute must be less than the `to` attribute")
        }
        AnnotationConstraint::FloatRange(range) => {
            let empty = range.from > range.to
                || (range.from == range.to && !(range.from_inclusive && range.to_inclusive));
            empty.then_some("Invalid range: the `from` attribute must be less than the `to` attribute")
        }
        AnnotationConstraint::Size(size) => {
            if [size.exact, size.min, size.max].iter().flatten().any(|v| *v < 0) {
                return Some("The size can't be negative");
            }
            if let (Some(min), Some(max)) = (size.min, size.max) {
                if min > max {
                    return Some("Invalid size range: the `min` attribute must be less than the `max` attribute");
                }
            }
            size.multiple
                .is_some_and(|m| m < 1)
                .then_some("The size multiple must be at least 1")
        }
        AnnotationConstraint::Typedef(typedef) => {
            let numeric = matches!(typedef.kind, TypedefKind::Int | TypedefKind::Long);
            (numeric && on_string)
                .then_some("This annotation does not apply for type String; expected int or long")
        }
        AnnotationConstraint::Restriction(restriction) if resolved.key == AnnotationKey::RestrictTo => {
            if restriction.scopes.is_empty() {
                return Some("Restrict to what? Expected at least one `RestrictTo.Scope` arguments.");
            }
            (restriction.has(RestrictScope::Subclasses) && matches!(decl, DeclRef::Class(_)))
                .then_some("RestrictTo.Scope.SUBCLASSES should only be specified on methods and fields")
        }
        _ => None,
    }
}

impl Detector for AnnotationUsageDetector {
    fn issues(&self) -> &'static [Issue] {
        &[Issue::SupportAnnotationUsage]
    }

    fn check_unit(&self, cx: &UnitContext<'_, '_>, out: &mut Vec<Finding>) {
        for (decl, resolved) in cx.table.entries() {
            if resolved.unit != cx.unit_index {
                continue;
            }
            let ty = declared_type(cx.index, decl);
            if let Some(message) = problem(decl, resolved, ty) {
                out.push(Finding::new(
                    Issue::SupportAnnotationUsage,
                    cx.location(resolved.annotation.span),
                    message,
                ));
            }
        }
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
import androidx.annotation.FloatRange;
import androidx.annotation.IntDef;
import androidx.annotation.IntRange;
import androidx.annotation.RestrictTo;
import androidx.annotation.Size;
public class Usage {{
    public static final int A = 0;
    public static final int B = 1;
    @IntDef({{A, B}}) @interface Mode {{}}
{}
}}
"#,
            body
        );
        messages("src/main/java/test/pkg/Usage.java", &source, Box::new(AnnotationUsageDetector::new()))
    }

    #[test]
    fn test_ranges() {
        let found = java(
            r#"
    void a(@IntRange(from = 10, to = 5) int x) {}
    void b(@FloatRange(from = 1.0, to = 0.5) float x) {}
    void c(@IntRange(from = 0, to = 5) int ok, @FloatRange(from = 0.0, to = 1.0) float fine) {}
"#,
        );
        assert_eq!(
            found,
            vec![
                "Invalid range: the `from` attribute must be less than the `to` attribute",
                "Invalid range: the `from` attribute must be less than the `to` attribute",
            ]
        );
    }

    #[test]
    fn test_sizes() {
        let found = java(
            r#"
    void a(@Size(min = 5, max = 2) int[] x) {}
    void b(@Size(multiple = 0) int[] x) {}
    void c(@Size(-1) int[] x) {}
    void d(@Size(min = 1, max = 4, multiple = 2) int[] ok) {}
"#,
        );
        assert_eq!(
            found,
            vec![
                "Invalid size range: the `min` attribute must be less than the `max` attribute",
                "The size multiple must be at least 1",
                "The size can't be negative",
            ]
        );
    }

    #[test]
    fn test_typedef_on_string() {
        let found = java(
            r#"
    @Mode String name;
    @Mode int mode;
"#,
        );
        assert_eq!(
            found,
            vec!["This annotation does not apply for type String; expected int or long"]
        );
    }

    #[test]
    fn test_restrict_to_usage() {
        let found = java(
            r#"
    @RestrictTo()
    void nothing() {}
    @RestrictTo(RestrictTo.Scope.SUBCLASSES)
    static class Helper {}
    @RestrictTo(RestrictTo.Scope.SUBCLASSES)
    protected void hook() {}
"#,
        );
        assert_eq!(
            found,
            vec![
                "Restrict to what? Expected at least one `RestrictTo.Scope` arguments.",
                "RestrictTo.Scope.SUBCLASSES should only be specified on methods and fields",
            ]
        );
    }
}
