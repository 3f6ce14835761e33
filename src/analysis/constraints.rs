//! Decoded annotation constraints
//!
//! Each recognised annotation is decoded once into an
//! [`AnnotationConstraint`]. Range-like constraints know how to check an exact
//! value, describe themselves, and decide whether another range or size
//! constraint fits inside them.

use super::value::{format_java_float, SymbolicValue, ValueRange};
use crate::ast::Span;
use crate::graph::{ClassId, FieldId};

#[derive(Debug, Clone, PartialEq)]
pub enum AnnotationConstraint {
    IntRange(IntRangeConstraint),
    FloatRange(FloatRangeConstraint),
    Size(SizeConstraint),
    Typedef(TypedefConstraint),
    Threads(Vec<ThreadContext>),
    Restriction(Restriction),
    VisibleForTesting(Visibility),
}

// ============================================================================
// Numeric ranges
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IntRangeConstraint {
    pub from: i64,
    pub to: i64,
}

impl Default for IntRangeConstraint {
    fn default() -> Self {
        Self {
            from: i64::MIN,
            to: i64::MAX,
        }
    }
}

impl IntRangeConstraint {
    pub fn is_valid(&self) -> bool {
        self.from <= self.to
    }

    pub fn describe(&self) -> String {
        match (self.from != i64::MIN, self.to != i64::MAX) {
            (true, true) => format!("Value must be ≥ {} and ≤ {}", self.from, self.to),
            (true, false) => format!("Value must be ≥ {}", self.from),
            (false, true) => format!("Value must be ≤ {}", self.to),
            (false, false) => "Value can be any integer".to_string(),
        }
    }

    /// Violation message for an exactly known value
    pub fn check(&self, value: &SymbolicValue) -> Option<String> {
        let v = value.as_i64()?;
        if v < self.from {
            Some(format!("Value must be ≥ {} (was {})", self.from, value.display()))
        } else if v > self.to {
            Some(format!("Value must be ≤ {} (was {})", self.to, value.display()))
        } else {
            None
        }
    }

    /// Whether every value of `actual` satisfies this constraint
    pub fn contains(&self, actual: &ValueRange) -> bool {
        !self.escapes_below(actual) && !self.escapes_above(actual)
    }

    pub fn describe_delta(&self, actual: &ValueRange, label: Option<&str>) -> String {
        let edge = if self.escapes_below(actual) {
            format!("< {}", self.from)
        } else {
            format!("> {}", self.to)
        };
        delta_message(&self.describe(), label, &edge)
    }

    fn escapes_below(&self, actual: &ValueRange) -> bool {
        if self.from == i64::MIN {
            return false;
        }
        if !actual.integral {
            return actual.min < self.from as f64;
        }
        let (min, _) = integral_bounds(actual);
        !matches!(min, Some(min) if min >= i128::from(self.from))
    }

    fn escapes_above(&self, actual: &ValueRange) -> bool {
        if self.to == i64::MAX {
            return false;
        }
        if !actual.integral {
            return actual.max > self.to as f64;
        }
        let (_, max) = integral_bounds(actual);
        !matches!(max, Some(max) if max <= i128::from(self.to))
    }
}

/// Smallest and largest integer of `range`; `None` is an open side
fn integral_bounds(range: &ValueRange) -> (Option<i128>, Option<i128>) {
    let edge = |exact: Option<i64>, approx: f64| match exact {
        Some(v) => Some(i128::from(v)),
        None if approx.is_finite() => Some(approx as i128),
        None => None,
    };
    let min = edge(range.exact_min, range.min).map(|v| v + i128::from(!range.min_inclusive));
    let max = edge(range.exact_max, range.max).map(|v| v - i128::from(!range.max_inclusive));
    (min, max)
}

fn delta_message(allowed: &str, label: Option<&str>, edge: &str) -> String {
    match label {
        Some(label) => format!("{} but `{}` can be {}", allowed, label, edge),
        None => format!("{} but can be {}", allowed, edge),
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FloatRangeConstraint {
    pub from: f64,
    pub to: f64,
    pub from_inclusive: bool,
    pub to_inclusive: bool,
}

impl Default for FloatRangeConstraint {
    fn default() -> Self {
        Self {
            from: f64::NEG_INFINITY,
            to: f64::INFINITY,
            from_inclusive: true,
            to_inclusive: true,
        }
    }
}

impl FloatRangeConstraint {
    pub fn is_valid(&self) -> bool {
        self.from < self.to || (self.from == self.to && self.from_inclusive && self.to_inclusive)
    }

    fn lower_text(&self) -> String {
        let op = if self.from_inclusive { "≥" } else { ">" };
        format!("{} {}", op, format_java_float(self.from, None))
    }

    fn upper_text(&self) -> String {
        let op = if self.to_inclusive { "≤" } else { "<" };
        format!("{} {}", op, format_java_float(self.to, None))
    }

    pub fn describe(&self) -> String {
        match (self.from.is_finite(), self.to.is_finite()) {
            (true, true) => format!(
                "Value must be {} and {}",
                self.lower_text(),
                self.upper_text()
            ),
            (true, false) => format!("Value must be {}", self.lower_text()),
            (false, true) => format!("Value must be {}", self.upper_text()),
            (false, false) => "Value can be any number".to_string(),
        }
    }

    fn below(&self, v: f64) -> bool {
        if self.from_inclusive {
            v < self.from
        } else {
            v <= self.from
        }
    }

    fn above(&self, v: f64) -> bool {
        if self.to_inclusive {
            v > self.to
        } else {
            v >= self.to
        }
    }

    pub fn check(&self, value: &SymbolicValue) -> Option<String> {
        let v = value.as_f64()?;
        if self.below(v) {
            Some(format!(
                "Value must be {} (was {})",
                self.lower_text(),
                value.display()
            ))
        } else if self.above(v) {
            Some(format!(
                "Value must be {} (was {})",
                self.upper_text(),
                value.display()
            ))
        } else {
            None
        }
    }

    fn lower_fits(&self, actual: &ValueRange) -> bool {
        actual.min > self.from
            || (actual.min == self.from && (self.from_inclusive || !actual.min_inclusive))
    }

    fn upper_fits(&self, actual: &ValueRange) -> bool {
        actual.max < self.to
            || (actual.max == self.to && (self.to_inclusive || !actual.max_inclusive))
    }

    pub fn contains(&self, actual: &ValueRange) -> bool {
        self.lower_fits(actual) && self.upper_fits(actual)
    }

    pub fn describe_delta(&self, actual: &ValueRange, label: Option<&str>) -> String {
        let edge = if !self.lower_fits(actual) {
            let op = if self.from_inclusive { "<" } else { "≤" };
            format!("{} {}", op, format_java_float(self.from, None))
        } else {
            let op = if self.to_inclusive { ">" } else { "≥" };
            format!("{} {}", op, format_java_float(self.to, None))
        };
        delta_message(&self.describe(), label, &edge)
    }
}

// ============================================================================
// Sizes
// ============================================================================

/// `@Size`: exact value, bounds and multiple; `None` means unspecified
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SizeConstraint {
    pub exact: Option<i64>,
    pub min: Option<i64>,
    pub max: Option<i64>,
    pub multiple: Option<i64>,
}

impl SizeConstraint {
    fn min_bound(&self) -> i64 {
        self.exact.or(self.min).unwrap_or(0)
    }

    fn max_bound(&self) -> Option<i64> {
        self.exact.or(self.max)
    }

    fn effective_multiple(&self) -> Option<i64> {
        self.multiple.filter(|m| *m > 1)
    }

    pub fn describe(&self) -> String {
        let mut text = match (self.exact, self.min, self.max) {
            (Some(exact), _, _) => format!("Size must be exactly {}", exact),
            (None, Some(min), Some(max)) => {
                format!("Size must be at least {} and at most {}", min, max)
            }
            (None, Some(min), None) => format!("Size must be at least {}", min),
            (None, None, Some(max)) => format!("Size must be at most {}", max),
            (None, None, None) => String::new(),
        };
        if let Some(multiple) = self.effective_multiple() {
            if text.is_empty() {
                text = format!("Size must be a multiple of {}", multiple);
            } else {
                text.push_str(&format!(" and a multiple of {}", multiple));
            }
        }
        text
    }

    /// Violation message for a known size; `unit` is `length` or `size`
    pub fn check(&self, size: i64, unit: &str) -> Option<String> {
        if let Some(exact) = self.exact {
            if size != exact {
                return Some(format!("Expected {} {} (was {})", unit, exact, size));
            }
        }
        if let Some(min) = self.min {
            if size < min {
                return Some(format!("Expected {} ≥ {} (was {})", unit, min, size));
            }
        }
        if let Some(max) = self.max {
            if size > max {
                return Some(format!("Expected {} ≤ {} (was {})", unit, max, size));
            }
        }
        if let Some(multiple) = self.effective_multiple() {
            let base = self.min.unwrap_or(0);
            let offset = size - base;
            if offset.rem_euclid(multiple) != 0 {
                let lower = base + offset.div_euclid(multiple) * multiple;
                return Some(format!(
                    "Expected {} to be a multiple of {} (was {} and should be either {} or {})",
                    unit,
                    multiple,
                    size,
                    lower,
                    lower + multiple
                ));
            }
        }
        None
    }

    /// Whether every size allowed by `other` is allowed here
    pub fn contains(&self, other: &SizeConstraint) -> bool {
        if let Some(exact) = self.exact {
            return other.exact == Some(exact);
        }
        if other.min_bound() < self.min.unwrap_or(0) {
            return false;
        }
        match (self.max, other.max_bound()) {
            (Some(_), None) => return false,
            (Some(max), Some(other_max)) if other_max > max => return false,
            _ => {}
        }
        match self.effective_multiple() {
            None => true,
            Some(multiple) => match (other.exact, other.effective_multiple()) {
                (Some(exact), _) => exact % multiple == 0,
                (None, Some(other_multiple)) => other_multiple % multiple == 0,
                (None, None) => false,
            },
        }
    }

    pub fn describe_delta(&self, other: &SizeConstraint, label: Option<&str>) -> String {
        let edge = if let Some(exact) = other.exact {
            exact.to_string()
        } else if other.min_bound() < self.min_bound() {
            format!("< {}", self.min_bound())
        } else if let Some(max) = self.max_bound().filter(|max| {
            other.max_bound().map_or(true, |other_max| other_max > *max)
        }) {
            format!("> {}", max)
        } else if let Some(exact) = self.exact {
            if other.min_bound() != exact {
                other.min_bound().to_string()
            } else {
                format!("> {}", exact)
            }
        } else {
            match self.effective_multiple() {
                Some(multiple) => match other.first_size_not_multiple_of(multiple) {
                    Some(size) => size.to_string(),
                    None => format!("a size that is not a multiple of {}", multiple),
                },
                None => "outside this range".to_string(),
            }
        };
        delta_message(&self.describe(), label, &edge)
    }

    fn first_size_not_multiple_of(&self, multiple: i64) -> Option<i64> {
        let step = self.effective_multiple().unwrap_or(1);
        let mut size = self.min_bound();
        if size % step != 0 {
            size += step - size % step;
        }
        for _ in 0..1000 {
            if self.max_bound().is_some_and(|max| size > max) {
                return None;
            }
            if size % multiple != 0 {
                return Some(size);
            }
            size += step;
        }
        None
    }
}

// ============================================================================
// Typedefs
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypedefKind {
    Int,
    Long,
    String,
}

impl TypedefKind {
    pub fn type_name(&self) -> &'static str {
        match self {
            TypedefKind::Int => "int",
            TypedefKind::Long => "long",
            TypedefKind::String => "String",
        }
    }
}

/// One allowed entry of an `@IntDef`/`@LongDef`/`@StringDef`
#[derive(Debug, Clone, PartialEq)]
pub struct TypedefValue {
    /// `Owner.NAME` for constants, literal text otherwise
    pub label: String,
    /// Text as written inside the annotation
    pub written: String,
    pub field: Option<FieldId>,
    pub value: SymbolicValue,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TypedefConstraint {
    pub values: Vec<TypedefValue>,
    pub flag: bool,
    pub open: bool,
    pub kind: TypedefKind,
    /// The annotation class declaring the typedef, for `@Mode` style usage
    pub declaration: Option<ClassId>,
}

impl TypedefConstraint {
    pub fn describe_allowed(&self) -> String {
        let labels: Vec<&str> = self.values.iter().map(|v| v.label.as_str()).collect();
        if self.flag {
            format!("Must be one or more of: {}", labels.join(", "))
        } else {
            format!("Must be one of: {}", labels.join(", "))
        }
    }

    pub fn allows_field(&self, field: FieldId) -> bool {
        self.values.iter().any(|v| v.field == Some(field))
    }

    /// Allowed entry with an equal value
    pub fn entry_with_value(&self, value: &SymbolicValue) -> Option<&TypedefValue> {
        if value.is_unknown() {
            return None;
        }
        self.values.iter().find(|v| same_value(&v.value, value))
    }

    /// Literal entries (`@IntDef({0, 1})`) with an equal value
    pub fn literal_allows(&self, value: &SymbolicValue) -> bool {
        self.values
            .iter()
            .any(|v| v.field.is_none() && same_value(&v.value, value))
    }

    /// Entries of `other` that this typedef does not accept
    pub fn missing_from<'b>(&self, other: &'b TypedefConstraint) -> Vec<&'b str> {
        other
            .values
            .iter()
            .filter(|candidate| {
                !self.values.iter().any(|mine| {
                    (mine.field.is_some() && mine.field == candidate.field)
                        || same_value(&mine.value, &candidate.value)
                })
            })
            .map(|v| v.label.as_str())
            .collect()
    }
}

/// Value equality across int/long/char representations
pub fn same_value(a: &SymbolicValue, b: &SymbolicValue) -> bool {
    if a.is_unknown() || b.is_unknown() {
        return false;
    }
    match (a.as_i64(), b.as_i64()) {
        (Some(x), Some(y)) => x == y,
        _ => a == b,
    }
}

// ============================================================================
// Threads, restrictions, visibility
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ThreadContext {
    Ui,
    Main,
    Worker,
    Binder,
    Any,
}

impl ThreadContext {
    pub fn label(&self) -> &'static str {
        match self {
            ThreadContext::Ui => "UI",
            ThreadContext::Main => "main",
            ThreadContext::Worker => "worker",
            ThreadContext::Binder => "binder",
            ThreadContext::Any => "any",
        }
    }

    /// Whether code running on `self` may call something requiring `required`
    pub fn satisfies(&self, required: ThreadContext) -> bool {
        if required == ThreadContext::Any || *self == required {
            return true;
        }
        matches!(
            (self, required),
            (ThreadContext::Ui, ThreadContext::Main) | (ThreadContext::Main, ThreadContext::Ui)
        )
    }
}

/// `caller` contexts are compatible with `callee` when each one satisfies at
/// least one required context; empty sets are unconstrained
pub fn threads_compatible(caller: &[ThreadContext], callee: &[ThreadContext]) -> bool {
    if caller.is_empty() || callee.is_empty() {
        return true;
    }
    caller
        .iter()
        .all(|c| callee.iter().any(|required| c.satisfies(*required)))
}

pub fn describe_threads(threads: &[ThreadContext], joiner: &str) -> String {
    let labels: Vec<&str> = threads.iter().map(|t| t.label()).collect();
    format!("{} thread", labels.join(joiner))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RestrictScope {
    Library,
    LibraryGroup,
    LibraryGroupPrefix,
    Tests,
    Subclasses,
    /// `@Hide`: only callable from the internal framework packages
    Hidden,
}

impl RestrictScope {
    pub fn from_name(name: &str) -> Option<Self> {
        Some(match name {
            "LIBRARY" => RestrictScope::Library,
            "LIBRARY_GROUP" | "GROUP_ID" => RestrictScope::LibraryGroup,
            "LIBRARY_GROUP_PREFIX" => RestrictScope::LibraryGroupPrefix,
            "TESTS" => RestrictScope::Tests,
            "SUBCLASSES" => RestrictScope::Subclasses,
            _ => return None,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Restriction {
    pub scopes: Vec<RestrictScope>,
}

impl Restriction {
    pub fn has(&self, scope: RestrictScope) -> bool {
        self.scopes.contains(&scope)
    }
}

/// `VisibleForTesting(otherwise = ...)`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Visibility {
    Private,
    PackagePrivate,
    Protected,
    /// Only tests may use it
    None,
}

impl Visibility {
    pub fn from_name(name: &str) -> Option<Self> {
        Some(match name {
            "PRIVATE" => Visibility::Private,
            "PACKAGE_PRIVATE" => Visibility::PackagePrivate,
            "PROTECTED" => Visibility::Protected,
            "NONE" => Visibility::None,
            _ => return None,
        })
    }

    pub fn from_code(code: i64) -> Option<Self> {
        Some(match code {
            2 => Visibility::Private,
            3 => Visibility::PackagePrivate,
            4 => Visibility::Protected,
            5 => Visibility::None,
            _ => return None,
        })
    }

    pub fn scope_name(&self) -> &'static str {
        match self {
            Visibility::Private => "private",
            Visibility::PackagePrivate => "package private",
            Visibility::Protected => "protected",
            Visibility::None => "test",
        }
    }
}
