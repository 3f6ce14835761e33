//! Symbolic values produced by the constant evaluator
//!
//! A value is either exactly known (`Int`, `Str`, `Array`, ...), known to lie
//! in a [`ValueRange`], known to be a multiple of some integer, or `Unknown`.
//! `Unknown` never proves a violation: every comparison involving it answers
//! "no".

use std::fmt;

#[derive(Debug, Clone, PartialEq)]
pub enum SymbolicValue {
    Int(i32),
    Long(i64),
    Float(f32),
    Double(f64),
    Char(char),
    Bool(bool),
    Str(String),
    Null,
    /// Array or collection with known element values
    Array(Vec<SymbolicValue>),
    Range(ValueRange),
    /// Some unknown integral value that is a multiple of `k`
    Multiple(i64),
    Unknown,
}

impl SymbolicValue {
    pub fn is_unknown(&self) -> bool {
        matches!(self, SymbolicValue::Unknown)
    }

    /// Exactly known scalar number
    pub fn is_exact_number(&self) -> bool {
        matches!(
            self,
            SymbolicValue::Int(_)
                | SymbolicValue::Long(_)
                | SymbolicValue::Float(_)
                | SymbolicValue::Double(_)
                | SymbolicValue::Char(_)
        )
    }

    pub fn is_integral(&self) -> bool {
        match self {
            SymbolicValue::Int(_) | SymbolicValue::Long(_) | SymbolicValue::Char(_) => true,
            SymbolicValue::Range(range) => range.integral,
            SymbolicValue::Multiple(_) => true,
            _ => false,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            SymbolicValue::Int(v) => Some(i64::from(*v)),
            SymbolicValue::Long(v) => Some(*v),
            SymbolicValue::Char(c) => Some(i64::from(u32::from(*c))),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            SymbolicValue::Float(v) => Some(f64::from(*v)),
            SymbolicValue::Double(v) => Some(*v),
            other => other.as_i64().map(|v| v as f64),
        }
    }

    /// Element count of arrays and length of strings
    pub fn size(&self) -> Option<usize> {
        match self {
            SymbolicValue::Array(items) => Some(items.len()),
            SymbolicValue::Str(s) => Some(s.chars().count()),
            _ => None,
        }
    }

    /// Range view of exact numbers and ranges
    pub fn to_range(&self) -> Option<ValueRange> {
        match self {
            SymbolicValue::Range(range) => Some(range.clone()),
            SymbolicValue::Float(_) | SymbolicValue::Double(_) => {
                self.as_f64().map(|v| ValueRange::exact(v, false))
            }
            other => other.as_i64().map(ValueRange::exact_integer),
        }
    }

    /// Least upper bound used where two paths meet
    pub fn join(&self, other: &SymbolicValue) -> SymbolicValue {
        if self == other {
            return self.clone();
        }
        let both_numeric = |v: &SymbolicValue| v.is_exact_number() || matches!(v, SymbolicValue::Range(_));
        if both_numeric(self) && both_numeric(other) {
            if let (Some(a), Some(b)) = (self.to_range(), other.to_range()) {
                return SymbolicValue::Range(a.union(&b));
            }
        }
        SymbolicValue::Unknown
    }

    /// Rendering used in messages (`(was 3)`, `(was 2.49)`)
    pub fn display(&self) -> String {
        match self {
            SymbolicValue::Int(v) => v.to_string(),
            SymbolicValue::Long(v) => v.to_string(),
            SymbolicValue::Float(v) => format_java_float(f64::from(*v), Some(*v)),
            SymbolicValue::Double(v) => format_java_float(*v, None),
            SymbolicValue::Char(c) => format!("'{}'", c),
            SymbolicValue::Bool(b) => b.to_string(),
            SymbolicValue::Str(s) => format!("\"{}\"", s),
            SymbolicValue::Null => "null".to_string(),
            SymbolicValue::Array(items) => {
                let parts: Vec<String> = items.iter().map(|i| i.display()).collect();
                format!("{{{}}}", parts.join(", "))
            }
            SymbolicValue::Range(range) => range.to_string(),
            SymbolicValue::Multiple(k) => format!("a multiple of {}", k),
            SymbolicValue::Unknown => "unknown".to_string(),
        }
    }

    /// Text used when concatenated into a string
    pub fn concat_text(&self) -> Option<String> {
        Some(match self {
            SymbolicValue::Str(s) => s.clone(),
            SymbolicValue::Char(c) => c.to_string(),
            SymbolicValue::Null => "null".to_string(),
            SymbolicValue::Int(_)
            | SymbolicValue::Long(_)
            | SymbolicValue::Float(_)
            | SymbolicValue::Double(_)
            | SymbolicValue::Bool(_) => self.display(),
            _ => return None,
        })
    }
}

/// Java's `Float.toString`/`Double.toString` shape: integral values keep `.0`
pub fn format_java_float(value: f64, as_float: Option<f32>) -> String {
    if value.is_nan() {
        return "NaN".to_string();
    }
    if value.is_infinite() {
        return if value > 0.0 { "Infinity" } else { "-Infinity" }.to_string();
    }
    let text = match as_float {
        Some(f) => format!("{:?}", f),
        None => format!("{:?}", value),
    };
    if text.contains('.') || text.contains('e') {
        text
    } else {
        format!("{}.0", text)
    }
}

/// Numeric interval; infinite bounds mean "unbounded"
#[derive(Debug, Clone, PartialEq)]
pub struct ValueRange {
    pub min: f64,
    pub max: f64,
    pub min_inclusive: bool,
    pub max_inclusive: bool,
    pub integral: bool,
    /// Derived from an `if` guard rather than a declaration or a value
    pub inferred: bool,
    /// Exact `long` bounds; `min`/`max` round beyond 2^53
    pub exact_min: Option<i64>,
    pub exact_max: Option<i64>,
}

impl ValueRange {
    pub fn new(min: f64, max: f64, integral: bool) -> Self {
        let (min, max) = if min <= max { (min, max) } else { (max, min) };
        Self {
            min,
            max,
            min_inclusive: true,
            max_inclusive: true,
            integral,
            inferred: false,
            exact_min: None,
            exact_max: None,
        }
    }

    /// Integral range of an `@IntRange`; `i64::MIN`/`i64::MAX` leave a side open
    pub fn integer(from: i64, to: i64) -> Self {
        let (from, to) = if from <= to { (from, to) } else { (to, from) };
        let exact_min = (from != i64::MIN).then_some(from);
        let exact_max = (to != i64::MAX).then_some(to);
        Self {
            exact_min,
            exact_max,
            ..Self::new(
                exact_min.map_or(f64::NEG_INFINITY, |v| v as f64),
                exact_max.map_or(f64::INFINITY, |v| v as f64),
                true,
            )
        }
    }

    pub fn exact_integer(value: i64) -> Self {
        Self {
            exact_min: Some(value),
            exact_max: Some(value),
            ..Self::exact(value as f64, true)
        }
    }

    pub fn exact(value: f64, integral: bool) -> Self {
        Self::new(value, value, integral)
    }

    pub fn at_least(value: f64, integral: bool) -> Self {
        Self::new(value, f64::INFINITY, integral)
    }

    pub fn at_most(value: f64, integral: bool) -> Self {
        Self::new(f64::NEG_INFINITY, value, integral)
    }

    pub fn unbounded(integral: bool) -> Self {
        Self::new(f64::NEG_INFINITY, f64::INFINITY, integral)
    }

    pub fn exclusive_min(mut self) -> Self {
        self.min_inclusive = false;
        self
    }

    pub fn exclusive_max(mut self) -> Self {
        self.max_inclusive = false;
        self
    }

    pub fn inferred(mut self) -> Self {
        self.inferred = true;
        self
    }

    pub fn is_exact(&self) -> bool {
        self.min == self.max && self.min.is_finite()
    }

    /// Open on at least one side
    pub fn is_infinite(&self) -> bool {
        self.min.is_infinite() || self.max.is_infinite()
    }

    pub fn contains_value(&self, value: f64) -> bool {
        let above = if self.min_inclusive {
            value >= self.min
        } else {
            value > self.min
        };
        let below = if self.max_inclusive {
            value <= self.max
        } else {
            value < self.max
        };
        above && below
    }

    /// Smallest range covering both
    pub fn union(&self, other: &ValueRange) -> ValueRange {
        let (min, min_inclusive) = if self.min < other.min {
            (self.min, self.min_inclusive)
        } else if other.min < self.min {
            (other.min, other.min_inclusive)
        } else {
            (self.min, self.min_inclusive || other.min_inclusive)
        };
        let (max, max_inclusive) = if self.max > other.max {
            (self.max, self.max_inclusive)
        } else if other.max > self.max {
            (other.max, other.max_inclusive)
        } else {
            (self.max, self.max_inclusive || other.max_inclusive)
        };
        ValueRange {
            min,
            max,
            min_inclusive,
            max_inclusive,
            integral: self.integral && other.integral,
            inferred: self.inferred || other.inferred,
            exact_min: self.exact_min.zip(other.exact_min).map(|(a, b)| a.min(b)),
            exact_max: self.exact_max.zip(other.exact_max).map(|(a, b)| a.max(b)),
        }
    }

    /// Overlap of both, `None` when disjoint
    pub fn intersect(&self, other: &ValueRange) -> Option<ValueRange> {
        let (min, min_inclusive) = if self.min > other.min {
            (self.min, self.min_inclusive)
        } else if other.min > self.min {
            (other.min, other.min_inclusive)
        } else {
            (self.min, self.min_inclusive && other.min_inclusive)
        };
        let (max, max_inclusive) = if self.max < other.max {
            (self.max, self.max_inclusive)
        } else if other.max < self.max {
            (other.max, other.max_inclusive)
        } else {
            (self.max, self.max_inclusive && other.max_inclusive)
        };
        if min > max || (min == max && !(min_inclusive && max_inclusive)) {
            return None;
        }
        Some(ValueRange {
            min,
            max,
            min_inclusive,
            max_inclusive,
            integral: self.integral || other.integral,
            inferred: self.inferred || other.inferred,
            exact_min: narrowed(self.exact_min, self.min, other.exact_min, other.min, i64::max),
            exact_max: narrowed(self.exact_max, self.max, other.exact_max, other.max, i64::min),
        })
    }

    /// Range moved by `delta`; exact bounds follow an exact integral `delta`
    pub fn shifted(&self, delta: f64, exact_delta: Option<i64>) -> ValueRange {
        let exact = |bound: Option<i64>| {
            bound
                .zip(exact_delta)
                .and_then(|(bound, delta)| bound.checked_add(delta))
        };
        ValueRange {
            min: self.min + delta,
            max: self.max + delta,
            exact_min: exact(self.exact_min),
            exact_max: exact(self.exact_max),
            ..self.clone()
        }
    }

    pub fn negate(&self) -> ValueRange {
        ValueRange {
            min: -self.max,
            max: -self.min,
            min_inclusive: self.max_inclusive,
            max_inclusive: self.min_inclusive,
            integral: self.integral,
            inferred: self.inferred,
            exact_min: self.exact_max.and_then(i64::checked_neg),
            exact_max: self.exact_min.and_then(i64::checked_neg),
        }
    }
}

/// Exact bound of an intersection; an open side leaves the other one
fn narrowed(a: Option<i64>, a_bound: f64, b: Option<i64>, b_bound: f64, pick: fn(i64, i64) -> i64) -> Option<i64> {
    match (a, b) {
        (Some(a), Some(b)) => Some(pick(a, b)),
        (Some(a), None) if b_bound.is_infinite() => Some(a),
        (None, Some(b)) if a_bound.is_infinite() => Some(b),
        _ => None,
    }
}

impl fmt::Display for ValueRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let bound = |v: f64, exact: Option<i64>| match exact {
            Some(exact) => exact.to_string(),
            None if self.integral && v.is_finite() => format!("{}", v as i64),
            None => format_java_float(v, None),
        };
        let open = if self.min_inclusive { '[' } else { '(' };
        let close = if self.max_inclusive { ']' } else { ')' };
        write!(
            f,
            "{}{}, {}{}",
            open,
            bound(self.min, self.exact_min),
            bound(self.max, self.exact_max),
            close
        )
    }
}
