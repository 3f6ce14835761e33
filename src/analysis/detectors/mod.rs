// Annotation checkers
// Each detector reacts to the sites the walker hands it and reports findings
// for the issues it owns.

mod annotation_usage;
mod range;
mod restrict_to;
mod shift_flags;
mod switch_intdef;
mod typedef;
mod unique_constants;
mod visible_for_testing;
mod wrong_thread;

pub use annotation_usage::AnnotationUsageDetector;
pub use range::RangeDetector;
pub use restrict_to::RestrictToDetector;
pub use shift_flags::ShiftFlagsDetector;
pub use switch_intdef::SwitchIntDefDetector;
pub use typedef::TypedefDetector;
pub use unique_constants::UniqueConstantsDetector;
pub use visible_for_testing::VisibleForTestingDetector;
pub use wrong_thread::WrongThreadDetector;

use super::walker::{CallSite, SwitchSite, UnitContext, ValueSite};
use super::{Finding, Issue};

/// Trait for annotation checkers
///
/// All hooks default to doing nothing; a detector overrides the ones that
/// matter for its issues.
pub trait Detector: Send + Sync {
    /// Issues this detector can report
    fn issues(&self) -> &'static [Issue];

    /// Declaration-level checks, run once per unit before the walk
    fn check_unit(&self, _cx: &UnitContext<'_, '_>, _out: &mut Vec<Finding>) {}

    /// Calls, constructor invocations, method references and field references
    fn check_call<'a>(&self, _cx: &UnitContext<'_, 'a>, _site: &CallSite<'_, 'a>, _out: &mut Vec<Finding>) {}

    /// Values flowing into annotated fields, locals and returns
    fn check_value<'a>(&self, _cx: &UnitContext<'_, 'a>, _site: &ValueSite<'_, 'a>, _out: &mut Vec<Finding>) {}

    fn check_switch<'a>(&self, _cx: &UnitContext<'_, 'a>, _site: &SwitchSite<'_, 'a>, _out: &mut Vec<Finding>) {}
}

/// Every built-in detector
pub fn all() -> Vec<Box<dyn Detector>> {
    vec![
        Box::new(RangeDetector::new()),
        Box::new(TypedefDetector::new()),
        Box::new(UniqueConstantsDetector::new()),
        Box::new(ShiftFlagsDetector::new()),
        Box::new(SwitchIntDefDetector::new()),
        Box::new(WrongThreadDetector::new()),
        Box::new(RestrictToDetector::new()),
        Box::new(VisibleForTestingDetector::new()),
        Box::new(AnnotationUsageDetector::new()),
    ]
}

/// Detectors owning at least one of `issues`
pub fn for_issues(issues: &[Issue]) -> Vec<Box<dyn Detector>> {
    all()
        .into_iter()
        .filter(|d| d.issues().iter().any(|i| issues.contains(i)))
        .collect()
}
