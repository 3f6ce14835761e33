//! VisibleForTesting Detector
//!
//! A member annotated `@VisibleForTesting(otherwise = ...)` is only public for
//! the benefit of tests. Production code must respect the visibility it would
//! otherwise have:
//!
//! - `PRIVATE` (the default): same file only
//! - `PACKAGE_PRIVATE`: same package
//! - `PROTECTED`: same package or a subclass
//! - `NONE`: tests only

use super::Detector;
use crate::analysis::constraints::Visibility;
use crate::analysis::walker::{CallSite, Callee, UnitContext};
use crate::analysis::{Finding, Issue};

pub struct VisibleForTestingDetector;

impl VisibleForTestingDetector {
    pub fn new() -> Self {
        Self
    }
}

impl Default for VisibleForTestingDetector {
    fn default() -> Self {
        Self::new()
    }
}

impl Detector for VisibleForTestingDetector {
    fn issues(&self) -> &'static [Issue] {
        &[Issue::VisibleForTests]
    }

    fn check_call<'a>(&self, cx: &UnitContext<'_, 'a>, site: &CallSite<'_, 'a>, out: &mut Vec<Finding>) {
        let Some(visibility) = cx.table.visibility(site.callee.decl()) else {
            return;
        };
        if site.in_test_context {
            return;
        }
        let owner = site.callee.owner();
        let owner_unit = cx.index.class(owner).unit;
        if owner_unit == cx.unit_index {
            return;
        }

        let same_package = cx.index.unit(owner_unit).package == cx.unit.package;
        let allowed = match visibility {
            Visibility::Private | Visibility::None => false,
            Visibility::PackagePrivate => same_package,
            Visibility::Protected => {
                same_package
                    || site.class.is_some_and(|class| {
                        cx.index
                            .class_chain(class)
                            .into_iter()
                            .any(|c| cx.index.inherits_from(c, owner))
                    })
            }
        };
        if allowed {
            return;
        }

        let kind = match site.callee {
            Callee::Field(_) => "field",
            _ => "method",
        };
        let message = match visibility {
            Visibility::None => format!("This {} should only be accessed from tests", kind),
            other => format!(
                "This {} should only be accessed from tests or within {} scope",
                kind,
                other.scope_name()
            ),
        };
        out.push(Finding::new(Issue::VisibleForTests, cx.location(site.name_span), message));
    }
}
