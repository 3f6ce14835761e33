//! Restricted API Detector
//!
//! Enforces `@RestrictTo` scopes and the Play services `@Hide` marker on
//! calls, constructor invocations, method references and field accesses.
//!
//! ## Scopes
//!
//! - `SUBCLASSES`: the call must come from a subclass of the declaring class
//!   (or a non-static class nested in one), unqualified or through `this`,
//!   `super`, or a receiver typed as that subclass
//! - `TESTS`: the call must come from test sources or from a declaration
//!   marked `@VisibleForTesting` / `@RestrictTo(TESTS)`
//! - `LIBRARY`, `LIBRARY_GROUP`, `LIBRARY_GROUP_PREFIX`: compared against
//!   the module coordinates from the configuration
//! - `@Hide`: only the internal framework packages may call it
//!
//! Calls from within the declaring class itself are never reported.

use super::Detector;
use crate::analysis::constraints::{RestrictScope, Restriction};
use crate::analysis::walker::{CallSite, Callee, UnitContext};
use crate::analysis::{Finding, Issue};
use crate::ast::{ClassKind, ExprKind};
use crate::graph::{ClassId, DeclarationIndex};

pub struct RestrictToDetector;

impl RestrictToDetector {
    pub fn new() -> Self {
        Self
    }
}

impl Default for RestrictToDetector {
    fn default() -> Self {
        Self::new()
    }
}

/// Nested classes without access to an outer instance
fn is_static_class(index: &DeclarationIndex<'_>, class: ClassId) -> bool {
    let decl = index.class(class).decl;
    decl.kind != ClassKind::Class || decl.modifiers.iter().any(|m| m == "static")
}

fn group_of(coordinate: &str) -> &str {
    coordinate.split(':').next().unwrap_or(coordinate)
}

fn group_prefix(group: &str) -> &str {
    match group.rfind('.') {
        Some(dot) => &group[..dot],
        None => group,
    }
}

fn from_group(caller: Option<&str>) -> String {
    match caller {
        Some(group) => format!(" from groupId={}", group),
        None => String::new(),
    }
}

impl RestrictToDetector {
    fn from_subclass<'a>(&self, cx: &UnitContext<'_, 'a>, site: &CallSite<'_, 'a>, owner: ClassId) -> bool {
        let Some(class) = site.class else {
            return false;
        };
        let mut subclass = None;
        for candidate in cx.index.class_chain(class) {
            if cx.index.inherits_from(candidate, owner) {
                subclass = Some(candidate);
                break;
            }
            if is_static_class(cx.index, candidate) {
                break;
            }
        }
        let Some(subclass) = subclass else {
            return false;
        };
        let Some(receiver) = site.receiver else {
            return true;
        };
        if matches!(receiver.skip_parens().kind, ExprKind::This | ExprKind::Super) {
            return true;
        }
        match cx.type_of(receiver, site.env) {
            Some(ty) => ty == subclass || cx.index.inherits_from(ty, subclass),
            None => true,
        }
    }

    /// Where the API may be used from, when the call site is outside it
    fn violation<'a>(
        &self,
        cx: &UnitContext<'_, 'a>,
        site: &CallSite<'_, 'a>,
        restriction: &Restriction,
    ) -> Option<Option<String>> {
        let owner = site.callee.owner();
        let caller = cx.unit.coordinate.as_deref();
        let callee = cx.index.unit_of(owner).coordinate.as_deref();

        if restriction.has(RestrictScope::LibraryGroup) {
            if let Some(callee) = callee {
                let group = group_of(callee);
                if caller.map(group_of) != Some(group) {
                    return Some(Some(format!(
                        "from within the same library group (referenced groupId={}{})",
                        group,
                        from_group(caller.map(group_of))
                    )));
                }
            }
        } else if restriction.has(RestrictScope::LibraryGroupPrefix) {
            if let Some(callee) = callee {
                let group = group_of(callee);
                let prefix = group_prefix(group);
                if caller.map(|c| group_prefix(group_of(c))) != Some(prefix) {
                    return Some(Some(format!(
                        "from within the same library group prefix (referenced groupId={} with prefix {}{})",
                        group,
                        prefix,
                        from_group(caller.map(group_of))
                    )));
                }
            }
        } else if restriction.has(RestrictScope::Library) {
            if let Some(callee) = callee {
                if caller != Some(callee) {
                    return Some(Some(format!("from within the same library ({})", callee)));
                }
            }
        }

        if restriction.has(RestrictScope::Tests) && !site.in_test_context {
            return Some(Some("from tests".to_string()));
        }

        if restriction.has(RestrictScope::Hidden) {
            let package = &cx.unit.package;
            let internal = cx
                .config
                .internal_package_prefixes
                .iter()
                .any(|prefix| package.starts_with(prefix.as_str()));
            if !internal {
                return Some(None);
            }
        }

        if restriction.has(RestrictScope::Subclasses) && !self.from_subclass(cx, site, owner) {
            return Some(Some("from subclasses".to_string()));
        }
        None
    }
}

impl Detector for RestrictToDetector {
    fn issues(&self) -> &'static [Issue] {
        &[Issue::RestrictedApi]
    }

    fn check_call<'a>(&self, cx: &UnitContext<'_, 'a>, site: &CallSite<'_, 'a>, out: &mut Vec<Finding>) {
        let Some(restriction) = cx.table.restriction(site.callee.decl()) else {
            return;
        };
        if restriction.scopes.is_empty() {
            return;
        }
        let owner = site.callee.owner();
        if let Some(class) = site.class {
            if cx.index.class_chain(class).contains(&owner) {
                return;
            }
        }
        let Some(where_) = self.violation(cx, site, &restriction) else {
            return;
        };

        let api = cx.callee_label(site.callee);
        let message = match where_ {
            None => format!("{} is marked as internal and should not be accessed from apps", api),
            Some(where_) => {
                let verb = match site.callee {
                    Callee::Field(_) => "accessed",
                    _ => "called",
                };
                format!("{} can only be {} {}", api, verb, where_)
            }
        };
        out.push(Finding::new(Issue::RestrictedApi, cx.location(site.name_span), message));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::detectors::test_support::{messages, run_units, run_with_config, unit};
    use crate::config::Config;

    #[test]
    fn test_subclass_scope() {
        let source = r#"
package test.pkg;
import androidx.annotation.RestrictTo;
public class Base {
    @RestrictTo(RestrictTo.Scope.SUBCLASSES)
    public void hook() {}
    void self() { hook(); }
}
class Sub extends Base {
    void ok() {
        hook();
        this.hook();
        super.hook();
    }
    void viaBase(Base other) {
        other.hook();
    }
    class Inner {
        void inner() { hook(); }
    }
    static class Nested {
        void nested() { new Base().hook(); }
    }
}
class Unrelated {
    void call(Base b) {
        b.hook();
    }
}
"#;
        let found = messages("src/main/java/test/pkg/Base.java", source, Box::new(RestrictToDetector::new()));
        assert_eq!(
            found,
            vec![
                "Base.hook can only be called from subclasses",
                "Base.hook can only be called from subclasses",
                "Base.hook can only be called from subclasses",
            ]
        );
    }

    #[test]
    fn test_tests_scope_and_test_context() {
        let api = unit(
            "src/main/java/test/pkg/Api.java",
            r#"
package test.pkg;
import androidx.annotation.RestrictTo;
import androidx.annotation.VisibleForTesting;
public class Api {
    @RestrictTo(RestrictTo.Scope.TESTS)
    public static void reset() {}
    @RestrictTo(RestrictTo.Scope.TESTS)
    public static int COUNTER = 0;
}
class Production {
    void run() {
        Api.reset();
        int c = Api.COUNTER;
    }
    @VisibleForTesting
    void helper() {
        Api.reset();
    }
}
"#,
        );
        let test = unit(
            "src/test/java/test/pkg/ApiTest.java",
            r#"
package test.pkg;
public class ApiTest {
    void testReset() {
        Api.reset();
    }
}
"#,
        );
        let found: Vec<String> = run_units(&[api, test], Box::new(RestrictToDetector::new()))
            .into_iter()
            .map(|f| f.message)
            .collect();
        assert_eq!(
            found,
            vec![
                "Api.reset can only be called from tests",
                "Api.COUNTER can only be accessed from tests",
            ]
        );
    }

    #[test]
    fn test_class_level_restriction_and_member_override() {
        let source = r#"
package test.pkg;
import androidx.annotation.RestrictTo;
@RestrictTo(RestrictTo.Scope.TESTS)
public class Internal {
    public static void a() {}
    @RestrictTo(RestrictTo.Scope.SUBCLASSES)
    protected static void b() {}
}
class Caller {
    void call() {
        Internal.a();
        Internal.b();
    }
}
"#;
        let found = messages("src/main/java/test/pkg/Internal.java", source, Box::new(RestrictToDetector::new()));
        assert_eq!(
            found,
            vec![
                "Internal.a can only be called from tests",
                "Internal.b can only be called from subclasses",
            ]
        );
    }

    #[test]
    fn test_override_does_not_inherit_restriction() {
        let source = r#"
package test.pkg;
import androidx.annotation.RestrictTo;
public class Base {
    @RestrictTo(RestrictTo.Scope.SUBCLASSES)
    protected void hook() {}
}
class Open extends Base {
    @Override
    protected void hook() {}
}
class Unrelated {
    void call(Open open, Base base) {
        open.hook();
        base.hook();
    }
}
"#;
        let found = messages("src/main/java/test/pkg/Base.java", source, Box::new(RestrictToDetector::new()));
        assert_eq!(found, vec!["Base.hook can only be called from subclasses"]);
    }

    fn library_units(caller: &str, callee: &str) -> Vec<crate::ast::SourceUnit> {
        let mut lib = unit(
            "lib/src/main/java/lib/pkg/Lib.java",
            r#"
package lib.pkg;
import androidx.annotation.RestrictTo;
public class Lib {
    @RestrictTo(RestrictTo.Scope.LIBRARY_GROUP)
    public static void group() {}
    @RestrictTo(RestrictTo.Scope.LIBRARY_GROUP_PREFIX)
    public static void prefix() {}
    @RestrictTo(RestrictTo.Scope.LIBRARY)
    public static void library() {}
}
"#,
        );
        lib.coordinate = Some(callee.to_string());
        let mut app = unit(
            "app/src/main/java/app/pkg/App.java",
            r#"
package app.pkg;
import lib.pkg.Lib;
public class App {
    void run() {
        Lib.group();
        Lib.prefix();
        Lib.library();
    }
}
"#,
        );
        app.coordinate = Some(caller.to_string());
        vec![app, lib]
    }

    fn library_messages(caller: &str, callee: &str) -> Vec<String> {
        run_units(&library_units(caller, callee), Box::new(RestrictToDetector::new()))
            .into_iter()
            .map(|f| f.message)
            .collect()
    }

    #[test]
    fn test_library_scopes() {
        assert_eq!(
            library_messages("com.example.app:app", "androidx.core:core"),
            vec![
                "Lib.group can only be called from within the same library group (referenced groupId=androidx.core from groupId=com.example.app)",
                "Lib.prefix can only be called from within the same library group prefix (referenced groupId=androidx.core with prefix androidx from groupId=com.example.app)",
                "Lib.library can only be called from within the same library (androidx.core:core)",
            ]
        );
        assert_eq!(
            library_messages("androidx.appcompat:appcompat", "androidx.core:core"),
            vec![
                "Lib.group can only be called from within the same library group (referenced groupId=androidx.core from groupId=androidx.appcompat)",
                "Lib.library can only be called from within the same library (androidx.core:core)",
            ]
        );
        assert!(library_messages("androidx.core:core", "androidx.core:core").is_empty());
    }

    #[test]
    fn test_hidden_api() {
        let lib = r#"
package com.google.android.gms.common;
import com.google.android.gms.common.internal.Hide;
public class Services {
    @Hide
    public static void secret() {}
}
"#;
        let app = r#"
package com.example.app;
import com.google.android.gms.common.Services;
public class App {
    void run() { Services.secret(); }
}
"#;
        let internal = r#"
package com.google.android.gms.maps;
import com.google.android.gms.common.Services;
public class Maps {
    void run() { Services.secret(); }
}
"#;
        let units = vec![
            unit("gms/Services.java", lib),
            unit("app/App.java", app),
            unit("gms/Maps.java", internal),
        ];
        let found: Vec<String> = run_with_config(&units, Box::new(RestrictToDetector::new()), &Config::default())
            .into_iter()
            .map(|f| f.message)
            .collect();
        assert_eq!(
            found,
            vec!["Services.secret is marked as internal and should not be accessed from apps"]
        );
    }
}
