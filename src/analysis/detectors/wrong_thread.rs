//! Wrong Thread Detector
//!
//! Checks calls against the thread annotations of the callee:
//!
//! ```java
//! @WorkerThread
//! void load() { }
//!
//! @UiThread
//! void onClick() {
//!     load();   // Method load must be called from the worker thread, currently inferred thread is UI thread
//! }
//! ```
//!
//! The required contexts come from the method, the methods it overrides, or
//! its class. The calling context comes from the enclosing method or class,
//! except inside lambdas, method references and anonymous classes passed to
//! a thread-annotated parameter, which run on that parameter's thread.

use super::Detector;
use crate::analysis::constraints::{describe_threads, threads_compatible};
use crate::analysis::walker::{CallSite, Callee, UnitContext};
use crate::analysis::{Finding, Issue};

pub struct WrongThreadDetector;

impl WrongThreadDetector {
    pub fn new() -> Self {
        Self
    }
}

impl Default for WrongThreadDetector {
    fn default() -> Self {
        Self::new()
    }
}

impl Detector for WrongThreadDetector {
    fn issues(&self) -> &'static [Issue] {
        &[Issue::WrongThread]
    }

    fn check_call<'a>(&self, cx: &UnitContext<'_, 'a>, site: &CallSite<'_, 'a>, out: &mut Vec<Finding>) {
        if site.caller_threads.is_empty() {
            return;
        }
        let (required, subject) = match site.callee {
            Callee::Method(method) => (
                cx.table.callee_threads(method),
                format!("Method {}", cx.index.method(method).name),
            ),
            Callee::Constructor { class, method } => (
                match method {
                    Some(method) => cx.table.callee_threads(method),
                    None => cx.table.class_threads(class),
                },
                format!("Constructor {}", cx.index.class(class).simple_name()),
            ),
            Callee::Field(_) => return,
        };
        if threads_compatible(&site.caller_threads, &required) {
            return;
        }
        out.push(Finding::new(
            Issue::WrongThread,
            cx.location(site.name_span),
            format!(
                "{} must be called from the {}, currently inferred thread is {}",
                subject,
                describe_threads(&required, " or "),
                describe_threads(&site.caller_threads, " and ")
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
import androidx.annotation.AnyThread;
import androidx.annotation.BinderThread;
import androidx.annotation.MainThread;
import androidx.annotation.UiThread;
import androidx.annotation.WorkerThread;
public class Threads {{
    @WorkerThread static void compute() {{}}
    @UiThread static void paint() {{}}
    @MainThread static void post() {{}}
    @AnyThread static void log() {{}}
    @UiThread @WorkerThread static void either() {{}}
    static void runOnWorker(@WorkerThread Runnable r) {{}}
    static void runPlain(Runnable r) {{}}
{}
}}
"#,
            body
        );
        messages("src/main/java/test/pkg/Threads.java", &source, Box::new(WrongThreadDetector::new()))
    }

    #[test]
    fn test_direct_calls() {
        let found = java(
            r#"
    @UiThread
    void onClick() {
        compute();
        paint();
        post();
        log();
        either();
    }
"#,
        );
        assert_eq!(
            found,
            vec!["Method compute must be called from the worker thread, currently inferred thread is UI thread"]
        );
    }

    #[test]
    fn test_lambda_inherits_parameter_thread() {
        let found = java(
            r#"
    @UiThread
    void onClick() {
        runOnWorker(() -> compute());
        runOnWorker(Threads::compute);
        runOnWorker(() -> paint());
        runPlain(() -> compute());
    }
"#,
        );
        assert_eq!(
            found,
            vec!["Method paint must be called from the UI thread, currently inferred thread is worker thread"]
        );
    }

    #[test]
    fn test_anonymous_class_and_multiple_caller_contexts() {
        let found = java(
            r#"
    @BinderThread @WorkerThread
    void handle() {
        log();
        paint();
    }
    @UiThread
    void start() {
        runOnWorker(new Runnable() {
            @Override public void run() {
                compute();
            }
        });
    }
"#,
        );
        assert_eq!(
            found,
            vec!["Method paint must be called from the UI thread, currently inferred thread is binder and worker thread"]
        );
    }

    #[test]
    fn test_class_level_annotation_and_constructor() {
        let source = r#"
package test.pkg;
import androidx.annotation.UiThread;
import androidx.annotation.WorkerThread;
@UiThread
class Screen {
    void render() {
        new Loader();
    }
}
@WorkerThread
class Loader {
    Loader() {}
}
"#;
        let found = messages(
            "src/main/java/test/pkg/Screen.java",
            source,
            Box::new(WrongThreadDetector::new()),
        );
        assert_eq!(
            found,
            vec!["Constructor Loader must be called from the worker thread, currently inferred thread is UI thread"]
        );
    }
}
