//! Runs a list of scripts one after another and reports everything they
//! produce to a task sink. A failing script never stops the batch.

use std::fmt;
use std::path::{Path, PathBuf};

use log::{debug, info, warn};

use crate::config::Config;
use crate::error::ScriptError;
use crate::model::{Diagnostic, ScriptException, ScriptUnit};
use crate::processor::ScriptRunner;
use crate::project::ProjectResolver;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskCategory {
    BuildCompile,
    Runtime,
    Project,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskSeverity {
    Error,
    Warning,
}

/// One line of the error list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskEntry {
    pub category: TaskCategory,
    pub severity: TaskSeverity,
    /// 0-based; 0 when the location is unknown.
    pub line: u32,
    pub column: u32,
    pub document: PathBuf,
    pub text: String,
    pub code: Option<&'static str>,
    pub help_keyword: Option<String>,
}

impl TaskEntry {
    pub fn from_diagnostic(script: &Path, diag: &Diagnostic) -> Self {
        Self {
            category: TaskCategory::BuildCompile,
            severity: if diag.is_blocking() {
                TaskSeverity::Error
            } else {
                TaskSeverity::Warning
            },
            line: diag.span.line,
            column: diag.span.column,
            document: script.to_path_buf(),
            text: diag.message.clone(),
            code: Some(diag.code),
            help_keyword: diag.help.clone(),
        }
    }

    pub fn from_exception(script: &Path, exception: &ScriptException) -> Self {
        let origin = exception.origin().unwrap_or_default();
        Self {
            line: origin.line,
            column: origin.column,
            ..Self::error(TaskCategory::Runtime, script, exception.message.clone())
        }
    }

    fn error(category: TaskCategory, script: &Path, text: String) -> Self {
        Self {
            category,
            severity: TaskSeverity::Error,
            line: 0,
            column: 0,
            document: script.to_path_buf(),
            text,
            code: None,
            help_keyword: None,
        }
    }
}

impl fmt::Display for TaskEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let severity = match self.severity {
            TaskSeverity::Error => "error",
            TaskSeverity::Warning => "warning",
        };
        write!(
            f,
            "{}:{}:{}: {severity}",
            self.document.display(),
            self.line + 1,
            self.column + 1
        )?;
        if let Some(code) = self.code {
            write!(f, "[{code}]")?;
        }
        write!(f, ": {}", self.text)
    }
}

/// Destination for batch results.
pub trait TaskSink {
    fn clear(&mut self);
    fn add(&mut self, entry: TaskEntry);
}

/// Keeps entries in memory, in the order they were reported.
#[derive(Debug, Default)]
pub struct TaskList {
    pub entries: Vec<TaskEntry>,
}

impl TaskList {
    pub fn errors(&self) -> impl Iterator<Item = &TaskEntry> {
        self.entries
            .iter()
            .filter(|e| e.severity == TaskSeverity::Error)
    }
}

impl TaskSink for TaskList {
    fn clear(&mut self) {
        self.entries.clear();
    }

    fn add(&mut self, entry: TaskEntry) {
        self.entries.push(entry);
    }
}

/// Prints each entry to stdout as it arrives.
#[derive(Debug, Default)]
pub struct ConsoleSink;

impl TaskSink for ConsoleSink {
    fn clear(&mut self) {}

    fn add(&mut self, entry: TaskEntry) {
        println!("{entry}");
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct BatchSummary {
    pub succeeded: usize,
    pub failed: usize,
}

impl BatchSummary {
    pub fn all_succeeded(&self) -> bool {
        self.failed == 0
    }
}

pub struct BatchRunner<'a, R: ProjectResolver, S: TaskSink> {
    resolver: &'a R,
    sink: &'a mut S,
    config: &'a Config,
}

impl<'a, R: ProjectResolver, S: TaskSink> BatchRunner<'a, R, S> {
    pub fn new(resolver: &'a R, sink: &'a mut S, config: &'a Config) -> Self {
        Self {
            resolver,
            sink,
            config,
        }
    }

    /// Clears the sink, then runs `scripts` in order.
    pub fn run_all(&mut self, scripts: &[PathBuf]) -> BatchSummary {
        self.sink.clear();
        info!("Running {} script(s)", scripts.len());

        let mut summary = BatchSummary::default();
        for script in scripts {
            if self.run_one(script) {
                summary.succeeded += 1;
            } else {
                summary.failed += 1;
            }
        }

        info!(
            "Finished: {} succeeded, {} failed",
            summary.succeeded, summary.failed
        );
        summary
    }

    fn run_one(&mut self, script: &Path) -> bool {
        let unit = match ScriptUnit::read(script, &self.config.output_extension) {
            Ok(unit) => unit,
            Err(e) => return self.fail(TaskCategory::Runtime, script, e),
        };

        let Some(manifest) = self.resolver.find_owning_project(&unit.path) else {
            let e = ScriptError::ProjectNotFound {
                script: unit.path.clone(),
            };
            return self.fail(TaskCategory::Project, &unit.path, e);
        };
        debug!("{} belongs to {}", unit.path.display(), manifest.display());
        let project = self.resolver.load_project(&manifest);

        let outcome = match ScriptRunner::new(self.config).run(&unit.path, project, &unit.source) {
            Ok(outcome) => outcome,
            Err(e) => return self.fail(TaskCategory::Runtime, &unit.path, e),
        };

        for diag in &outcome.diagnostics {
            self.sink.add(TaskEntry::from_diagnostic(&unit.path, diag));
        }
        if let Some(exception) = &outcome.exception {
            self.sink.add(TaskEntry::from_exception(&unit.path, exception));
        }

        match &outcome.state {
            Some(state) => {
                info!(
                    "{} -> {} ({} bytes in {:.2?})",
                    unit.path.display(),
                    state.output_path.display(),
                    state.bytes_written,
                    state.elapsed
                );
                true
            }
            None if outcome.exception.is_some() => {
                warn!("{} threw an exception", unit.path.display());
                false
            }
            None => {
                warn!("{} did not compile", unit.path.display());
                false
            }
        }
    }

    fn fail(&mut self, category: TaskCategory, script: &Path, e: ScriptError) -> bool {
        warn!("{e}");
        self.sink.add(TaskEntry::error(category, script, e.to_string()));
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::processor::context::tests::sample_project;
    use crate::project::Project;
    use std::fs;
    use std::sync::Arc;

    struct FixedResolver {
        owned: bool,
        project: Option<Arc<Project>>,
    }

    impl ProjectResolver for FixedResolver {
        fn find_owning_project(&self, _script: &Path) -> Option<PathBuf> {
            self.owned.then(|| PathBuf::from("/demo/Cargo.toml"))
        }

        fn load_project(&self, _manifest: &Path) -> Option<Arc<Project>> {
            self.project.clone()
        }
    }

    fn resolver() -> FixedResolver {
        FixedResolver {
            owned: true,
            project: Some(sample_project()),
        }
    }

    fn write_scripts(dir: &Path, scripts: &[(&str, &str)]) -> Vec<PathBuf> {
        scripts
            .iter()
            .map(|(name, src)| {
                let path = dir.join(name);
                fs::write(&path, src).unwrap();
                path
            })
            .collect()
    }

    #[test]
    fn test_failures_are_isolated_per_script() {
        let dir = tempfile::tempdir().unwrap();
        let scripts = write_scripts(
            dir.path(),
            &[
                ("a.sgx", "WriteLine(\"a\");\nthrow \"a failed\";"),
                ("b.sgx", "WriteLine(\"b\");"),
                ("c.sgx", "var unused = 0;\nWriteLine(\"c\");"),
            ],
        );
        let config = Config::default();
        let mut sink = TaskList::default();
        sink.add(TaskEntry::error(TaskCategory::Runtime, Path::new("stale"), "old".into()));

        let summary = BatchRunner::new(&resolver(), &mut sink, &config).run_all(&scripts);

        assert_eq!(summary, BatchSummary { succeeded: 2, failed: 1 });
        assert_eq!(sink.entries.len(), 2);
        let first = &sink.entries[0];
        assert_eq!(
            (first.category, first.severity, first.line, first.document.as_path()),
            (TaskCategory::Runtime, TaskSeverity::Error, 1, scripts[0].as_path())
        );
        assert_eq!(first.text, "a failed");
        let second = &sink.entries[1];
        assert_eq!(
            (second.category, second.severity, second.code, second.document.as_path()),
            (TaskCategory::BuildCompile, TaskSeverity::Warning, Some("SG0168"), scripts[2].as_path())
        );

        assert!(!dir.path().join("a.g.rs").exists());
        assert_eq!(fs::read_to_string(dir.path().join("b.g.rs")).unwrap(), "b\n");
        assert_eq!(fs::read_to_string(dir.path().join("c.g.rs")).unwrap(), "c\n");
    }

    #[test]
    fn test_project_problems_become_entries() {
        let dir = tempfile::tempdir().unwrap();
        let scripts = write_scripts(dir.path(), &[("gen.sgx", "WriteLine();")]);
        let config = Config::default();
        let test_cases = vec![
            (
                FixedResolver { owned: false, project: None },
                TaskCategory::Project,
                "no project owns",
            ),
            (
                FixedResolver { owned: true, project: None },
                TaskCategory::Runtime,
                "could not open the project owning",
            ),
        ];

        for (resolver, category, text) in test_cases {
            let mut sink = TaskList::default();
            let summary = BatchRunner::new(&resolver, &mut sink, &config).run_all(&scripts);
            assert_eq!(summary.failed, 1);
            assert_eq!(sink.entries.len(), 1);
            assert_eq!(sink.entries[0].category, category);
            assert!(sink.entries[0].text.starts_with(text), "{}", sink.entries[0].text);
        }
    }

    #[test]
    fn test_unreadable_script_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::default();
        let mut sink = TaskList::default();
        let missing = vec![dir.path().join("missing.sgx")];

        let summary = BatchRunner::new(&resolver(), &mut sink, &config).run_all(&missing);
        assert!(!summary.all_succeeded());
        assert_eq!(sink.errors().count(), 1);
        assert_eq!(sink.entries[0].category, TaskCategory::Runtime);
    }

    #[test]
    fn test_entry_display() {
        let diag = Diagnostic::error(
            "SG1002",
            crate::model::Span {
                offset: 12,
                line: 1,
                column: 4,
            },
            "expected `;`, found `}`",
        );
        let entry = TaskEntry::from_diagnostic(Path::new("gen.sgx"), &diag);
        assert_eq!(entry.to_string(), "gen.sgx:2:5: error[SG1002]: expected `;`, found `}`");

        let exception = ScriptException::new("writing out.g.rs: denied");
        let entry = TaskEntry::from_exception(Path::new("gen.sgx"), &exception);
        assert_eq!(entry.to_string(), "gen.sgx:1:1: error: writing out.g.rs: denied");
    }
}
