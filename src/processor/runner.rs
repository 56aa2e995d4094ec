//! One script end to end: compile, stop on blocking diagnostics, execute
//! against a fresh context, then persist the output.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use log::debug;

use super::ast::Script;
use super::check;
use super::context::ExecutionContext;
use super::globals::ScriptOptions;
use super::script_parser::parse_script;
use super::value::Value;
use super::vm;
use crate::config::Config;
use crate::error::ScriptError;
use crate::model::{Diagnostic, ScriptException, Severity};
use crate::project::Project;

/// Terminal state of a script that ran to completion.
#[derive(Debug)]
pub struct RunState {
    /// Value of the last top-level expression statement.
    pub value: Value,
    pub output_path: PathBuf,
    pub bytes_written: usize,
    pub elapsed: Duration,
}

pub struct RunOutcome {
    /// Present unless the context was disposed after a successful flush.
    pub context: Option<ExecutionContext>,
    pub state: Option<RunState>,
    pub diagnostics: Vec<Diagnostic>,
    pub exception: Option<ScriptException>,
}

impl RunOutcome {
    pub fn succeeded(&self) -> bool {
        self.state.is_some()
    }

    pub fn is_blocked(&self) -> bool {
        self.diagnostics.iter().any(Diagnostic::is_blocking)
    }
}

pub struct ScriptRunner<'c> {
    config: &'c Config,
}

impl<'c> ScriptRunner<'c> {
    pub fn new(config: &'c Config) -> Self {
        Self { config }
    }

    /// Parses and checks `source`. Diagnostics come back ordered by
    /// position, with configured warnings promoted to errors.
    pub fn compile(&self, source: &str, options: &ScriptOptions) -> (Script, Vec<Diagnostic>) {
        let (script, mut diagnostics) = parse_script(source);
        // A broken tree only produces follow-on noise in the checker.
        if !diagnostics.iter().any(Diagnostic::is_blocking) {
            diagnostics.extend(check::check(&script, options));
            diagnostics.sort_by_key(|d| d.span.offset);
        }
        for d in &mut diagnostics {
            if d.severity == Severity::Warning && self.config.is_warning_as_error(d.code) {
                d.warning_as_error = true;
            }
        }
        (script, diagnostics)
    }

    /// Runs the script and writes its output file on success.
    pub fn run(
        &self,
        script: &Path,
        project: Option<Arc<Project>>,
        source: &str,
    ) -> Result<RunOutcome, ScriptError> {
        self.execute(script, project, source, true)
    }

    /// Like [`ScriptRunner::run`] but leaves the output in the returned
    /// context instead of writing it.
    pub fn render(
        &self,
        script: &Path,
        project: Option<Arc<Project>>,
        source: &str,
    ) -> Result<RunOutcome, ScriptError> {
        self.execute(script, project, source, false)
    }

    fn execute(
        &self,
        script: &Path,
        project: Option<Arc<Project>>,
        source: &str,
        persist: bool,
    ) -> Result<RunOutcome, ScriptError> {
        let mut context = ExecutionContext::new(script, project, &self.config.output_extension)?;
        let options = ScriptOptions::new(script);

        let (compiled, diagnostics) = self.compile(source, &options);
        if diagnostics.iter().any(Diagnostic::is_blocking) {
            debug!("{} did not compile", script.display());
            return Ok(RunOutcome {
                context: Some(context),
                state: None,
                diagnostics,
                exception: None,
            });
        }

        let started = Instant::now();
        let value = match vm::execute(&compiled, &mut context, &options, self.config.timeout()) {
            Ok(value) => value,
            Err(exception) => {
                return Ok(RunOutcome {
                    context: Some(context),
                    state: None,
                    diagnostics,
                    exception: Some(exception),
                });
            }
        };

        let output_path = context.output_path();
        if !persist {
            let bytes_written = context.output_bytes().map(<[u8]>::len).unwrap_or_default();
            return Ok(RunOutcome {
                context: Some(context),
                state: Some(RunState {
                    value,
                    output_path,
                    bytes_written,
                    elapsed: started.elapsed(),
                }),
                diagnostics,
                exception: None,
            });
        }

        match context.flush_to_file() {
            Ok(bytes_written) => {
                context.dispose();
                Ok(RunOutcome {
                    context: None,
                    state: Some(RunState {
                        value,
                        output_path,
                        bytes_written,
                        elapsed: started.elapsed(),
                    }),
                    diagnostics,
                    exception: None,
                })
            }
            Err(e) => Ok(RunOutcome {
                context: Some(context),
                state: None,
                diagnostics,
                exception: Some(ScriptException::new(e.to_string())),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::processor::context::tests::sample_project;
    use std::fs;

    fn outcome(config: &Config, script: &Path, source: &str) -> RunOutcome {
        ScriptRunner::new(config)
            .run(script, Some(sample_project()), source)
            .unwrap()
    }

    #[test]
    fn test_clean_script_writes_its_output() {
        let dir = tempfile::tempdir().unwrap();
        let script = dir.path().join("gen.sgx");
        let out = outcome(&Config::default(), &script, r#"WriteLine("a"); Write("b"); 40 + 2;"#);

        assert!(out.succeeded());
        assert!(out.context.is_none());
        assert!(out.diagnostics.is_empty());
        let state = out.state.unwrap();
        assert_eq!(state.bytes_written, 3);
        assert_eq!(state.output_path, dir.path().join("gen.g.rs"));
        assert!(matches!(state.value, Value::Int(42)));
        assert_eq!(fs::read_to_string(dir.path().join("gen.g.rs")).unwrap(), "a\nb");
    }

    #[test]
    fn test_blocking_diagnostics_skip_execution() {
        let dir = tempfile::tempdir().unwrap();
        let script = dir.path().join("gen.sgx");
        let test_cases = vec!["WriteLine(\"x\");\nif (true) {", "WriteLin(\"x\");", "var s = \"\\q\";"];

        for src in test_cases {
            let out = outcome(&Config::default(), &script, src);
            assert!(out.is_blocked(), "source: {src}");
            assert!(out.state.is_none() && out.exception.is_none(), "source: {src}");
            assert!(out.context.is_some(), "source: {src}");
            assert!(!dir.path().join("gen.g.rs").exists(), "source: {src}");
        }
    }

    #[test]
    fn test_exception_keeps_the_buffer_and_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let script = dir.path().join("gen.sgx");
        let out = outcome(&Config::default(), &script, "WriteLine(\"partial\");\nthrow \"stop\";");

        let exception = out.exception.unwrap();
        assert_eq!(exception.message, "stop");
        assert_eq!(exception.origin().unwrap().line, 1);
        let mut context = out.context.unwrap();
        assert_eq!(context.output_bytes().unwrap(), b"partial\n");
        assert!(!dir.path().join("gen.g.rs").exists());
    }

    #[test]
    fn test_warnings_as_errors() {
        let dir = tempfile::tempdir().unwrap();
        let script = dir.path().join("gen.sgx");
        let src = "var unused = 1;";

        let out = outcome(&Config::default(), &script, src);
        assert!(out.succeeded());
        assert_eq!(out.diagnostics.len(), 1);
        assert!(!out.diagnostics[0].is_blocking());

        for promoted in ["SG0168", "*"] {
            let config = Config {
                warnings_as_errors: vec![promoted.to_string()],
                ..Config::default()
            };
            let out = outcome(&config, &script, src);
            assert!(out.is_blocked());
            assert!(out.diagnostics[0].warning_as_error);
            assert!(out.state.is_none());
        }
    }

    #[test]
    fn test_render_does_not_touch_the_disk() {
        let dir = tempfile::tempdir().unwrap();
        let script = dir.path().join("gen.sgx");
        let config = Config::default();
        let out = ScriptRunner::new(&config)
            .render(&script, Some(sample_project()), "WriteLine(Project);")
            .unwrap();

        assert_eq!(out.state.as_ref().unwrap().bytes_written, 5);
        assert_eq!(out.context.unwrap().output_bytes().unwrap(), b"demo\n");
        assert!(!dir.path().join("gen.g.rs").exists());
    }

    #[test]
    fn test_missing_project_is_an_error() {
        let config = Config::default();
        let result = ScriptRunner::new(&config).run(Path::new("gen.sgx"), None, "WriteLine();");
        assert!(matches!(result, Err(ScriptError::ProjectNotLoaded { .. })));
    }

    #[test]
    fn test_persist_failure_is_reported_as_exception() {
        let dir = tempfile::tempdir().unwrap();
        let script = dir.path().join("missing").join("gen.sgx");
        let out = outcome(&Config::default(), &script, "WriteLine(1);");

        assert!(!out.succeeded());
        let exception = out.exception.unwrap();
        assert!(exception.message.starts_with("writing "), "{}", exception.message);
        assert!(exception.origin().is_none());
    }
}
