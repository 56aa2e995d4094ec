//! The per-run object injected into a script as its global state.
//!
//! Output is buffered in memory and only reaches the disk through
//! [`ExecutionContext::flush_to_file`].

use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::error::ScriptError;
use crate::project::{Document, Project, SemanticModel, SyntaxTree};
use crate::writer::generated;

/// Indentation step used by the block helpers.
pub const INDENT_STEP: i64 = 4;

pub struct ExecutionContext {
    script: PathBuf,
    project: Arc<Project>,
    output: BufWriter<Vec<u8>>,
    indentation: usize,
    auto_indent: bool,
    at_line_start: bool,
    extension: String,
}

impl ExecutionContext {
    /// Fails with `ProjectNotLoaded` when there is no project or it has no
    /// documents.
    pub fn new(
        script: &Path,
        project: Option<Arc<Project>>,
        extension: &str,
    ) -> Result<Self, ScriptError> {
        let project = project
            .filter(|p| p.is_loaded())
            .ok_or_else(|| ScriptError::ProjectNotLoaded {
                script: script.to_path_buf(),
            })?;

        Ok(Self {
            script: script.to_path_buf(),
            project,
            output: BufWriter::new(Vec::new()),
            indentation: 0,
            auto_indent: false,
            at_line_start: true,
            extension: extension.to_string(),
        })
    }

    pub fn script_file(&self) -> &Path {
        &self.script
    }

    pub fn project(&self) -> &Arc<Project> {
        &self.project
    }

    pub fn extension(&self) -> &str {
        &self.extension
    }

    pub fn set_extension(&mut self, extension: impl Into<String>) {
        self.extension = extension.into();
    }

    pub fn output_path(&self) -> PathBuf {
        generated::output_path(&self.script, &self.extension)
    }

    // ── indentation ──────────────────────────────────────────────────

    pub fn indentation(&self) -> usize {
        self.indentation
    }

    /// Negative values clamp to zero.
    pub fn set_indentation(&mut self, value: i64) {
        self.indentation = usize::try_from(value).unwrap_or(0);
    }

    pub fn increase_indentation(&mut self, by: i64) -> &mut Self {
        self.set_indentation((self.indentation as i64).saturating_add(by));
        self
    }

    pub fn decrease_indentation(&mut self, by: i64) -> &mut Self {
        self.set_indentation((self.indentation as i64).saturating_sub(by));
        self
    }

    pub fn auto_write_indentation(&self) -> bool {
        self.auto_indent
    }

    pub fn set_auto_write_indentation(&mut self, on: bool) {
        self.auto_indent = on;
    }

    // ── writing ──────────────────────────────────────────────────────

    fn raw(&mut self, text: &str) -> io::Result<()> {
        if text.is_empty() {
            return Ok(());
        }
        self.output.write_all(text.as_bytes())?;
        self.at_line_start = text.ends_with('\n');
        Ok(())
    }

    fn auto_indentation(&mut self) -> io::Result<()> {
        if self.auto_indent && self.at_line_start {
            self.write_indentation()?;
        }
        Ok(())
    }

    pub fn write_indentation(&mut self) -> io::Result<&mut Self> {
        let pad = " ".repeat(self.indentation);
        self.raw(&pad)?;
        Ok(self)
    }

    /// Appends `text`. With auto-indentation on, a write that starts a new
    /// line is prefixed with the current indentation.
    pub fn write(&mut self, text: &str) -> io::Result<&mut Self> {
        if !text.is_empty() {
            self.auto_indentation()?;
        }
        self.raw(text)?;
        Ok(self)
    }

    pub fn write_line(&mut self, text: &str) -> io::Result<&mut Self> {
        self.auto_indentation()?;
        self.raw(text)?;
        self.raw("\n")?;
        Ok(self)
    }

    /// One indented `using <name>;` line per name.
    pub fn write_usings<S: AsRef<str>>(&mut self, names: &[S]) -> io::Result<&mut Self> {
        for name in names {
            self.write_indentation()?;
            self.raw(&format!("using {};\n", name.as_ref()))?;
        }
        Ok(self)
    }

    pub fn write_namespace(&mut self, name: &str) -> io::Result<&mut Self> {
        self.write_line(&format!("namespace {name}"))?;
        self.write_line("{")?;
        Ok(self.increase_indentation(INDENT_STEP))
    }

    pub fn write_end(&mut self) -> io::Result<&mut Self> {
        self.decrease_indentation(INDENT_STEP);
        self.write_line("}")
    }

    /// Everything written so far.
    pub fn output_bytes(&mut self) -> io::Result<&[u8]> {
        self.output.flush()?;
        Ok(self.output.get_ref())
    }

    /// Replaces the generated file with the buffered output and returns
    /// the number of bytes written.
    pub fn flush_to_file(&mut self) -> Result<usize, ScriptError> {
        let path = self.output_path();
        let persist_err = |source| ScriptError::Persist {
            path: path.clone(),
            source,
        };
        let bytes = self.output_bytes().map_err(persist_err)?;
        let len = bytes.len();
        generated::persist(&path, bytes).map_err(persist_err)?;
        Ok(len)
    }

    /// Releases the output buffer; anything not flushed is discarded.
    pub fn dispose(self) {
        drop(self.output);
    }

    // ── project access ───────────────────────────────────────────────

    pub fn documents(&self) -> &[Arc<Document>] {
        &self.project.documents
    }

    pub fn document(&self, name: &str) -> Option<Arc<Document>> {
        self.project.find_document(name).cloned()
    }

    /// Full text under the root of the document's syntax tree.
    pub fn syntax(&self, name: &str) -> Option<String> {
        self.tree(name).map(|t| t.text.clone())
    }

    pub fn tree(&self, name: &str) -> Option<Arc<SyntaxTree>> {
        self.project.find_document(name).map(|d| d.syntax_tree())
    }

    pub fn model(&self, name: &str) -> Option<Arc<SemanticModel>> {
        self.project.find_document(name).map(|d| d.semantic_model())
    }

    pub fn syntaxes(&self) -> impl Iterator<Item = String> + '_ {
        self.trees().map(|t| t.text.clone())
    }

    pub fn trees(&self) -> impl Iterator<Item = Arc<SyntaxTree>> + '_ {
        self.project.documents.iter().map(|d| d.syntax_tree())
    }

    pub fn models(&self) -> impl Iterator<Item = Arc<SemanticModel>> + '_ {
        self.project.documents.iter().map(|d| d.semantic_model())
    }
}
