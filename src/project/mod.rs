//! Read-only view of the project a script belongs to.
//!
//! A project is a directory holding one of the configured marker files
//! (`Cargo.toml` by default). Its documents are the files under that
//! directory with one of the configured document extensions. Syntax trees
//! and semantic models are built on first access and memoized per document.

pub mod symbols;

use std::cell::RefCell;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, OnceLock};

use anyhow::{Context, Result};
use log::{debug, warn};
use walkdir::WalkDir;

pub use symbols::{Symbol, SymbolKind};

use crate::config::Config;

/// Directories never searched for documents or scripts.
pub const SKIPPED_DIRS: &[&str] = &["target", "node_modules"];

pub fn is_skipped_dir(name: &str) -> bool {
    name.starts_with('.') || SKIPPED_DIRS.contains(&name)
}

#[derive(Debug)]
pub struct SyntaxTree {
    pub path: PathBuf,
    pub text: String,
}

impl SyntaxTree {
    pub fn lines(&self) -> impl Iterator<Item = &str> {
        self.text.lines()
    }
}

#[derive(Debug)]
pub struct SemanticModel {
    pub path: PathBuf,
    pub symbols: Vec<Symbol>,
}

impl SemanticModel {
    pub fn find(&self, name: &str) -> Option<&Symbol> {
        self.symbols.iter().find(|s| s.name == name)
    }

    pub fn types(&self) -> impl Iterator<Item = &Symbol> {
        self.symbols.iter().filter(|s| s.kind.is_type())
    }

    pub fn functions(&self) -> impl Iterator<Item = &Symbol> {
        self.symbols
            .iter()
            .filter(|s| s.kind == SymbolKind::Function)
    }
}

/// One source file of a project.
#[derive(Debug)]
pub struct Document {
    /// Path relative to the project root, `/`-separated.
    pub name: String,
    pub path: PathBuf,
    pub text: String,
    tree: OnceLock<Arc<SyntaxTree>>,
    model: OnceLock<Arc<SemanticModel>>,
}

impl Document {
    pub fn new(name: impl Into<String>, path: impl Into<PathBuf>, text: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            path: path.into(),
            text: text.into(),
            tree: OnceLock::new(),
            model: OnceLock::new(),
        }
    }

    pub fn syntax_tree(&self) -> Arc<SyntaxTree> {
        self.tree
            .get_or_init(|| {
                Arc::new(SyntaxTree {
                    path: self.path.clone(),
                    text: self.text.clone(),
                })
            })
            .clone()
    }

    pub fn semantic_model(&self) -> Arc<SemanticModel> {
        self.model
            .get_or_init(|| {
                Arc::new(SemanticModel {
                    path: self.path.clone(),
                    symbols: symbols::scan(&self.text),
                })
            })
            .clone()
    }
}

#[derive(Debug)]
pub struct Project {
    pub name: String,
    pub manifest: PathBuf,
    pub root: PathBuf,
    pub documents: Vec<Arc<Document>>,
}

impl Project {
    pub fn new(name: impl Into<String>, manifest: impl Into<PathBuf>, documents: Vec<Document>) -> Self {
        let manifest = manifest.into();
        let root = manifest
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_default();
        Self {
            name: name.into(),
            manifest,
            root,
            documents: documents.into_iter().map(Arc::new).collect(),
        }
    }

    /// Reads every document under the manifest's directory.
    pub fn load(manifest: &Path, document_extensions: &[String]) -> Result<Self> {
        let root = manifest
            .parent()
            .with_context(|| format!("{} has no parent directory", manifest.display()))?;
        let name = root
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| root.display().to_string());

        let mut documents = Vec::new();
        let walker = WalkDir::new(root)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|e| e.depth() == 0 || !(e.file_type().is_dir() && is_skipped_dir(&e.file_name().to_string_lossy())));

        for entry in walker {
            let entry = entry.with_context(|| format!("Walking {}", root.display()))?;
            if !entry.file_type().is_file() || !has_extension(entry.path(), document_extensions) {
                continue;
            }
            let path = entry.path();
            let text = match std::fs::read_to_string(path) {
                Ok(text) => text,
                Err(e) => {
                    warn!("Skipping document {}: {e}", path.display());
                    continue;
                }
            };
            let rel = path.strip_prefix(root).unwrap_or(path);
            let name = rel
                .components()
                .map(|c| c.as_os_str().to_string_lossy())
                .collect::<Vec<_>>()
                .join("/");
            documents.push(Document::new(name, path, text));
        }

        debug!("Loaded project {name} with {} documents", documents.len());
        Ok(Self::new(name, manifest, documents))
    }

    /// A project without documents is treated as not loaded.
    pub fn is_loaded(&self) -> bool {
        !self.documents.is_empty()
    }

    /// First document whose name ends with `suffix`.
    pub fn find_document(&self, suffix: &str) -> Option<&Arc<Document>> {
        self.documents.iter().find(|d| d.name.ends_with(suffix))
    }
}

pub fn has_extension(path: &Path, extensions: &[String]) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|ext| extensions.iter().any(|want| want.trim_start_matches('.') == ext))
}

/// Answers "which project does this script belong to".
pub trait ProjectResolver {
    /// Manifest path of the project owning `script`.
    fn find_owning_project(&self, script: &Path) -> Option<PathBuf>;

    /// The loaded project for a manifest returned by `find_owning_project`.
    fn load_project(&self, manifest: &Path) -> Option<Arc<Project>>;
}

/// Resolves projects from the filesystem: the owner of a script is the
/// nearest ancestor directory holding a project marker.
pub struct FsProjectResolver {
    markers: Vec<String>,
    document_extensions: Vec<String>,
    loaded: RefCell<HashMap<PathBuf, Arc<Project>>>,
}

impl FsProjectResolver {
    pub fn new(config: &Config) -> Self {
        Self {
            markers: config.project_markers.clone(),
            document_extensions: config.document_extensions.clone(),
            loaded: RefCell::new(HashMap::new()),
        }
    }
}

impl ProjectResolver for FsProjectResolver {
    fn find_owning_project(&self, script: &Path) -> Option<PathBuf> {
        let script = std::path::absolute(script).ok()?;
        script.ancestors().skip(1).find_map(|dir| {
            self.markers
                .iter()
                .map(|marker| dir.join(marker))
                .find(|candidate| candidate.is_file())
        })
    }

    fn load_project(&self, manifest: &Path) -> Option<Arc<Project>> {
        if let Some(project) = self.loaded.borrow().get(manifest) {
            return Some(project.clone());
        }
        match Project::load(manifest, &self.document_extensions) {
            Ok(project) => {
                let project = Arc::new(project);
                self.loaded
                    .borrow_mut()
                    .insert(manifest.to_path_buf(), project.clone());
                Some(project)
            }
            Err(e) => {
                warn!("Could not load project {}: {e:#}", manifest.display());
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn config() -> Config {
        Config::default()
    }

    #[test]
    fn test_find_owning_project_walks_up() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("app");
        fs::create_dir_all(root.join("src/gen")).unwrap();
        fs::write(root.join("Cargo.toml"), "[package]\n").unwrap();
        let script = root.join("src/gen/models.sgx");
        fs::write(&script, "").unwrap();

        let resolver = FsProjectResolver::new(&config());
        assert_eq!(
            resolver.find_owning_project(&script),
            Some(root.join("Cargo.toml"))
        );
    }

    #[test]
    fn test_orphan_script_has_no_project() {
        let dir = tempfile::tempdir().unwrap();
        let script = dir.path().join("lonely.sgx");
        fs::write(&script, "").unwrap();

        let resolver = FsProjectResolver::new(&Config {
            project_markers: vec!["no-such-marker.json".into()],
            ..config()
        });
        assert_eq!(resolver.find_owning_project(&script), None);
    }

    #[test]
    fn test_load_collects_documents_and_skips_target() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        fs::create_dir_all(root.join("src")).unwrap();
        fs::create_dir_all(root.join("target/debug")).unwrap();
        fs::write(root.join("Cargo.toml"), "").unwrap();
        fs::write(root.join("src/lib.rs"), "pub struct A;").unwrap();
        fs::write(root.join("src/main.rs"), "fn main() {}").unwrap();
        fs::write(root.join("src/notes.txt"), "ignored").unwrap();
        fs::write(root.join("target/debug/build.rs"), "ignored").unwrap();

        let resolver = FsProjectResolver::new(&config());
        let project = resolver.load_project(&root.join("Cargo.toml")).unwrap();
        let names: Vec<&str> = project.documents.iter().map(|d| d.name.as_str()).collect();
        assert_eq!(names, vec!["src/lib.rs", "src/main.rs"]);
        assert!(project.is_loaded());

        // Second lookup hits the cache.
        let again = resolver.load_project(&root.join("Cargo.toml")).unwrap();
        assert!(Arc::ptr_eq(&project, &again));
    }

    #[test]
    fn test_document_lookup_by_suffix() {
        let project = Project::new(
            "demo",
            "/demo/Cargo.toml",
            vec![
                Document::new("src/lib.rs", "/demo/src/lib.rs", "pub fn a() {}"),
                Document::new("src/model.rs", "/demo/src/model.rs", "pub struct M;"),
            ],
        );

        assert_eq!(project.find_document("model.rs").map(|d| d.name.as_str()), Some("src/model.rs"));
        assert!(project.find_document("missing.rs").is_none());
    }

    #[test]
    fn test_trees_and_models_are_memoized() {
        let doc = Document::new("a.rs", "/a.rs", "pub struct A;\nfn b() {}");
        assert!(Arc::ptr_eq(&doc.syntax_tree(), &doc.syntax_tree()));
        let model = doc.semantic_model();
        assert!(Arc::ptr_eq(&model, &doc.semantic_model()));
        assert_eq!(model.types().count(), 1);
        assert_eq!(model.functions().count(), 1);
        assert_eq!(model.find("b").map(|s| s.line), Some(2));
    }
}
