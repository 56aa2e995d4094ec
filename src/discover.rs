//! Finding the scripts a command should run.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use walkdir::WalkDir;

use crate::config::Config;
use crate::project::{has_extension, is_skipped_dir};

pub fn is_script(path: &Path, config: &Config) -> bool {
    has_extension(path, std::slice::from_ref(&config.script_extension))
}

/// Every script under `dir`, sorted by path. Build output and hidden
/// directories are not searched.
pub fn scripts_under(dir: &Path, config: &Config) -> Result<Vec<PathBuf>> {
    let walker = WalkDir::new(dir).into_iter().filter_entry(|e| {
        e.depth() == 0 || !(e.file_type().is_dir() && is_skipped_dir(&e.file_name().to_string_lossy()))
    });

    let mut scripts = Vec::new();
    for entry in walker {
        let entry = entry.with_context(|| format!("Walking {}", dir.display()))?;
        if entry.file_type().is_file() && is_script(entry.path(), config) {
            scripts.push(entry.into_path());
        }
    }
    scripts.sort();
    Ok(scripts)
}

/// Refuses anything that isn't a script file.
pub fn ensure_scripts(paths: &[PathBuf], config: &Config) -> Result<()> {
    for path in paths {
        if !is_script(path, config) {
            bail!(
                "{} is not a script; expected a .{} file",
                path.display(),
                config.script_extension.trim_start_matches('.')
            );
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_scripts_under_skips_build_and_hidden_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        for rel in [
            "src/b.sgx",
            "a.sgx",
            "src/nested/c.sgx",
            "src/lib.rs",
            "target/debug/d.sgx",
            ".git/e.sgx",
        ] {
            let path = root.join(rel);
            fs::create_dir_all(path.parent().unwrap()).unwrap();
            fs::write(path, "").unwrap();
        }

        let found = scripts_under(root, &Config::default()).unwrap();
        let rel: Vec<_> = found
            .iter()
            .map(|p| p.strip_prefix(root).unwrap().to_path_buf())
            .collect();
        assert_eq!(
            rel,
            vec![
                PathBuf::from("a.sgx"),
                PathBuf::from("src/b.sgx"),
                PathBuf::from("src/nested/c.sgx"),
            ]
        );
    }

    #[test]
    fn test_ensure_scripts() {
        let config = Config::default();
        let test_cases = vec![
            (vec!["a.sgx", "dir/b.sgx"], true),
            (vec!["a.sgx", "lib.rs"], false),
            (vec!["noext"], false),
            (vec![], true),
        ];

        for (paths, ok) in test_cases {
            let paths: Vec<PathBuf> = paths.into_iter().map(PathBuf::from).collect();
            assert_eq!(ensure_scripts(&paths, &config).is_ok(), ok, "paths: {paths:?}");
        }
    }
}
