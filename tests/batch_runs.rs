use std::fs;
use std::path::{Path, PathBuf};

use scriptgen::batch::{BatchRunner, BatchSummary, TaskCategory, TaskList, TaskSeverity};
use scriptgen::config::Config;
use scriptgen::discover;
use scriptgen::project::FsProjectResolver;
use tempfile::TempDir;

const LIB_RS: &str = "pub struct Widget {\n    size: u32,\n}\n\nimpl Widget {\n    pub fn new() -> Self {\n        Widget { size: 0 }\n    }\n}\n\npub enum Shape { Round, Square }\n";

fn project(files: &[(&str, &str)]) -> TempDir {
    let dir = tempfile::tempdir().unwrap();
    let mut all = vec![("Cargo.toml", "[package]\nname = \"demo\"\n"), ("src/lib.rs", LIB_RS)];
    all.extend_from_slice(files);
    for (rel, text) in all {
        let path = dir.path().join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, text).unwrap();
    }
    dir
}

fn run(config: &Config, root: &Path, scripts: &[&str]) -> (BatchSummary, TaskList) {
    let paths: Vec<PathBuf> = scripts.iter().map(|s| root.join(s)).collect();
    let resolver = FsProjectResolver::new(config);
    let mut sink = TaskList::default();
    let summary = BatchRunner::new(&resolver, &mut sink, config).run_all(&paths);
    (summary, sink)
}

#[test]
fn hello_world_writes_sibling_file() {
    let dir = project(&[("gen/hello.sgx", r#"Context.WriteLine("Hello {0}", "World");"#)]);
    let config = Config {
        output_extension: ".g.cs".into(),
        ..Config::default()
    };

    let (summary, sink) = run(&config, dir.path(), &["gen/hello.sgx"]);

    assert!(summary.all_succeeded());
    assert!(sink.entries.is_empty(), "{:?}", sink.entries);
    assert_eq!(
        fs::read_to_string(dir.path().join("gen/hello.g.cs")).unwrap(),
        "Hello World\n"
    );
}

#[test]
fn unmatched_brace_blocks_the_write() {
    let dir = project(&[("gen.sgx", "if (true) {\n    WriteLine(\"x\");\n")]);
    let (summary, sink) = run(&Config::default(), dir.path(), &["gen.sgx"]);

    assert_eq!(summary.failed, 1);
    assert!(sink.errors().count() >= 1);
    assert!(sink.entries.iter().all(|e| e.category == TaskCategory::BuildCompile));
    assert!(sink.entries.iter().any(|e| e.code == Some("SG1513")));
    assert!(!dir.path().join("gen.g.rs").exists());
}

#[test]
fn thrown_exception_writes_nothing() {
    let dir = project(&[("gen.sgx", "WriteLine(\"started\");\n\nthrow \"no widgets\";")]);
    let (summary, sink) = run(&Config::default(), dir.path(), &["gen.sgx"]);

    assert_eq!(summary.failed, 1);
    assert_eq!(sink.entries.len(), 1);
    let entry = &sink.entries[0];
    assert_eq!(entry.category, TaskCategory::Runtime);
    assert_eq!(entry.severity, TaskSeverity::Error);
    assert_eq!((entry.line, entry.text.as_str()), (2, "no widgets"));
    assert!(!dir.path().join("gen.g.rs").exists());
}

#[test]
fn failing_script_does_not_stop_the_batch() {
    let dir = project(&[
        ("a.sgx", "WriteLine(1 / 0);"),
        ("b.sgx", "WriteLine(\"b\");"),
        ("c.sgx", "WriteLine(\"c\");"),
    ]);
    let (summary, sink) = run(&Config::default(), dir.path(), &["a.sgx", "b.sgx", "c.sgx"]);

    assert_eq!(summary, BatchSummary { succeeded: 2, failed: 1 });
    assert_eq!(sink.entries.len(), 1);
    assert_eq!(sink.entries[0].document, dir.path().join("a.sgx"));
    assert_eq!(fs::read_to_string(dir.path().join("b.g.rs")).unwrap(), "b\n");
    assert_eq!(fs::read_to_string(dir.path().join("c.g.rs")).unwrap(), "c\n");
}

#[test]
fn repeated_runs_replace_the_output() {
    let dir = project(&[("gen.sgx", "WriteLine(\"short\");")]);
    let out = dir.path().join("gen.g.rs");
    fs::write(&out, "a much longer stale file\nwith two lines\n").unwrap();

    for _ in 0..2 {
        let (summary, sink) = run(&Config::default(), dir.path(), &["gen.sgx"]);
        assert!(summary.all_succeeded());
        assert!(sink.entries.is_empty());
        assert_eq!(fs::read_to_string(&out).unwrap(), "short\n");
    }
}

#[test]
fn script_outside_any_project_is_reported() {
    let dir = tempfile::tempdir().unwrap();
    let script = dir.path().join("orphan.sgx");
    fs::write(&script, "WriteLine();").unwrap();

    let (summary, sink) = run(&Config::default(), dir.path(), &["orphan.sgx"]);

    assert_eq!(summary.failed, 1);
    assert_eq!(sink.entries.len(), 1);
    assert_eq!(sink.entries[0].category, TaskCategory::Project);
    assert!(!dir.path().join("orphan.g.rs").exists());
}

#[test]
fn project_without_documents_is_not_loaded() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("Cargo.toml"), "[package]\n").unwrap();
    fs::write(dir.path().join("gen.sgx"), "WriteLine();").unwrap();

    let (summary, sink) = run(&Config::default(), dir.path(), &["gen.sgx"]);

    assert_eq!(summary.failed, 1);
    assert_eq!(sink.entries[0].category, TaskCategory::Runtime);
    assert!(sink.entries[0].text.contains("is it fully loaded?"));
}

#[test]
fn endless_script_hits_the_deadline() {
    let dir = project(&[("spin.sgx", "while (true) {\n}"), ("after.sgx", "WriteLine(\"ok\");")]);
    let config = Config {
        timeout_ms: Some(50),
        ..Config::default()
    };

    let (summary, sink) = run(&config, dir.path(), &["spin.sgx", "after.sgx"]);

    assert_eq!(summary, BatchSummary { succeeded: 1, failed: 1 });
    assert_eq!(sink.entries.len(), 1);
    assert_eq!(sink.entries[0].text, "script exceeded its deadline of 50 ms");
    assert!(dir.path().join("after.g.rs").exists());
}

#[test]
fn scripts_see_the_owning_project() {
    let script = r#"
AutoWriteIndentation = true;
WriteUsings("crate::Widget");
WriteNamespace(Project);
foreach (var t in Model("lib.rs").Types) {
    WriteLine("// {0} {1} at line {2}", t.Kind, t.Name, t.Line);
}
var ctor = Model("lib.rs").Find("new");
WriteLine("// {0} in {1}", ctor.Name, ctor.Container);
WriteEnd();
"#;
    let dir = project(&[("src/gen/describe.sgx", script)]);
    let (summary, sink) = run(&Config::default(), dir.path(), &["src/gen/describe.sgx"]);

    assert!(summary.all_succeeded(), "{:?}", sink.entries);
    let name = dir.path().file_name().unwrap().to_string_lossy().into_owned();
    assert_eq!(
        fs::read_to_string(dir.path().join("src/gen/describe.g.rs")).unwrap(),
        format!(
            "using crate::Widget;\nnamespace {name}\n{{\n    // struct Widget at line 1\n    // enum Shape at line 11\n    // new in Widget\n}}\n"
        )
    );
}

#[test]
fn project_command_discovers_every_script() {
    let dir = project(&[
        ("src/one.sgx", "Write(1);"),
        ("src/nested/two.sgx", "Write(2);"),
        ("target/skip.sgx", "throw \"never run\";"),
    ]);
    let config = Config::default();
    let scripts = discover::scripts_under(dir.path(), &config).unwrap();
    assert_eq!(scripts.len(), 2);

    let resolver = FsProjectResolver::new(&config);
    let mut sink = TaskList::default();
    let summary = BatchRunner::new(&resolver, &mut sink, &config).run_all(&scripts);

    assert_eq!(summary.succeeded, 2);
    assert_eq!(fs::read_to_string(dir.path().join("src/one.g.rs")).unwrap(), "1");
    assert_eq!(fs::read_to_string(dir.path().join("src/nested/two.g.rs")).unwrap(), "2");
}

#[test]
fn warnings_are_reported_alongside_a_thrown_exception() {
    let dir = project(&[("gen.sgx", "var unused = 1;\nthrow \"x\";")]);
    let (summary, sink) = run(&Config::default(), dir.path(), &["gen.sgx"]);

    assert_eq!(summary.failed, 1);
    assert_eq!(sink.entries.len(), 2, "{:?}", sink.entries);
    let (warning, error) = (&sink.entries[0], &sink.entries[1]);
    assert_eq!(
        (warning.category, warning.severity, warning.code, warning.line),
        (TaskCategory::BuildCompile, TaskSeverity::Warning, Some("SG0168"), 0)
    );
    assert_eq!(
        (error.category, error.severity, error.line, error.text.as_str()),
        (TaskCategory::Runtime, TaskSeverity::Error, 1, "x")
    );
    assert!(!dir.path().join("gen.g.rs").exists());
}

#[test]
fn entries_follow_script_order_across_the_batch() {
    let dir = project(&[
        ("a.sgx", "WriteLine(\"a\""),
        ("b.sgx", "WriteLine(\"b\");"),
        ("c.sgx", "var unused = 0;\nWriteLine(\"c\");"),
    ]);
    let (summary, sink) = run(&Config::default(), dir.path(), &["a.sgx", "b.sgx", "c.sgx"]);

    assert_eq!(summary, BatchSummary { succeeded: 2, failed: 1 });
    let documents: Vec<&Path> = sink.entries.iter().map(|e| e.document.as_path()).collect();
    let a = dir.path().join("a.sgx");
    let c = dir.path().join("c.sgx");
    let split = documents.iter().position(|d| *d != a.as_path()).unwrap();
    assert!(split > 0, "{:?}", sink.entries);
    assert!(documents[split..].iter().all(|d| *d == c.as_path()), "{:?}", sink.entries);
    assert!(sink.entries[..split]
        .iter()
        .all(|e| e.category == TaskCategory::BuildCompile && e.severity == TaskSeverity::Error));
    assert_eq!(sink.entries.len(), split + 1);
    assert_eq!(sink.entries[split].code, Some("SG0168"));
    assert_eq!(sink.entries[split].severity, TaskSeverity::Warning);
    assert!(!dir.path().join("a.g.rs").exists());
    assert_eq!(fs::read_to_string(dir.path().join("b.g.rs")).unwrap(), "b\n");
    assert_eq!(fs::read_to_string(dir.path().join("c.g.rs")).unwrap(), "c\n");
}

#[test]
fn deeply_nested_script_is_rejected_without_stopping_the_batch() {
    let depth = 50_000;
    let nested = format!("WriteLine({}1{});", "(".repeat(depth), ")".repeat(depth));
    let sum = format!("WriteLine(0{});", " + 1".repeat(depth));
    let dir = project(&[
        ("nested.sgx", nested.as_str()),
        ("sum.sgx", sum.as_str()),
        ("after.sgx", "WriteLine(1);"),
    ]);
    let (summary, sink) = run(&Config::default(), dir.path(), &["nested.sgx", "sum.sgx", "after.sgx"]);

    assert_eq!(summary, BatchSummary { succeeded: 1, failed: 2 });
    let codes: Vec<_> = sink.entries.iter().map(|e| (e.category, e.code)).collect();
    assert_eq!(
        codes,
        vec![
            (TaskCategory::BuildCompile, Some("SG8078")),
            (TaskCategory::BuildCompile, Some("SG8078")),
        ]
    );
    assert!(!dir.path().join("nested.g.rs").exists());
    assert_eq!(fs::read_to_string(dir.path().join("after.g.rs")).unwrap(), "1\n");
}

#[test]
fn oversized_format_width_is_a_runtime_error() {
    let dir = project(&[
        ("wide.sgx", r#"WriteLine("{0,9000000000000000000}", 1);"#),
        ("after.sgx", "WriteLine(1);"),
    ]);
    let (summary, sink) = run(&Config::default(), dir.path(), &["wide.sgx", "after.sgx"]);

    assert_eq!(summary, BatchSummary { succeeded: 1, failed: 1 });
    assert_eq!(sink.entries.len(), 1);
    assert_eq!(sink.entries[0].category, TaskCategory::Runtime);
    assert_eq!(sink.entries[0].text, "input string was not in a correct format");
    assert!(dir.path().join("after.g.rs").exists());
}
