//! The shape scripts compile against: members of the injected context,
//! the library namespaces, and the fixed compile options that make them
//! visible.

use std::path::{Path, PathBuf};

use super::value::Library;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemberKind {
    Property { writable: bool },
    Method {
        min_args: usize,
        max_args: Option<usize>,
        /// Returns the context, so calls can be chained.
        chains: bool,
    },
}

#[derive(Debug, Clone, Copy)]
pub struct Member {
    pub name: &'static str,
    pub kind: MemberKind,
    /// Library reference the member needs, if any.
    pub requires: Option<&'static str>,
}

const fn prop(name: &'static str, writable: bool) -> Member {
    Member {
        name,
        kind: MemberKind::Property { writable },
        requires: None,
    }
}

const fn method(name: &'static str, min_args: usize, max_args: Option<usize>, chains: bool) -> Member {
    Member {
        name,
        kind: MemberKind::Method {
            min_args,
            max_args,
            chains,
        },
        requires: None,
    }
}

const fn project(member: Member) -> Member {
    Member {
        requires: Some(PROJECT_LIBRARY),
        ..member
    }
}

pub const PROJECT_LIBRARY: &str = "project";

/// Members of the execution context. Bare names in a script resolve here
/// after locals, and `Context` names the context itself.
pub const CONTEXT_MEMBERS: &[Member] = &[
    prop("Context", false),
    prop("Indentation", true),
    prop("Indent", true),
    prop("AutoWriteIndentation", true),
    prop("Extension", true),
    prop("ScriptFile", false),
    prop("OutputPath", false),
    method("Write", 0, None, true),
    method("WriteLine", 0, None, true),
    method("WriteUsings", 0, None, true),
    method("WriteNamespace", 1, Some(1), true),
    method("WriteEnd", 0, Some(0), true),
    method("WriteIndentation", 0, Some(0), true),
    method("IncreaseIndentation", 0, Some(1), true),
    method("DecreaseIndentation", 0, Some(1), true),
    project(prop("Project", false)),
    project(prop("Documents", false)),
    project(prop("Syntaxes", false)),
    project(prop("Trees", false)),
    project(prop("Models", false)),
    project(method("Document", 1, Some(1), false)),
    project(method("Syntax", 1, Some(1), false)),
    project(method("Tree", 1, Some(1), false)),
    project(method("Model", 1, Some(1), false)),
];

pub struct LibraryDef {
    pub namespace: &'static str,
    pub reference: &'static str,
    pub library: Library,
    pub members: &'static [Member],
}

pub const LIBRARIES: &[LibraryDef] = &[
    LibraryDef {
        namespace: "String",
        reference: "text",
        library: Library::String,
        members: &[
            method("Join", 2, Some(2), false),
            method("Format", 1, None, false),
            method("Concat", 0, None, false),
            method("IsNullOrEmpty", 1, Some(1), false),
        ],
    },
    LibraryDef {
        namespace: "Math",
        reference: "math",
        library: Library::Math,
        members: &[
            method("Max", 2, Some(2), false),
            method("Min", 2, Some(2), false),
            method("Abs", 1, Some(1), false),
        ],
    },
];

pub fn context_member(name: &str) -> Option<&'static Member> {
    CONTEXT_MEMBERS.iter().find(|m| m.name == name)
}

pub fn library_member(library: Library, name: &str) -> Option<&'static Member> {
    LIBRARIES
        .iter()
        .find(|l| l.library == library)
        .and_then(|l| l.members.iter().find(|m| m.name == name))
}

/// Fixed configuration every script is compiled with.
#[derive(Debug, Clone)]
pub struct ScriptOptions {
    pub file_path: PathBuf,
    /// Namespaces usable by bare name.
    pub imports: Vec<&'static str>,
    /// Libraries linked into the script.
    pub references: Vec<&'static str>,
}

impl ScriptOptions {
    pub fn new(file_path: &Path) -> Self {
        Self {
            file_path: file_path.to_path_buf(),
            imports: vec!["String", "Math"],
            references: vec!["core", "text", "math", PROJECT_LIBRARY],
        }
    }

    pub fn references(&self, reference: &str) -> bool {
        self.references.contains(&reference)
    }

    /// The library a bare name refers to, if it's imported and referenced.
    pub fn library(&self, name: &str) -> Option<&'static LibraryDef> {
        LIBRARIES.iter().find(|l| {
            l.namespace == name && self.imports.contains(&l.namespace) && self.references(l.reference)
        })
    }

    /// Whether a context member is usable under these options.
    pub fn allows(&self, member: &Member) -> bool {
        member.requires.is_none_or(|r| self.references(r))
    }
}

impl MemberKind {
    pub fn accepts(self, argc: usize) -> bool {
        match self {
            MemberKind::Method {
                min_args, max_args, ..
            } => argc >= min_args && max_args.is_none_or(|max| argc <= max),
            MemberKind::Property { .. } => false,
        }
    }
}
