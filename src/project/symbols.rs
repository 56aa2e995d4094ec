//! Line-oriented declaration scanner behind `SemanticModel`.
//!
//! This is not a Rust parser. It recognises item headers at the start of a
//! line and tracks brace depth to know which `impl`, `trait` or `mod` block
//! an item sits in. String literals and `//` comments are blanked before
//! braces are counted.

use std::sync::LazyLock;

use regex::Regex;

static FN_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"^\s*(pub(?:\([^)]*\))?\s+)?(?:(?:const|async|unsafe|extern(?:\s+"[^"]*")?)\s+)*fn\s+([A-Za-z_][A-Za-z0-9_]*)"#)
        .expect("valid fn regex")
});

static ITEM_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*(pub(?:\([^)]*\))?\s+)?(struct|enum|trait|mod|type|const|static(?:\s+mut)?|union)\s+([A-Za-z_][A-Za-z0-9_]*)")
        .expect("valid item regex")
});

static IMPL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*(?:unsafe\s+)?impl(?:\s*<[^{]*?>)?\s+(?:[\w:]+(?:<[^{]*?>)?\s+for\s+)?([\w:]+)")
        .expect("valid impl regex")
});

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SymbolKind {
    Function,
    Struct,
    Enum,
    Trait,
    Module,
    TypeAlias,
    Const,
    Static,
    Union,
}

impl SymbolKind {
    pub fn as_str(self) -> &'static str {
        match self {
            SymbolKind::Function => "fn",
            SymbolKind::Struct => "struct",
            SymbolKind::Enum => "enum",
            SymbolKind::Trait => "trait",
            SymbolKind::Module => "mod",
            SymbolKind::TypeAlias => "type",
            SymbolKind::Const => "const",
            SymbolKind::Static => "static",
            SymbolKind::Union => "union",
        }
    }

    pub fn is_type(self) -> bool {
        matches!(
            self,
            SymbolKind::Struct
                | SymbolKind::Enum
                | SymbolKind::Trait
                | SymbolKind::TypeAlias
                | SymbolKind::Union
        )
    }

    fn from_keyword(kw: &str) -> Option<Self> {
        let kind = match kw {
            "struct" => SymbolKind::Struct,
            "enum" => SymbolKind::Enum,
            "trait" => SymbolKind::Trait,
            "mod" => SymbolKind::Module,
            "type" => SymbolKind::TypeAlias,
            "const" => SymbolKind::Const,
            "union" => SymbolKind::Union,
            s if s.starts_with("static") => SymbolKind::Static,
            _ => return None,
        };
        Some(kind)
    }
}

/// A declared item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Symbol {
    pub name: String,
    pub kind: SymbolKind,
    /// 1-based line of the declaration.
    pub line: u32,
    pub public: bool,
    /// The `impl`, `trait` or `mod` block the item is declared in.
    pub container: Option<String>,
}

struct OpenContainer {
    name: String,
    depth: usize,
}

pub fn scan(text: &str) -> Vec<Symbol> {
    let mut symbols = Vec::new();
    let mut stack: Vec<OpenContainer> = Vec::new();
    let mut pending: Option<String> = None;
    let mut depth = 0usize;
    let mut in_block_comment = false;

    for (idx, raw) in text.lines().enumerate() {
        let line = blank_noise(raw, &mut in_block_comment);
        let depth_before = depth;
        let container = stack.last().map(|c| c.name.clone());

        if let Some(caps) = FN_RE.captures(&line) {
            symbols.push(Symbol {
                name: caps[2].to_string(),
                kind: SymbolKind::Function,
                line: idx as u32 + 1,
                public: caps.get(1).is_some(),
                container,
            });
        } else if let Some(caps) = ITEM_RE.captures(&line) {
            if let Some(kind) = SymbolKind::from_keyword(&caps[2]) {
                let name = caps[3].to_string();
                if matches!(kind, SymbolKind::Trait | SymbolKind::Module) {
                    pending = Some(name.clone());
                }
                symbols.push(Symbol {
                    name,
                    kind,
                    line: idx as u32 + 1,
                    public: caps.get(1).is_some(),
                    container,
                });
            }
        } else if let Some(caps) = IMPL_RE.captures(&line) {
            let path = &caps[1];
            let name = path.rsplit("::").next().unwrap_or(path);
            pending = Some(name.to_string());
        }

        for c in line.chars() {
            match c {
                '{' => {
                    depth += 1;
                    if depth == depth_before + 1 {
                        if let Some(name) = pending.take() {
                            stack.push(OpenContainer { name, depth });
                        }
                    }
                }
                '}' => {
                    depth = depth.saturating_sub(1);
                    while stack.last().is_some_and(|c| c.depth > depth) {
                        stack.pop();
                    }
                }
                // `mod foo;` and `trait Foo;`-like forms never open a block.
                ';' if depth == depth_before => pending = None,
                _ => {}
            }
        }
    }

    symbols
}

/// Replaces string contents and comments with spaces so they can't
/// contribute braces.
fn blank_noise(line: &str, in_block_comment: &mut bool) -> String {
    let mut out = String::with_capacity(line.len());
    let mut chars = line.chars().peekable();
    let mut in_string = false;

    while let Some(c) = chars.next() {
        if *in_block_comment {
            if c == '*' && chars.peek() == Some(&'/') {
                chars.next();
                *in_block_comment = false;
            }
            out.push(' ');
            continue;
        }
        if in_string {
            match c {
                '\\' => {
                    chars.next();
                }
                '"' => {
                    in_string = false;
                    out.push('"');
                    continue;
                }
                _ => {}
            }
            out.push(' ');
            continue;
        }
        match c {
            '"' => {
                in_string = true;
                out.push('"');
            }
            '/' if chars.peek() == Some(&'/') => break,
            '/' if chars.peek() == Some(&'*') => {
                chars.next();
                *in_block_comment = true;
                out.push(' ');
            }
            c => out.push(c),
        }
    }
    out
}
