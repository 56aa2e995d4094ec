//! Runtime values of the script language.

use std::fmt;
use std::sync::Arc;

use crate::project::{Document, SemanticModel, Symbol, SyntaxTree};

/// Library namespaces a script can call into, e.g. `String.Join(...)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Library {
    String,
    Math,
}

#[derive(Debug, Clone)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Str(String),
    List(Vec<Value>),
    /// The execution context itself.
    Context,
    Library(Library),
    Document(Arc<Document>),
    Tree(Arc<SyntaxTree>),
    Model(Arc<SemanticModel>),
    Symbol(Symbol),
}

impl Value {
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Str(_) => "string",
            Value::List(_) => "list",
            Value::Context => "Context",
            Value::Library(Library::String) => "String",
            Value::Library(Library::Math) => "Math",
            Value::Document(_) => "Document",
            Value::Tree(_) => "Tree",
            Value::Model(_) => "Model",
            Value::Symbol(_) => "Symbol",
        }
    }

    /// `==` semantics: structural for data, identity for project objects.
    pub fn equals(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::List(a), Value::List(b)) => {
                a.len() == b.len() && a.iter().zip(b).all(|(x, y)| x.equals(y))
            }
            (Value::Context, Value::Context) => true,
            (Value::Library(a), Value::Library(b)) => a == b,
            (Value::Document(a), Value::Document(b)) => Arc::ptr_eq(a, b),
            (Value::Tree(a), Value::Tree(b)) => Arc::ptr_eq(a, b),
            (Value::Model(a), Value::Model(b)) => Arc::ptr_eq(a, b),
            (Value::Symbol(a), Value::Symbol(b)) => a == b,
            _ => false,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => Ok(()),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Int(n) => write!(f, "{n}"),
            Value::Str(s) => f.write_str(s),
            Value::List(items) => {
                f.write_str("[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{item}")?;
                }
                f.write_str("]")
            }
            Value::Document(doc) => f.write_str(&doc.name),
            Value::Tree(tree) => write!(f, "{}", tree.path.display()),
            Value::Model(model) => write!(f, "{}", model.path.display()),
            Value::Symbol(sym) => f.write_str(&sym.name),
            Value::Context | Value::Library(_) => f.write_str(self.type_name()),
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Str(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Str(s)
    }
}

impl From<Option<String>> for Value {
    fn from(s: Option<String>) -> Self {
        s.map_or(Value::Null, Value::Str)
    }
}

/// Composite formatting: `{n}` is replaced by argument `n`, `{n,w}` pads it
/// to `w` columns (right-aligned, left-aligned for negative `w`), and
/// `{{`/`}}` are literal braces.
pub fn format_composite(format: &str, args: &[Value]) -> Result<String, String> {
    const MALFORMED: &str = "input string was not in a correct format";
    // Widths at or past this bound are rejected before anything is padded.
    const MAX_WIDTH: u64 = 1_000_000;

    let mut out = String::with_capacity(format.len());
    let mut chars = format.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '{' if chars.peek() == Some(&'{') => {
                chars.next();
                out.push('{');
            }
            '}' if chars.peek() == Some(&'}') => {
                chars.next();
                out.push('}');
            }
            '}' => return Err(MALFORMED.into()),
            '{' => {
                let mut hole = String::new();
                loop {
                    match chars.next() {
                        Some('}') => break,
                        Some(c) => hole.push(c),
                        None => return Err(MALFORMED.into()),
                    }
                }
                let (index, width) = match hole.split_once(',') {
                    Some((i, w)) => (i, Some(w)),
                    None => (hole.as_str(), None),
                };
                let index: usize = index.trim().parse().map_err(|_| MALFORMED.to_string())?;
                let arg = args.get(index).ok_or_else(|| {
                    format!(
                        "index {index} is out of range for {} format argument(s)",
                        args.len()
                    )
                })?;
                let text = arg.to_string();
                match width {
                    None => out.push_str(&text),
                    Some(w) => {
                        let w: i64 = w.trim().parse().map_err(|_| MALFORMED.to_string())?;
                        if w.unsigned_abs() >= MAX_WIDTH {
                            return Err(MALFORMED.into());
                        }
                        let pad = (w.unsigned_abs() as usize).saturating_sub(text.chars().count());
                        if w < 0 {
                            out.push_str(&text);
                            out.extend(std::iter::repeat_n(' ', pad));
                        } else {
                            out.extend(std::iter::repeat_n(' ', pad));
                            out.push_str(&text);
                        }
                    }
                }
            }
            c => out.push(c),
        }
    }
    Ok(out)
}
