//! Tree-walking interpreter for checked scripts.
//!
//! Every fault becomes a `ScriptException` pointing at the offending
//! expression; nothing in here panics on bad script input.

use std::collections::HashMap;
use std::io;
use std::path::PathBuf;
use std::time::{Duration, Instant};

use super::ast::*;
use super::context::{ExecutionContext, INDENT_STEP};
use super::globals::{self, MemberKind, ScriptOptions};
use super::value::{Library, Value, format_composite};
use crate::model::{ScriptException, Span};
use crate::project::Symbol;

type Flow<T> = Result<T, ScriptException>;

/// Runs `script` against `ctx`. Returns the value of the last top-level
/// expression statement.
pub fn execute(
    script: &Script,
    ctx: &mut ExecutionContext,
    options: &ScriptOptions,
    timeout: Option<Duration>,
) -> Flow<Value> {
    let mut vm = Vm {
        script: ctx.script_file().to_path_buf(),
        ctx,
        options,
        scopes: vec![HashMap::new()],
        deadline: timeout.map(|t| (Instant::now() + t, t)),
    };
    let mut last = Value::Null;
    for stmt in &script.body {
        last = vm.exec(stmt)?;
    }
    Ok(last)
}

/// Where an assignment stores its value.
enum Place {
    Local(String),
    Context(String),
}

struct Vm<'a> {
    ctx: &'a mut ExecutionContext,
    options: &'a ScriptOptions,
    script: PathBuf,
    scopes: Vec<HashMap<String, Value>>,
    deadline: Option<(Instant, Duration)>,
}

impl Vm<'_> {
    fn fault(&self, span: Span, message: impl Into<String>) -> ScriptException {
        ScriptException::at(message, &self.script, span)
    }

    fn io_fault(&self, span: Span) -> impl Fn(io::Error) -> ScriptException + '_ {
        move |e| self.fault(span, format!("writing output failed: {e}"))
    }

    fn tick(&self, span: Span) -> Flow<()> {
        match self.deadline {
            Some((deadline, timeout)) if Instant::now() >= deadline => Err(self.fault(
                span,
                format!("script exceeded its deadline of {} ms", timeout.as_millis()),
            )),
            _ => Ok(()),
        }
    }

    fn local(&self, name: &str) -> Option<&Value> {
        self.scopes.iter().rev().find_map(|s| s.get(name))
    }

    fn local_mut(&mut self, name: &str) -> Option<&mut Value> {
        self.scopes.iter_mut().rev().find_map(|s| s.get_mut(name))
    }

    // ── statements ───────────────────────────────────────────────────

    fn exec(&mut self, stmt: &Stmt) -> Flow<Value> {
        self.tick(stmt.span)?;
        match &stmt.kind {
            StmtKind::Var { name, init } => {
                let value = self.eval(init)?;
                if let Some(scope) = self.scopes.last_mut() {
                    scope.insert(name.clone(), value);
                }
            }
            StmtKind::Expr(expr) => return self.eval(expr),
            StmtKind::If {
                condition,
                then_branch,
                else_branch,
            } => {
                if self.condition(condition)? {
                    self.block(then_branch, None)?;
                } else if let Some(else_branch) = else_branch {
                    self.block(else_branch, None)?;
                }
            }
            StmtKind::While { condition, body } => {
                while self.condition(condition)? {
                    self.block(body, None)?;
                    self.tick(stmt.span)?;
                }
            }
            StmtKind::Foreach {
                binding,
                items,
                body,
            } => {
                let items = match self.eval(items)? {
                    Value::List(items) => items,
                    Value::Str(s) => s.chars().map(|c| Value::Str(c.to_string())).collect(),
                    other => {
                        return Err(self.fault(
                            stmt.span,
                            format!("foreach cannot iterate over a value of type `{}`", other.type_name()),
                        ));
                    }
                };
                for item in items {
                    self.tick(stmt.span)?;
                    self.block(body, Some((binding, item)))?;
                }
            }
            StmtKind::Throw(value) => {
                let message = match self.eval(value)? {
                    Value::Null => "exception of type 'ScriptException' was thrown".to_string(),
                    other => other.to_string(),
                };
                return Err(self.fault(stmt.span, message));
            }
            StmtKind::Block(body) => self.block(body, None)?,
        }
        Ok(Value::Null)
    }

    fn block(&mut self, body: &[Stmt], binding: Option<(&String, Value)>) -> Flow<()> {
        let mut scope = HashMap::new();
        if let Some((name, value)) = binding {
            scope.insert(name.clone(), value);
        }
        self.scopes.push(scope);
        let result = body.iter().try_for_each(|stmt| self.exec(stmt).map(drop));
        self.scopes.pop();
        result
    }

    fn condition(&mut self, expr: &Expr) -> Flow<bool> {
        match self.eval(expr)? {
            Value::Bool(b) => Ok(b),
            other => Err(self.fault(
                expr.span,
                format!("condition must be a bool, found `{}`", other.type_name()),
            )),
        }
    }

    // ── expressions ──────────────────────────────────────────────────

    fn eval(&mut self, expr: &Expr) -> Flow<Value> {
        let span = expr.span;
        match &expr.kind {
            ExprKind::Null => Ok(Value::Null),
            ExprKind::Bool(b) => Ok(Value::Bool(*b)),
            ExprKind::Int(n) => Ok(Value::Int(*n)),
            ExprKind::Str(s) => Ok(Value::Str(s.clone())),
            ExprKind::List(items) => items
                .iter()
                .map(|e| self.eval(e))
                .collect::<Flow<Vec<_>>>()
                .map(Value::List),
            ExprKind::Name(name) => self.name(name, span),
            ExprKind::Member { target, name } => {
                let recv = self.eval(target)?;
                self.get_member(recv, name, span)
            }
            ExprKind::Call { callee, args } => match &callee.kind {
                ExprKind::Name(name) if self.local(name).is_none() => {
                    let args = self.eval_args(args)?;
                    self.call_method(Value::Context, name, args, callee.span)
                }
                ExprKind::Member { target, name } => {
                    let recv = self.eval(target)?;
                    let args = self.eval_args(args)?;
                    self.call_method(recv, name, args, callee.span)
                }
                _ => {
                    let value = self.eval(callee)?;
                    Err(self.fault(span, format!("a value of type `{}` is not invocable", value.type_name())))
                }
            },
            ExprKind::Index { target, index } => {
                let target = self.eval(target)?;
                let index = self.eval(index)?;
                self.index(target, index, span)
            }
            ExprKind::Unary { op, operand } => match (op, self.eval(operand)?) {
                (UnaryOp::Not, Value::Bool(b)) => Ok(Value::Bool(!b)),
                (UnaryOp::Neg, Value::Int(n)) => n
                    .checked_neg()
                    .map(Value::Int)
                    .ok_or_else(|| self.fault(span, "arithmetic operation resulted in an overflow")),
                (op, value) => Err(self.fault(
                    span,
                    format!(
                        "operator `{}` cannot be applied to an operand of type `{}`",
                        if *op == UnaryOp::Not { "!" } else { "-" },
                        value.type_name()
                    ),
                )),
            },
            ExprKind::Binary { op, lhs, rhs } => match op {
                BinOp::And | BinOp::Or => {
                    let lhs = self.condition(lhs)?;
                    if lhs == (*op == BinOp::Or) {
                        return Ok(Value::Bool(lhs));
                    }
                    Ok(Value::Bool(self.condition(rhs)?))
                }
                _ => {
                    let lhs = self.eval(lhs)?;
                    let rhs = self.eval(rhs)?;
                    self.binary(*op, lhs, rhs, span)
                }
            },
            ExprKind::Assign { op, target, value } => self.assign(*op, target, value, span),
        }
    }

    fn eval_args(&mut self, args: &[Expr]) -> Flow<Vec<Value>> {
        args.iter().map(|a| self.eval(a)).collect()
    }

    fn name(&mut self, name: &str, span: Span) -> Flow<Value> {
        if let Some(value) = self.local(name) {
            return Ok(value.clone());
        }
        if name == "Context" {
            return Ok(Value::Context);
        }
        if let Some(lib) = self.options.library(name) {
            return Ok(Value::Library(lib.library));
        }
        self.get_member(Value::Context, name, span)
    }

    fn binary(&self, op: BinOp, lhs: Value, rhs: Value, span: Span) -> Flow<Value> {
        let overflow = || self.fault(span, "arithmetic operation resulted in an overflow");
        let value = match (op, &lhs, &rhs) {
            (BinOp::Eq, _, _) => Value::Bool(lhs.equals(&rhs)),
            (BinOp::Ne, _, _) => Value::Bool(!lhs.equals(&rhs)),
            (BinOp::Add, Value::Int(a), Value::Int(b)) => Value::Int(a.checked_add(*b).ok_or_else(overflow)?),
            (BinOp::Add, Value::Str(_), _) | (BinOp::Add, _, Value::Str(_)) => Value::Str(format!("{lhs}{rhs}")),
            (BinOp::Add, Value::List(a), Value::List(b)) => Value::List(a.iter().chain(b).cloned().collect()),
            (BinOp::Sub, Value::Int(a), Value::Int(b)) => Value::Int(a.checked_sub(*b).ok_or_else(overflow)?),
            (BinOp::Mul, Value::Int(a), Value::Int(b)) => Value::Int(a.checked_mul(*b).ok_or_else(overflow)?),
            (BinOp::Div | BinOp::Rem, Value::Int(_), Value::Int(0)) => {
                return Err(self.fault(span, "attempted to divide by zero"));
            }
            (BinOp::Div, Value::Int(a), Value::Int(b)) => Value::Int(a.checked_div(*b).ok_or_else(overflow)?),
            (BinOp::Rem, Value::Int(a), Value::Int(b)) => Value::Int(a.checked_rem(*b).ok_or_else(overflow)?),
            (BinOp::Lt | BinOp::Le | BinOp::Gt | BinOp::Ge, _, _) => {
                let ordering = match (&lhs, &rhs) {
                    (Value::Int(a), Value::Int(b)) => a.cmp(b),
                    (Value::Str(a), Value::Str(b)) => a.cmp(b),
                    _ => return Err(self.operand_fault(op, &lhs, &rhs, span)),
                };
                Value::Bool(match op {
                    BinOp::Lt => ordering.is_lt(),
                    BinOp::Le => ordering.is_le(),
                    BinOp::Gt => ordering.is_gt(),
                    _ => ordering.is_ge(),
                })
            }
            _ => return Err(self.operand_fault(op, &lhs, &rhs, span)),
        };
        Ok(value)
    }

    fn operand_fault(&self, op: BinOp, lhs: &Value, rhs: &Value, span: Span) -> ScriptException {
        self.fault(
            span,
            format!(
                "operator `{}` cannot be applied to operands of type `{}` and `{}`",
                op.symbol(),
                lhs.type_name(),
                rhs.type_name()
            ),
        )
    }

    fn assign(&mut self, op: AssignOp, target: &Expr, value: &Expr, span: Span) -> Flow<Value> {
        let place = match &target.kind {
            ExprKind::Name(name) if self.local(name).is_some() => Place::Local(name.clone()),
            ExprKind::Name(name) => Place::Context(name.clone()),
            ExprKind::Member { target: owner, name } => match self.eval(owner)? {
                Value::Context => Place::Context(name.clone()),
                other => {
                    return Err(self.fault(
                        target.span,
                        format!("`{name}` of `{}` cannot be assigned to", other.type_name()),
                    ));
                }
            },
            _ => {
                return Err(self.fault(
                    target.span,
                    "the left-hand side of an assignment must be a variable or property",
                ));
            }
        };

        let rhs = self.eval(value)?;
        let new_value = match op {
            AssignOp::Set => rhs,
            AssignOp::Add | AssignOp::Sub => {
                let current = match &place {
                    Place::Local(name) => self.local(name).cloned().unwrap_or(Value::Null),
                    Place::Context(name) => self.get_member(Value::Context, name, target.span)?,
                };
                let op = if op == AssignOp::Add { BinOp::Add } else { BinOp::Sub };
                self.binary(op, current, rhs, span)?
            }
        };

        match place {
            Place::Local(name) => {
                if let Some(slot) = self.local_mut(&name) {
                    *slot = new_value.clone();
                }
            }
            Place::Context(name) => self.set_context(&name, new_value.clone(), target.span)?,
        }
        Ok(new_value)
    }

    fn index(&self, target: Value, index: Value, span: Span) -> Flow<Value> {
        let out_of_range = || self.fault(span, "index was outside the bounds of the list");
        match (target, index) {
            (Value::List(items), Value::Int(i)) => usize::try_from(i)
                .ok()
                .and_then(|i| items.get(i).cloned())
                .ok_or_else(out_of_range),
            (Value::Str(s), Value::Int(i)) => usize::try_from(i)
                .ok()
                .and_then(|i| s.chars().nth(i))
                .map(|c| Value::Str(c.to_string()))
                .ok_or_else(out_of_range),
            (Value::Null, _) => Err(self.null_fault(span)),
            (target, index) => Err(self.fault(
                span,
                format!(
                    "cannot index a value of type `{}` with `{}`",
                    target.type_name(),
                    index.type_name()
                ),
            )),
        }
    }

    fn null_fault(&self, span: Span) -> ScriptException {
        self.fault(span, "object reference not set to an instance of an object")
    }

    fn missing(&self, recv: &Value, name: &str, span: Span) -> ScriptException {
        self.fault(
            span,
            format!("`{}` does not contain a definition for `{name}`", recv.type_name()),
        )
    }

    // ── members ──────────────────────────────────────────────────────

    fn get_member(&self, recv: Value, name: &str, span: Span) -> Flow<Value> {
        let value = match (&recv, name) {
            (Value::Context, _) => return self.get_context(name, span),
            (Value::Null, _) => return Err(self.null_fault(span)),
            (Value::Str(s), "Length") => Value::Int(s.chars().count() as i64),
            (Value::List(items), "Count") => Value::Int(items.len() as i64),
            (Value::Document(doc), "Name") => Value::from(doc.name.as_str()),
            (Value::Document(doc), "Path") => Value::from(doc.path.display().to_string()),
            (Value::Document(doc), "Text") => Value::from(doc.text.as_str()),
            (Value::Document(doc), "Tree") => Value::Tree(doc.syntax_tree()),
            (Value::Document(doc), "Model") => Value::Model(doc.semantic_model()),
            (Value::Tree(tree), "Path") => Value::from(tree.path.display().to_string()),
            (Value::Tree(tree), "Text") => Value::from(tree.text.as_str()),
            (Value::Tree(tree), "Lines") => Value::List(tree.lines().map(Value::from).collect()),
            (Value::Tree(tree), "LineCount") => Value::Int(tree.lines().count() as i64),
            (Value::Model(model), "Path") => Value::from(model.path.display().to_string()),
            (Value::Model(model), "Symbols") => symbols(model.symbols.iter()),
            (Value::Model(model), "Types") => symbols(model.types()),
            (Value::Model(model), "Functions") => symbols(model.functions()),
            (Value::Symbol(sym), "Name") => Value::from(sym.name.as_str()),
            (Value::Symbol(sym), "Kind") => Value::from(sym.kind.as_str()),
            (Value::Symbol(sym), "Line") => Value::Int(i64::from(sym.line)),
            (Value::Symbol(sym), "IsPublic") => Value::Bool(sym.public),
            (Value::Symbol(sym), "Container") => Value::from(sym.container.clone()),
            _ => return Err(self.missing(&recv, name, span)),
        };
        Ok(value)
    }

    fn call_method(&mut self, recv: Value, name: &str, args: Vec<Value>, span: Span) -> Flow<Value> {
        match recv {
            Value::Context => self.call_context(name, args, span),
            Value::Library(lib) => self.call_library(lib, name, args, span),
            Value::Str(s) => self.call_string(&s, name, &args, span),
            Value::List(items) if name == "Contains" => {
                self.arity(name, &args, 1, 1, span)?;
                Ok(Value::Bool(items.iter().any(|i| i.equals(&args[0]))))
            }
            Value::Model(model) if name == "Find" => {
                self.arity(name, &args, 1, 1, span)?;
                let wanted = self.str_arg(&args, 0, span)?;
                Ok(model
                    .find(&wanted)
                    .map_or(Value::Null, |s| Value::Symbol(s.clone())))
            }
            Value::Null => Err(self.null_fault(span)),
            other => Err(self.missing(&other, name, span)),
        }
    }

    fn arity(&self, name: &str, args: &[Value], min: usize, max: usize, span: Span) -> Flow<()> {
        if args.len() < min || args.len() > max {
            return Err(self.fault(
                span,
                format!("no overload for method `{name}` takes {} arguments", args.len()),
            ));
        }
        Ok(())
    }

    fn str_arg(&self, args: &[Value], i: usize, span: Span) -> Flow<String> {
        match args.get(i) {
            Some(Value::Str(s)) => Ok(s.clone()),
            Some(other) => Err(self.fault(
                span,
                format!("argument {} must be a string, found `{}`", i + 1, other.type_name()),
            )),
            None => Err(self.fault(span, format!("missing argument {}", i + 1))),
        }
    }

    fn int_arg(&self, args: &[Value], i: usize, span: Span) -> Flow<i64> {
        match args.get(i) {
            Some(Value::Int(n)) => Ok(*n),
            Some(other) => Err(self.fault(
                span,
                format!("argument {} must be an int, found `{}`", i + 1, other.type_name()),
            )),
            None => Err(self.fault(span, format!("missing argument {}", i + 1))),
        }
    }

    fn call_string(&self, s: &str, name: &str, args: &[Value], span: Span) -> Flow<Value> {
        let value = match name {
            "ToUpper" | "ToLower" | "Trim" => {
                self.arity(name, args, 0, 0, span)?;
                Value::from(match name {
                    "ToUpper" => s.to_uppercase(),
                    "ToLower" => s.to_lowercase(),
                    _ => s.trim().to_string(),
                })
            }
            "Contains" | "StartsWith" | "EndsWith" => {
                self.arity(name, args, 1, 1, span)?;
                let needle = self.str_arg(args, 0, span)?;
                Value::Bool(match name {
                    "Contains" => s.contains(&needle),
                    "StartsWith" => s.starts_with(&needle),
                    _ => s.ends_with(&needle),
                })
            }
            "IndexOf" => {
                self.arity(name, args, 1, 1, span)?;
                let needle = self.str_arg(args, 0, span)?;
                Value::Int(
                    s.find(&needle)
                        .map_or(-1, |byte| s[..byte].chars().count() as i64),
                )
            }
            "Replace" => {
                self.arity(name, args, 2, 2, span)?;
                let from = self.str_arg(args, 0, span)?;
                let to = self.str_arg(args, 1, span)?;
                if from.is_empty() {
                    return Err(self.fault(span, "string cannot be of zero length"));
                }
                Value::from(s.replace(&from, &to))
            }
            "Split" => {
                self.arity(name, args, 1, 1, span)?;
                let sep = self.str_arg(args, 0, span)?;
                if sep.is_empty() {
                    return Err(self.fault(span, "separator cannot be of zero length"));
                }
                Value::List(s.split(sep.as_str()).map(Value::from).collect())
            }
            "Substring" => {
                self.arity(name, args, 1, 2, span)?;
                let chars: Vec<char> = s.chars().collect();
                let start = self.int_arg(args, 0, span)?;
                let len = match args.len() {
                    2 => self.int_arg(args, 1, span)?,
                    _ => chars.len() as i64 - start,
                };
                let in_range = start >= 0 && len >= 0 && start.saturating_add(len) <= chars.len() as i64;
                if !in_range {
                    return Err(self.fault(span, "index and length must refer to a location within the string"));
                }
                let (start, len) = (start as usize, len as usize);
                Value::from(chars[start..start + len].iter().collect::<String>())
            }
            _ => return Err(self.missing(&Value::Str(String::new()), name, span)),
        };
        Ok(value)
    }

    fn call_library(&self, lib: Library, name: &str, args: Vec<Value>, span: Span) -> Flow<Value> {
        let member = globals::library_member(lib, name)
            .ok_or_else(|| self.missing(&Value::Library(lib), name, span))?;
        if !member.kind.accepts(args.len()) {
            return Err(self.fault(
                span,
                format!("no overload for method `{name}` takes {} arguments", args.len()),
            ));
        }

        let value = match (lib, name) {
            (Library::String, "Join") => {
                let sep = args[0].to_string();
                match &args[1] {
                    Value::List(items) => Value::Str(
                        items
                            .iter()
                            .map(Value::to_string)
                            .collect::<Vec<_>>()
                            .join(&sep),
                    ),
                    other => {
                        return Err(self.fault(
                            span,
                            format!("argument 2 must be a list, found `{}`", other.type_name()),
                        ));
                    }
                }
            }
            (Library::String, "Format") => {
                let format = self.str_arg(&args, 0, span)?;
                Value::Str(format_composite(&format, &args[1..]).map_err(|e| self.fault(span, e))?)
            }
            (Library::String, "Concat") => Value::Str(args.iter().map(Value::to_string).collect()),
            (Library::String, "IsNullOrEmpty") => Value::Bool(match &args[0] {
                Value::Null => true,
                Value::Str(s) => s.is_empty(),
                _ => false,
            }),
            (Library::Math, "Abs") => {
                let n = self.int_arg(&args, 0, span)?;
                Value::Int(
                    n.checked_abs()
                        .ok_or_else(|| self.fault(span, "negating the minimum value of an int is invalid"))?,
                )
            }
            (Library::Math, "Max" | "Min") => {
                let a = self.int_arg(&args, 0, span)?;
                let b = self.int_arg(&args, 1, span)?;
                Value::Int(if name == "Max" { a.max(b) } else { a.min(b) })
            }
            _ => return Err(self.missing(&Value::Library(lib), name, span)),
        };
        Ok(value)
    }

    // ── the context ──────────────────────────────────────────────────

    fn context_member(&self, name: &str, span: Span) -> Flow<&'static globals::Member> {
        globals::context_member(name)
            .filter(|m| self.options.allows(m))
            .ok_or_else(|| self.fault(span, format!("the name `{name}` does not exist in the current context")))
    }

    /// Text for the `Write` family: a leading string with more arguments is
    /// a format string, a single argument is written as is, anything else
    /// is joined with spaces.
    fn compose(&self, args: &[Value], span: Span) -> Flow<String> {
        match args {
            [] => Ok(String::new()),
            [single] => Ok(single.to_string()),
            [Value::Str(format), rest @ ..] => {
                format_composite(format, rest).map_err(|e| self.fault(span, e))
            }
            _ => Ok(args
                .iter()
                .map(Value::to_string)
                .collect::<Vec<_>>()
                .join(" ")),
        }
    }

    fn get_context(&self, name: &str, span: Span) -> Flow<Value> {
        let member = self.context_member(name, span)?;
        if let MemberKind::Method { .. } = member.kind {
            return Err(self.fault(
                span,
                format!("cannot use method `{name}` as a value; did you mean to call it?"),
            ));
        }
        let ctx = &*self.ctx;
        let value = match name {
            "Context" => Value::Context,
            "Indentation" | "Indent" => Value::Int(ctx.indentation() as i64),
            "AutoWriteIndentation" => Value::Bool(ctx.auto_write_indentation()),
            "Extension" => Value::from(ctx.extension()),
            "ScriptFile" => Value::from(ctx.script_file().display().to_string()),
            "OutputPath" => Value::from(ctx.output_path().display().to_string()),
            "Project" => Value::from(ctx.project().name.as_str()),
            "Documents" => Value::List(ctx.documents().iter().cloned().map(Value::Document).collect()),
            "Syntaxes" => Value::List(ctx.syntaxes().map(Value::Str).collect()),
            "Trees" => Value::List(ctx.trees().map(Value::Tree).collect()),
            "Models" => Value::List(ctx.models().map(Value::Model).collect()),
            _ => return Err(self.missing(&Value::Context, name, span)),
        };
        Ok(value)
    }

    fn set_context(&mut self, name: &str, value: Value, span: Span) -> Flow<()> {
        let member = self.context_member(name, span)?;
        if member.kind != (MemberKind::Property { writable: true }) {
            return Err(self.fault(span, format!("`{name}` cannot be assigned to; it is read only")));
        }
        match (name, value) {
            ("Indentation" | "Indent", Value::Int(n)) => self.ctx.set_indentation(n),
            ("AutoWriteIndentation", Value::Bool(b)) => self.ctx.set_auto_write_indentation(b),
            ("Extension", Value::Str(s)) => self.ctx.set_extension(s),
            (_, value) => {
                return Err(self.fault(
                    span,
                    format!("cannot assign a value of type `{}` to `{name}`", value.type_name()),
                ));
            }
        }
        Ok(())
    }

    fn call_context(&mut self, name: &str, args: Vec<Value>, span: Span) -> Flow<Value> {
        let member = self.context_member(name, span)?;
        if let MemberKind::Property { .. } = member.kind {
            return Err(self.fault(
                span,
                format!("non-invocable member `{name}` cannot be used like a method"),
            ));
        }
        if !member.kind.accepts(args.len()) {
            return Err(self.fault(
                span,
                format!("no overload for method `{name}` takes {} arguments", args.len()),
            ));
        }

        match name {
            "Write" | "WriteLine" => {
                let text = self.compose(&args, span)?;
                let written = if name == "Write" {
                    self.ctx.write(&text).map(drop)
                } else {
                    self.ctx.write_line(&text).map(drop)
                };
                written.map_err(self.io_fault(span))?;
            }
            "WriteUsings" => {
                let mut names = Vec::new();
                for arg in args {
                    match arg {
                        Value::List(items) => names.extend(items.iter().map(Value::to_string)),
                        other => names.push(other.to_string()),
                    }
                }
                let written = self.ctx.write_usings(&names).map(drop);
                written.map_err(self.io_fault(span))?;
            }
            "WriteNamespace" => {
                let ns = args[0].to_string();
                let written = self.ctx.write_namespace(&ns).map(drop);
                written.map_err(self.io_fault(span))?;
            }
            "WriteEnd" => {
                let written = self.ctx.write_end().map(drop);
                written.map_err(self.io_fault(span))?;
            }
            "WriteIndentation" => {
                let written = self.ctx.write_indentation().map(drop);
                written.map_err(self.io_fault(span))?;
            }
            "IncreaseIndentation" | "DecreaseIndentation" => {
                let by = if args.is_empty() {
                    INDENT_STEP
                } else {
                    self.int_arg(&args, 0, span)?
                };
                if name == "IncreaseIndentation" {
                    self.ctx.increase_indentation(by);
                } else {
                    self.ctx.decrease_indentation(by);
                }
            }
            "Document" | "Syntax" | "Tree" | "Model" => {
                let wanted = self.str_arg(&args, 0, span)?;
                return Ok(match name {
                    "Document" => self.ctx.document(&wanted).map_or(Value::Null, Value::Document),
                    "Syntax" => Value::from(self.ctx.syntax(&wanted)),
                    "Tree" => self.ctx.tree(&wanted).map_or(Value::Null, Value::Tree),
                    _ => self.ctx.model(&wanted).map_or(Value::Null, Value::Model),
                });
            }
            _ => return Err(self.missing(&Value::Context, name, span)),
        }
        Ok(Value::Context)
    }
}

fn symbols<'s>(iter: impl Iterator<Item = &'s Symbol>) -> Value {
    Value::List(iter.cloned().map(Value::Symbol).collect())
}
