//! Name and member checks run after parsing.
//!
//! Only the context and library namespaces have a static shape; members of
//! strings, lists and project objects are resolved when the script runs.

use super::ast::*;
use super::globals::{self, LibraryDef, Member, MemberKind, ScriptOptions};
use crate::model::{Diagnostic, Span};

/// What an expression is known to be before running it.
#[derive(Clone, Copy)]
enum Known {
    Context,
    Library(&'static LibraryDef),
}

struct Local {
    name: String,
    span: Span,
    used: bool,
    /// `var` declarations warn when unused; `foreach` bindings don't.
    warn_unused: bool,
}

pub fn check(script: &Script, options: &ScriptOptions) -> Vec<Diagnostic> {
    let mut checker = Checker {
        options,
        scopes: Vec::new(),
        diagnostics: Vec::new(),
    };
    checker.block(&script.body);
    checker.diagnostics.sort_by_key(|d| d.span.offset);
    checker.diagnostics
}

struct Checker<'a> {
    options: &'a ScriptOptions,
    scopes: Vec<Vec<Local>>,
    diagnostics: Vec<Diagnostic>,
}

impl Checker<'_> {
    fn error(&mut self, code: &'static str, span: Span, message: String) {
        self.diagnostics.push(Diagnostic::error(code, span, message));
    }

    // ── scopes ───────────────────────────────────────────────────────

    fn block(&mut self, body: &[Stmt]) {
        self.scopes.push(Vec::new());
        self.statements(body);
        self.pop_scope();
    }

    fn pop_scope(&mut self) {
        let Some(scope) = self.scopes.pop() else {
            return;
        };
        for local in scope.into_iter().filter(|l| l.warn_unused && !l.used) {
            self.diagnostics.push(Diagnostic::warning(
                "SG0168",
                local.span,
                format!("the variable `{}` is declared but never used", local.name),
            ));
        }
    }

    fn declare(&mut self, name: &str, span: Span, warn_unused: bool) {
        if self.lookup(name).is_some() {
            self.error(
                "SG0128",
                span,
                format!("a local variable named `{name}` is already defined in this scope"),
            );
            return;
        }
        if let Some(scope) = self.scopes.last_mut() {
            scope.push(Local {
                name: name.to_string(),
                span,
                used: false,
                warn_unused,
            });
        }
    }

    fn lookup(&mut self, name: &str) -> Option<&mut Local> {
        self.scopes
            .iter_mut()
            .rev()
            .flat_map(|s| s.iter_mut())
            .find(|l| l.name == name)
    }

    // ── statements ───────────────────────────────────────────────────

    fn statements(&mut self, body: &[Stmt]) {
        let mut threw = false;
        for stmt in body {
            if threw {
                self.diagnostics.push(Diagnostic::warning(
                    "SG0162",
                    stmt.span,
                    "unreachable code detected",
                ));
                threw = false;
            }
            self.statement(stmt);
            if matches!(stmt.kind, StmtKind::Throw(_)) {
                threw = true;
            }
        }
    }

    fn statement(&mut self, stmt: &Stmt) {
        match &stmt.kind {
            StmtKind::Var { name, init } => {
                self.expr(init);
                self.declare(name, stmt.span, true);
            }
            StmtKind::Expr(expr) => self.expr(expr),
            StmtKind::If {
                condition,
                then_branch,
                else_branch,
            } => {
                self.expr(condition);
                self.block(then_branch);
                if let Some(else_branch) = else_branch {
                    self.block(else_branch);
                }
            }
            StmtKind::While { condition, body } => {
                self.expr(condition);
                self.block(body);
            }
            StmtKind::Foreach {
                binding,
                items,
                body,
            } => {
                self.expr(items);
                self.scopes.push(Vec::new());
                self.declare(binding, stmt.span, false);
                self.statements(body);
                self.pop_scope();
            }
            StmtKind::Throw(value) => self.expr(value),
            StmtKind::Block(body) => self.block(body),
        }
    }

    // ── expressions ──────────────────────────────────────────────────

    fn expr(&mut self, expr: &Expr) {
        match &expr.kind {
            ExprKind::Null | ExprKind::Bool(_) | ExprKind::Int(_) | ExprKind::Str(_) => {}
            ExprKind::List(items) => items.iter().for_each(|e| self.expr(e)),
            ExprKind::Name(name) => {
                if let Some(member) = self.resolve_name(name, expr.span) {
                    self.not_a_method(member, expr.span);
                }
            }
            ExprKind::Member { target, name } => {
                if let Some(member) = self.member(target, name, expr.span) {
                    self.not_a_method(member, expr.span);
                }
            }
            ExprKind::Call { callee, args } => {
                args.iter().for_each(|a| self.expr(a));
                self.call(callee, args.len());
            }
            ExprKind::Index { target, index } => {
                self.expr(target);
                self.expr(index);
            }
            ExprKind::Unary { operand, .. } => self.expr(operand),
            ExprKind::Binary { lhs, rhs, .. } => {
                self.expr(lhs);
                self.expr(rhs);
            }
            ExprKind::Assign { op, target, value } => {
                self.expr(value);
                self.assign_target(*op, target);
            }
        }
    }

    /// Resolves a bare name. Returns the context member it names, if any.
    fn resolve_name(&mut self, name: &str, span: Span) -> Option<&'static Member> {
        if let Some(local) = self.lookup(name) {
            local.used = true;
            return None;
        }
        if name == "Context" || self.options.library(name).is_some() {
            return None;
        }
        match globals::context_member(name) {
            Some(member) if self.options.allows(member) => Some(member),
            _ => {
                self.error(
                    "SG0103",
                    span,
                    format!("the name `{name}` does not exist in the current context"),
                );
                None
            }
        }
    }

    /// The static shape of `expr`, if it has one. Does not report anything.
    fn known(&mut self, expr: &Expr) -> Option<Known> {
        match &expr.kind {
            ExprKind::Name(name) => {
                if self.lookup(name).is_some() {
                    return None;
                }
                if name == "Context" {
                    return Some(Known::Context);
                }
                self.options.library(name).map(Known::Library)
            }
            ExprKind::Member { target, name } if name == "Context" => {
                matches!(self.known(target), Some(Known::Context)).then_some(Known::Context)
            }
            ExprKind::Call { callee, .. } => {
                let member = match &callee.kind {
                    ExprKind::Name(name) if self.lookup(name).is_none() => {
                        globals::context_member(name)
                    }
                    ExprKind::Member { target, name } => match self.known(target) {
                        Some(Known::Context) => globals::context_member(name),
                        _ => None,
                    },
                    _ => None,
                }?;
                matches!(member.kind, MemberKind::Method { chains: true, .. }).then_some(Known::Context)
            }
            _ => None,
        }
    }

    /// Checks `target.name` and returns the member when the target has a
    /// static shape.
    fn member(&mut self, target: &Expr, name: &str, span: Span) -> Option<&'static Member> {
        self.expr(target);
        let (owner, found) = match self.known(target)? {
            Known::Context => (
                "Context",
                globals::context_member(name).filter(|m| self.options.allows(m)),
            ),
            Known::Library(lib) => (lib.namespace, globals::library_member(lib.library, name)),
        };
        if found.is_none() {
            self.error(
                "SG0117",
                span,
                format!("`{owner}` does not contain a definition for `{name}`"),
            );
        }
        found
    }

    fn not_a_method(&mut self, member: &Member, span: Span) {
        if matches!(member.kind, MemberKind::Method { .. }) {
            self.error(
                "SG0428",
                span,
                format!("cannot use method `{}` as a value; did you mean to call it?", member.name),
            );
        }
    }

    fn call(&mut self, callee: &Expr, argc: usize) {
        let member = match &callee.kind {
            ExprKind::Name(name) => self.resolve_name(name, callee.span),
            ExprKind::Member { target, name } => self.member(target, name, callee.span),
            _ => {
                self.expr(callee);
                None
            }
        };
        let Some(member) = member else {
            return;
        };
        match member.kind {
            MemberKind::Property { .. } => self.error(
                "SG1955",
                callee.span,
                format!("non-invocable member `{}` cannot be used like a method", member.name),
            ),
            kind if !kind.accepts(argc) => self.error(
                "SG1501",
                callee.span,
                format!("no overload for method `{}` takes {argc} arguments", member.name),
            ),
            _ => {}
        }
    }

    fn assign_target(&mut self, op: AssignOp, target: &Expr) {
        let member = match &target.kind {
            ExprKind::Name(name) => {
                if let Some(local) = self.lookup(name) {
                    // Compound assignment reads the variable.
                    if op != AssignOp::Set {
                        local.used = true;
                    }
                    return;
                }
                self.resolve_name(name, target.span)
            }
            ExprKind::Member { target: owner, name } => self.member(owner, name, target.span),
            _ => {
                self.expr(target);
                self.error(
                    "SG0131",
                    target.span,
                    "the left-hand side of an assignment must be a variable or property".into(),
                );
                return;
            }
        };
        if let Some(member) = member {
            if member.kind != (MemberKind::Property { writable: true }) {
                self.error(
                    "SG0200",
                    target.span,
                    format!("`{}` cannot be assigned to; it is read only", member.name),
                );
            }
        }
    }
}
