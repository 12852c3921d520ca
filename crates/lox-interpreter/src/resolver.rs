use std::mem;

use log::{debug, trace};
use lox_common::error::{Error, ErrorS, NameError, SyntaxError, TypeError};
use lox_common::stack;
use lox_common::types::Span;
use lox_syntax::ast::{Expr, ExprS, Program, Spanned, Stmt, StmtFun, StmtS, Var};
use rustc_hash::FxHashMap;

use crate::interpreter::Locals;

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
enum FunType {
    #[default]
    None,
    Function,
    Initializer,
    Method,
}

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
enum ClassType {
    #[default]
    None,
    Class,
    Subclass,
}

/// Static pass between parsing and interpretation.
///
/// Each frame on `scopes` matches one `Env` the interpreter will create at run
/// time, so the distance recorded for a reference is exactly the number of
/// parent hops the interpreter has to take. Names that are not found in any
/// frame are left out of [`Locals`] and looked up in the globals.
#[derive(Debug, Default)]
pub struct Resolver {
    /// `false` while a name is declared but its initializer is still running.
    scopes: Vec<FxHashMap<String, bool>>,
    locals: Locals,
    errors: Vec<ErrorS>,
    fun_type: FunType,
    class_type: ClassType,
}

impl Resolver {
    pub fn resolve(mut self, program: &Program) -> Result<Locals, Vec<ErrorS>> {
        for stmt_s in &program.stmts {
            self.resolve_stmt(stmt_s);
        }
        debug!("resolved {} bindings with {} errors", self.locals.len(), self.errors.len());
        if self.errors.is_empty() {
            Ok(self.locals)
        } else {
            Err(self.errors)
        }
    }

    fn resolve_stmt(&mut self, stmt_s: &StmtS) {
        stack::ensure_sufficient_stack(|| self.resolve_stmt_inner(stmt_s))
    }

    fn resolve_stmt_inner(&mut self, stmt_s: &StmtS) {
        let (stmt, span) = stmt_s;
        match stmt {
            Stmt::Block(block) => {
                self.begin_scope();
                for stmt_s in &block.stmts {
                    self.resolve_stmt(stmt_s);
                }
                self.end_scope();
            }
            Stmt::Class(class) => {
                let enclosing = mem::replace(&mut self.class_type, ClassType::Class);
                self.declare_define(&class.name);

                if let Some(super_) = &class.super_ {
                    if let (Expr::Var(var), span) = super_ {
                        if var.var.name == class.name.0 {
                            self.errors.push((
                                Error::TypeError(TypeError::InheritFromSelf {
                                    name: class.name.0.clone(),
                                }),
                                span.clone(),
                            ));
                        }
                    }
                    self.class_type = ClassType::Subclass;
                    self.resolve_expr(super_);
                    self.begin_scope();
                    self.define("super");
                }

                self.begin_scope();
                self.define("this");
                for method in &class.methods {
                    let fun_type = match method.name.0.as_str() {
                        "init" => FunType::Initializer,
                        _ => FunType::Method,
                    };
                    self.resolve_fun(method, fun_type);
                }
                self.end_scope();

                if class.super_.is_some() {
                    self.end_scope();
                }
                self.class_type = enclosing;
            }
            Stmt::Expr(expr) => self.resolve_expr(&expr.value),
            Stmt::Fun(fun) => {
                self.declare_define(&fun.name);
                self.resolve_fun(fun, FunType::Function);
            }
            Stmt::If(if_) => {
                self.resolve_expr(&if_.cond);
                self.resolve_stmt(&if_.then);
                if let Some(else_) = &if_.else_ {
                    self.resolve_stmt(else_);
                }
            }
            Stmt::Print(print) => self.resolve_expr(&print.value),
            Stmt::Return(return_) => {
                if self.fun_type == FunType::None {
                    self.error(SyntaxError::ReturnOutsideFunction, span);
                }
                if let Some(value) = &return_.value {
                    if self.fun_type == FunType::Initializer {
                        self.error(SyntaxError::ReturnInInitializer, span);
                    }
                    self.resolve_expr(value);
                }
            }
            Stmt::Var(var) => {
                self.declare(&var.name);
                if let Some(value) = &var.value {
                    self.resolve_expr(value);
                }
                self.define(&var.name.0);
            }
            Stmt::While(while_) => {
                self.resolve_expr(&while_.cond);
                self.resolve_stmt(&while_.body);
            }
        }
    }

    fn resolve_expr(&mut self, expr_s: &ExprS) {
        stack::ensure_sufficient_stack(|| self.resolve_expr_inner(expr_s))
    }

    fn resolve_expr_inner(&mut self, expr_s: &ExprS) {
        let (expr, span) = expr_s;
        match expr {
            Expr::Assign(assign) => {
                self.resolve_expr(&assign.value);
                self.access(&assign.var);
            }
            Expr::Call(call) => {
                self.resolve_expr(&call.callee);
                for arg in &call.args {
                    self.resolve_expr(arg);
                }
            }
            Expr::Get(get) => self.resolve_expr(&get.object),
            Expr::Grouping(group) => self.resolve_expr(&group.value),
            Expr::Infix(infix) => {
                self.resolve_expr(&infix.lt);
                self.resolve_expr(&infix.rt);
            }
            Expr::Literal(_) => {}
            Expr::Logical(logical) => {
                self.resolve_expr(&logical.lt);
                self.resolve_expr(&logical.rt);
            }
            Expr::Prefix(prefix) => self.resolve_expr(&prefix.rt),
            Expr::Set(set) => {
                self.resolve_expr(&set.object);
                self.resolve_expr(&set.value);
            }
            Expr::Super(super_) => {
                match self.class_type {
                    ClassType::None => self.error(SyntaxError::SuperOutsideClass, span),
                    ClassType::Class => self.error(SyntaxError::SuperWithoutSuperclass, span),
                    ClassType::Subclass => {}
                }
                self.access(&super_.var);
            }
            Expr::This(this) => {
                if self.class_type == ClassType::None {
                    self.error(SyntaxError::ThisOutsideClass, span);
                }
                self.access(&this.var);
            }
            Expr::Var(var) => {
                let name = &var.var.name;
                if self.scopes.last().and_then(|scope| scope.get(name)) == Some(&false) {
                    self.errors.push((
                        Error::NameError(NameError::AccessInsideInitializer { name: name.clone() }),
                        span.clone(),
                    ));
                }
                self.access(&var.var);
            }
        }
    }

    fn resolve_fun(&mut self, fun: &StmtFun, fun_type: FunType) {
        let enclosing = mem::replace(&mut self.fun_type, fun_type);
        self.begin_scope();
        for param in &fun.params {
            self.declare_define(param);
        }
        for stmt_s in &fun.body {
            self.resolve_stmt(stmt_s);
        }
        self.end_scope();
        self.fun_type = enclosing;
    }

    fn declare_define(&mut self, name: &Spanned<String>) {
        self.declare(name);
        self.define(&name.0);
    }

    fn declare(&mut self, (name, span): &Spanned<String>) {
        if let Some(scope) = self.scopes.last_mut() {
            if scope.contains_key(name) {
                self.errors.push((
                    Error::NameError(NameError::AlreadyDefined { name: name.clone() }),
                    span.clone(),
                ));
            }
            scope.insert(name.clone(), false);
        }
    }

    fn define(&mut self, name: &str) {
        if let Some(scope) = self.scopes.last_mut() {
            scope.insert(name.to_string(), true);
        }
    }

    fn access(&mut self, var: &Var) {
        for (depth, scope) in self.scopes.iter().rev().enumerate() {
            if scope.contains_key(&var.name) {
                trace!("bound {:?} ({:?}) at depth {}", var.name, var.id, depth);
                self.locals.insert(var.id, depth);
                return;
            }
        }
        trace!("left {:?} ({:?}) to the globals", var.name, var.id);
    }

    fn error(&mut self, error: SyntaxError, span: &Span) {
        self.errors.push((Error::SyntaxError(error), span.clone()));
    }

    fn begin_scope(&mut self) {
        self.scopes.push(FxHashMap::default());
    }

    fn end_scope(&mut self) {
        self.scopes.pop().unwrap_or_else(|| unreachable!("attempted to pop global scope"));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use pretty_assertions::assert_eq;

    fn parse(source: &str) -> Program {
        let (tokens, errors) = lox_syntax::scan(source);
        assert!(errors.is_empty(), "{errors:?}");
        let (program, errors) = lox_syntax::parse(tokens);
        assert!(errors.is_empty(), "{errors:?}");
        program
    }

    fn resolve_errors(source: &str) -> Vec<String> {
        match Resolver::default().resolve(&parse(source)) {
            Ok(_) => Vec::new(),
            Err(errors) => errors.iter().map(|(error, _)| error.to_string()).collect(),
        }
    }

    /// Collects the resolved depth of every `Var` reference in a function
    /// body, in source order. `None` means the reference is global.
    fn depths(fun: &StmtFun, locals: &Locals) -> Vec<(String, Option<usize>)> {
        fn walk_stmt(stmt_s: &StmtS, locals: &Locals, out: &mut Vec<(String, Option<usize>)>) {
            match &stmt_s.0 {
                Stmt::Block(block) => block.stmts.iter().for_each(|s| walk_stmt(s, locals, out)),
                Stmt::Print(print) => walk_expr(&print.value, locals, out),
                Stmt::Return(return_) => {
                    return_.value.iter().for_each(|e| walk_expr(e, locals, out))
                }
                Stmt::Var(var) => var.value.iter().for_each(|e| walk_expr(e, locals, out)),
                _ => {}
            }
        }
        fn walk_expr(expr_s: &ExprS, locals: &Locals, out: &mut Vec<(String, Option<usize>)>) {
            match &expr_s.0 {
                Expr::Var(var) => {
                    out.push((var.var.name.clone(), locals.get(&var.var.id).copied()))
                }
                Expr::Infix(infix) => {
                    walk_expr(&infix.lt, locals, out);
                    walk_expr(&infix.rt, locals, out);
                }
                _ => {}
            }
        }

        let mut out = Vec::new();
        fun.body.iter().for_each(|stmt_s| walk_stmt(stmt_s, locals, &mut out));
        out
    }

    #[test]
    fn distances_count_enclosing_scopes() {
        let program = parse("var g; fun f(a) { var b; { print a + b + g; } return b; }");
        let locals = Resolver::default().resolve(&program).unwrap();
        let fun = match &program.stmts[1].0 {
            Stmt::Fun(fun) => fun,
            stmt => panic!("expected function, got {stmt:?}"),
        };
        let exp = vec![
            ("a".to_string(), Some(1)),
            ("b".to_string(), Some(1)),
            ("g".to_string(), None),
            ("b".to_string(), Some(0)),
        ];
        assert_eq!(exp, depths(fun, &locals));
    }

    #[test]
    fn global_redeclaration_is_allowed() {
        assert_eq!(Vec::<String>::new(), resolve_errors("var a = 1; var a = a;"));
    }

    #[test]
    fn local_errors() {
        assert_eq!(
            vec![r#"NameError: name "a" is already defined"#],
            resolve_errors("{ var a = 1; var a = 2; }")
        );
        assert_eq!(
            vec![r#"NameError: cannot read "a" in its own initializer"#],
            resolve_errors("var a = 1; { var a = a; }")
        );
        assert_eq!(
            vec![r#"NameError: name "x" is already defined"#],
            resolve_errors("fun f(x, x) {}")
        );
    }

    #[test]
    fn return_errors() {
        assert_eq!(vec![r#"SyntaxError: "return" outside function"#], resolve_errors("return 1;"));
        assert_eq!(
            vec![r#"SyntaxError: "init" cannot return a value"#],
            resolve_errors("class A { init() { return 1; } }")
        );
        assert_eq!(Vec::<String>::new(), resolve_errors("class A { init() { return; } }"));
        assert_eq!(
            Vec::<String>::new(),
            resolve_errors("class A { init() { fun f() { return 1; } } }")
        );
    }

    #[test]
    fn class_errors() {
        assert_eq!(vec![r#"SyntaxError: "this" outside class"#], resolve_errors("print this;"));
        assert_eq!(
            vec![r#"SyntaxError: "this" outside class"#],
            resolve_errors("fun f() { return this; }")
        );
        assert_eq!(vec![r#"SyntaxError: "super" outside class"#], resolve_errors("super.m();"));
        assert_eq!(
            vec![r#"SyntaxError: "super" in a class with no superclass"#],
            resolve_errors("class A { m() { super.m(); } }")
        );
        assert_eq!(
            vec![r#"TypeError: class "A" cannot inherit from itself"#],
            resolve_errors("class A < A {}")
        );
        assert_eq!(
            Vec::<String>::new(),
            resolve_errors("class A { m() {} } class B < A { m() { super.m(); this.x = 1; } }")
        );
    }

    #[test]
    fn errors_accumulate() {
        let got = resolve_errors("return; print this; { var b; var b; }");
        assert_eq!(3, got.len());
    }
}
