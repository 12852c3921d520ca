use std::io::Write;
use std::ops::ControlFlow;

use log::{debug, trace};
use lox_common::error::{
    AttributeError, Error, IoError, NameError, OverflowError, Result, TypeError,
};
use lox_common::stack;
use lox_syntax::ast::{
    Expr, ExprLiteral, ExprS, OpInfix, OpLogical, OpPrefix, Program, Span, Stmt, StmtS, Var,
    VarId,
};
use rustc_hash::FxHashMap;

use crate::env::Env;
use crate::object::{Class, Function, Object};
use crate::resolver::Resolver;
use crate::RunError;

/// Resolved distance, in scopes, from each local reference to its binding.
pub type Locals = FxHashMap<VarId, usize>;

/// Outcome of running a statement: `Break` carries a value out of a function
/// body on `return`.
pub type Flow = ControlFlow<Object>;

/// Deepest nesting of function calls before a program is stopped with an
/// `OverflowError`.
pub const MAX_CALL_DEPTH: usize = 4096;

#[derive(Debug)]
pub struct Interpreter<Stdout> {
    globals: Env,
    locals: Locals,
    /// Number of function bodies currently running.
    call_depth: usize,
    stdout: Stdout,
}

impl<Stdout: Write> Interpreter<Stdout> {
    pub fn new(stdout: Stdout) -> Self {
        Self { globals: Env::default(), locals: Locals::default(), call_depth: 0, stdout }
    }

    /// Scans, parses, resolves and runs `source`, stopping at the first stage
    /// that reports errors. Globals from earlier runs stay visible.
    pub fn run(&mut self, source: &str) -> Result<(), RunError> {
        let (tokens, errors) = lox_syntax::scan(source);
        if !errors.is_empty() {
            return Err(RunError::Lex(errors));
        }
        let (program, errors) = lox_syntax::parse(tokens);
        if !errors.is_empty() {
            return Err(RunError::Parse(errors));
        }
        let locals = Resolver::default().resolve(&program).map_err(RunError::Resolve)?;
        self.interpret(&program, locals).map_err(RunError::Runtime)
    }

    /// Runs a resolved program. Execution stops at the first runtime error.
    pub fn interpret(&mut self, program: &Program, locals: Locals) -> Result<()> {
        debug!("interpreting {} statements", program.stmts.len());
        self.locals.extend(locals);
        let globals = &mut self.globals.clone();
        for stmt_s in &program.stmts {
            if let ControlFlow::Break(_) = self.run_stmt(globals, stmt_s)? {
                break;
            }
        }
        Ok(())
    }

    /// Runs a function body. `span` locates the call, for the error raised
    /// when calls nest too deeply.
    pub(crate) fn run_body(&mut self, env: &mut Env, body: &[StmtS], span: &Span) -> Result<Flow> {
        if self.call_depth == MAX_CALL_DEPTH {
            let error = OverflowError::StackOverflow { max: MAX_CALL_DEPTH };
            return Err((Error::OverflowError(error), span.clone()));
        }
        self.call_depth += 1;
        let flow = self.run_stmts(env, body);
        self.call_depth -= 1;
        flow
    }

    fn run_stmts(&mut self, env: &mut Env, stmts: &[StmtS]) -> Result<Flow> {
        for stmt_s in stmts {
            if let ControlFlow::Break(value) = self.run_stmt(env, stmt_s)? {
                return Ok(ControlFlow::Break(value));
            }
        }
        Ok(ControlFlow::Continue(()))
    }

    fn run_stmt(&mut self, env: &mut Env, stmt_s: &StmtS) -> Result<Flow> {
        stack::ensure_sufficient_stack(|| self.run_stmt_inner(env, stmt_s))
    }

    fn run_stmt_inner(&mut self, env: &mut Env, stmt_s: &StmtS) -> Result<Flow> {
        let (stmt, span) = stmt_s;
        match stmt {
            Stmt::Block(block) => {
                let env = &mut Env::with_parent(env);
                self.run_stmts(env, &block.stmts)
            }
            Stmt::Class(class) => {
                let super_ = match &class.super_ {
                    Some(super_) => match &self.run_expr(env, super_)? {
                        Object::Class(super_) => Some(super_.clone()),
                        object => {
                            return Err((
                                Error::TypeError(TypeError::SuperclassMustBeClass {
                                    type_: object.type_name().to_string(),
                                }),
                                super_.1.clone(),
                            ));
                        }
                    },
                    None => None,
                };

                env.define(&class.name.0, Object::Nil);
                let object = Class::new(class, super_, env).into();
                if !env.assign(&class.name.0, object) {
                    unreachable!("class {:?} vanished", class.name.0);
                }
                Ok(ControlFlow::Continue(()))
            }
            Stmt::Expr(expr) => {
                self.run_expr(env, &expr.value)?;
                Ok(ControlFlow::Continue(()))
            }
            Stmt::Fun(fun) => {
                let object = Function::new(fun, env, false).into();
                env.define(&fun.name.0, object);
                Ok(ControlFlow::Continue(()))
            }
            Stmt::If(if_) => {
                let cond = self.run_expr(env, &if_.cond)?;
                if cond.is_truthy() {
                    self.run_stmt(env, &if_.then)
                } else if let Some(else_) = &if_.else_ {
                    self.run_stmt(env, else_)
                } else {
                    Ok(ControlFlow::Continue(()))
                }
            }
            Stmt::Print(print) => {
                let value = self.run_expr(env, &print.value)?;
                writeln!(self.stdout, "{value}").map_err(|_| {
                    (
                        Error::IoError(IoError::WriteError { file: "stdout".to_string() }),
                        span.clone(),
                    )
                })?;
                Ok(ControlFlow::Continue(()))
            }
            Stmt::Return(return_) => {
                let value = match &return_.value {
                    Some(value) => self.run_expr(env, value)?,
                    None => Object::Nil,
                };
                Ok(ControlFlow::Break(value))
            }
            Stmt::Var(var) => {
                let value = match &var.value {
                    Some(value) => self.run_expr(env, value)?,
                    None => Object::Nil,
                };
                env.define(&var.name.0, value);
                Ok(ControlFlow::Continue(()))
            }
            Stmt::While(while_) => {
                while self.run_expr(env, &while_.cond)?.is_truthy() {
                    if let ControlFlow::Break(value) = self.run_stmt(env, &while_.body)? {
                        return Ok(ControlFlow::Break(value));
                    }
                }
                Ok(ControlFlow::Continue(()))
            }
        }
    }

    fn run_expr(&mut self, env: &mut Env, expr_s: &ExprS) -> Result<Object> {
        stack::ensure_sufficient_stack(|| self.run_expr_inner(env, expr_s))
    }

    fn run_expr_inner(&mut self, env: &mut Env, expr_s: &ExprS) -> Result<Object> {
        let (expr, span) = expr_s;
        match expr {
            Expr::Assign(assign) => {
                let value = self.run_expr(env, &assign.value)?;
                let Var { name, id } = &assign.var;
                match self.locals.get(id) {
                    Some(&depth) => {
                        if !env.assign_at(name, value.clone(), depth) {
                            unreachable!("{name:?} not found at resolved depth {depth}");
                        }
                    }
                    None => {
                        if !self.globals.assign(name, value.clone()) {
                            let error = NameError::NotDefined { name: name.clone() };
                            return Err((Error::NameError(error), span.clone()));
                        }
                    }
                }
                Ok(value)
            }
            Expr::Call(call) => {
                let callee = self.run_expr(env, &call.callee)?;
                let args = call
                    .args
                    .iter()
                    .map(|arg| self.run_expr(env, arg))
                    .collect::<Result<Vec<_>>>()?;
                callee.call(self, args, &call.paren)
            }
            Expr::Get(get) => {
                let object = self.run_expr(env, &get.object)?;
                object.get(&get.name.0, &get.name.1)
            }
            Expr::Grouping(group) => self.run_expr(env, &group.value),
            Expr::Infix(infix) => {
                let lt = self.run_expr(env, &infix.lt)?;
                let rt = self.run_expr(env, &infix.rt)?;
                match (infix.op, &lt, &rt) {
                    (OpInfix::Add, Object::Number(a), Object::Number(b)) => {
                        Ok(Object::Number(a + b))
                    }
                    (OpInfix::Add, Object::String(a), Object::String(b)) => {
                        Ok(Object::String(a.clone() + b))
                    }
                    (OpInfix::Subtract, Object::Number(a), Object::Number(b)) => {
                        Ok(Object::Number(a - b))
                    }
                    (OpInfix::Multiply, Object::Number(a), Object::Number(b)) => {
                        Ok(Object::Number(a * b))
                    }
                    (OpInfix::Divide, Object::Number(a), Object::Number(b)) => {
                        Ok(Object::Number(a / b))
                    }
                    (OpInfix::Less, Object::Number(a), Object::Number(b)) => {
                        Ok(Object::Bool(a < b))
                    }
                    (OpInfix::LessEqual, Object::Number(a), Object::Number(b)) => {
                        Ok(Object::Bool(a <= b))
                    }
                    (OpInfix::Greater, Object::Number(a), Object::Number(b)) => {
                        Ok(Object::Bool(a > b))
                    }
                    (OpInfix::GreaterEqual, Object::Number(a), Object::Number(b)) => {
                        Ok(Object::Bool(a >= b))
                    }
                    (OpInfix::Equal, a, b) => Ok(Object::Bool(a == b)),
                    (OpInfix::NotEqual, a, b) => Ok(Object::Bool(a != b)),
                    (op, a, b) => {
                        let lt_type = a.type_name().to_string();
                        let rt_type = b.type_name().to_string();
                        let error = match op {
                            OpInfix::Add => TypeError::OperandsMustBeNumbersOrStrings {
                                op: op.to_string(),
                                lt_type,
                                rt_type,
                            },
                            _ => TypeError::OperandsMustBeNumbers {
                                op: op.to_string(),
                                lt_type,
                                rt_type,
                            },
                        };
                        Err((Error::TypeError(error), span.clone()))
                    }
                }
            }
            Expr::Literal(literal) => Ok(match literal {
                ExprLiteral::Bool(bool) => Object::Bool(*bool),
                ExprLiteral::Nil => Object::Nil,
                ExprLiteral::Number(number) => Object::Number(*number),
                ExprLiteral::String(string) => Object::String(string.clone()),
            }),
            Expr::Logical(logical) => {
                let lt = self.run_expr(env, &logical.lt)?;
                match logical.op {
                    OpLogical::And if !lt.is_truthy() => Ok(lt),
                    OpLogical::Or if lt.is_truthy() => Ok(lt),
                    _ => self.run_expr(env, &logical.rt),
                }
            }
            Expr::Prefix(prefix) => {
                let rt = self.run_expr(env, &prefix.rt)?;
                match prefix.op {
                    OpPrefix::Negate => match rt {
                        Object::Number(number) => Ok(Object::Number(-number)),
                        rt => Err((
                            Error::TypeError(TypeError::OperandMustBeNumber {
                                op: prefix.op.to_string(),
                                rt_type: rt.type_name().to_string(),
                            }),
                            span.clone(),
                        )),
                    },
                    OpPrefix::Not => Ok(Object::Bool(!rt.is_truthy())),
                }
            }
            Expr::Set(set) => {
                let instance = match &self.run_expr(env, &set.object)? {
                    Object::Instance(instance) => instance.clone(),
                    object => {
                        return Err((
                            Error::AttributeError(AttributeError::NotAnInstance {
                                type_: object.type_name().to_string(),
                                name: set.name.0.clone(),
                            }),
                            set.name.1.clone(),
                        ));
                    }
                };
                let value = self.run_expr(env, &set.value)?;
                instance.set_field(&set.name.0, value.clone());
                Ok(value)
            }
            Expr::Super(super_) => {
                let depth = *self.locals.get(&super_.var.id).unwrap_or_else(|| {
                    unreachable!(r#""super" was not resolved"#)
                });
                let class = match &self.lookup_at(env, "super", depth) {
                    Object::Class(class) => class.clone(),
                    object => unreachable!(r#""super" bound to {} object"#, object.type_name()),
                };
                let instance = match &self.lookup_at(env, "this", depth - 1) {
                    Object::Instance(instance) => instance.clone(),
                    object => unreachable!(r#""this" bound to {} object"#, object.type_name()),
                };
                match class.find_method(&super_.name.0) {
                    Some(method) => Ok(method.bind(&instance).into()),
                    None => Err((
                        Error::AttributeError(AttributeError::UndefinedProperty {
                            type_: class.name().to_string(),
                            name: super_.name.0.clone(),
                        }),
                        super_.name.1.clone(),
                    )),
                }
            }
            Expr::This(this) => self.lookup(env, &this.var, span),
            Expr::Var(var) => self.lookup(env, &var.var, span),
        }
    }

    fn lookup(&self, env: &Env, var: &Var, span: &Span) -> Result<Object> {
        match self.locals.get(&var.id) {
            Some(&depth) => Ok(self.lookup_at(env, &var.name, depth)),
            None => {
                trace!("global lookup of {:?}", var.name);
                self.globals.get(&var.name).ok_or_else(|| {
                    (
                        Error::NameError(NameError::NotDefined { name: var.name.clone() }),
                        span.clone(),
                    )
                })
            }
        }
    }

    fn lookup_at(&self, env: &Env, name: &str, depth: usize) -> Object {
        trace!("local lookup of {name:?} at depth {depth}");
        env.get_at(name, depth)
            .unwrap_or_else(|| unreachable!("{name:?} not found at resolved depth {depth}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use pretty_assertions::assert_eq;

    fn run(source: &str) -> (String, Option<String>) {
        let mut stdout = Vec::new();
        let result = Interpreter::new(&mut stdout).run(source);
        let error = result.err().map(|err| {
            err.errors().iter().map(|(error, _)| error.to_string()).collect::<Vec<_>>().join("\n")
        });
        (String::from_utf8(stdout).unwrap(), error)
    }

    fn output(source: &str) -> String {
        let (stdout, error) = run(source);
        assert_eq!(None, error);
        stdout
    }

    #[test]
    fn arithmetic_and_printing() {
        let source = r#"
            print 1 + 2 * 3;
            print 5 / 2;
            print -(1 + 2);
            print "hello" + " world";
            print !nil;
            print nil;
        "#;
        assert_eq!("7\n2.5\n-3\nhello world\ntrue\nnil\n", output(source));
    }

    #[test]
    fn equality() {
        let source = r#"
            print nil == nil;
            print nil == false;
            print 1 == "1";
            print "a" == "a";
            print 0/0 == 0/0;
        "#;
        assert_eq!("true\nfalse\nfalse\ntrue\nfalse\n", output(source));
    }

    #[test]
    fn logical_operators_return_operands() {
        assert_eq!("hi\nnil\n2\nfalse\n", output(
            r#"print "hi" or 2; print nil and 1; print nil or 2; print false and nil;"#
        ));
    }

    #[test]
    fn closures_capture_their_scope() {
        let source = r#"
            fun makeCounter() {
                var i = 0;
                fun count() { i = i + 1; return i; }
                return count;
            }
            var c = makeCounter();
            c();
            print c();
            print makeCounter;
        "#;
        assert_eq!("2\n<fn makeCounter>\n", output(source));
    }

    #[test]
    fn resolution_is_static() {
        let source = r#"
            var a = "global";
            {
                fun show() { print a; }
                show();
                var a = "block";
                show();
            }
        "#;
        assert_eq!("global\nglobal\n", output(source));
    }

    #[test]
    fn classes_and_inheritance() {
        let source = r#"
            class A {
                init(n) { this.n = n; }
                method() { return "A " + this.name(); }
                name() { return "a"; }
            }
            class B < A {
                method() { return "B " + super.method(); }
                name() { return "b"; }
            }
            var b = B(1);
            print b.method();
            print b.n;
            print B;
            print b;
            print b.init(2) == b;
            print b.n;
        "#;
        assert_eq!("B A b\n1\nB\nB instance\ntrue\n2\n", output(source));
    }

    #[test]
    fn fields_shadow_methods() {
        let source = r#"
            class A { m() { return "method"; } }
            var a = A();
            a.m = "field";
            print a.m;
        "#;
        assert_eq!("field\n", output(source));
    }

    #[test]
    fn runtime_errors() {
        let cases = [
            ("print -\"a\";", r#"TypeError: unsupported operand type for -: "string""#),
            (
                "print 1 + nil;",
                r#"TypeError: unsupported operand type(s) for +: "number" and "nil""#,
            ),
            (
                "print 1 < \"a\";",
                r#"TypeError: unsupported operand type(s) for <: "number" and "string""#,
            ),
            ("print x;", r#"NameError: name "x" is not defined"#),
            ("x = 1;", r#"NameError: name "x" is not defined"#),
            (r#""a"();"#, r#"TypeError: "string" object is not callable"#),
            ("fun f(a) {} f();", "TypeError: f() takes 1 arguments but 0 were given"),
            (
                "var n = 1; n.x = 2;",
                r#"AttributeError: "number" object is not an instance, cannot access "x""#,
            ),
            ("class A {} A().x;", r#"AttributeError: "A" object has no attribute "x""#),
            (
                "var A = 1; class B < A {}",
                r#"TypeError: superclass should be of type "class", not "number""#,
            ),
        ];
        for (source, exp) in cases {
            assert_eq!((String::new(), Some(exp.to_string())), run(source), "{source}");
        }
    }

    #[test]
    fn output_before_error_is_kept() {
        assert_eq!(
            ("1\n".to_string(), Some(r#"NameError: name "y" is not defined"#.to_string())),
            run("print 1; print y; print 2;")
        );
    }

    #[test]
    fn reinterpreting_a_program_is_deterministic() {
        let source = r#"
            class Counter { init() { this.n = 0; } tick() { this.n = this.n + 1; return this.n; } }
            var c = Counter();
            c.tick();
            print c.tick();
            fun twice(f) { return f() + f(); }
            print twice(c.tick);
        "#;
        let (tokens, _) = lox_syntax::scan(source);
        let (program, _) = lox_syntax::parse(tokens);

        let outputs = (0..2)
            .map(|_| {
                let locals = Resolver::default().resolve(&program).unwrap();
                let mut stdout = Vec::new();
                Interpreter::new(&mut stdout).interpret(&program, locals).unwrap();
                String::from_utf8(stdout).unwrap()
            })
            .collect::<Vec<_>>();
        assert_eq!("2\n7\n", outputs[0]);
        assert_eq!(outputs[0], outputs[1]);
    }

    #[test]
    fn deep_recursion() {
        let source = r#"
            fun count(n) { if (n == 0) return 0; return count(n - 1) + 1; }
            print count(3000);
        "#;
        assert_eq!("3000\n", output(source));
    }

    #[test]
    fn unbounded_recursion_is_an_error() {
        let mut stdout = Vec::new();
        {
            let mut interpreter = Interpreter::new(&mut stdout);
            let result = interpreter.run("fun f(n) { print n; f(n + 1); } f(1);");
            let (error, _) = result.unwrap_err().errors().remove(0);
            let exp = Error::OverflowError(OverflowError::StackOverflow { max: MAX_CALL_DEPTH });
            assert_eq!(exp, error);

            // The depth count unwinds with the error.
            interpreter.run("fun g(n) { if (n > 0) g(n - 1); } g(100);").unwrap();
        }
        let stdout = String::from_utf8(stdout).unwrap();
        assert_eq!(MAX_CALL_DEPTH, stdout.lines().count());
    }

    #[test]
    fn globals_persist_across_runs() {
        let mut stdout = Vec::new();
        {
            let mut interpreter = Interpreter::new(&mut stdout);
            interpreter.run("var a = 1; fun get() { return a; }").unwrap();
            interpreter.run("a = a + 1; print get();").unwrap();
            assert!(interpreter.run("print b;").is_err());
            interpreter.run("print a;").unwrap();
        }
        assert_eq!("2\n2\n", String::from_utf8(stdout).unwrap());
    }
}
