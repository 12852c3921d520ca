use std::fmt::{self, Display, Formatter};
use std::io::Write;
use std::ops::ControlFlow;
use std::rc::Rc;

use gc::{Finalize, Gc, Trace};
use lox_common::error::Result;
use lox_common::types::Span;
use lox_syntax::ast::StmtFun;

use crate::env::Env;
use crate::interpreter::Interpreter;
use crate::object::{self, Instance, Object};

/// A user-defined function or method together with the scope it closed over.
#[derive(Clone, Debug, Finalize, Trace)]
pub struct Function(Gc<FunctionImpl>);

#[derive(Debug, Finalize, Trace)]
struct FunctionImpl {
    #[unsafe_ignore_trace]
    decl: Rc<StmtFun>,
    closure: Env,
    /// Set for methods named `init`; calling one always yields `this`.
    is_init: bool,
}

impl Function {
    pub fn new(decl: &Rc<StmtFun>, closure: &Env, is_init: bool) -> Self {
        let decl = Rc::clone(decl);
        Function(Gc::new(FunctionImpl { decl, closure: closure.clone(), is_init }))
    }

    pub fn name(&self) -> &str {
        &self.0.decl.name.0
    }

    pub fn arity(&self) -> usize {
        self.0.decl.params.len()
    }

    /// Returns a copy of this method whose closure has `this` bound to
    /// `instance`, one scope above the original closure.
    pub fn bind(&self, instance: &Instance) -> Function {
        let mut closure = Env::with_parent(&self.0.closure);
        closure.define("this", instance.clone().into());
        Function::new(&self.0.decl, &closure, self.0.is_init)
    }

    pub fn call<W: Write>(
        &self,
        interpreter: &mut Interpreter<W>,
        args: Vec<Object>,
        span: &Span,
    ) -> Result<Object> {
        object::check_arity(self.name(), self.arity(), &args, span)?;
        self.invoke(interpreter, args, span)
    }

    /// Runs the body with `args` bound to the parameters. The caller has
    /// already checked the argument count.
    pub(super) fn invoke<W: Write>(
        &self,
        interpreter: &mut Interpreter<W>,
        args: Vec<Object>,
        span: &Span,
    ) -> Result<Object> {
        let env = &mut Env::with_parent(&self.0.closure);
        for ((param, _), arg) in self.0.decl.params.iter().zip(args) {
            env.define(param, arg);
        }

        let returned = match interpreter.run_body(env, &self.0.decl.body, span)? {
            ControlFlow::Break(value) => value,
            ControlFlow::Continue(()) => Object::Nil,
        };
        if self.0.is_init {
            return Ok(self
                .0
                .closure
                .get("this")
                .unwrap_or_else(|| unreachable!(r#""this" is not bound in "init""#)));
        }
        Ok(returned)
    }
}

impl Display for Function {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "<fn {}>", self.name())
    }
}

impl Eq for Function {}

impl PartialEq for Function {
    fn eq(&self, other: &Self) -> bool {
        Gc::ptr_eq(&self.0, &other.0)
    }
}
