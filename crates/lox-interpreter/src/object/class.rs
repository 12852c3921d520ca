use std::fmt::{self, Display, Formatter};
use std::io::Write;

use gc::{Finalize, Gc, Trace};
use lox_common::error::Result;
use lox_common::types::Span;
use lox_syntax::ast::StmtClass;
use rustc_hash::FxHashMap;

use crate::env::Env;
use crate::interpreter::Interpreter;
use crate::object::{self, Function, Instance, Object};

#[derive(Clone, Debug, Finalize, Trace)]
pub struct Class(Gc<ClassImpl>);

#[derive(Debug, Finalize, Trace)]
struct ClassImpl {
    name: String,
    superclass: Option<Class>,
    methods: FxHashMap<String, Function>,
}

impl Class {
    /// Builds a class from its declaration. With a superclass, the methods
    /// close over an extra scope holding `super`.
    pub fn new(decl: &StmtClass, superclass: Option<Class>, env: &Env) -> Self {
        let mut closure = env.clone();
        if let Some(superclass) = &superclass {
            closure = Env::with_parent(&closure);
            closure.define("super", superclass.clone().into());
        }
        let methods = decl
            .methods
            .iter()
            .map(|method| {
                let name = method.name.0.clone();
                let is_init = name == "init";
                (name, Function::new(method, &closure, is_init))
            })
            .collect();

        Self(Gc::new(ClassImpl { name: decl.name.0.clone(), superclass, methods }))
    }

    pub fn name(&self) -> &str {
        &self.0.name
    }

    /// Looks a method up on this class, then up the superclass chain.
    pub fn find_method(&self, name: &str) -> Option<Function> {
        match self.0.methods.get(name) {
            Some(method) => Some(method.clone()),
            None => self.0.superclass.as_ref()?.find_method(name),
        }
    }

    /// Takes as many arguments as `init` does, or none without one.
    pub fn arity(&self) -> usize {
        self.find_method("init").map_or(0, |init| init.arity())
    }

    /// Calling a class makes a new instance and runs `init` on it.
    pub fn construct<W: Write>(
        &self,
        interpreter: &mut Interpreter<W>,
        args: Vec<Object>,
        span: &Span,
    ) -> Result<Object> {
        object::check_arity(self.name(), self.arity(), &args, span)?;
        let instance = Instance::new(self);
        if let Some(init) = self.find_method("init") {
            init.bind(&instance).invoke(interpreter, args, span)?;
        }
        Ok(instance.into())
    }
}

impl Display for Class {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl Eq for Class {}

impl PartialEq for Class {
    fn eq(&self, other: &Self) -> bool {
        Gc::ptr_eq(&self.0, &other.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use lox_syntax::ast::Stmt;
    use pretty_assertions::assert_eq;

    fn classes(source: &str) -> Vec<Class> {
        let (tokens, _) = lox_syntax::scan(source);
        let (program, errors) = lox_syntax::parse(tokens);
        assert!(errors.is_empty(), "{errors:?}");
        let env = Env::default();
        let mut classes: Vec<Class> = Vec::new();
        for (stmt, _) in &program.stmts {
            if let Stmt::Class(decl) = stmt {
                classes.push(Class::new(decl, classes.last().cloned(), &env));
            }
        }
        classes
    }

    #[test]
    fn methods_are_inherited() {
        let chain = classes("class A { f() {} init(a, b) {} } class B { g() {} }");
        let [a, b] = [&chain[0], &chain[1]];
        assert_eq!(Some("f"), b.find_method("f").as_ref().map(Function::name));
        assert!(a.find_method("g").is_none());
        assert_eq!((2, 2), (a.arity(), b.arity()));
    }

    #[test]
    fn arity_without_init() {
        assert_eq!(0, classes("class A {}")[0].arity());
    }
}
