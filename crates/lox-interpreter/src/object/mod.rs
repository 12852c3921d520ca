mod class;
mod function;
mod instance;

use std::fmt::{self, Display, Formatter};
use std::io::Write;

pub use class::Class;
pub use function::Function;
use gc::{Finalize, Trace};
pub use instance::Instance;
use lox_common::error::{AttributeError, Error, Result, TypeError};
use lox_common::types::Span;

use crate::interpreter::Interpreter;

/// A runtime value.
#[derive(Clone, Debug, Finalize, Trace)]
pub enum Object {
    Bool(bool),
    Class(Class),
    Function(Function),
    Instance(Instance),
    Nil,
    Number(f64),
    String(String),
}

impl Object {
    pub fn is_truthy(&self) -> bool {
        !matches!(self, Object::Nil | Object::Bool(false))
    }

    /// Name used for this value's type in error messages. Instances report
    /// the name of their class.
    pub fn type_name(&self) -> &str {
        match self {
            Object::Bool(_) => "bool",
            Object::Class(_) => "class",
            Object::Function(_) => "function",
            Object::Instance(instance) => instance.class().name(),
            Object::Nil => "nil",
            Object::Number(_) => "number",
            Object::String(_) => "string",
        }
    }

    /// `object.name`. Only instances have properties.
    pub fn get(&self, name: &str, span: &Span) -> Result<Object> {
        match self {
            Object::Instance(instance) => instance.property(name, span),
            object => Err((
                Error::AttributeError(AttributeError::NotAnInstance {
                    type_: object.type_name().to_string(),
                    name: name.to_string(),
                }),
                span.clone(),
            )),
        }
    }

    /// `object(args)`. Calling a class constructs an instance of it.
    pub fn call<W: Write>(
        &self,
        interpreter: &mut Interpreter<W>,
        args: Vec<Object>,
        span: &Span,
    ) -> Result<Object> {
        match self {
            Object::Class(class) => class.construct(interpreter, args, span),
            Object::Function(function) => function.call(interpreter, args, span),
            object => Err((
                Error::TypeError(TypeError::NotCallable { type_: object.type_name().to_string() }),
                span.clone(),
            )),
        }
    }
}

/// Fails unless exactly `exp_args` arguments were passed to `name`.
fn check_arity(name: &str, exp_args: usize, args: &[Object], span: &Span) -> Result<()> {
    if args.len() == exp_args {
        return Ok(());
    }
    let error = TypeError::ArityMismatch { name: name.to_string(), exp_args, got_args: args.len() };
    Err((Error::TypeError(error), span.clone()))
}

impl Display for Object {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Object::Bool(bool) => write!(f, "{bool}"),
            Object::Class(class) => write!(f, "{class}"),
            Object::Function(function) => write!(f, "{function}"),
            Object::Instance(instance) => write!(f, "{instance}"),
            Object::Nil => write!(f, "nil"),
            Object::Number(number) => write!(f, "{number}"),
            Object::String(string) => write!(f, "{string}"),
        }
    }
}

impl From<Class> for Object {
    fn from(class: Class) -> Self {
        Object::Class(class)
    }
}

impl From<Function> for Object {
    fn from(function: Function) -> Self {
        Object::Function(function)
    }
}

impl From<Instance> for Object {
    fn from(instance: Instance) -> Self {
        Object::Instance(instance)
    }
}

/// Numbers follow IEEE comparison, so `NaN` is unequal to itself. Classes,
/// functions and instances are equal only to themselves.
impl PartialEq for Object {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Object::Bool(a), Object::Bool(b)) => a == b,
            (Object::Class(a), Object::Class(b)) => a == b,
            (Object::Function(a), Object::Function(b)) => a == b,
            (Object::Instance(a), Object::Instance(b)) => a == b,
            (Object::Nil, Object::Nil) => true,
            (Object::Number(a), Object::Number(b)) => a == b,
            (Object::String(a), Object::String(b)) => a == b,
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use pretty_assertions::assert_eq;

    #[test]
    fn truthiness() {
        assert!(!Object::Nil.is_truthy());
        assert!(!Object::Bool(false).is_truthy());
        assert!(Object::Bool(true).is_truthy());
        assert!(Object::Number(0.0).is_truthy());
        assert!(Object::String(String::new()).is_truthy());
    }

    #[test]
    fn nil_only_equals_nil() {
        assert_eq!(Object::Nil, Object::Nil);
        assert_ne!(Object::Nil, Object::Bool(false));
        assert_ne!(Object::Number(0.0), Object::Nil);
        assert_ne!(Object::Number(1.0), Object::String("1".to_string()));
        assert_ne!(Object::Number(f64::NAN), Object::Number(f64::NAN));
    }

    #[test]
    fn display_numbers_without_trailing_zeros() {
        let got = [3.0, 2.5, -0.0, 0.1 + 0.2, 1e21].map(|n| Object::Number(n).to_string());
        let exp = ["3", "2.5", "-0", "0.30000000000000004", "1000000000000000000000"];
        assert_eq!(exp, got);
    }

    #[test]
    fn only_instances_have_properties() {
        let span = Span::default();
        for object in [Object::Nil, Object::Number(1.0), Object::String("s".to_string())] {
            let (error, _) = object.get("len", &span).unwrap_err();
            let exp = Error::AttributeError(AttributeError::NotAnInstance {
                type_: object.type_name().to_string(),
                name: "len".to_string(),
            });
            assert_eq!(exp, error);
        }
    }
}
