use std::fmt::{self, Display, Formatter};

use gc::{Finalize, Gc, GcCell, Trace};
use lox_common::error::{AttributeError, Error, Result};
use lox_common::types::Span;
use rustc_hash::FxHashMap;

use crate::object::{Class, Object};

/// An object made by calling a class. The class is fixed at construction;
/// fields appear the first time they are assigned.
#[derive(Clone, Debug, Finalize, Trace)]
pub struct Instance(Gc<InstanceImpl>);

#[derive(Debug, Finalize, Trace)]
struct InstanceImpl {
    class: Class,
    fields: GcCell<FxHashMap<String, Object>>,
}

impl Instance {
    pub fn new(class: &Class) -> Self {
        let fields = GcCell::new(FxHashMap::default());
        Self(Gc::new(InstanceImpl { class: class.clone(), fields }))
    }

    pub fn class(&self) -> &Class {
        &self.0.class
    }

    /// Reads `name` off this instance. A field shadows a method of the same
    /// name. Methods are looked up through the class chain and come back bound
    /// to this instance, as a new function on every access.
    pub fn property(&self, name: &str, span: &Span) -> Result<Object> {
        if let Some(value) = self.0.fields.borrow().get(name) {
            return Ok(value.clone());
        }
        match self.class().find_method(name) {
            Some(method) => Ok(method.bind(self).into()),
            None => Err((
                Error::AttributeError(AttributeError::UndefinedProperty {
                    type_: self.class().name().to_string(),
                    name: name.to_string(),
                }),
                span.clone(),
            )),
        }
    }

    /// Creates or overwrites a field.
    pub fn set_field(&self, name: &str, value: Object) {
        self.0.fields.borrow_mut().insert(name.to_string(), value);
    }
}

impl Display for Instance {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{} instance", self.class().name())
    }
}

impl Eq for Instance {}

impl PartialEq for Instance {
    fn eq(&self, other: &Self) -> bool {
        Gc::ptr_eq(&self.0, &other.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use lox_syntax::ast::Stmt;
    use pretty_assertions::assert_eq;

    use crate::env::Env;

    fn class(source: &str) -> Class {
        let (tokens, _) = lox_syntax::scan(source);
        let (program, errors) = lox_syntax::parse(tokens);
        assert!(errors.is_empty(), "{errors:?}");
        match &program.stmts[0].0 {
            Stmt::Class(decl) => Class::new(decl, None, &Env::default()),
            stmt => panic!("expected a class declaration, got {stmt:?}"),
        }
    }

    #[test]
    fn fields_shadow_methods() {
        let instance = Instance::new(&class("class Point { x() { return 1; } }"));
        let span = Span::default();
        assert!(matches!(instance.property("x", &span), Ok(Object::Function(_))));

        instance.set_field("x", Object::Number(2.0));
        assert_eq!(Object::Number(2.0), instance.property("x", &span).unwrap());
    }

    #[test]
    fn methods_are_bound_on_each_access() {
        let instance = Instance::new(&class("class Point { x() {} }"));
        let span = Span::default();
        let first = instance.property("x", &span).unwrap();
        let second = instance.property("x", &span).unwrap();
        assert_ne!(first, second);
    }

    #[test]
    fn missing_property() {
        let instance = Instance::new(&class("class Point {}"));
        let (error, _) = instance.property("y", &Span::default()).unwrap_err();
        let exp = Error::AttributeError(AttributeError::UndefinedProperty {
            type_: "Point".to_string(),
            name: "y".to_string(),
        });
        assert_eq!(exp, error);
        assert_eq!("Point instance", instance.to_string());
    }
}
