use std::ops::Deref;

use gc::{Finalize, Gc, GcCell, Trace};
use rustc_hash::FxHashMap;

use crate::object::Object;

/// One lexical scope at runtime.
///
/// Cloning an `Env` clones the handle, not the bindings: every closure that
/// captured a scope observes writes made through any other handle.
#[derive(Clone, Debug, Default, Finalize, Trace)]
pub struct Env(Gc<GcCell<EnvImpl>>);

impl Deref for Env {
    type Target = Gc<GcCell<EnvImpl>>;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl Env {
    pub fn with_parent(parent: &Env) -> Self {
        let env = EnvImpl { map: FxHashMap::default(), parent: Some(parent.clone()) };
        Self(Gc::new(GcCell::new(env)))
    }

    /// Binds `name` in this scope, replacing any previous binding.
    pub fn define(&mut self, name: &str, value: Object) {
        self.borrow_mut().map.insert(name.to_string(), value);
    }

    pub fn contains(&self, name: &str) -> bool {
        self.borrow().map.contains_key(name)
    }

    pub fn get(&self, name: &str) -> Option<Object> {
        self.borrow().map.get(name).cloned()
    }

    pub fn get_at(&self, name: &str, depth: usize) -> Option<Object> {
        self.ancestor(depth)?.get(name)
    }

    /// Overwrites an existing binding in this scope only. Returns `false`,
    /// leaving the scope untouched, when `name` is not bound here.
    pub fn assign(&mut self, name: &str, value: Object) -> bool {
        match self.borrow_mut().map.get_mut(name) {
            Some(entry) => {
                *entry = value;
                true
            }
            None => false,
        }
    }

    pub fn assign_at(&mut self, name: &str, value: Object, depth: usize) -> bool {
        match self.ancestor(depth) {
            Some(mut env) => env.assign(name, value),
            None => false,
        }
    }

    fn ancestor(&self, depth: usize) -> Option<Env> {
        let mut env = self.clone();
        for _ in 0..depth {
            let parent = env.borrow().parent.clone()?;
            env = parent;
        }
        Some(env)
    }
}

#[derive(Debug, Default, Finalize, Trace)]
pub struct EnvImpl {
    map: FxHashMap<String, Object>,
    parent: Option<Env>,
}
