//! Lexical scopes.
//!
//! The outermost scope is backed by the global object, so `var x` at top level and `window.x` name the
//! same binding. Blocks share their enclosing function's scope.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use super::value::{ObjRef, Value};

pub type ScopeRef = Rc<RefCell<Scope>>;

pub struct Scope {
    bindings: Bindings,
    parent: Option<ScopeRef>,
}

enum Bindings {
    Declarative(HashMap<String, Value>),
    Global(ObjRef),
}

impl Scope {
    /// The outermost scope, backed by `global`.
    pub fn global(global: ObjRef) -> ScopeRef {
        Rc::new(RefCell::new(Scope {
            bindings: Bindings::Global(global),
            parent: None,
        }))
    }

    /// A fresh function scope nested in `parent`.
    pub fn child(parent: &ScopeRef) -> ScopeRef {
        Rc::new(RefCell::new(Scope {
            bindings: Bindings::Declarative(HashMap::new()),
            parent: Some(parent.clone()),
        }))
    }

    fn get_own(&self, name: &str) -> Option<Value> {
        match &self.bindings {
            Bindings::Declarative(vars) => vars.get(name).cloned(),
            Bindings::Global(object) => object.borrow().properties.get(name).cloned(),
        }
    }

    fn has_own(&self, name: &str) -> bool {
        match &self.bindings {
            Bindings::Declarative(vars) => vars.contains_key(name),
            Bindings::Global(object) => object.borrow().properties.contains_key(name),
        }
    }

    fn set_own(&mut self, name: &str, value: Value) {
        match &mut self.bindings {
            Bindings::Declarative(vars) => {
                vars.insert(name.to_string(), value);
            }
            Bindings::Global(object) => {
                object.borrow_mut().properties.insert(name.to_string(), value);
            }
        }
    }

    /// Bind `name` in this scope, replacing any existing binding.
    pub fn declare(scope: &ScopeRef, name: &str, value: Value) {
        scope.borrow_mut().set_own(name, value);
    }

    /// Bind `name` to `undefined` unless this scope already has it.
    pub fn hoist(scope: &ScopeRef, name: &str) {
        let mut borrowed = scope.borrow_mut();
        if !borrowed.has_own(name) {
            borrowed.set_own(name, Value::Undefined);
        }
    }

    pub fn lookup(scope: &ScopeRef, name: &str) -> Option<Value> {
        let mut current = Some(scope.clone());
        while let Some(s) = current {
            let borrowed = s.borrow();
            if let Some(value) = borrowed.get_own(name) {
                return Some(value);
            }
            current = borrowed.parent.clone();
        }
        None
    }

    /// Assign to the nearest binding of `name`; unbound names become globals.
    pub fn assign(scope: &ScopeRef, name: &str, value: Value) {
        let mut current = scope.clone();
        loop {
            let parent = {
                let borrowed = current.borrow();
                if borrowed.has_own(name) {
                    None
                } else {
                    borrowed.parent.clone()
                }
            };
            match parent {
                Some(parent) => current = parent,
                None => break,
            }
        }
        current.borrow_mut().set_own(name, value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interp::value::{Object, ObjectKind};

    #[test]
    fn test_assign_walks_to_declaring_scope() {
        let global = Object::new(ObjectKind::Ordinary, None);
        let root = Scope::global(global.clone());
        Scope::declare(&root, "x", Value::from(1.0));
        let inner = Scope::child(&root);
        Scope::assign(&inner, "x", Value::from(2.0));
        assert!(Scope::lookup(&root, "x").unwrap().strict_equals(&Value::from(2.0)));
    }

    #[test]
    fn test_unbound_assignment_creates_global_property() {
        let global = Object::new(ObjectKind::Ordinary, None);
        let root = Scope::global(global.clone());
        let inner = Scope::child(&root);
        Scope::assign(&inner, "leaked", Value::from("v"));
        assert!(global.borrow().properties.contains_key("leaked"));
    }

    #[test]
    fn test_hoist_keeps_existing_binding() {
        let global = Object::new(ObjectKind::Ordinary, None);
        let root = Scope::global(global);
        Scope::declare(&root, "stjs", Value::from(true));
        Scope::hoist(&root, "stjs");
        assert!(Scope::lookup(&root, "stjs").unwrap().truthy());
    }
}
