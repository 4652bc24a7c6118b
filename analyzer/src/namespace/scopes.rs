use crate::errors::AlreadyDefined;
use std::cell::RefCell;
use std::collections::BTreeMap;
use std::rc::Rc;

use pact_parser::node::NodeId;

pub type Shared<T> = Rc<RefCell<T>>;

/// A lexical scope for local variables inside a function body, used during
/// name resolution. Scopes nest; lookups walk outwards.
pub struct BlockScope<'a> {
    parent: Option<&'a BlockScope<'a>>,
    variables: BTreeMap<String, NodeId>,
}

impl<'a> BlockScope<'a> {
    pub fn function_scope() -> Self {
        Self {
            parent: None,
            variables: BTreeMap::new(),
        }
    }

    pub fn child(&'a self) -> Self {
        Self {
            parent: Some(self),
            variables: BTreeMap::new(),
        }
    }

    /// Add a variable to this scope. Shadowing an outer local is rejected.
    pub fn add_var(&mut self, name: &str, id: NodeId) -> Result<(), AlreadyDefined> {
        if self.resolve(name).is_some() {
            return Err(AlreadyDefined);
        }
        self.variables.insert(name.to_string(), id);
        Ok(())
    }

    pub fn resolve(&self, name: &str) -> Option<NodeId> {
        self.variables
            .get(name)
            .copied()
            .or_else(|| self.parent.and_then(|parent| parent.resolve(name)))
    }
}

#[cfg(test)]
mod tests {
    use super::BlockScope;
    use pact_parser::node::NodeId;

    #[test]
    fn nested_lookup_and_shadowing() {
        let mut outer = BlockScope::function_scope();
        let id = NodeId::fresh();
        outer.add_var("x", id).unwrap();

        let mut inner = outer.child();
        assert_eq!(inner.resolve("x"), Some(id));
        assert!(inner.add_var("x", NodeId::fresh()).is_err());
        inner.add_var("y", NodeId::fresh()).unwrap();
        assert!(outer.resolve("y").is_none());
    }
}
