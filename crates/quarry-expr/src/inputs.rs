//! Evaluation inputs.
//!
//! The environment declares a small vocabulary of well-known bindings:
//! `cols` (the current row, always present), `resource`, `principal`,
//! `entitlement` (provisioning context), and `input`/`credentials`
//! (account creation). [`Inputs`] collects whichever of these a caller has
//! and turns them into an evaluation scope.

use rhai::{Dynamic, Map, Scope};

pub const COLS: &str = "cols";
pub const RESOURCE: &str = "resource";
pub const PRINCIPAL: &str = "principal";
pub const ENTITLEMENT: &str = "entitlement";
pub const INPUT: &str = "input";
pub const CREDENTIALS: &str = "credentials";

/// Named bindings for one evaluation.
#[derive(Debug, Clone, Default)]
pub struct Inputs {
    bindings: Map,
}

impl Inputs {
    /// Create an empty input set. `cols` is still bound (to an empty map)
    /// at evaluation time.
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind an arbitrary name to a value.
    pub fn set(&mut self, name: &str, value: Dynamic) {
        self.bindings.insert(name.into(), value);
    }

    /// Builder-style [`Inputs::set`].
    pub fn with(mut self, name: &str, value: Dynamic) -> Self {
        self.set(name, value);
        self
    }

    /// Look up a binding by name.
    pub fn get(&self, name: &str) -> Option<&Dynamic> {
        self.bindings.get(name)
    }

    /// Iterate over all bindings.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Dynamic)> {
        self.bindings.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Bind the current row under `cols`.
    pub fn set_row(&mut self, cols: Map) {
        self.set(COLS, Dynamic::from(cols));
    }

    /// Bind the current resource under `resource` as
    /// `{ID, Type, DisplayName}`.
    pub fn set_resource(&mut self, id: &str, resource_type: &str, display_name: &str) {
        let mut map = Map::new();
        map.insert("ID".into(), Dynamic::from(id.to_string()));
        map.insert("Type".into(), Dynamic::from(resource_type.to_string()));
        map.insert(
            "DisplayName".into(),
            Dynamic::from(display_name.to_string()),
        );
        self.set(RESOURCE, Dynamic::from(map));
    }

    /// Bind the provisioning principal under `principal` as `{ID, Type}`.
    pub fn set_principal(&mut self, id: &str, resource_type: &str) {
        let mut map = Map::new();
        map.insert("ID".into(), Dynamic::from(id.to_string()));
        map.insert("Type".into(), Dynamic::from(resource_type.to_string()));
        self.set(PRINCIPAL, Dynamic::from(map));
    }

    /// Bind the provisioning entitlement under `entitlement` as `{ID}`.
    pub fn set_entitlement(&mut self, id: &str) {
        let mut map = Map::new();
        map.insert("ID".into(), Dynamic::from(id.to_string()));
        self.set(ENTITLEMENT, Dynamic::from(map));
    }

    /// Build the evaluation scope. `cols` is always present, defaulting to
    /// an empty map.
    pub(crate) fn to_scope(&self) -> Scope<'static> {
        let mut scope = Scope::new();
        for (name, value) in &self.bindings {
            scope.push(name.to_string(), value.clone());
        }
        if !self.bindings.contains_key(COLS) {
            scope.push(COLS, Dynamic::from(Map::new()));
        }
        scope
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cols_always_present() {
        let inputs = Inputs::new();
        let scope = inputs.to_scope();
        assert!(scope.contains(COLS));
    }

    #[test]
    fn test_resource_binding_shape() {
        let mut inputs = Inputs::new();
        inputs.set_resource("admin", "role", "Administrators");

        let resource = inputs.get(RESOURCE).unwrap().clone();
        let map = resource.cast::<Map>();
        assert_eq!(map.get("ID").unwrap().clone().into_string().unwrap(), "admin");
        assert_eq!(map.get("Type").unwrap().clone().into_string().unwrap(), "role");
        assert_eq!(
            map.get("DisplayName")
                .unwrap()
                .clone()
                .into_string()
                .unwrap(),
            "Administrators"
        );
    }

    #[test]
    fn test_direct_lookup() {
        let inputs = Inputs::new().with("password", Dynamic::from("s3cret".to_string()));
        assert!(inputs.get("password").is_some());
        assert!(inputs.get("missing").is_none());
    }
}
