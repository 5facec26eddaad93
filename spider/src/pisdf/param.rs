//! Named scalar parameters.

/// A parameter's resolution lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamType {
    /// Value known and folded at graph-construction time.
    Static,
    /// Value is `UNDEFINED` until a `CONFIG` actor firing writes it.
    Dynamic,
    /// Value is copied from the parent `GraphFiring`'s parameter table at
    /// firing-setup time.
    Inherited,
}

/// A named scalar parameter, lowercased by convention so expression lookup
/// is case-insensitive.
#[derive(Debug, Clone, PartialEq)]
pub struct Param {
    name: String,
    kind: ParamType,
    value: Option<i64>,
    /// Index of the parameter this one inherits from, in the parent
    /// `GraphFiring`'s parameter table. Only meaningful for `Inherited`.
    parent: Option<usize>,
}

impl Param {
    pub fn new(name: &str, kind: ParamType, value: Option<i64>) -> Self {
        Param {
            name: name.to_lowercase(),
            kind,
            value,
            parent: None,
        }
    }

    pub fn inherited(name: &str, parent_ix: usize) -> Self {
        Param {
            name: name.to_lowercase(),
            kind: ParamType::Inherited,
            value: None,
            parent: Some(parent_ix),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> ParamType {
        self.kind
    }

    pub fn value(&self) -> Option<i64> {
        self.value
    }

    pub fn set_value(&mut self, value: i64) {
        self.value = Some(value);
    }

    pub fn is_resolved(&self) -> bool {
        self.value.is_some()
    }

    /// Resolve an `Inherited` parameter by copying its value from the
    /// parent firing's already-resolved table. No-op for `Static`/`Dynamic`.
    pub fn resolve_from_parent(&mut self, parent_table: &[Param]) {
        if self.kind == ParamType::Inherited {
            if let Some(ix) = self.parent {
                self.value = parent_table[ix].value;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn inherited_param_copies_parent_value_on_resolve() {
        let parent_table = vec![Param::new("n", ParamType::Static, Some(7))];
        let mut child = Param::inherited("n", 0);
        assert!(!child.is_resolved());
        child.resolve_from_parent(&parent_table);
        assert_eq!(child.value(), Some(7));
    }

    #[test]
    fn dynamic_param_undefined_until_set() {
        let p = Param::new("p", ParamType::Dynamic, None);
        assert!(!p.is_resolved());
    }
}
