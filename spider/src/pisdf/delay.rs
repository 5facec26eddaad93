//! Token-initial conditions on edges.

use crate::expression::Expression;

/// A delay: some number of tokens already present on an edge before the
/// first iteration. Persistent delays keep their reserved address stable
/// across iterations; non-persistent delays are reclaimed with the owning
/// firing and get a synthesized INIT/END vertex pair if the application
/// did not supply explicit setter/getter actors.
#[derive(Debug, Clone)]
pub struct Delay {
    pub value: Expression,
    pub persistent: bool,
    /// Vertex index of a user-supplied setter actor (writes the delay's
    /// initial tokens). `None` ⇒ a synthesized `INIT` vertex is used.
    pub setter: Option<usize>,
    /// Vertex index of a user-supplied getter actor. `None` ⇒ a
    /// synthesized `END` vertex is used.
    pub getter: Option<usize>,
}

impl Delay {
    pub fn new(value: Expression, persistent: bool) -> Self {
        Delay {
            value,
            persistent,
            setter: None,
            getter: None,
        }
    }

    pub fn with_setter_getter(mut self, setter: usize, getter: usize) -> Self {
        self.setter = Some(setter);
        self.getter = Some(getter);
        self
    }

    /// Persistent delays never synthesize INIT/END actors regardless of
    /// setter/getter presence (§3 invariant: "Persistent ⇒ no setter/getter").
    pub fn needs_synthesized_pair(&self) -> bool {
        !self.persistent && self.setter.is_none() && self.getter.is_none()
    }
}
