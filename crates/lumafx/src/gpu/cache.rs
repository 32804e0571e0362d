use std::collections::HashMap;
use std::rc::Rc;

use crate::program::{ProgramKey, ShaderProgram};

/// Compiled programs keyed by effect and variant.
#[derive(Default)]
pub(crate) struct ProgramCache {
    entries: HashMap<ProgramKey, Rc<ShaderProgram>>,
}

impl ProgramCache {
    pub(crate) fn get(&self, key: &ProgramKey) -> Option<Rc<ShaderProgram>> {
        self.entries.get(key).cloned()
    }

    /// Stores `program` unless the key is already present, and returns the
    /// entry that ends up cached. The first compilation of a key wins.
    pub(crate) fn store(&mut self, key: ProgramKey, program: Rc<ShaderProgram>) -> Rc<ShaderProgram> {
        Rc::clone(self.entries.entry(key).or_insert(program))
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }
}
