use std::fmt;

use serde::{Deserialize, Serialize};

/// A name as it appears in source text, before α-renaming.
pub type SourceName = String;

/// A globally unique name, assigned by the namer. Every binding in the
/// program — `Def`s, `Fn` parameters, and the synthetic SSA names stamped on
/// `Call`, `Instruction`, `External`, and `Fn` nodes — gets exactly one of
/// these, and no two bindings share one.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct UniqueName(pub String);

impl UniqueName {
    pub fn new(name: impl Into<String>) -> UniqueName {
        UniqueName(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UniqueName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for UniqueName {
    fn from(s: String) -> UniqueName {
        UniqueName(s)
    }
}
