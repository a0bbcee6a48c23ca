//! Analytic tagging axes (`#DIM`), their one-level specializations
//! (`#UNDERDIM`) and their coded values (`#OBJEKT`).

use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dimension {
    pub id: u32,
    pub name: String,
}

/// A dimension attached under another one. Only the direct super-dimension
/// reference is kept; deeper hierarchies are not resolved.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubDimension {
    pub id: u32,
    pub name: String,
    pub super_id: u32,
}

/// A coded value within one dimension, e.g. cost center `"12"` in
/// dimension 1.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DimensionObject {
    pub dimension: u32,
    pub code: String,
    pub name: String,
}

/// A non-owning `(dimension id, object code)` reference, as carried by
/// object-qualified balance posts and journal-line object lists.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectRef {
    pub dimension: u32,
    pub code: String,
}

impl ObjectRef {
    pub fn new(dimension: u32, code: impl Into<String>) -> ObjectRef {
        ObjectRef {
            dimension,
            code: code.into(),
        }
    }

    /// Both halves of the pair must be present for the reference to mean
    /// anything.
    pub fn is_complete(&self) -> bool {
        self.dimension > 0 && !self.code.is_empty()
    }
}
