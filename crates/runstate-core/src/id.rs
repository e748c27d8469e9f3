//! Identity types for RunState

use std::fmt;

/// Data type identity - assigned by the type registry on creation
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct TypeId(pub u32);

impl TypeId {
    #[inline]
    pub fn new(id: u32) -> Self {
        TypeId(id)
    }

    #[inline]
    pub fn get(self) -> u32 {
        self.0
    }
}

impl fmt::Debug for TypeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Type({})", self.0)
    }
}

impl fmt::Display for TypeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_type_id_display() {
        let id = TypeId::new(7);
        assert_eq!(id.to_string(), "7");
        assert_eq!(format!("{:?}", id), "Type(7)");
        assert_eq!(id.get(), 7);
    }
}
