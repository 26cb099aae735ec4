//! Function signatures and their deduplication into the Type section.

use std::collections::HashMap;

use crate::ast::ValType;
use crate::error::{Error, Result};

/// A function signature: ordered parameter types and an optional result.
///
/// Equality and hashing are structural, which is what makes interning sound:
/// two signatures with equal parameter sequences and equal results map to
/// the same type index.
#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub(crate) struct Signature {
    pub(crate) params: Vec<ValType>,
    pub(crate) result: Option<ValType>,
}

/// Deduplicates signatures into the dense index space of the Type section.
#[derive(Debug, Default)]
pub(crate) struct TypeInterner {
    signatures: Vec<Signature>,
    indices: HashMap<Signature, u32>,
}

impl TypeInterner {
    /// Returns the dense index for `signature`, inserting a fresh entry when
    /// the signature is new.
    pub(crate) fn intern(&mut self, signature: &Signature) -> Result<u32> {
        if let Some(&index) = self.indices.get(signature) {
            return Ok(index);
        }

        let index = u32::try_from(self.signatures.len()).map_err(|_| Error::Overflow)?;
        self.signatures.push(signature.clone());
        self.indices.insert(signature.clone(), index);
        Ok(index)
    }

    /// Every distinct signature, in index order.
    pub(crate) fn signatures(&self) -> &[Signature] {
        &self.signatures
    }
}

#[cfg(test)]
mod tests {
    use super::{Signature, TypeInterner};
    use crate::ast::ValType;

    #[test]
    fn equal_signatures_share_an_index() {
        let mut interner = TypeInterner::default();

        let binary = Signature {
            params: vec![ValType::I32, ValType::I32],
            result: Some(ValType::I32),
        };
        let unary = Signature {
            params: vec![ValType::I32],
            result: Some(ValType::I32),
        };

        assert_eq!(interner.intern(&binary).unwrap(), 0);
        assert_eq!(interner.intern(&unary).unwrap(), 1);
        assert_eq!(interner.intern(&binary).unwrap(), 0);
        assert_eq!(interner.signatures().len(), 2);
    }

    #[test]
    fn result_type_distinguishes_signatures() {
        let mut interner = TypeInterner::default();

        let returns = Signature {
            params: vec![ValType::I64],
            result: Some(ValType::I64),
        };
        let void = Signature {
            params: vec![ValType::I64],
            result: None,
        };

        assert_ne!(
            interner.intern(&returns).unwrap(),
            interner.intern(&void).unwrap()
        );
    }
}
