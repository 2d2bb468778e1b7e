//! Ordered collections of field realizations

use crate::error::{Error, Result};
use crate::field::{Field, FieldElement, GridTransform};

/// An ordered collection of realizations of one spatial variable.
///
/// All members share the same shape and geometry, enforced on insertion.
/// Member order is stable: member `i` of a propagated output ensemble
/// corresponds to member `i` of the input ensemble, which is what makes
/// paired before/after comparisons and reproducible diagnostics possible.
#[derive(Debug, Clone)]
pub struct Ensemble<T: FieldElement = f64> {
    members: Vec<Field<T>>,
    name: Option<String>,
    units: Option<String>,
}

impl<T: FieldElement> Ensemble<T> {
    /// Create an empty ensemble
    pub fn new() -> Self {
        Self {
            members: Vec::new(),
            name: None,
            units: None,
        }
    }

    /// Create an empty ensemble with capacity for `n` members
    pub fn with_capacity(n: usize) -> Self {
        Self {
            members: Vec::with_capacity(n),
            name: None,
            units: None,
        }
    }

    /// Append a realization.
    ///
    /// Fails with `DimensionMismatch` when the member is not aligned with
    /// the first member.
    pub fn push(&mut self, member: Field<T>) -> Result<()> {
        if let Some(first) = self.members.first()
            && !first.aligned_with(&member)
        {
            return Err(Error::DimensionMismatch {
                expected: first.shape(),
                actual: member.shape(),
            });
        }
        self.members.push(member);
        Ok(())
    }

    /// Number of realizations
    pub fn len(&self) -> usize {
        self.members.len()
    }

    /// Whether the ensemble has no members
    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// Realization at index `i`
    pub fn member(&self, i: usize) -> Option<&Field<T>> {
        self.members.get(i)
    }

    /// First realization
    pub fn first(&self) -> Option<&Field<T>> {
        self.members.first()
    }

    /// Iterate over realizations in index order
    pub fn iter(&self) -> std::slice::Iter<'_, Field<T>> {
        self.members.iter()
    }

    /// Shape shared by all members, if any member exists
    pub fn shape(&self) -> Option<(usize, usize)> {
        self.members.first().map(|f| f.shape())
    }

    /// Geometry shared by all members, if any member exists
    pub fn transform(&self) -> Option<&GridTransform> {
        self.members.first().map(|f| f.transform())
    }

    /// Variable name for reporting
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = Some(name.into());
    }

    /// Units for reporting
    pub fn units(&self) -> Option<&str> {
        self.units.as_deref()
    }

    pub fn set_units(&mut self, units: impl Into<String>) {
        self.units = Some(units.into());
    }
}

impl<T: FieldElement> Default for Ensemble<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<'a, T: FieldElement> IntoIterator for &'a Ensemble<T> {
    type Item = &'a Field<T>;
    type IntoIter = std::slice::Iter<'a, Field<T>>;

    fn into_iter(self) -> Self::IntoIter {
        self.members.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_push_aligned() {
        let mut e: Ensemble<f64> = Ensemble::new();
        e.push(Field::filled(3, 3, 1.0)).unwrap();
        e.push(Field::filled(3, 3, 2.0)).unwrap();
        assert_eq!(e.len(), 2);
        assert_eq!(e.member(1).unwrap().get(0, 0).unwrap(), 2.0);
    }

    #[test]
    fn test_push_misaligned() {
        let mut e: Ensemble<f64> = Ensemble::new();
        e.push(Field::filled(3, 3, 1.0)).unwrap();
        let err = e.push(Field::filled(3, 4, 2.0)).unwrap_err();
        assert!(matches!(err, Error::DimensionMismatch { .. }));
    }

    #[test]
    fn test_push_misaligned_geometry() {
        let mut e: Ensemble<f64> = Ensemble::new();
        e.push(Field::filled(3, 3, 1.0)).unwrap();
        let mut other = Field::filled(3, 3, 2.0);
        other.set_transform(GridTransform::new(5.0, 5.0, 2.0, -2.0));
        assert!(e.push(other).is_err());
    }

    #[test]
    fn test_metadata() {
        let mut e: Ensemble<f64> = Ensemble::new();
        e.set_name("elevation");
        e.set_units("m");
        assert_eq!(e.name(), Some("elevation"));
        assert_eq!(e.units(), Some("m"));
    }
}
