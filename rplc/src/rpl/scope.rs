//! Region and region-parameter declarations.
//!
//! Every region name and region parameter used in an annotation must be
//! declared in an enclosing scope. This table records the declarations; the
//! binder decides which scopes are visible from a given declaration and asks
//! the table to resolve names in that order.

use indexmap::IndexMap;
use rustc_hash::FxHashMap;
use thiserror::Error;

use super::{ParamName, RegionName, Scope, SpecialRegion};
use crate::hir::DeclId;

/// Why a declaration was rejected.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DeclareError {
    /// The name is already declared in this scope.
    #[error("`{0}` is already declared in this scope")]
    Duplicate(String),
    /// The name is one of the reserved regions.
    #[error("`{0}` is a reserved region name")]
    Reserved(String),
    /// The name is empty or contains a path separator or wildcard.
    #[error("`{0}` is not a valid region name")]
    Invalid(String),
}

/// Declared region names and region parameters, per scope.
#[derive(Debug, Default, Clone)]
pub struct RegionScopes {
    regions: FxHashMap<Scope, IndexMap<String, RegionName>>,
    params: FxHashMap<DeclId, Vec<ParamName>>,
    synthesized: usize,
}

impl RegionScopes {
    /// Create an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare a region name in a scope.
    pub fn declare(&mut self, name: &str, scope: Scope) -> Result<RegionName, DeclareError> {
        validate_name(name)?;
        let regions = self.regions.entry(scope).or_default();
        if regions.contains_key(name) {
            return Err(DeclareError::Duplicate(name.to_string()));
        }
        let region = RegionName::new(name, scope);
        regions.insert(name.to_string(), region.clone());
        Ok(region)
    }

    /// Declare a region parameter on a class or function.
    pub fn declare_param(&mut self, name: &str, owner: DeclId) -> Result<ParamName, DeclareError> {
        validate_name(name)?;
        let params = self.params.entry(owner).or_default();
        if params.iter().any(|p| p.name == name) {
            return Err(DeclareError::Duplicate(name.to_string()));
        }
        let param = ParamName::new(name, owner);
        params.push(param.clone());
        Ok(param)
    }

    /// Declare a fresh region for the inference engine.
    ///
    /// The name is derived from `hint` and made unique within the scope.
    pub fn synthesize(&mut self, hint: &str, scope: Scope) -> RegionName {
        let base = format!("rgn_{hint}");
        let regions = self.regions.entry(scope).or_default();
        let mut name = base.clone();
        let mut counter = 1;
        while regions.contains_key(&name) {
            counter += 1;
            name = format!("{base}_{counter}");
        }
        self.synthesized += 1;
        let region = RegionName::new(name.clone(), scope);
        regions.insert(name, region.clone());
        region
    }

    /// Look up a region name declared directly in `scope`.
    pub fn region(&self, scope: Scope, name: &str) -> Option<&RegionName> {
        self.regions.get(&scope).and_then(|regions| regions.get(name))
    }

    /// The region names declared directly in `scope`, in declaration order.
    pub fn regions_in(&self, scope: Scope) -> impl Iterator<Item = &RegionName> {
        self.regions.get(&scope).into_iter().flat_map(|regions| regions.values())
    }

    /// The region parameters declared by `owner`, in declaration order.
    pub fn params(&self, owner: DeclId) -> &[ParamName] {
        self.params.get(&owner).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Look up a region parameter declared by `owner`.
    pub fn param(&self, owner: DeclId, name: &str) -> Option<&ParamName> {
        self.params(owner).iter().find(|p| p.name == name)
    }

    /// Number of regions created by [`RegionScopes::synthesize`].
    pub fn synthesized_count(&self) -> usize {
        self.synthesized
    }
}

fn validate_name(name: &str) -> Result<(), DeclareError> {
    if SpecialRegion::from_name(name).is_some() {
        return Err(DeclareError::Reserved(name.to_string()));
    }
    if name.is_empty() || name.contains(':') || name.contains('*') || name.contains(char::is_whitespace) {
        return Err(DeclareError::Invalid(name.to_string()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_declare_and_lookup() {
        let mut scopes = RegionScopes::new();
        let left = scopes.declare("Left", Scope::Global).unwrap();
        assert_eq!(scopes.region(Scope::Global, "Left"), Some(&left));
        assert_eq!(scopes.region(Scope::Decl(DeclId(3)), "Left"), None);
    }

    #[test]
    fn test_same_name_in_different_scopes_is_distinct() {
        let mut scopes = RegionScopes::new();
        let a = scopes.declare("R", Scope::Decl(DeclId(1))).unwrap();
        let b = scopes.declare("R", Scope::Decl(DeclId(2))).unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_duplicate_and_reserved() {
        let mut scopes = RegionScopes::new();
        scopes.declare("R", Scope::Global).unwrap();
        assert_eq!(
            scopes.declare("R", Scope::Global),
            Err(DeclareError::Duplicate("R".to_string()))
        );
        assert_eq!(
            scopes.declare("Root", Scope::Global),
            Err(DeclareError::Reserved("Root".to_string()))
        );
        assert_eq!(
            scopes.declare("A:B", Scope::Global),
            Err(DeclareError::Invalid("A:B".to_string()))
        );
    }

    #[test]
    fn test_params_keep_order() {
        let mut scopes = RegionScopes::new();
        let owner = DeclId(4);
        scopes.declare_param("P", owner).unwrap();
        scopes.declare_param("Q", owner).unwrap();
        let names: Vec<_> = scopes.params(owner).iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["P", "Q"]);
        assert!(scopes.declare_param("P", owner).is_err());
        assert!(scopes.params(DeclId(5)).is_empty());
    }

    #[test]
    fn test_synthesize_is_unique() {
        let mut scopes = RegionScopes::new();
        let scope = Scope::Decl(DeclId(9));
        let first = scopes.synthesize("a", scope);
        let second = scopes.synthesize("a", scope);
        assert_eq!(first.name, "rgn_a");
        assert_eq!(second.name, "rgn_a_2");
        assert_eq!(scopes.synthesized_count(), 2);
    }
}
