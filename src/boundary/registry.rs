//! Name-to-factory table for boundary conditions.
//!
//! Populated explicitly: [`BoundaryConditionRegistry::with_standard_conditions`]
//! registers the built-in set and applications add their own with
//! [`BoundaryConditionRegistry::register`].

use std::collections::BTreeMap;

use super::basic::{Calculated, FixedGradient, FixedValue, Mixed, ZeroGradient};
use super::condition::BoundaryCondition;
use super::constraint::{Empty, Symmetry};
use super::coupled::{Cyclic, Processor};
use super::inlet_outlet::InletOutlet;
use crate::error::{FvError, Result};
use crate::io::Dictionary;
use crate::mesh::{Patch, PatchKind};
use crate::types::FieldValue;

/// Factory building a condition for a patch from its dictionary entries.
pub type BoundaryFactory<T> =
    Box<dyn Fn(&Patch, &Dictionary) -> Result<Box<dyn BoundaryCondition<T>>> + Send + Sync>;

/// Condition type a patch kind imposes, if any.
pub fn constraint_type(kind: &PatchKind) -> Option<&'static str> {
    match kind {
        PatchKind::Empty => Some("empty"),
        PatchKind::Cyclic { .. } => Some("cyclic"),
        PatchKind::Processor { .. } => Some("processor"),
        PatchKind::Symmetry => Some("symmetryPlane"),
        PatchKind::Patch | PatchKind::Wall => None,
    }
}

/// Condition imposed by a constrained patch kind, built directly.
pub fn constraint_condition<T: FieldValue>(patch: &Patch) -> Option<Box<dyn BoundaryCondition<T>>> {
    match patch.kind {
        PatchKind::Empty => Some(Box::new(Empty)),
        PatchKind::Cyclic { neighbour_patch } => Some(Box::new(Cyclic::new(neighbour_patch))),
        PatchKind::Processor { neighbour_rank, tag } => {
            Some(Box::new(Processor::<T>::new(neighbour_rank, tag)))
        }
        PatchKind::Symmetry => Some(Box::new(Symmetry)),
        PatchKind::Patch | PatchKind::Wall => None,
    }
}

/// Registry of boundary condition factories for one value type.
pub struct BoundaryConditionRegistry<T: FieldValue> {
    factories: BTreeMap<String, BoundaryFactory<T>>,
}

impl<T: FieldValue> Default for BoundaryConditionRegistry<T> {
    fn default() -> Self {
        Self::with_standard_conditions()
    }
}

impl<T: FieldValue> std::fmt::Debug for BoundaryConditionRegistry<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BoundaryConditionRegistry")
            .field("value_type", &T::TYPE_NAME)
            .field("types", &self.names())
            .finish()
    }
}

impl<T: FieldValue> BoundaryConditionRegistry<T> {
    /// Empty registry.
    pub fn new() -> Self {
        Self {
            factories: BTreeMap::new(),
        }
    }

    /// Registry with every built-in condition.
    pub fn with_standard_conditions() -> Self {
        let mut reg = Self::new();
        reg.register("calculated", |_, _| Ok(Box::new(Calculated)));
        reg.register("zeroGradient", |_, _| Ok(Box::new(ZeroGradient)));
        reg.register("fixedValue", |patch, dict| {
            let value = dict.patch_value::<T>("value", patch.size)?;
            Ok(Box::new(FixedValue::new(value)))
        });
        reg.register("fixedGradient", |patch, dict| {
            let gradient = dict.patch_value::<T>("gradient", patch.size)?;
            Ok(Box::new(FixedGradient::new(gradient)))
        });
        reg.register("mixed", |patch, dict| {
            Ok(Box::new(Mixed::new(
                dict.patch_value::<T>("refValue", patch.size)?,
                dict.patch_value::<T>("refGradient", patch.size)?,
                dict.patch_value::<f64>("valueFraction", patch.size)?,
            )))
        });
        reg.register("inletOutlet", |patch, dict| {
            let inlet = dict.patch_value::<T>("inletValue", patch.size)?;
            Ok(Box::new(InletOutlet::new(inlet)))
        });
        reg.register("symmetryPlane", |_, _| Ok(Box::new(Symmetry)));
        reg.register("symmetry", |_, _| Ok(Box::new(Symmetry)));
        reg.register("empty", |_, _| Ok(Box::new(Empty)));
        reg.register("cyclic", |patch, _| match patch.kind {
            PatchKind::Cyclic { neighbour_patch } => Ok(Box::new(Cyclic::new(neighbour_patch))),
            _ => Err(wrong_patch_kind("cyclic", patch)),
        });
        reg.register("processor", |patch, _| match patch.kind {
            PatchKind::Processor { neighbour_rank, tag } => {
                Ok(Box::new(Processor::<T>::new(neighbour_rank, tag)))
            }
            _ => Err(wrong_patch_kind("processor", patch)),
        });
        reg
    }

    /// Add or replace a factory.
    pub fn register<F>(&mut self, name: &str, factory: F)
    where
        F: Fn(&Patch, &Dictionary) -> Result<Box<dyn BoundaryCondition<T>>> + Send + Sync + 'static,
    {
        self.factories.insert(name.to_string(), Box::new(factory));
    }

    pub fn contains(&self, name: &str) -> bool {
        self.factories.contains_key(name)
    }

    /// Registered names, sorted.
    pub fn names(&self) -> Vec<&str> {
        self.factories.keys().map(String::as_str).collect()
    }

    /// Build the condition `type_name` for `patch`.
    ///
    /// Constrained patch kinds (empty, cyclic, processor, symmetry) always get
    /// their own condition regardless of `type_name`.
    pub fn create(
        &self,
        type_name: &str,
        patch: &Patch,
        dict: &Dictionary,
    ) -> Result<Box<dyn BoundaryCondition<T>>> {
        let actual = match constraint_type(&patch.kind) {
            Some(forced)
                if forced != type_name && !(forced == "symmetryPlane" && type_name == "symmetry") =>
            {
                log::debug!(
                    "Patch '{}' is {}; using '{forced}' instead of '{type_name}'",
                    patch.name,
                    patch.kind.keyword()
                );
                forced
            }
            _ => type_name,
        };
        let factory = self
            .factories
            .get(actual)
            .ok_or_else(|| FvError::unknown_type("boundary condition", actual, self.names()))?;
        factory(patch, dict)
    }
}

fn wrong_patch_kind(type_name: &str, patch: &Patch) -> FvError {
    FvError::InvalidConfig(format!(
        "'{type_name}' condition needs a {type_name} patch, but '{}' is {}",
        patch.name,
        patch.kind.keyword()
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{PatchIndex, Vector};

    #[test]
    fn test_unknown_condition_lists_alternatives() {
        let reg = BoundaryConditionRegistry::<f64>::with_standard_conditions();
        let patch = Patch::new("inlet", 0, 2, PatchKind::Patch);
        let err = reg
            .create("fixedValu", &patch, &Dictionary::new())
            .unwrap_err();
        match err {
            FvError::UnknownType { name, valid, .. } => {
                assert_eq!(name, "fixedValu");
                assert!(valid.contains(&"fixedValue".to_string()));
                let mut sorted = valid.clone();
                sorted.sort();
                assert_eq!(valid, sorted);
            }
            other => panic!("unexpected error {other}"),
        }
    }

    #[test]
    fn test_constrained_patch_forces_condition() {
        let reg = BoundaryConditionRegistry::<Vector>::with_standard_conditions();
        let cyc = Patch::new(
            "periodic",
            0,
            1,
            PatchKind::Cyclic {
                neighbour_patch: PatchIndex::new(1),
            },
        );
        let bc = reg.create("zeroGradient", &cyc, &Dictionary::new()).unwrap();
        assert_eq!(bc.type_name(), "cyclic");
        assert!(bc.is_coupled());

        let wall = Patch::new("wall", 0, 1, PatchKind::Wall);
        assert!(matches!(
            reg.create("cyclic", &wall, &Dictionary::new()),
            Err(FvError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_fixed_value_requires_value_entry() {
        let reg = BoundaryConditionRegistry::<f64>::with_standard_conditions();
        let patch = Patch::new("inlet", 0, 3, PatchKind::Patch);
        assert!(reg.create("fixedValue", &patch, &Dictionary::new()).is_err());
        let dict = Dictionary::from_pairs(&[("value", "uniform 2")]).unwrap();
        let bc = reg.create("fixedValue", &patch, &dict).unwrap();
        assert!(bc.fixes_value());
    }

    #[test]
    fn test_custom_registration() {
        let mut reg = BoundaryConditionRegistry::<f64>::new();
        reg.register("slip", |_, _| Ok(Box::new(Symmetry)));
        assert_eq!(reg.names(), vec!["slip"]);
        let patch = Patch::new("side", 0, 1, PatchKind::Patch);
        assert_eq!(reg.create("slip", &patch, &Dictionary::new()).unwrap().type_name(), "symmetryPlane");
    }
}
