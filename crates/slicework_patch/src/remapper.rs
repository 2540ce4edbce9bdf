//! Consistent entity id rewriting across an entity graph.
//!
//! Entity ids appear in two roles inside a field tree: as keys of an
//! entity-keyed list (definitions) and as `EntityRef` leaves (references).
//! Remapping rewrites both. Ids absent from the map are external references
//! and are left untouched.

use std::collections::BTreeSet;

use slicework_foundation::{EntityId, Result};
use slicework_tree::FieldTree;

use crate::generator::{CustomIdMapper, IdGenerator};
use crate::id_map::EntityIdMap;

/// Stateless entry point for id remapping.
#[derive(Debug, Clone, Copy, Default)]
pub struct EntityIdRemapper;

impl EntityIdRemapper {
    /// Ids of every entity defined in `tree`.
    #[must_use]
    pub fn entity_ids(tree: &FieldTree) -> BTreeSet<EntityId> {
        tree.defined_entity_ids()
    }

    /// Builds a fresh id for every entity defined in `tree`.
    ///
    /// The custom mapper, when present, chooses each id; otherwise the
    /// generator does.
    #[must_use]
    pub fn generate_new_ids(
        tree: &FieldTree,
        ids: &mut dyn IdGenerator,
        mapper: Option<&CustomIdMapper>,
    ) -> EntityIdMap {
        Self::entity_ids(tree)
            .into_iter()
            .map(|base| (base, Self::assign(base, ids, mapper)))
            .collect()
    }

    /// Picks a new id for `base`.
    #[must_use]
    pub fn assign(
        base: EntityId,
        ids: &mut dyn IdGenerator,
        mapper: Option<&CustomIdMapper>,
    ) -> EntityId {
        match mapper {
            Some(mapper) => mapper(base, ids),
            None => ids.next_id(),
        }
    }

    /// Rewrites every id in `tree` through `map`.
    ///
    /// # Errors
    ///
    /// Returns [`IdCollision`](slicework_foundation::ErrorKind::IdCollision)
    /// without touching anything if `map` is not a bijection.
    pub fn remap(tree: &FieldTree, map: &EntityIdMap) -> Result<FieldTree> {
        map.validate_bijection()?;
        Ok(tree.map_entity_ids(|id, _| map.map_or_keep(id)))
    }

    /// Clones `tree` under fresh ids, fixing up every reference.
    ///
    /// # Errors
    ///
    /// Returns an error if the generated ids collide (a custom mapper
    /// returning the same id twice, for example).
    pub fn clone_and_generate_new_ids(
        tree: &FieldTree,
        ids: &mut dyn IdGenerator,
        mapper: Option<&CustomIdMapper>,
    ) -> Result<(FieldTree, EntityIdMap)> {
        let map = Self::generate_new_ids(tree, ids, mapper);
        let cloned = Self::remap(tree, &map)?;
        Ok((cloned, map))
    }

    /// Remaps `tree` with `map`, first extending `map` through `assign` for
    /// every defined entity it does not yet cover.
    ///
    /// `map` is only updated if the remap succeeds.
    ///
    /// # Errors
    ///
    /// Returns [`IdCollision`](slicework_foundation::ErrorKind::IdCollision)
    /// if the extended map is not a bijection.
    pub fn replace_ids(
        tree: &FieldTree,
        map: &mut EntityIdMap,
        mut assign: impl FnMut(EntityId) -> EntityId,
    ) -> Result<FieldTree> {
        let mut extended = map.clone();
        for base in Self::entity_ids(tree) {
            if !extended.contains_base(base) {
                extended.insert(base, assign(base));
            }
        }
        let remapped = Self::remap(tree, &extended)?;
        *map = extended;
        Ok(remapped)
    }
}
