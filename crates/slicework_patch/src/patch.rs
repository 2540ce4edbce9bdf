//! Data patches: the minimal edit set that rebuilds a target tree from a
//! source tree.
//!
//! [`DataPatch::create`] walks source and target together. Children present
//! only in the target become [`PatchOp::Add`], children present only in the
//! source become [`PatchOp::Remove`], differing leaves and nodes whose shape
//! changed become [`PatchOp::Replace`]. Edits are kept sorted by address so
//! [`DataPatch::apply`] always visits a parent before its children.

use std::collections::BTreeMap;

use slicework_foundation::{EntityId, Error, FieldAddress};
use slicework_tree::{FieldNode, FieldTree};
use tracing::debug;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::flags::{DataFlags, FlagsMap};

/// One recorded edit.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum PatchOp {
    /// Replace the node at the address.
    Replace(FieldNode),
    /// Add a node that the source does not have.
    Add(FieldNode),
    /// Remove the node at the address.
    Remove,
}

impl PatchOp {
    /// Short name for logs.
    #[must_use]
    pub const fn kind_name(&self) -> &'static str {
        match self {
            Self::Replace(_) => "replace",
            Self::Add(_) => "add",
            Self::Remove => "remove",
        }
    }
}

/// An edit that could not be applied because the source changed shape.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StaleEdit {
    /// Where the edit was addressed.
    pub address: FieldAddress,
    /// The edit that was dropped.
    pub op: PatchOp,
}

impl From<&StaleEdit> for Error {
    fn from(stale: &StaleEdit) -> Self {
        Error::stale_edit(stale.address.clone())
    }
}

/// Result of [`DataPatch::apply`].
#[derive(Clone, Debug)]
pub struct ApplyOutcome {
    /// The patched tree.
    pub tree: FieldTree,
    /// Edits dropped because their address no longer exists in the source.
    pub stale: Vec<StaleEdit>,
    /// Edits skipped because their address is flagged `PREVENT_OVERRIDE`.
    pub suppressed: usize,
}

impl ApplyOutcome {
    /// Returns true if every edit was applied.
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.stale.is_empty() && self.suppressed == 0
    }
}

/// Address-ordered edits plus the flags they were created with.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct DataPatch {
    edits: BTreeMap<FieldAddress, PatchOp>,
    flags: FlagsMap,
}

impl DataPatch {
    /// Creates an empty patch.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Computes the edits that turn `source` into `target`.
    ///
    /// Addresses whose effective flags include `PREVENT_OVERRIDE` or `HIDDEN`
    /// are never recorded. Leaves under `FORCE_OVERRIDE` are recorded even
    /// when equal.
    #[must_use]
    pub fn create(source: &FieldTree, target: &FieldTree, flags: &FlagsMap) -> Self {
        let mut edits = BTreeMap::new();
        let mut address = FieldAddress::root();
        compare(source.root(), target.root(), &mut address, flags, &mut edits);
        Self {
            edits,
            flags: flags.clone(),
        }
    }

    /// Applies the patch to `source` using the flags it was created with.
    #[must_use]
    pub fn apply(&self, source: &FieldTree) -> ApplyOutcome {
        self.apply_with_flags(source, &self.flags)
    }

    /// Applies the patch to a clone of `source`.
    ///
    /// Edits under `PREVENT_OVERRIDE` are skipped. A `Replace` whose address
    /// is gone, or an `Add` whose parent is gone, is dropped and reported as
    /// stale; the source value stands. Removing something already missing
    /// is a no-op.
    #[must_use]
    pub fn apply_with_flags(&self, source: &FieldTree, flags: &FlagsMap) -> ApplyOutcome {
        let mut tree = source.clone();
        let mut stale = Vec::new();
        let mut suppressed = 0;

        for (address, op) in &self.edits {
            if flags.effective(address).skips_apply() {
                suppressed += 1;
                continue;
            }
            let applied = match op {
                PatchOp::Replace(node) => {
                    tree.contains(address) && tree.set_node(address, node.clone()).is_ok()
                }
                PatchOp::Add(node) => tree.set_node(address, node.clone()).is_ok(),
                PatchOp::Remove => {
                    if tree.contains(address) {
                        tree.remove_node(address).is_ok()
                    } else {
                        true
                    }
                }
            };
            if !applied {
                debug!(%address, op = op.kind_name(), "dropping stale patch edit");
                stale.push(StaleEdit {
                    address: address.clone(),
                    op: op.clone(),
                });
            }
        }

        ApplyOutcome {
            tree,
            stale,
            suppressed,
        }
    }

    /// Number of edits.
    #[must_use]
    pub fn len(&self) -> usize {
        self.edits.len()
    }

    /// Returns true if there are no edits.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.edits.is_empty()
    }

    /// Iterates edits in address order.
    pub fn iter(&self) -> impl Iterator<Item = (&FieldAddress, &PatchOp)> {
        self.edits.iter()
    }

    /// Returns the edit at `address`.
    #[must_use]
    pub fn edit(&self, address: &FieldAddress) -> Option<&PatchOp> {
        self.edits.get(address)
    }

    /// Records an edit directly.
    pub fn insert_edit(&mut self, address: FieldAddress, op: PatchOp) -> Option<PatchOp> {
        self.edits.insert(address, op)
    }

    /// Removes an edit.
    pub fn remove_edit(&mut self, address: &FieldAddress) -> Option<PatchOp> {
        self.edits.remove(address)
    }

    /// The flags the patch was created with.
    #[must_use]
    pub fn flags(&self) -> &FlagsMap {
        &self.flags
    }

    /// Replaces the stored flags.
    pub fn set_flags(&mut self, flags: FlagsMap) {
        self.flags = flags;
    }

    /// Returns a copy with entity ids rewritten in addresses, in recorded
    /// nodes, and in flag addresses.
    #[must_use]
    pub fn remap_ids(&self, mut f: impl FnMut(EntityId) -> EntityId) -> Self {
        let edits = self
            .edits
            .iter()
            .map(|(address, op)| {
                let op = match op {
                    PatchOp::Replace(node) => PatchOp::Replace(node.map_entity_ids(&mut |id, _| f(id))),
                    PatchOp::Add(node) => PatchOp::Add(node.map_entity_ids(&mut |id, _| f(id))),
                    PatchOp::Remove => PatchOp::Remove,
                };
                (address.remap_entities(&mut f), op)
            })
            .collect();
        Self {
            edits,
            flags: self.flags.remap_entities(&mut f),
        }
    }

    /// Returns a copy re-rooted under `prefix`.
    #[must_use]
    pub fn prefixed(&self, prefix: &FieldAddress) -> Self {
        Self {
            edits: self
                .edits
                .iter()
                .map(|(address, op)| (prefix.join(address), op.clone()))
                .collect(),
            flags: self.flags.prefixed(prefix),
        }
    }
}

fn compare(
    source: &FieldNode,
    target: &FieldNode,
    address: &mut FieldAddress,
    flags: &FlagsMap,
    edits: &mut BTreeMap<FieldAddress, PatchOp>,
) {
    let effective = flags.effective(address);
    if effective.skips_create() {
        return;
    }

    if !source.same_shape(target) {
        edits.insert(address.clone(), PatchOp::Replace(target.clone()));
        return;
    }

    if let (FieldNode::Value(a), FieldNode::Value(b)) = (source, target) {
        if a != b || effective.contains(DataFlags::FORCE_OVERRIDE) {
            edits.insert(address.clone(), PatchOp::Replace(target.clone()));
        }
        return;
    }

    for (segment, target_child) in target.children() {
        let source_child = source.child(&segment);
        address.push(segment);
        match source_child {
            Some(source_child) => compare(source_child, target_child, address, flags, edits),
            None => {
                if !flags.effective(address).skips_create() {
                    edits.insert(address.clone(), PatchOp::Add(target_child.clone()));
                }
            }
        }
        address.pop();
    }

    for (segment, _) in source.children() {
        if target.child(&segment).is_some() {
            continue;
        }
        address.push(segment);
        if !flags.effective(address).skips_create() {
            edits.insert(address.clone(), PatchOp::Remove);
        }
        address.pop();
    }
}
