//! Cycle detection for recursive slice instantiation.
//!
//! A guard is created for each top-level instantiation and passed down the
//! recursive calls. It is never shared between unrelated calls.

use slicework_foundation::SliceAssetId;

/// Stack of assets currently being instantiated.
#[derive(Debug, Default, Clone)]
pub struct InstantiationCycleGuard {
    stack: Vec<SliceAssetId>,
}

impl InstantiationCycleGuard {
    /// Creates an empty guard.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Marks `asset` as in flight.
    pub fn push(&mut self, asset: SliceAssetId) {
        self.stack.push(asset);
    }

    /// Returns true if `asset` is already in flight.
    #[must_use]
    pub fn contains_cycle(&self, asset: SliceAssetId) -> bool {
        self.stack.contains(&asset)
    }

    /// The cycle that entering `asset` would close: the stack from the first
    /// occurrence of `asset` to the top, followed by `asset` again.
    ///
    /// Returns `None` if entering `asset` closes no cycle.
    #[must_use]
    pub fn cycle_report(&self, asset: SliceAssetId) -> Option<Vec<SliceAssetId>> {
        let pos = self.stack.iter().position(|a| *a == asset)?;
        let mut chain = self.stack[pos..].to_vec();
        chain.push(asset);
        Some(chain)
    }

    /// Marks `asset` as finished.
    ///
    /// # Panics
    ///
    /// Panics if `asset` is not on top of the stack. Calls must nest
    /// strictly; a violation is a bug in the caller, not bad data.
    pub fn pop(&mut self, asset: SliceAssetId) {
        let top = self.stack.pop();
        assert_eq!(
            top,
            Some(asset),
            "instantiation guard popped out of order (stack: {:?})",
            self.stack
        );
    }

    /// Current depth.
    #[must_use]
    pub fn depth(&self) -> usize {
        self.stack.len()
    }

    /// Returns true when no instantiation is in flight.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.stack.is_empty()
    }

    /// Assets in flight, outermost first.
    #[must_use]
    pub fn stack(&self) -> &[SliceAssetId] {
        &self.stack
    }
}
