//! Error types for slicework.
//!
//! Uses `thiserror` for ergonomic error definition with rich context.

use std::fmt;

use thiserror::Error;

use crate::address::FieldAddress;
use crate::entity::EntityId;
use crate::ids::{SliceAssetId, SliceInstanceId};

/// Result alias used across every slicework crate.
pub type Result<T> = std::result::Result<T, Error>;

/// The main error type for slicework operations.
#[derive(Debug, Clone, Error)]
#[error("{kind}{}", format_context(.context.as_ref()))]
pub struct Error {
    /// The kind of error that occurred.
    pub kind: ErrorKind,
    /// Optional context about where the error occurred.
    pub context: Option<ErrorContext>,
}

impl Error {
    /// Creates a new error with the given kind.
    #[must_use]
    pub fn new(kind: ErrorKind) -> Self {
        Self {
            kind,
            context: None,
        }
    }

    /// Adds context to this error.
    #[must_use]
    pub fn with_context(mut self, context: ErrorContext) -> Self {
        self.context = Some(context);
        self
    }

    /// Creates a missing asset error.
    #[must_use]
    pub fn missing_asset(asset: SliceAssetId) -> Self {
        Self::new(ErrorKind::MissingAsset(asset))
    }

    /// Creates a cyclic dependency error from the offending chain.
    #[must_use]
    pub fn cyclic_dependency(chain: Vec<SliceAssetId>) -> Self {
        Self::new(ErrorKind::CyclicDependency(chain))
    }

    /// Creates an id collision error.
    #[must_use]
    pub fn id_collision(id: EntityId, first: EntityId, second: EntityId) -> Self {
        Self::new(ErrorKind::IdCollision { id, first, second })
    }

    /// Creates a stale edit error.
    #[must_use]
    pub fn stale_edit(address: FieldAddress) -> Self {
        Self::new(ErrorKind::StaleEdit(address))
    }

    /// Creates a duplicate entity error.
    #[must_use]
    pub fn duplicate_entity(id: EntityId) -> Self {
        Self::new(ErrorKind::DuplicateEntity(id))
    }

    /// Creates an entity not found error.
    #[must_use]
    pub fn entity_not_found(id: EntityId) -> Self {
        Self::new(ErrorKind::EntityNotFound(id))
    }

    /// Creates an instance not found error.
    #[must_use]
    pub fn instance_not_found(id: SliceInstanceId) -> Self {
        Self::new(ErrorKind::InstanceNotFound(id))
    }

    /// Creates a malformed tree error.
    #[must_use]
    pub fn malformed_tree(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::MalformedTree(message.into()))
    }

    /// Creates an invalid address error.
    #[must_use]
    pub fn invalid_address(address: FieldAddress, reason: impl Into<String>) -> Self {
        Self::new(ErrorKind::InvalidAddress {
            address,
            reason: reason.into(),
        })
    }

    /// Returns true if this error only degrades data quality.
    ///
    /// Stale edits and missing assets are reported as warnings when partial
    /// instantiation is allowed; everything else is structural.
    #[must_use]
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self.kind,
            ErrorKind::StaleEdit(_) | ErrorKind::MissingAsset(_)
        )
    }
}

/// Categorized error kinds for pattern matching.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ErrorKind {
    /// Source slice asset is unavailable from the asset provider.
    #[error("missing slice asset: {0}")]
    MissingAsset(SliceAssetId),

    /// Slice asset graph references itself.
    #[error("cyclic slice dependency: {}", format_chain(.0))]
    CyclicDependency(Vec<SliceAssetId>),

    /// Two base entities resolve to the same new identity during remap.
    #[error("entity id collision: {first} and {second} both map to {id}")]
    IdCollision {
        /// The colliding new id.
        id: EntityId,
        /// The first base id mapped to `id`.
        first: EntityId,
        /// The second base id mapped to `id`.
        second: EntityId,
    },

    /// A patch address no longer exists in the source.
    #[error("stale patch edit at {0}")]
    StaleEdit(FieldAddress),

    /// Entity id already present in the component.
    #[error("duplicate entity: {0}")]
    DuplicateEntity(EntityId),

    /// Entity was not found.
    #[error("entity not found: {0}")]
    EntityNotFound(EntityId),

    /// Slice instance was not found.
    #[error("slice instance not found: {0}")]
    InstanceNotFound(SliceInstanceId),

    /// Operation requires instantiated entities.
    #[error("slice instance is not instantiated")]
    NotInstantiated,

    /// A field tree does not have the expected shape.
    #[error("malformed field tree: {0}")]
    MalformedTree(String),

    /// An address cannot be used for the requested operation.
    #[error("invalid address {address}: {reason}")]
    InvalidAddress {
        /// The offending address.
        address: FieldAddress,
        /// Why it was rejected.
        reason: String,
    },

    /// Encoding or decoding failed.
    #[error("serialization error: {0}")]
    SerializationError(String),

    /// Filesystem access failed.
    #[error("io error: {0}")]
    IoError(String),

    /// Internal error (should not happen).
    #[error("internal error: {0}")]
    Internal(String),
}

fn format_context(context: Option<&ErrorContext>) -> String {
    context.map(|c| format!(" ({c})")).unwrap_or_default()
}

fn format_chain(chain: &[SliceAssetId]) -> String {
    chain
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(" -> ")
}

/// Context about where an error occurred.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ErrorContext {
    /// Asset being processed.
    pub asset: Option<SliceAssetId>,
    /// Instance being processed.
    pub instance: Option<SliceInstanceId>,
    /// Field address being processed.
    pub address: Option<FieldAddress>,
}

impl ErrorContext {
    /// Creates a new empty context.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the asset.
    #[must_use]
    pub fn with_asset(mut self, asset: SliceAssetId) -> Self {
        self.asset = Some(asset);
        self
    }

    /// Sets the instance.
    #[must_use]
    pub fn with_instance(mut self, instance: SliceInstanceId) -> Self {
        self.instance = Some(instance);
        self
    }

    /// Sets the field address.
    #[must_use]
    pub fn with_address(mut self, address: FieldAddress) -> Self {
        self.address = Some(address);
        self
    }
}

impl fmt::Display for ErrorContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut parts = Vec::new();
        if let Some(asset) = &self.asset {
            parts.push(format!("asset {asset}"));
        }
        if let Some(instance) = &self.instance {
            parts.push(format!("instance {instance}"));
        }
        if let Some(address) = &self.address {
            parts.push(format!("at {address}"));
        }
        write!(f, "{}", parts.join(", "))
    }
}
