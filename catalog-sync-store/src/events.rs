//! After-commit notifications published by the primary store.

use catalog_sync_shared::EntityKind;
use uuid::Uuid;

/// A committed change to one entity.
///
/// Events carry identity only. Consumers re-read the entity so they always
/// act on current persisted state, whatever order events arrive in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeEvent {
    /// Created or updated.
    Upserted { kind: EntityKind, id: Uuid },
    /// Soft-deleted or disabled.
    SoftDeleted { kind: EntityKind, id: Uuid },
    /// Hard-deleted from the store.
    Removed { kind: EntityKind, id: Uuid },
    /// A view was recorded and the view counter incremented.
    Viewed { kind: EntityKind, id: Uuid },
}

impl ChangeEvent {
    pub fn kind(&self) -> EntityKind {
        match self {
            ChangeEvent::Upserted { kind, .. }
            | ChangeEvent::SoftDeleted { kind, .. }
            | ChangeEvent::Removed { kind, .. }
            | ChangeEvent::Viewed { kind, .. } => *kind,
        }
    }

    pub fn id(&self) -> Uuid {
        match self {
            ChangeEvent::Upserted { id, .. }
            | ChangeEvent::SoftDeleted { id, .. }
            | ChangeEvent::Removed { id, .. }
            | ChangeEvent::Viewed { id, .. } => *id,
        }
    }
}
