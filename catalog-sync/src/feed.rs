//! Line-delimited JSON feed of store mutations.
//!
//! In `worker` mode the binary plays the CRUD layer: each line read from
//! stdin is applied to the primary store, which then publishes the change
//! event the orchestrator consumes. Example lines:
//!
//! ```json
//! {"op": "view", "kind": "thread", "id": "0b9e2b3c-5c1f-4b7a-9d55-4a0f1e6d7c21"}
//! {"op": "soft_delete", "kind": "listing", "id": "…"}
//! {"op": "upsert_user", "user": { … }}
//! ```

use serde::Deserialize;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tracing::{debug, warn};
use uuid::Uuid;

use catalog_sync_shared::{Entity, EntityKind, Listing, Thread, UserProfile};
use catalog_sync_store::{MemoryStore, StoreError};

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum FeedCommand {
    View { kind: EntityKind, id: Uuid },
    SoftDelete { kind: EntityKind, id: Uuid },
    Remove { kind: EntityKind, id: Uuid },
    UpsertListing { listing: Listing },
    UpsertThread { thread: Thread },
    UpsertUser { user: UserProfile },
}

/// Apply one command to the store.
pub async fn apply(store: &MemoryStore, command: FeedCommand) -> Result<(), StoreError> {
    match command {
        FeedCommand::View { kind, id } => {
            let views = store.record_view(kind, id).await?;
            debug!(kind = %kind, entity_id = %id, views, "View recorded");
        }
        FeedCommand::SoftDelete { kind, id } => store.soft_delete(kind, id).await?,
        FeedCommand::Remove { kind, id } => store.remove(kind, id).await?,
        FeedCommand::UpsertListing { listing } => store.upsert(Entity::Listing(listing)).await?,
        FeedCommand::UpsertThread { thread } => store.upsert(Entity::Thread(thread)).await?,
        FeedCommand::UpsertUser { user } => store.upsert(Entity::User(user)).await?,
    }
    Ok(())
}

/// Apply every line of `reader` until EOF. Malformed lines and rejected
/// commands are logged and skipped. Returns the number applied.
pub async fn run<R>(store: &MemoryStore, reader: R) -> std::io::Result<usize>
where
    R: AsyncBufRead + Unpin,
{
    let mut lines = reader.lines();
    let mut applied = 0;

    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let command = match serde_json::from_str::<FeedCommand>(line) {
            Ok(command) => command,
            Err(e) => {
                warn!(error = %e, "Skipping malformed feed line");
                continue;
            }
        };

        match apply(store, command).await {
            Ok(()) => applied += 1,
            Err(e) => warn!(error = %e, "Feed command rejected"),
        }
    }

    Ok(applied)
}
