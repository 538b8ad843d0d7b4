//! Cell mutation with refresh notification.
//!
//! # Invariants
//! - The refresh event is published only after the store committed.
//! - Event delivery problems never turn a committed write into an error.

use crate::notify::{EventBus, ViewEvent};
use crate::service::av_service::{AttributeViewStore, AvResult, BlockAttributeViewKeys};
use rusqlite::Connection;

#[derive(Clone)]
pub struct CellMutator {
    store: AttributeViewStore,
    events: EventBus,
}

impl CellMutator {
    pub fn new(store: AttributeViewStore, events: EventBus) -> Self {
        Self { store, events }
    }

    /// Updates one cell and asks open renderings of the view to refresh.
    pub fn set_cell(
        &self,
        conn: &mut Connection,
        av_id: &str,
        key_id: &str,
        row_id: &str,
        cell_id: &str,
        value: &serde_json::Value,
    ) -> AvResult<Vec<BlockAttributeViewKeys>> {
        let summary = self
            .store
            .update_cell(conn, av_id, key_id, row_id, cell_id, value)?;
        self.events.publish(ViewEvent::refresh(av_id));
        Ok(summary)
    }
}
