//! Attribute view rendering.
//!
//! # Responsibility
//! - Materialize one view of an attribute view into a paginated payload.
//! - Serve live, history and snapshot variants with one payload shape.
//!
//! # Invariants
//! - Mirror ids render their canonical attribute view; the payload keeps
//!   the requested id and reports `isMirror`.
//! - Rows keep `row_ids` order; the page window is clipped, never an error.
//! - View `options` pass through untouched.

use crate::model::av::{AttributeView, CellValue, Key, View};
use crate::service::av_service::{AttributeViewStore, AvError, AvResult};
use log::debug;
use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use std::ops::Range;

/// Page size sentinel meaning "all rows".
pub const UNBOUNDED_PAGE_SIZE: i64 = -1;

/// Rendered attribute view as returned to callers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ViewPayload {
    pub name: String,
    pub id: String,
    pub view_type: String,
    #[serde(rename = "viewID")]
    pub view_id: String,
    pub views: Vec<ViewSummary>,
    pub view: MaterializedView,
    pub is_mirror: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ViewSummary {
    pub id: String,
    pub icon: String,
    pub name: String,
    #[serde(rename = "type")]
    pub layout_type: String,
}

/// One view with its columns and the requested page of rows.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MaterializedView {
    pub id: String,
    pub icon: String,
    pub name: String,
    #[serde(rename = "type")]
    pub layout_type: String,
    pub options: serde_json::Value,
    pub keys: Vec<Key>,
    pub rows: Vec<RenderedRow>,
    /// Total rows before pagination.
    pub row_count: usize,
    pub page: i64,
    pub page_size: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RenderedRow {
    pub id: String,
    /// One entry per key, in column order.
    pub cells: Vec<RenderedCell>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RenderedCell {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub key_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<CellValue>,
}

/// Normalizes a requested page. Non-positive pages mean the first page.
pub fn normalize_page(page: i64) -> i64 {
    page.max(1)
}

/// Computes the row index window for `page` of `page_size` over `total` rows.
///
/// Non-positive page sizes select every row.
pub fn page_window(total: usize, page: i64, page_size: i64) -> Range<usize> {
    if page_size <= 0 {
        return 0..total;
    }
    let page = normalize_page(page) as u64;
    let size = page_size as u64;
    let start = (page - 1).saturating_mul(size).min(total as u64) as usize;
    let end = start.saturating_add(size as usize).min(total);
    start..end
}

/// Renders attribute views for live, history and snapshot requests.
#[derive(Clone)]
pub struct ViewRenderer {
    store: AttributeViewStore,
}

impl ViewRenderer {
    pub fn new(store: AttributeViewStore) -> Self {
        Self { store }
    }

    /// Renders one page of a view of the current attribute view state.
    ///
    /// A blank `view_id` selects the active view.
    pub fn render_attribute_view(
        &self,
        conn: &Connection,
        av_id: &str,
        view_id: &str,
        page: i64,
        page_size: i64,
    ) -> AvResult<ViewPayload> {
        let (av, is_mirror) = self.store.resolve(conn, av_id)?;
        let view = if view_id.trim().is_empty() {
            av.active_view()
        } else {
            av.view(view_id)
        }
        .ok_or_else(|| AvError::ViewNotFound {
            av_id: av_id.to_string(),
            view_id: view_id.to_string(),
        })?;

        debug!(
            "event=av_render module=render status=ok av_id={} view_id={} page={} page_size={} mirror={}",
            av_id, view.id, page, page_size, is_mirror
        );
        Ok(build_payload(av_id, &av, view, page, page_size, is_mirror))
    }

    /// Renders the active view of a history entry without pagination.
    pub fn render_history_attribute_view(
        &self,
        conn: &Connection,
        av_id: &str,
        created: &str,
    ) -> AvResult<ViewPayload> {
        let av = self.store.load_history(conn, av_id, created)?;
        let is_mirror = self.store.is_mirror(conn, av_id)?;
        render_pinned(av_id, &av, is_mirror)
    }

    /// Renders the active view of a snapshot without pagination.
    pub fn render_snapshot_attribute_view(
        &self,
        conn: &Connection,
        snapshot: &str,
        av_id: &str,
    ) -> AvResult<ViewPayload> {
        let av = self.store.load_snapshot(conn, snapshot, av_id)?;
        let is_mirror = self.store.is_mirror(conn, av_id)?;
        render_pinned(av_id, &av, is_mirror)
    }
}

fn render_pinned(av_id: &str, av: &AttributeView, is_mirror: bool) -> AvResult<ViewPayload> {
    let view = av.active_view().ok_or_else(|| AvError::ViewNotFound {
        av_id: av_id.to_string(),
        view_id: av.view_id.clone(),
    })?;
    Ok(build_payload(
        av_id,
        av,
        view,
        1,
        UNBOUNDED_PAGE_SIZE,
        is_mirror,
    ))
}

fn build_payload(
    requested_id: &str,
    av: &AttributeView,
    view: &View,
    page: i64,
    page_size: i64,
    is_mirror: bool,
) -> ViewPayload {
    ViewPayload {
        name: av.name.clone(),
        id: requested_id.to_string(),
        view_type: view.layout_type.as_str().to_string(),
        view_id: view.id.clone(),
        views: av
            .views
            .iter()
            .map(|v| ViewSummary {
                id: v.id.clone(),
                icon: v.icon.clone(),
                name: v.name.clone(),
                layout_type: v.layout_type.as_str().to_string(),
            })
            .collect(),
        view: materialize(av, view, page, page_size),
        is_mirror,
    }
}

fn materialize(av: &AttributeView, view: &View, page: i64, page_size: i64) -> MaterializedView {
    let keys = ordered_keys(av, view);
    let window = page_window(av.row_ids.len(), page, page_size);
    let rows = av.row_ids[window]
        .iter()
        .map(|row_id| RenderedRow {
            id: row_id.clone(),
            cells: keys
                .iter()
                .map(|key| {
                    let cell = av.cell(&key.id, row_id);
                    RenderedCell {
                        id: cell.map(|c| c.id.clone()),
                        key_id: key.id.clone(),
                        value: cell.map(|c| c.value.clone()),
                    }
                })
                .collect(),
        })
        .collect();

    MaterializedView {
        id: view.id.clone(),
        icon: view.icon.clone(),
        name: view.name.clone(),
        layout_type: view.layout_type.as_str().to_string(),
        options: view.options.clone(),
        keys,
        rows,
        row_count: av.row_ids.len(),
        page: normalize_page(page),
        page_size: if page_size <= 0 {
            UNBOUNDED_PAGE_SIZE
        } else {
            page_size
        },
    }
}

fn ordered_keys(av: &AttributeView, view: &View) -> Vec<Key> {
    let mut keys: Vec<Key> = view
        .key_order
        .iter()
        .filter_map(|id| av.key_values(id).map(|kv| kv.key.clone()))
        .collect();
    for key in av.keys() {
        if !keys.iter().any(|k| k.id == key.id) {
            keys.push(key.clone());
        }
    }
    keys
}

#[cfg(test)]
mod tests {
    use super::{normalize_page, ordered_keys, page_window};
    use crate::model::av::{AttributeView, Key, KeyType, LayoutType, View};

    #[test]
    fn page_window_clips_to_total() {
        assert_eq!(page_window(10, 2, 4), 4..8);
        assert_eq!(page_window(10, 3, 4), 8..10);
        assert_eq!(page_window(10, 4, 4), 10..10);
        assert_eq!(page_window(10, 0, 4), 0..4);
        assert_eq!(page_window(10, 3, -1), 0..10);
        assert_eq!(page_window(0, 1, 4), 0..0);
        assert_eq!(page_window(5, i64::MAX, 4), 5..5);
    }

    #[test]
    fn normalize_page_floors_at_one() {
        assert_eq!(normalize_page(-3), 1);
        assert_eq!(normalize_page(0), 1);
        assert_eq!(normalize_page(7), 7);
    }

    #[test]
    fn key_order_then_definition_order() {
        let mut av = AttributeView::new("av1", "Tasks");
        av.add_key(Key::new("k-a", "A", KeyType::Text)).expect("key a");
        av.add_key(Key::new("k-b", "B", KeyType::Number)).expect("key b");
        let mut view = View::new("v1", "Table", LayoutType::Table);
        view.key_order = vec!["k-b".to_string(), "ghost".to_string()];

        let ids: Vec<String> = ordered_keys(&av, &view).into_iter().map(|k| k.id).collect();
        let primary = av.primary_key().expect("primary").id.clone();
        assert_eq!(ids, vec!["k-b".to_string(), primary, "k-a".to_string()]);
    }
}
