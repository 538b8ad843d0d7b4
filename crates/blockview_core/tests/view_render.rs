use blockview_core::db::open_db_in_memory;
use blockview_core::{
    AttributeView, AttributeViewStore, AvError, CellValue, ContentCache, Key, KeyType,
    LayoutType, View, ViewRenderer,
};
use rusqlite::Connection;
use serde_json::json;
use std::sync::Arc;

fn setup(av: &AttributeView) -> (Connection, AttributeViewStore, ViewRenderer) {
    let mut conn = open_db_in_memory().unwrap();
    let store = AttributeViewStore::new(Arc::new(ContentCache::new()));
    store.save_attribute_view(&mut conn, av).unwrap();
    let renderer = ViewRenderer::new(store.clone());
    (conn, store, renderer)
}

fn ten_rows() -> AttributeView {
    let mut av = AttributeView::new("av-big", "Backlog");
    av.add_view(View::new("v1", "Table", LayoutType::Table))
        .unwrap();
    for n in 1..=10 {
        av.add_row(format!("r{n}"), format!("Row {n}")).unwrap();
    }
    av
}

fn three_rows() -> AttributeView {
    let mut av = AttributeView::new("av1", "Reading list");
    av.add_key(Key::new("k-rating", "Rating", KeyType::Number))
        .unwrap();
    let mut table = View::new("v1", "All books", LayoutType::Table);
    table.options = json!({"filters": [], "sorts": [{"column": "k-rating", "order": "DESC"}]});
    av.add_view(table).unwrap();
    av.add_view(View::new("v2", "Covers", LayoutType::Gallery))
        .unwrap();
    for (id, title) in [("b1", "Dune"), ("b2", "Emma"), ("b3", "Ulysses")] {
        av.add_row(id, title).unwrap();
    }
    av.set_value("k-rating", "b1", CellValue::Number(4.5)).unwrap();
    av
}

fn row_ids(payload: &blockview_core::ViewPayload) -> Vec<&str> {
    payload.view.rows.iter().map(|row| row.id.as_str()).collect()
}

#[test]
fn pagination_windows_rows_in_order() {
    let (conn, _, renderer) = setup(&ten_rows());

    let page2 = renderer
        .render_attribute_view(&conn, "av-big", "", 2, 4)
        .unwrap();
    assert_eq!(row_ids(&page2), vec!["r5", "r6", "r7", "r8"]);
    assert_eq!(page2.view.row_count, 10);
    assert_eq!((page2.view.page, page2.view.page_size), (2, 4));

    let page3 = renderer
        .render_attribute_view(&conn, "av-big", "", 3, 4)
        .unwrap();
    assert_eq!(row_ids(&page3), vec!["r9", "r10"]);

    let page4 = renderer
        .render_attribute_view(&conn, "av-big", "", 4, 4)
        .unwrap();
    assert!(page4.view.rows.is_empty());
    assert_eq!(page4.view.row_count, 10);
}

#[test]
fn non_positive_page_and_size_are_normalized() {
    let (conn, _, renderer) = setup(&ten_rows());

    let first = renderer
        .render_attribute_view(&conn, "av-big", "", 0, 3)
        .unwrap();
    assert_eq!(row_ids(&first), vec!["r1", "r2", "r3"]);
    assert_eq!(first.view.page, 1);

    let all = renderer
        .render_attribute_view(&conn, "av-big", "", 5, -1)
        .unwrap();
    assert_eq!(all.view.rows.len(), 10);
    assert_eq!(all.view.page_size, -1);
}

#[test]
fn default_view_renders_all_three_rows_with_sparse_cells() {
    let (conn, _, renderer) = setup(&three_rows());
    let payload = renderer
        .render_attribute_view(&conn, "av1", "", 1, -1)
        .unwrap();

    assert_eq!(payload.id, "av1");
    assert_eq!(payload.name, "Reading list");
    assert_eq!(payload.view_id, "v1");
    assert_eq!(payload.view_type, "table");
    assert!(!payload.is_mirror);
    assert_eq!(row_ids(&payload), vec!["b1", "b2", "b3"]);

    let views: Vec<(&str, &str)> = payload
        .views
        .iter()
        .map(|v| (v.id.as_str(), v.layout_type.as_str()))
        .collect();
    assert_eq!(views, vec![("v1", "table"), ("v2", "gallery")]);

    assert_eq!(payload.view.keys.len(), 2);
    let rating = &payload.view.rows[0].cells[1];
    assert_eq!(rating.key_id, "k-rating");
    assert_eq!(rating.value, Some(CellValue::Number(4.5)));
    assert!(payload.view.rows[1].cells[1].value.is_none());
    assert!(payload.view.rows[1].cells[1].id.is_none());
}

#[test]
fn payload_serializes_with_wire_field_names() {
    let (conn, _, renderer) = setup(&three_rows());
    let payload = renderer
        .render_attribute_view(&conn, "av1", "v2", 1, 2)
        .unwrap();
    let value = serde_json::to_value(&payload).unwrap();

    assert_eq!(value["viewID"], "v2");
    assert_eq!(value["viewType"], "gallery");
    assert_eq!(value["isMirror"], false);
    assert_eq!(value["view"]["type"], "gallery");
    assert_eq!(value["view"]["rowCount"], 3);
    assert_eq!(value["view"]["pageSize"], 2);
    assert_eq!(value["views"][0]["type"], "table");
    assert!(value["view"]["rows"][1]["cells"][1].get("value").is_none());
}

#[test]
fn view_options_pass_through_unchanged() {
    let (conn, _, renderer) = setup(&three_rows());
    let payload = renderer
        .render_attribute_view(&conn, "av1", "v1", 1, -1)
        .unwrap();
    assert_eq!(
        payload.view.options,
        json!({"filters": [], "sorts": [{"column": "k-rating", "order": "DESC"}]})
    );
}

#[test]
fn unknown_ids_are_errors() {
    let (conn, _, renderer) = setup(&three_rows());

    let err = renderer
        .render_attribute_view(&conn, "missing", "", 1, -1)
        .unwrap_err();
    assert!(matches!(err, AvError::AttributeViewNotFound(_)), "{err}");

    let err = renderer
        .render_attribute_view(&conn, "av1", "v9", 1, -1)
        .unwrap_err();
    assert!(matches!(err, AvError::ViewNotFound { ref view_id, .. } if view_id == "v9"), "{err}");
}

#[test]
fn attribute_view_without_views_cannot_render() {
    let (conn, _, renderer) = setup(&AttributeView::new("bare", "Bare"));
    let err = renderer
        .render_attribute_view(&conn, "bare", "", 1, -1)
        .unwrap_err();
    assert!(matches!(err, AvError::ViewNotFound { .. }), "{err}");
}

#[test]
fn stale_active_view_falls_back_to_first_view() {
    let mut av = three_rows();
    av.view_id = "removed".to_string();
    let (conn, _, renderer) = setup(&av);
    let payload = renderer
        .render_attribute_view(&conn, "av1", "", 1, -1)
        .unwrap();
    assert_eq!(payload.view_id, "v1");
}

#[test]
fn mirror_renders_canonical_content_under_its_own_id() {
    let (mut conn, store, renderer) = setup(&three_rows());
    store.register_mirror(&mut conn, "av1-mirror", "av1").unwrap();

    let canonical = renderer
        .render_attribute_view(&conn, "av1", "", 1, -1)
        .unwrap();
    let mirror = renderer
        .render_attribute_view(&conn, "av1-mirror", "", 1, -1)
        .unwrap();

    assert_eq!(mirror.id, "av1-mirror");
    assert!(mirror.is_mirror);
    assert_ne!(mirror.id, canonical.id);
    assert_eq!(mirror.view, canonical.view);
    assert_eq!(mirror.views, canonical.views);
}

#[test]
fn mirror_sees_canonical_mutations() {
    let (mut conn, store, renderer) = setup(&three_rows());
    store.register_mirror(&mut conn, "av1-mirror", "av1").unwrap();

    store
        .update_cell(&mut conn, "av1", "k-rating", "b2", "c-b2", &json!(3))
        .unwrap();

    let mirror = renderer
        .render_attribute_view(&conn, "av1-mirror", "", 1, -1)
        .unwrap();
    let cell = &mirror.view.rows[1].cells[1];
    assert_eq!(cell.id.as_deref(), Some("c-b2"));
    assert_eq!(cell.value, Some(CellValue::Number(3.0)));
}

#[test]
fn history_renders_pinned_state_unpaginated() {
    let (mut conn, store, renderer) = setup(&ten_rows());
    store
        .record_history(&mut conn, "av-big", "20240301101010")
        .unwrap();

    let mut av = store.get_attribute_view(&conn, "av-big").unwrap();
    av.add_row("r11", "Row 11").unwrap();
    store.save_attribute_view(&mut conn, &av).unwrap();

    let history = renderer
        .render_history_attribute_view(&conn, "av-big", "20240301101010")
        .unwrap();
    assert_eq!(history.view.rows.len(), 10);
    assert_eq!(history.view.page_size, -1);
    assert_eq!(history.view_id, "v1");

    let live = renderer
        .render_attribute_view(&conn, "av-big", "", 1, -1)
        .unwrap();
    assert_eq!(live.view.rows.len(), 11);

    let err = renderer
        .render_history_attribute_view(&conn, "av-big", "19990101000000")
        .unwrap_err();
    assert!(matches!(err, AvError::HistoryNotFound { .. }), "{err}");
}

#[test]
fn snapshot_renders_identical_payload_shape() {
    let (mut conn, store, renderer) = setup(&three_rows());
    store.register_mirror(&mut conn, "av1-mirror", "av1").unwrap();
    let token = store.create_snapshot(&mut conn, "av1").unwrap();

    let live = renderer
        .render_attribute_view(&conn, "av1", "", 1, -1)
        .unwrap();
    let snapshot = renderer
        .render_snapshot_attribute_view(&conn, &token, "av1")
        .unwrap();
    assert_eq!(snapshot, live);

    let via_mirror = renderer
        .render_snapshot_attribute_view(&conn, &token, "av1-mirror")
        .unwrap();
    assert!(via_mirror.is_mirror);
    assert_eq!(via_mirror.id, "av1-mirror");

    let err = renderer
        .render_snapshot_attribute_view(&conn, "0000", "av1")
        .unwrap_err();
    assert!(matches!(err, AvError::SnapshotNotFound { .. }), "{err}");
}
