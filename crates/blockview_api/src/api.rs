//! Use-case handlers exposed to transports.
//!
//! # Responsibility
//! - Map flat JSON argument maps to kernel services.
//! - Wrap every outcome in the `{code, msg, data}` envelope.
//!
//! # Invariants
//! - Handlers never panic; failures become `code = -1` with the error text
//!   as `msg`.
//! - Every request opens its own connection from the configured path.

use crate::request::{
    ApiRequest, GetAttributeViewKeysRequest, RenderAttributeViewRequest, RenderHistoryRequest,
    RenderSnapshotRequest, SetAttributeViewBlockAttrRequest,
};
use blockview_core::{
    core_version as core_version_inner, init_logging as init_logging_inner, open_db,
    ping as ping_inner, AttributeViewStore, CellMutator, ContentCache, DocumentSource, EventBus,
    IndexCoordinator, KernelConfig, ViewEvent, ViewRenderer,
};
use log::{debug, warn};
use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::mpsc::Receiver;
use std::sync::Arc;
use std::time::Instant;

pub const CODE_OK: i32 = 0;
pub const CODE_ERROR: i32 = -1;

/// Response envelope of every handler.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiResult {
    pub code: i32,
    pub msg: String,
    pub data: Value,
}

impl ApiResult {
    pub fn ok(data: Value) -> Self {
        Self {
            code: CODE_OK,
            msg: String::new(),
            data,
        }
    }

    pub fn error(msg: impl Into<String>) -> Self {
        Self {
            code: CODE_ERROR,
            msg: msg.into(),
            data: Value::Null,
        }
    }

    pub fn is_ok(&self) -> bool {
        self.code == CODE_OK
    }
}

/// Broadcast message for a view event: `{cmd, channel, data}`.
pub fn event_message(event: &ViewEvent) -> Value {
    json!({
        "cmd": event.name(),
        "channel": event.channel(),
        "data": event.data(),
    })
}

/// Health check.
pub fn ping() -> String {
    ping_inner().to_owned()
}

pub fn core_version() -> String {
    core_version_inner().to_owned()
}

/// Initializes kernel logging. Returns an empty string on success and the
/// error message otherwise.
pub fn init_logging(level: String, log_dir: String) -> String {
    match init_logging_inner(level.as_str(), log_dir.as_str()) {
        Ok(()) => String::new(),
        Err(err) => err,
    }
}

/// Kernel services wired from one configuration.
pub struct BlockviewApi {
    config: KernelConfig,
    index: IndexCoordinator,
    store: AttributeViewStore,
    renderer: ViewRenderer,
    mutator: CellMutator,
}

impl BlockviewApi {
    /// Builds the services and returns the receiver draining view events.
    pub fn new(
        config: KernelConfig,
        documents: Arc<dyn DocumentSource>,
    ) -> (Self, Receiver<ViewEvent>) {
        let (events, receiver) = EventBus::channel();
        (Self::with_events(config, documents, events), receiver)
    }

    pub fn with_events(
        config: KernelConfig,
        documents: Arc<dyn DocumentSource>,
        events: EventBus,
    ) -> Self {
        let cache = Arc::new(ContentCache::new());
        let index = IndexCoordinator::new(config.index_config(), Arc::clone(&cache), documents);
        let store = AttributeViewStore::new(cache);
        let renderer = ViewRenderer::new(store.clone());
        let mutator = CellMutator::new(store.clone(), events);
        Self {
            config,
            index,
            store,
            renderer,
            mutator,
        }
    }

    pub fn config(&self) -> &KernelConfig {
        &self.config
    }

    pub fn index(&self) -> &IndexCoordinator {
        &self.index
    }

    pub fn store(&self) -> &AttributeViewStore {
        &self.store
    }

    /// Opens a connection to the configured database.
    pub fn open(&self) -> Result<Connection, String> {
        open_db(&self.config.db_path).map_err(|err| format!("database open failed: {err}"))
    }

    /// Args: `snapshot`, `id`.
    pub fn render_snapshot_attribute_view(&self, args: &Value) -> ApiResult {
        self.handle("render_snapshot_attribute_view", args, |request: RenderSnapshotRequest, conn| {
            self.renderer
                .render_snapshot_attribute_view(conn, &request.snapshot, &request.id)
                .map_err(|err| err.to_string())
        })
    }

    /// Args: `id`, `created`.
    pub fn render_history_attribute_view(&self, args: &Value) -> ApiResult {
        self.handle("render_history_attribute_view", args, |request: RenderHistoryRequest, conn| {
            self.renderer
                .render_history_attribute_view(conn, &request.id, &request.created)
                .map_err(|err| err.to_string())
        })
    }

    /// Args: `id`, optional `viewID`, `page` and `pageSize`.
    pub fn render_attribute_view(&self, args: &Value) -> ApiResult {
        self.handle("render_attribute_view", args, |request: RenderAttributeViewRequest, conn| {
            self.renderer
                .render_attribute_view(
                    conn,
                    &request.id,
                    request.view_id.as_deref().unwrap_or_default(),
                    request.page(),
                    request.page_size(),
                )
                .map_err(|err| err.to_string())
        })
    }

    /// Args: `id` of a block.
    pub fn get_attribute_view_keys(&self, args: &Value) -> ApiResult {
        self.handle("get_attribute_view_keys", args, |request: GetAttributeViewKeysRequest, conn| {
            self.store
                .get_block_attribute_view_keys(conn, &request.id)
                .map_err(|err| err.to_string())
        })
    }

    /// Args: `avID`, `keyID`, `rowID`, `cellID`, `value`.
    pub fn set_attribute_view_block_attr(&self, args: &Value) -> ApiResult {
        self.handle(
            "set_attribute_view_block_attr",
            args,
            |request: SetAttributeViewBlockAttrRequest, conn| {
                self.mutator
                    .set_cell(
                        conn,
                        &request.av_id,
                        &request.key_id,
                        &request.row_id,
                        &request.cell_id,
                        &request.value,
                    )
                    .map_err(|err| err.to_string())
            },
        )
    }

    fn handle<R, T>(
        &self,
        op: &'static str,
        args: &Value,
        run: impl FnOnce(R, &mut Connection) -> Result<T, String>,
    ) -> ApiResult
    where
        R: ApiRequest,
        T: Serialize,
    {
        let started_at = Instant::now();
        let outcome = R::decode(args)
            .map_err(|err| err.to_string())
            .and_then(|request| {
                let mut conn = self.open()?;
                run(request, &mut conn)
            })
            .and_then(|data| {
                serde_json::to_value(data).map_err(|err| format!("response encoding failed: {err}"))
            });

        match outcome {
            Ok(data) => {
                debug!(
                    "event=api_call module=api op={} status=ok duration_ms={}",
                    op,
                    started_at.elapsed().as_millis()
                );
                ApiResult::ok(data)
            }
            Err(msg) => {
                warn!(
                    "event=api_call module=api op={} status=error duration_ms={}",
                    op,
                    started_at.elapsed().as_millis()
                );
                ApiResult::error(msg)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{core_version, event_message, init_logging, ping, BlockviewApi};
    use blockview_core::{
        open_db, AttributeView, InMemoryDocumentSource, Key, KeyType, KernelConfig, LayoutType,
        View, ViewEvent,
    };
    use serde_json::json;
    use std::sync::mpsc::Receiver;
    use std::sync::Arc;
    use tempfile::TempDir;

    struct Fixture {
        _dir: TempDir,
        api: BlockviewApi,
        events: Receiver<ViewEvent>,
    }

    fn fixture() -> Fixture {
        let dir = TempDir::new().expect("temp dir");
        let config = KernelConfig {
            db_path: dir.path().join("api.sqlite3"),
            asset_base: dir.path().to_path_buf(),
            ..KernelConfig::default()
        };
        let (api, events) = BlockviewApi::new(config, Arc::new(InMemoryDocumentSource::new()));

        let mut av = AttributeView::new("av1", "Tasks");
        av.add_key(Key::new("k-status", "Status", KeyType::Select))
            .expect("status key");
        av.add_view(View::new("v1", "Table", LayoutType::Table))
            .expect("table view");
        av.add_view(View::new("v2", "Board", LayoutType::Kanban))
            .expect("board view");
        for row in ["b1", "b2", "b3"] {
            av.add_row(row, format!("block {row}")).expect("row");
        }

        let mut conn = open_db(&api.config().db_path).expect("open db");
        api.store()
            .save_attribute_view(&mut conn, &av)
            .expect("save av");
        api.store()
            .register_mirror(&mut conn, "av1-mirror", "av1")
            .expect("mirror");

        Fixture {
            _dir: dir,
            api,
            events,
        }
    }

    #[test]
    fn ping_and_version() {
        assert_eq!(ping(), "pong");
        assert!(!core_version().is_empty());
    }

    #[test]
    fn init_logging_rejects_bad_arguments() {
        assert!(!init_logging("info".to_string(), String::new()).is_empty());
        assert!(!init_logging("verbose".to_string(), "/tmp/logs".to_string()).is_empty());
    }

    #[test]
    fn render_defaults_to_active_view_and_all_rows() {
        let fx = fixture();
        let result = fx.api.render_attribute_view(&json!({"id": "av1"}));
        assert!(result.is_ok(), "{}", result.msg);
        assert_eq!(result.data["viewID"], "v1");
        assert_eq!(result.data["viewType"], "table");
        assert_eq!(result.data["isMirror"], false);
        assert_eq!(result.data["view"]["rows"].as_array().map(Vec::len), Some(3));
        assert_eq!(result.data["views"].as_array().map(Vec::len), Some(2));
    }

    #[test]
    fn render_pages_and_selects_views() {
        let fx = fixture();
        let result = fx.api.render_attribute_view(
            &json!({"id": "av1", "viewID": "v2", "page": 2, "pageSize": 2}),
        );
        assert!(result.is_ok(), "{}", result.msg);
        assert_eq!(result.data["viewType"], "kanban");
        assert_eq!(result.data["view"]["rowCount"], 3);
        let rows = result.data["view"]["rows"].as_array().cloned().unwrap_or_default();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0]["id"], "b3");
    }

    #[test]
    fn render_mirror_reports_requested_id() {
        let fx = fixture();
        let result = fx.api.render_attribute_view(&json!({"id": "av1-mirror"}));
        assert!(result.is_ok(), "{}", result.msg);
        assert_eq!(result.data["id"], "av1-mirror");
        assert_eq!(result.data["isMirror"], true);
        assert_eq!(result.data["name"], "Tasks");
    }

    #[test]
    fn render_errors_surface_as_code_minus_one() {
        let fx = fixture();
        let missing = fx.api.render_attribute_view(&json!({"id": "nope"}));
        assert_eq!(missing.code, -1);
        assert!(missing.msg.contains("nope"));
        assert!(missing.data.is_null());

        let blank = fx.api.render_attribute_view(&json!({"id": "  "}));
        assert_eq!(blank.code, -1);

        let unknown_view = fx
            .api
            .render_attribute_view(&json!({"id": "av1", "viewID": "v9"}));
        assert_eq!(unknown_view.code, -1);
        assert!(unknown_view.msg.contains("v9"));
    }

    #[test]
    fn set_block_attr_returns_keys_and_broadcasts_refresh() {
        let fx = fixture();
        let result = fx.api.set_attribute_view_block_attr(&json!({
            "avID": "av1",
            "keyID": "k-status",
            "rowID": "b2",
            "cellID": "c-b2",
            "value": "done",
        }));
        assert!(result.is_ok(), "{}", result.msg);
        let summaries = result.data.as_array().cloned().unwrap_or_default();
        assert_eq!(summaries.len(), 1);
        assert_eq!(summaries[0]["avID"], "av1");
        assert_eq!(summaries[0]["blockID"], "b2");

        let event = fx.events.try_recv().expect("refresh event");
        assert_eq!(
            event_message(&event),
            json!({"cmd": "refreshAttributeView", "channel": "protyle", "data": {"id": "av1"}})
        );

        let keys = fx.api.get_attribute_view_keys(&json!({"id": "b2"}));
        assert!(keys.is_ok(), "{}", keys.msg);
        let status = &keys.data[0]["keyValues"][1];
        assert_eq!(status["key"]["id"], "k-status");
        assert_eq!(status["values"][0]["value"]["content"], json!(["done"]));
    }

    #[test]
    fn failed_set_block_attr_broadcasts_nothing() {
        let fx = fixture();
        let result = fx.api.set_attribute_view_block_attr(&json!({
            "avID": "av1",
            "keyID": "k-status",
            "rowID": "ghost",
            "cellID": "c1",
            "value": "done",
        }));
        assert_eq!(result.code, -1);
        assert!(fx.events.try_recv().is_err());

        let via_mirror = fx.api.set_attribute_view_block_attr(&json!({
            "avID": "av1-mirror",
            "keyID": "k-status",
            "rowID": "b1",
            "cellID": "c1",
            "value": "done",
        }));
        assert_eq!(via_mirror.code, -1);
        assert!(fx.events.try_recv().is_err());
    }

    #[test]
    fn history_and_snapshot_handlers_render_pinned_state() {
        let fx = fixture();
        let mut conn = fx.api.open().expect("open db");
        fx.api
            .store()
            .record_history(&mut conn, "av1", "20240101120000")
            .expect("history");
        let token = fx
            .api
            .store()
            .create_snapshot(&mut conn, "av1")
            .expect("snapshot");

        let history = fx
            .api
            .render_history_attribute_view(&json!({"id": "av1", "created": "20240101120000"}));
        assert!(history.is_ok(), "{}", history.msg);
        assert_eq!(history.data["view"]["rows"].as_array().map(Vec::len), Some(3));

        let snapshot = fx
            .api
            .render_snapshot_attribute_view(&json!({"snapshot": token, "id": "av1"}));
        assert!(snapshot.is_ok(), "{}", snapshot.msg);
        assert_eq!(snapshot.data["viewID"], "v1");

        let missing = fx
            .api
            .render_history_attribute_view(&json!({"id": "av1", "created": "19700101000000"}));
        assert_eq!(missing.code, -1);
    }

    #[test]
    fn get_keys_for_unbound_block_is_empty() {
        let fx = fixture();
        let result = fx.api.get_attribute_view_keys(&json!({"id": "unbound"}));
        assert!(result.is_ok(), "{}", result.msg);
        assert_eq!(result.data, json!([]));
    }
}
