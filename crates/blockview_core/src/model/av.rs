//! Attribute view domain model.
//!
//! # Responsibility
//! - Define the database-like projection over blocks: keys (typed columns),
//!   rows (bound blocks), sparse cells and the views presenting them.
//! - Own in-memory mutation rules for rows and cells.
//!
//! # Invariants
//! - Every attribute view has exactly one primary key of type `block`.
//! - Each `(key, row)` coordinate holds at most one cell.
//! - A cell always references an existing key and row.
//! - View payloads (`options`) are carried through unchanged.

use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

/// Stable attribute view identifier.
pub type AttributeViewId = String;

/// Primary key name used for new attribute views.
pub const PRIMARY_KEY_NAME: &str = "Block";

/// Generates a fresh identifier for keys, views and cells.
pub fn generate_id() -> String {
    Uuid::new_v4().to_string()
}

/// Value type of a key (column).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum KeyType {
    /// Primary key; the cell mirrors the bound block.
    Block,
    Text,
    Number,
    /// Epoch milliseconds.
    Date,
    Select,
    #[serde(rename = "mSelect")]
    MultiSelect,
    Url,
    Checkbox,
}

/// Layout tag of a view. Unknown tags round-trip unchanged.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum LayoutType {
    Table,
    Gallery,
    Kanban,
    #[serde(untagged)]
    Other(String),
}

impl LayoutType {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Table => "table",
            Self::Gallery => "gallery",
            Self::Kanban => "kanban",
            Self::Other(tag) => tag.as_str(),
        }
    }
}

/// Typed column definition shared by every view of an attribute view.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Key {
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub key_type: KeyType,
    #[serde(default)]
    pub icon: String,
}

impl Key {
    pub fn new(id: impl Into<String>, name: impl Into<String>, key_type: KeyType) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            key_type,
            icon: String::new(),
        }
    }
}

/// Content of a primary key cell.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlockRef {
    pub id: String,
    pub content: String,
}

/// Typed cell value. The variant always matches the owning key type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "content", rename_all = "camelCase")]
pub enum CellValue {
    Block(BlockRef),
    Text(String),
    Number(f64),
    Date(i64),
    Select(Vec<String>),
    #[serde(rename = "mSelect")]
    MultiSelect(Vec<String>),
    Url(String),
    Checkbox(bool),
}

impl CellValue {
    /// Returns the key type this value belongs to.
    pub fn key_type(&self) -> KeyType {
        match self {
            Self::Block(_) => KeyType::Block,
            Self::Text(_) => KeyType::Text,
            Self::Number(_) => KeyType::Number,
            Self::Date(_) => KeyType::Date,
            Self::Select(_) => KeyType::Select,
            Self::MultiSelect(_) => KeyType::MultiSelect,
            Self::Url(_) => KeyType::Url,
            Self::Checkbox(_) => KeyType::Checkbox,
        }
    }

    /// Decodes an untyped JSON value according to `key_type`.
    ///
    /// `row_id` is used as the block reference of primary key cells.
    pub fn from_json(
        key_type: KeyType,
        row_id: &str,
        raw: &serde_json::Value,
    ) -> Result<Self, String> {
        use serde_json::Value;

        let decoded = match (key_type, raw) {
            (KeyType::Block, Value::String(content)) => Some(Self::Block(BlockRef {
                id: row_id.to_string(),
                content: content.clone(),
            })),
            (KeyType::Block, Value::Object(map)) => map
                .get("content")
                .and_then(Value::as_str)
                .map(|content| {
                    Self::Block(BlockRef {
                        id: row_id.to_string(),
                        content: content.to_string(),
                    })
                }),
            (KeyType::Text, Value::String(text)) => Some(Self::Text(text.clone())),
            (KeyType::Url, Value::String(url)) => Some(Self::Url(url.trim().to_string())),
            (KeyType::Number, Value::Number(number)) => number.as_f64().map(Self::Number),
            (KeyType::Date, Value::Number(number)) => number.as_i64().map(Self::Date),
            (KeyType::Select, Value::String(option)) => {
                let option = option.trim();
                if option.is_empty() {
                    Some(Self::Select(Vec::new()))
                } else {
                    Some(Self::Select(vec![option.to_string()]))
                }
            }
            (KeyType::MultiSelect, Value::Array(items)) => items
                .iter()
                .map(|item| item.as_str().map(|option| option.trim().to_string()))
                .collect::<Option<Vec<_>>>()
                .map(|options| {
                    Self::MultiSelect(options.into_iter().filter(|o| !o.is_empty()).collect())
                }),
            (KeyType::Checkbox, Value::Bool(checked)) => Some(Self::Checkbox(*checked)),
            _ => None,
        };

        decoded.ok_or_else(|| format!("value `{raw}` does not match key type {key_type:?}"))
    }
}

/// One `(key, row)` value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Cell {
    pub id: String,
    pub key_id: String,
    /// Bound block id of the row.
    pub row_id: String,
    pub value: CellValue,
}

/// A key together with its sparse cells.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KeyValues {
    pub key: Key,
    #[serde(default)]
    pub values: Vec<Cell>,
}

impl KeyValues {
    pub fn cell_for_row(&self, row_id: &str) -> Option<&Cell> {
        self.values.iter().find(|cell| cell.row_id == row_id)
    }
}

/// One presentation (table, gallery, kanban...) of an attribute view.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct View {
    pub id: String,
    #[serde(default)]
    pub icon: String,
    pub name: String,
    #[serde(rename = "type")]
    pub layout_type: LayoutType,
    /// Column order. Keys not listed follow in definition order.
    #[serde(default)]
    pub key_order: Vec<String>,
    /// Filters, sorts, grouping and other layout settings.
    #[serde(default)]
    pub options: serde_json::Value,
}

impl View {
    pub fn new(id: impl Into<String>, name: impl Into<String>, layout_type: LayoutType) -> Self {
        Self {
            id: id.into(),
            icon: String::new(),
            name: name.into(),
            layout_type,
            key_order: Vec::new(),
            options: serde_json::Value::Null,
        }
    }
}

/// Structured database over blocks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttributeView {
    pub id: AttributeViewId,
    pub name: String,
    #[serde(default)]
    pub key_values: Vec<KeyValues>,
    /// Bound block ids in display order.
    #[serde(default)]
    pub row_ids: Vec<String>,
    #[serde(default)]
    pub views: Vec<View>,
    /// Designated active view. Empty until the first view is added.
    #[serde(default, rename = "viewID")]
    pub view_id: String,
}

/// In-memory mutation failures on one attribute view.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttributeViewError {
    DuplicateKey(String),
    DuplicateView(String),
    DuplicateRow(String),
    KeyNotFound(String),
    RowNotFound(String),
    CellNotFound(String),
    InvalidValue { key_id: String, message: String },
}

impl Display for AttributeViewError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::DuplicateKey(id) => write!(f, "key already exists: {id}"),
            Self::DuplicateView(id) => write!(f, "view already exists: {id}"),
            Self::DuplicateRow(id) => write!(f, "row already exists: {id}"),
            Self::KeyNotFound(id) => write!(f, "key not found: {id}"),
            Self::RowNotFound(id) => write!(f, "row not found: {id}"),
            Self::CellNotFound(id) => write!(f, "cell not found: {id}"),
            Self::InvalidValue { key_id, message } => {
                write!(f, "invalid value for key {key_id}: {message}")
            }
        }
    }
}

impl Error for AttributeViewError {}

impl AttributeView {
    /// Creates an attribute view with its primary block key and no views.
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            key_values: vec![KeyValues {
                key: Key::new(generate_id(), PRIMARY_KEY_NAME, KeyType::Block),
                values: Vec::new(),
            }],
            row_ids: Vec::new(),
            views: Vec::new(),
            view_id: String::new(),
        }
    }

    pub fn primary_key(&self) -> Option<&Key> {
        self.key_values
            .iter()
            .map(|kv| &kv.key)
            .find(|key| key.key_type == KeyType::Block)
    }

    pub fn key_values(&self, key_id: &str) -> Option<&KeyValues> {
        self.key_values.iter().find(|kv| kv.key.id == key_id)
    }

    pub fn keys(&self) -> impl Iterator<Item = &Key> {
        self.key_values.iter().map(|kv| &kv.key)
    }

    pub fn has_row(&self, row_id: &str) -> bool {
        self.row_ids.iter().any(|id| id == row_id)
    }

    pub fn view(&self, view_id: &str) -> Option<&View> {
        self.views.iter().find(|view| view.id == view_id)
    }

    /// Returns the designated active view, falling back to the first view
    /// when the designation is unset or stale.
    pub fn active_view(&self) -> Option<&View> {
        self.view(&self.view_id).or_else(|| self.views.first())
    }

    pub fn cell(&self, key_id: &str, row_id: &str) -> Option<&Cell> {
        self.key_values(key_id)?.cell_for_row(row_id)
    }

    /// Adds a non-primary key.
    pub fn add_key(&mut self, key: Key) -> Result<(), AttributeViewError> {
        if self.key_values(&key.id).is_some() {
            return Err(AttributeViewError::DuplicateKey(key.id));
        }
        if key.key_type == KeyType::Block {
            return Err(AttributeViewError::InvalidValue {
                key_id: key.id,
                message: "attribute view already has a primary key".to_string(),
            });
        }
        self.key_values.push(KeyValues {
            key,
            values: Vec::new(),
        });
        Ok(())
    }

    /// Adds a view. The first view added becomes the active one.
    pub fn add_view(&mut self, view: View) -> Result<(), AttributeViewError> {
        if self.view(&view.id).is_some() {
            return Err(AttributeViewError::DuplicateView(view.id));
        }
        if self.view_id.is_empty() {
            self.view_id = view.id.clone();
        }
        self.views.push(view);
        Ok(())
    }

    /// Binds a block as a new row and fills its primary key cell.
    pub fn add_row(
        &mut self,
        block_id: impl Into<String>,
        content: impl Into<String>,
    ) -> Result<(), AttributeViewError> {
        let block_id = block_id.into();
        if self.has_row(&block_id) {
            return Err(AttributeViewError::DuplicateRow(block_id));
        }
        let primary = self
            .key_values
            .iter_mut()
            .find(|kv| kv.key.key_type == KeyType::Block)
            .ok_or_else(|| AttributeViewError::KeyNotFound(PRIMARY_KEY_NAME.to_string()))?;
        primary.values.push(Cell {
            id: generate_id(),
            key_id: primary.key.id.clone(),
            row_id: block_id.clone(),
            value: CellValue::Block(BlockRef {
                id: block_id.clone(),
                content: content.into(),
            }),
        });
        self.row_ids.push(block_id);
        Ok(())
    }

    /// Unbinds a row and drops all of its cells. Returns whether it existed.
    pub fn remove_row(&mut self, row_id: &str) -> bool {
        let before = self.row_ids.len();
        self.row_ids.retain(|id| id != row_id);
        if self.row_ids.len() == before {
            return false;
        }
        for kv in &mut self.key_values {
            kv.values.retain(|cell| cell.row_id != row_id);
        }
        true
    }

    /// Sets a typed value at `(key, row)`, creating the cell when absent.
    ///
    /// Returns the cell id.
    pub fn set_value(
        &mut self,
        key_id: &str,
        row_id: &str,
        value: CellValue,
    ) -> Result<String, AttributeViewError> {
        if !self.has_row(row_id) {
            return Err(AttributeViewError::RowNotFound(row_id.to_string()));
        }
        let kv = self.key_values_mut(key_id)?;
        if value.key_type() != kv.key.key_type {
            return Err(AttributeViewError::InvalidValue {
                key_id: key_id.to_string(),
                message: format!(
                    "{:?} value for {:?} key",
                    value.key_type(),
                    kv.key.key_type
                ),
            });
        }

        if let Some(cell) = kv.values.iter_mut().find(|cell| cell.row_id == row_id) {
            cell.value = value;
            return Ok(cell.id.clone());
        }

        let cell_id = generate_id();
        kv.values.push(Cell {
            id: cell_id.clone(),
            key_id: key_id.to_string(),
            row_id: row_id.to_string(),
            value,
        });
        Ok(cell_id)
    }

    /// Applies an untyped update to exactly one cell.
    ///
    /// Rows and keys are never created. A cell that is missing at a valid
    /// coordinate is created with `cell_id`; a `cell_id` that lives at a
    /// different coordinate is reported as not found.
    pub fn update_cell(
        &mut self,
        key_id: &str,
        row_id: &str,
        cell_id: &str,
        raw: &serde_json::Value,
    ) -> Result<(), AttributeViewError> {
        if !self.has_row(row_id) {
            return Err(AttributeViewError::RowNotFound(row_id.to_string()));
        }
        let kv = self.key_values_mut(key_id)?;
        let value = CellValue::from_json(kv.key.key_type, row_id, raw).map_err(|message| {
            AttributeViewError::InvalidValue {
                key_id: key_id.to_string(),
                message,
            }
        })?;

        if cell_id.trim().is_empty() {
            return Err(AttributeViewError::CellNotFound(cell_id.to_string()));
        }

        match kv.values.iter().position(|cell| cell.id == cell_id) {
            Some(index) if kv.values[index].row_id == row_id => {
                kv.values[index].value = value;
                Ok(())
            }
            Some(_) => Err(AttributeViewError::CellNotFound(cell_id.to_string())),
            None if kv.cell_for_row(row_id).is_some() => {
                Err(AttributeViewError::CellNotFound(cell_id.to_string()))
            }
            None => {
                kv.values.push(Cell {
                    id: cell_id.to_string(),
                    key_id: key_id.to_string(),
                    row_id: row_id.to_string(),
                    value,
                });
                Ok(())
            }
        }
    }

    /// Returns every key with only the cell bound to `row_id` (if any).
    pub fn key_values_for_row(&self, row_id: &str) -> Vec<KeyValues> {
        self.key_values
            .iter()
            .map(|kv| KeyValues {
                key: kv.key.clone(),
                values: kv.cell_for_row(row_id).cloned().into_iter().collect(),
            })
            .collect()
    }

    fn key_values_mut(&mut self, key_id: &str) -> Result<&mut KeyValues, AttributeViewError> {
        self.key_values
            .iter_mut()
            .find(|kv| kv.key.id == key_id)
            .ok_or_else(|| AttributeViewError::KeyNotFound(key_id.to_string()))
    }
}
