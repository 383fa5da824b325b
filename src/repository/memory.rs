//! In-process backend, used by tests and by `memory://` development runs.
//!
//! Mirrors the PostgreSQL backend's observable behavior: the same row shape,
//! orderings and uniqueness rules. One lock guards the whole store, so every
//! write is atomic.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde_json::{json, Map, Value};
use tokio::sync::Mutex;

use super::Repository;
use crate::{
    error::{AppError, AppResult},
    models::{
        column::{ColumnDescriptor, SelectOption},
        enums::{FieldKind, NamedEntity, Variant},
        item::{
            CleanedFields, CleanedValue, ItemCommand, ItemFilter, ItemOrder, ItemQuery, ItemRow, ScopedName,
            DEFAULT_STATUS,
        },
        user::UserCommand,
    },
};

#[derive(Debug, Clone)]
enum Stored {
    Plain(CleanedValue),
    One(Option<i64>),
    Many(Vec<i64>),
}

#[derive(Debug, Clone)]
struct StoredItem {
    id: i64,
    library_slug: String,
    variant: Variant,
    acc_no: Decimal,
    base: Vec<(&'static ColumnDescriptor, Stored)>,
    extension: Vec<(&'static ColumnDescriptor, Stored)>,
    created_at: DateTime<Utc>,
}

impl StoredItem {
    fn field(&self, id: &str) -> Option<&Stored> {
        self.base
            .iter()
            .chain(self.extension.iter())
            .find(|(c, _)| c.id == id)
            .map(|(_, v)| v)
    }

    fn acquired_on(&self) -> chrono::NaiveDate {
        match self.field("purchased_on") {
            Some(Stored::Plain(CleanedValue::Date(d))) => *d,
            _ => self.created_at.date_naive(),
        }
    }
}

#[derive(Debug, Default)]
struct State {
    next_id: i64,
    libraries: BTreeSet<String>,
    named: HashMap<NamedEntity, Vec<(i64, ScopedName)>>,
    items: BTreeMap<i64, StoredItem>,
    users: Vec<(i64, UserCommand)>,
    uses: HashMap<i64, u64>,
}

impl State {
    fn next_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }

    fn find_named(&self, entity: NamedEntity, key: &ScopedName) -> Option<i64> {
        self.named
            .get(&entity)
            .and_then(|entries| entries.iter().find(|(_, k)| k == key))
            .map(|(id, _)| *id)
    }

    fn find_or_create(&mut self, entity: NamedEntity, key: &ScopedName) -> i64 {
        if let Some(id) = self.find_named(entity, key) {
            return id;
        }
        let id = self.next_id();
        self.named.entry(entity).or_default().push((id, key.clone()));
        id
    }

    fn name_of(&self, entity: NamedEntity, id: i64) -> Option<&str> {
        self.named
            .get(&entity)
            .and_then(|entries| entries.iter().find(|(i, _)| *i == id))
            .map(|(_, k)| k.name())
    }

    fn store(&mut self, fields: &CleanedFields) -> Vec<(&'static ColumnDescriptor, Stored)> {
        let mut stored = Vec::with_capacity(fields.0.len());
        for field in fields.iter() {
            let column = field.column;
            let value = match (column.select, &field.value) {
                (Some(source), CleanedValue::Select(key)) => Stored::One(Some(self.find_or_create(source.entity, key))),
                (Some(source), CleanedValue::MultiSelect(keys)) => {
                    Stored::Many(keys.iter().map(|k| self.find_or_create(source.entity, k)).collect())
                }
                (Some(_), _) if column.kind == FieldKind::MultiSelect => Stored::Many(Vec::new()),
                (Some(_), _) => Stored::One(None),
                (None, CleanedValue::Null) if column.id == "status" => {
                    Stored::Plain(CleanedValue::Text(DEFAULT_STATUS.to_string()))
                }
                (None, value) => Stored::Plain(value.clone()),
            };
            stored.push((column, value));
        }
        stored
    }

    fn acc_no_taken(&self, library_slug: &str, acc_no: Decimal, except: Option<i64>) -> bool {
        self.items
            .values()
            .any(|i| i.library_slug == library_slug && i.acc_no == acc_no && Some(i.id) != except)
    }

    fn relation(&self, entity: NamedEntity, id: i64) -> Value {
        json!({ "id": id, "name": self.name_of(entity, id).unwrap_or_default() })
    }

    fn to_json(&self, column: &ColumnDescriptor, value: &Stored) -> Value {
        let entity = column.select.map(|s| s.entity);
        match (value, entity) {
            (Stored::One(Some(id)), Some(entity)) => self.relation(entity, *id),
            (Stored::Many(ids), Some(entity)) => {
                let mut relations: Vec<Value> = ids.iter().map(|id| self.relation(entity, *id)).collect();
                relations.sort_by(|a, b| a["name"].as_str().cmp(&b["name"].as_str()));
                Value::Array(relations)
            }
            (Stored::Plain(value), _) => plain_json(value),
            _ => Value::Null,
        }
    }

    fn matches_term(&self, item: &StoredItem, term: &str, columns: &[&'static ColumnDescriptor]) -> bool {
        let term = term.to_lowercase();
        columns.iter().any(|column| {
            let texts: Vec<String> = match (item.field(column.id), column.select) {
                (Some(Stored::Plain(CleanedValue::Text(s))), _) => vec![s.clone()],
                (Some(Stored::Plain(CleanedValue::Number(n))), _) => vec![n.to_string()],
                (Some(Stored::Plain(CleanedValue::Date(d))), _) => vec![d.to_string()],
                (Some(Stored::One(Some(id))), Some(s)) => {
                    self.name_of(s.entity, *id).map(str::to_string).into_iter().collect()
                }
                (Some(Stored::Many(ids)), Some(s)) => ids
                    .iter()
                    .filter_map(|id| self.name_of(s.entity, *id))
                    .map(str::to_string)
                    .collect(),
                _ => Vec::new(),
            };
            texts.iter().any(|t| t.to_lowercase().contains(&term))
        })
    }

    fn to_row(&self, item: &StoredItem, query: &ItemQuery) -> ItemRow {
        let mut row = Map::new();
        row.insert("id".into(), json!(item.id));
        row.insert("library_slug".into(), json!(item.library_slug));
        row.insert("type".into(), json!(item.variant.as_str()));
        row.insert("created_at".into(), json!(item.created_at.to_rfc3339()));
        for (column, value) in &item.base {
            row.insert(column.id.to_string(), self.to_json(column, value));
        }

        let mut extension = Map::new();
        extension.insert("item_id".into(), json!(item.id));
        for (column, value) in &item.extension {
            extension.insert(column.id.to_string(), self.to_json(column, value));
        }

        match query.variant {
            Some(v) => {
                row.insert(v.as_str().to_string(), Value::Object(extension));
            }
            None => {
                for v in Variant::ALL {
                    let nested = if v == item.variant {
                        Value::Object(extension.clone())
                    } else {
                        Value::Null
                    };
                    row.insert(v.as_str().to_string(), nested);
                }
            }
        }
        row
    }
}

fn plain_json(value: &CleanedValue) -> Value {
    match value {
        CleanedValue::Text(s) => Value::String(s.clone()),
        CleanedValue::Number(n) => {
            serde_json::from_str(&n.normalize().to_string()).unwrap_or_else(|_| Value::String(n.to_string()))
        }
        CleanedValue::Boolean(b) => Value::Bool(*b),
        CleanedValue::Date(d) => Value::String(d.to_string()),
        _ => Value::Null,
    }
}

fn duplicate_acc_no(command: &ItemCommand, acc_no: Decimal) -> AppError {
    AppError::Conflict(format!(
        "Accession number {} already exists in library '{}'",
        acc_no, command.library_slug
    ))
}

#[derive(Default)]
pub struct MemoryRepository {
    state: Mutex<State>,
}

impl MemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn add_library(&self, slug: &str) {
        self.state.lock().await.libraries.insert(slug.to_string());
    }

    /// Records one use of an item, which ranks it in the popular listing.
    pub async fn record_transaction(&self, item_id: i64) {
        *self.state.lock().await.uses.entry(item_id).or_default() += 1;
    }
}

#[async_trait]
impl Repository for MemoryRepository {
    async fn library_exists(&self, slug: &str) -> AppResult<bool> {
        Ok(self.state.lock().await.libraries.contains(slug))
    }

    async fn create_item(&self, command: &ItemCommand) -> AppResult<i64> {
        let mut state = self.state.lock().await;

        if !state.libraries.contains(&command.library_slug) {
            return Err(AppError::NotFound(format!("Library '{}' not found", command.library_slug)));
        }
        let acc_no = command
            .acc_no()
            .ok_or_else(|| AppError::Validation("Accession number is required".to_string()))?;
        if state.acc_no_taken(&command.library_slug, acc_no, None) {
            return Err(duplicate_acc_no(command, acc_no));
        }

        let id = state.next_id();
        let base = state.store(&command.base);
        let extension = state.store(&command.extension);
        state.items.insert(
            id,
            StoredItem {
                id,
                library_slug: command.library_slug.clone(),
                variant: command.variant,
                acc_no,
                base,
                extension,
                created_at: Utc::now(),
            },
        );
        Ok(id)
    }

    async fn update_item(&self, id: i64, command: &ItemCommand) -> AppResult<()> {
        let mut state = self.state.lock().await;

        let current = match state.items.get(&id) {
            Some(item) if item.library_slug == command.library_slug => item.variant,
            _ => return Err(AppError::NotFound(format!("Item {} not found", id))),
        };
        if current != command.variant {
            return Err(AppError::BadRequest(format!(
                "Item {} is a {}, its type cannot change to {}",
                id, current, command.variant
            )));
        }
        let acc_no = command
            .acc_no()
            .ok_or_else(|| AppError::Validation("Accession number is required".to_string()))?;
        if state.acc_no_taken(&command.library_slug, acc_no, Some(id)) {
            return Err(duplicate_acc_no(command, acc_no));
        }

        let base = state.store(&command.base);
        let extension = state.store(&command.extension);
        if let Some(item) = state.items.get_mut(&id) {
            item.acc_no = acc_no;
            item.base = base;
            item.extension = extension;
        }
        Ok(())
    }

    async fn find_items(&self, query: &ItemQuery) -> AppResult<Vec<ItemRow>> {
        let state = self.state.lock().await;

        let mut items: Vec<&StoredItem> = state
            .items
            .values()
            .filter(|i| i.library_slug == query.library_slug)
            .filter(|i| query.variant.map_or(true, |v| i.variant == v))
            .filter(|i| match query.filter {
                ItemFilter::All => true,
                ItemFilter::Ids(ref ids) => ids.contains(&i.id),
                ItemFilter::Search { ref term, ref columns } => state.matches_term(i, term, columns),
            })
            .collect();

        let uses = |i: &StoredItem| state.uses.get(&i.id).copied().unwrap_or(0);
        match query.order {
            ItemOrder::AccessionNumber => items.sort_by(|a, b| (a.acc_no, a.id).cmp(&(b.acc_no, b.id))),
            ItemOrder::RecentlyAcquired => items.sort_by(|a, b| {
                b.acquired_on()
                    .cmp(&a.acquired_on())
                    .then((a.acc_no, a.id).cmp(&(b.acc_no, b.id)))
            }),
            ItemOrder::MostUsed => {
                items.sort_by(|a, b| uses(*b).cmp(&uses(*a)).then((a.acc_no, a.id).cmp(&(b.acc_no, b.id))))
            }
        }
        if let Some(limit) = query.limit {
            items.truncate(usize::try_from(limit).unwrap_or(0));
        }

        Ok(items.into_iter().map(|i| state.to_row(i, query)).collect())
    }

    async fn find_item(&self, query: &ItemQuery) -> AppResult<Option<ItemRow>> {
        Ok(self.find_items(query).await?.into_iter().next())
    }

    async fn find_or_create(&self, entity: NamedEntity, key: &ScopedName) -> AppResult<i64> {
        Ok(self.state.lock().await.find_or_create(entity, key))
    }

    async fn find_named(&self, entity: NamedEntity, key: &ScopedName) -> AppResult<Option<i64>> {
        Ok(self.state.lock().await.find_named(entity, key))
    }

    async fn list_named(&self, entity: NamedEntity, library_slug: Option<String>) -> AppResult<Vec<SelectOption>> {
        let state = self.state.lock().await;
        let mut options: Vec<SelectOption> = state
            .named
            .get(&entity)
            .map(|entries| {
                entries
                    .iter()
                    .filter(|(_, k)| k.library_slug() == library_slug.as_deref())
                    .map(|(id, k)| SelectOption {
                        id: *id,
                        name: k.name().to_string(),
                    })
                    .collect()
            })
            .unwrap_or_default();
        options.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(options)
    }

    async fn create_user(&self, user: &UserCommand) -> AppResult<i64> {
        let mut state = self.state.lock().await;
        if state.users.iter().any(|(_, u)| u.email_address == user.email_address) {
            return Err(AppError::Conflict(format!(
                "Email address '{}' is already registered",
                user.email_address
            )));
        }
        let id = state.next_id();
        state.users.push((id, user.clone()));
        Ok(id)
    }

    async fn close(&self) {}
}
