//! PostgreSQL backend.
//!
//! Items are stored in `items` plus one extension table per variant. Rows are
//! read back as JSON built by the database (`to_jsonb`), so the row shape
//! follows the column registry without per-column mapping code here.

use async_trait::async_trait;
use chrono::NaiveDate;
use rust_decimal::Decimal;
use sqlx::{postgres::PgPoolOptions, types::Json, PgConnection, Pool, Postgres, QueryBuilder};

use super::Repository;
use crate::{
    config::DatabaseConfig,
    error::{AppError, AppResult},
    models::{
        column::{ColumnDescriptor, ColumnOwner, SelectOption},
        enums::{FieldKind, NamedEntity, Variant},
        item::{CleanedFields, CleanedValue, ItemCommand, ItemFilter, ItemOrder, ItemQuery, ItemRow, ScopedName},
        user::UserCommand,
    },
};

const ACC_NO_CONSTRAINT: &str = "items_library_acc_no_key";

#[derive(Clone)]
pub struct PgRepository {
    pool: Pool<Postgres>,
}

impl PgRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    /// Opens a pool sized from configuration
    pub async fn connect(config: &DatabaseConfig) -> Result<Self, sqlx::Error> {
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .min_connections(config.min_connections)
            .connect(&config.url)
            .await?;
        Ok(Self::new(pool))
    }

    pub async fn migrate(&self) -> Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("./migrations").run(&self.pool).await
    }

    pub fn pool(&self) -> &Pool<Postgres> {
        &self.pool
    }
}

// =========================================================================
// Value binding
// =========================================================================

/// A cleaned value ready to bind, with selects already resolved to ids
#[derive(Debug)]
enum Bound {
    Null,
    Text(String),
    Number(Decimal),
    Boolean(bool),
    Date(NaiveDate),
    Id(i64),
}

impl From<&CleanedValue> for Bound {
    fn from(value: &CleanedValue) -> Self {
        match value {
            CleanedValue::Text(s) => Bound::Text(s.clone()),
            CleanedValue::Number(n) => Bound::Number(*n),
            CleanedValue::Boolean(b) => Bound::Boolean(*b),
            CleanedValue::Date(d) => Bound::Date(*d),
            CleanedValue::Null | CleanedValue::Select(_) | CleanedValue::MultiSelect(_) => Bound::Null,
        }
    }
}

/// NULL is written as a literal so the column's own type applies.
fn push_bound(qb: &mut QueryBuilder<'_, Postgres>, value: Bound) {
    match value {
        Bound::Null => qb.push("NULL"),
        Bound::Text(s) => qb.push_bind(s),
        Bound::Number(n) => qb.push_bind(n),
        Bound::Boolean(b) => qb.push_bind(b),
        Bound::Date(d) => qb.push_bind(d),
        Bound::Id(id) => qb.push_bind(id),
    };
}

/// Cleaned fields split into table columns and junction links
#[derive(Debug, Default)]
struct Resolved {
    scalars: Vec<(&'static str, Bound)>,
    links: Vec<(&'static ColumnDescriptor, Vec<i64>)>,
}

/// Junction table of a multi-select: `item_categories`, `book_authors`, ...
fn junction_table(column: &ColumnDescriptor) -> String {
    match column.owner {
        ColumnOwner::Base => format!("item_{}", column.id),
        ColumnOwner::Variant(v) => format!("{}_{}", v.as_str(), column.id),
    }
}

async fn find_or_create_in(conn: &mut PgConnection, entity: NamedEntity, key: &ScopedName) -> Result<i64, sqlx::Error> {
    let table = entity.table();
    let insert = format!(
        "INSERT INTO {table} (library_slug, name) VALUES ($1, $2) \
         ON CONFLICT ON CONSTRAINT {table}_scope_name_key DO NOTHING RETURNING id"
    );
    let inserted: Option<i64> = sqlx::query_scalar(&insert)
        .bind(key.library_slug())
        .bind(key.name())
        .fetch_optional(&mut *conn)
        .await?;
    if let Some(id) = inserted {
        return Ok(id);
    }

    let select = format!("SELECT id FROM {table} WHERE library_slug IS NOT DISTINCT FROM $1 AND name = $2");
    sqlx::query_scalar(&select)
        .bind(key.library_slug())
        .bind(key.name())
        .fetch_one(&mut *conn)
        .await
}

async fn resolve(conn: &mut PgConnection, fields: &CleanedFields) -> Result<Resolved, sqlx::Error> {
    let mut resolved = Resolved::default();
    for field in fields.iter() {
        let column = field.column;
        match (column.select, &field.value) {
            (Some(source), CleanedValue::MultiSelect(keys)) => {
                let mut ids = Vec::with_capacity(keys.len());
                for key in keys {
                    ids.push(find_or_create_in(conn, source.entity, key).await?);
                }
                resolved.links.push((column, ids));
            }
            (Some(_), CleanedValue::Null) if column.kind == FieldKind::MultiSelect => {
                resolved.links.push((column, Vec::new()));
            }
            (Some(source), CleanedValue::Select(key)) => {
                let id = find_or_create_in(conn, source.entity, key).await?;
                resolved.scalars.push((source.entity.key_column(), Bound::Id(id)));
            }
            (Some(source), _) => resolved.scalars.push((source.entity.key_column(), Bound::Null)),
            (None, value) => resolved.scalars.push((column.id, Bound::from(value))),
        }
    }
    Ok(resolved)
}

async fn replace_links(
    conn: &mut PgConnection,
    item_id: i64,
    links: Vec<(&'static ColumnDescriptor, Vec<i64>)>,
) -> Result<(), sqlx::Error> {
    for (column, ids) in links {
        let Some(source) = column.select else { continue };
        let table = junction_table(column);

        sqlx::query(&format!("DELETE FROM {table} WHERE item_id = $1"))
            .bind(item_id)
            .execute(&mut *conn)
            .await?;
        if ids.is_empty() {
            continue;
        }
        let insert = format!(
            "INSERT INTO {table} (item_id, {key}) SELECT $1, UNNEST($2::bigint[]) ON CONFLICT DO NOTHING",
            key = source.entity.key_column()
        );
        sqlx::query(&insert).bind(item_id).bind(ids).execute(&mut *conn).await?;
    }
    Ok(())
}

/// Maps constraint violations of a write to client errors.
fn write_error(e: sqlx::Error, command: &ItemCommand) -> AppError {
    if let sqlx::Error::Database(ref db) = e {
        if db.is_unique_violation() {
            return match db.constraint() {
                Some(ACC_NO_CONSTRAINT) => AppError::Conflict(format!(
                    "Accession number {} already exists in library '{}'",
                    command.acc_no().map(|n| n.to_string()).unwrap_or_default(),
                    command.library_slug
                )),
                other => AppError::Conflict(format!("Duplicate value ({})", other.unwrap_or("unique key"))),
            };
        }
        if db.is_foreign_key_violation() {
            return AppError::NotFound(format!("Library '{}' not found", command.library_slug));
        }
    }
    AppError::Database(e)
}

// =========================================================================
// Row building
// =========================================================================

/// `{id, name}` for a single select, an array of them for a multi-select.
/// `alias` is the table holding the select's key column.
fn relation_sql(column: &ColumnDescriptor, alias: &str) -> Option<String> {
    let source = column.select?;
    let table = source.entity.table();
    let key = source.entity.key_column();
    let sql = match column.kind {
        FieldKind::Select => format!(
            "(SELECT jsonb_build_object('id', e.id, 'name', e.name) FROM {table} e WHERE e.id = {alias}.{key})"
        ),
        _ => format!(
            "COALESCE((SELECT jsonb_agg(jsonb_build_object('id', e.id, 'name', e.name) ORDER BY e.name) \
             FROM {junction} j JOIN {table} e ON e.id = j.{key} WHERE j.item_id = i.id), '[]'::jsonb)",
            junction = junction_table(column)
        ),
    };
    Some(sql)
}

fn relations_object(includes: &[&'static ColumnDescriptor], owner: ColumnOwner, alias: &str) -> String {
    let pairs: Vec<String> = includes
        .iter()
        .filter(|c| c.owner == owner)
        .filter_map(|c| relation_sql(c, alias).map(|sql| format!("'{}', {}", c.id, sql)))
        .collect();
    format!("jsonb_build_object({})", pairs.join(", "))
}

/// Key columns replaced by relation objects are dropped from the row.
fn key_columns(includes: &[&'static ColumnDescriptor], owner: ColumnOwner) -> String {
    includes
        .iter()
        .filter(|c| c.owner == owner && c.kind == FieldKind::Select)
        .filter_map(|c| c.select)
        .map(|s| format!(" - '{}'", s.entity.key_column()))
        .collect()
}

fn extension_sql(query: &ItemQuery, variant: Variant) -> String {
    let owner = ColumnOwner::Variant(variant);
    format!(
        "((to_jsonb(v.*){}) || {})",
        key_columns(&query.includes, owner),
        relations_object(&query.includes, owner, "v")
    )
}

fn row_sql(query: &ItemQuery) -> String {
    let base = format!(
        "((to_jsonb(i.*){}) || {})",
        key_columns(&query.includes, ColumnOwner::Base),
        relations_object(&query.includes, ColumnOwner::Base, "i")
    );

    let extensions: Vec<String> = match query.variant {
        Some(v) => vec![format!("'{}', {}", v.as_str(), extension_sql(query, v))],
        None => Variant::ALL
            .iter()
            .map(|v| {
                format!(
                    "'{}', (SELECT {} FROM {} v WHERE v.item_id = i.id)",
                    v.as_str(),
                    extension_sql(query, *v),
                    v.table()
                )
            })
            .collect(),
    };

    format!("{} || jsonb_build_object({})", base, extensions.join(", "))
}

fn push_search(qb: &mut QueryBuilder<'_, Postgres>, query: &ItemQuery, term: &str, columns: &[&'static ColumnDescriptor]) {
    let pattern = crate::catalog::query::like_pattern(term);
    let mut first = true;
    qb.push(" AND (");
    for column in columns {
        let alias = match column.owner {
            ColumnOwner::Base => "i",
            ColumnOwner::Variant(v) if query.variant == Some(v) => "v",
            ColumnOwner::Variant(_) => continue,
        };
        let condition = match (column.kind, column.select) {
            (FieldKind::Boolean, _) => continue,
            (FieldKind::Select, Some(source)) => format!(
                "EXISTS (SELECT 1 FROM {} e WHERE e.id = {}.{} AND e.name ILIKE ",
                source.entity.table(),
                alias,
                source.entity.key_column()
            ),
            (FieldKind::MultiSelect, Some(source)) => format!(
                "EXISTS (SELECT 1 FROM {} j JOIN {} e ON e.id = j.{} WHERE j.item_id = i.id AND e.name ILIKE ",
                junction_table(column),
                source.entity.table(),
                source.entity.key_column()
            ),
            _ => format!("({}.{}::text ILIKE ", alias, column.id),
        };
        if !first {
            qb.push(" OR ");
        }
        first = false;
        qb.push(condition);
        qb.push_bind(pattern.clone());
        qb.push(" ESCAPE '\\')");
    }
    if first {
        qb.push("FALSE");
    }
    qb.push(")");
}

fn build_select(query: &ItemQuery) -> QueryBuilder<'static, Postgres> {
    let mut qb = QueryBuilder::new(format!("SELECT {} AS row FROM items i", row_sql(query)));

    if let Some(variant) = query.variant {
        qb.push(format!(" JOIN {} v ON v.item_id = i.id", variant.table()));
    }
    if query.order == ItemOrder::MostUsed {
        qb.push(
            " LEFT JOIN (SELECT item_id, COUNT(*) AS uses FROM transactions GROUP BY item_id) t ON t.item_id = i.id",
        );
    }

    qb.push(" WHERE i.library_slug = ");
    qb.push_bind(query.library_slug.clone());

    match query.filter {
        ItemFilter::All => {}
        ItemFilter::Ids(ref ids) => {
            qb.push(" AND i.id = ANY(");
            qb.push_bind(ids.clone());
            qb.push(")");
        }
        ItemFilter::Search { ref term, ref columns } => push_search(&mut qb, query, term, columns),
    }

    qb.push(match query.order {
        ItemOrder::AccessionNumber => " ORDER BY i.acc_no ASC, i.id ASC",
        ItemOrder::RecentlyAcquired => {
            " ORDER BY COALESCE(i.purchased_on, i.created_at::date) DESC, i.acc_no ASC, i.id ASC"
        }
        ItemOrder::MostUsed => " ORDER BY COALESCE(t.uses, 0) DESC, i.acc_no ASC, i.id ASC",
    });

    if let Some(limit) = query.limit {
        qb.push(" LIMIT ");
        qb.push_bind(limit);
    }
    qb
}

// =========================================================================
// Repository
// =========================================================================

#[async_trait]
impl Repository for PgRepository {
    async fn library_exists(&self, slug: &str) -> AppResult<bool> {
        let exists: bool = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM libraries WHERE slug = $1)")
            .bind(slug)
            .fetch_one(&self.pool)
            .await?;
        Ok(exists)
    }

    async fn create_item(&self, command: &ItemCommand) -> AppResult<i64> {
        let mut tx = self.pool.begin().await?;

        let base = resolve(&mut tx, &command.base).await.map_err(|e| write_error(e, command))?;
        let extension = resolve(&mut tx, &command.extension).await.map_err(|e| write_error(e, command))?;

        let mut qb = QueryBuilder::<Postgres>::new("INSERT INTO items (library_slug, type, status");
        let scalars: Vec<_> = base.scalars.into_iter().filter(|(name, _)| *name != "status").collect();
        for (name, _) in &scalars {
            qb.push(", ").push(*name);
        }
        qb.push(") VALUES (");
        qb.push_bind(command.library_slug.clone());
        qb.push(", ").push_bind(command.variant.as_str());
        qb.push(", ").push_bind(command.status().to_string());
        for (_, value) in scalars {
            qb.push(", ");
            push_bound(&mut qb, value);
        }
        qb.push(") RETURNING id");

        let id: i64 = qb
            .build_query_scalar()
            .fetch_one(&mut *tx)
            .await
            .map_err(|e| write_error(e, command))?;

        let mut qb = QueryBuilder::<Postgres>::new(format!("INSERT INTO {} (item_id", command.variant.table()));
        for (name, _) in &extension.scalars {
            qb.push(", ").push(*name);
        }
        qb.push(") VALUES (");
        qb.push_bind(id);
        for (_, value) in extension.scalars {
            qb.push(", ");
            push_bound(&mut qb, value);
        }
        qb.push(")");
        qb.build().execute(&mut *tx).await.map_err(|e| write_error(e, command))?;

        replace_links(&mut tx, id, base.links).await?;
        replace_links(&mut tx, id, extension.links).await?;

        tx.commit().await?;
        tracing::debug!(id, library = %command.library_slug, variant = %command.variant, "Item created");
        Ok(id)
    }

    async fn update_item(&self, id: i64, command: &ItemCommand) -> AppResult<()> {
        let mut tx = self.pool.begin().await?;

        let current: Option<String> =
            sqlx::query_scalar("SELECT type FROM items WHERE id = $1 AND library_slug = $2 FOR UPDATE")
                .bind(id)
                .bind(&command.library_slug)
                .fetch_optional(&mut *tx)
                .await?;
        match current {
            None => return Err(AppError::NotFound(format!("Item {} not found", id))),
            Some(ref t) if t != command.variant.as_str() => {
                return Err(AppError::BadRequest(format!(
                    "Item {} is a {}, its type cannot change to {}",
                    id, t, command.variant
                )))
            }
            Some(_) => {}
        }

        let base = resolve(&mut tx, &command.base).await.map_err(|e| write_error(e, command))?;
        let extension = resolve(&mut tx, &command.extension).await.map_err(|e| write_error(e, command))?;

        let mut qb = QueryBuilder::<Postgres>::new("UPDATE items SET updated_at = NOW(), status = ");
        qb.push_bind(command.status().to_string());
        for (name, value) in base.scalars.into_iter().filter(|(name, _)| *name != "status") {
            qb.push(", ").push(name).push(" = ");
            push_bound(&mut qb, value);
        }
        qb.push(" WHERE id = ");
        qb.push_bind(id);
        qb.build().execute(&mut *tx).await.map_err(|e| write_error(e, command))?;

        if !extension.scalars.is_empty() {
            let mut qb = QueryBuilder::<Postgres>::new(format!("UPDATE {} SET ", command.variant.table()));
            for (i, (name, value)) in extension.scalars.into_iter().enumerate() {
                if i > 0 {
                    qb.push(", ");
                }
                qb.push(name).push(" = ");
                push_bound(&mut qb, value);
            }
            qb.push(" WHERE item_id = ");
            qb.push_bind(id);
            qb.build().execute(&mut *tx).await.map_err(|e| write_error(e, command))?;
        }

        replace_links(&mut tx, id, base.links).await?;
        replace_links(&mut tx, id, extension.links).await?;

        tx.commit().await?;
        tracing::debug!(id, library = %command.library_slug, "Item updated");
        Ok(())
    }

    async fn find_items(&self, query: &ItemQuery) -> AppResult<Vec<ItemRow>> {
        let mut qb = build_select(query);
        let rows: Vec<Json<ItemRow>> = qb.build_query_scalar().fetch_all(&self.pool).await?;
        Ok(rows.into_iter().map(|Json(row)| row).collect())
    }

    async fn find_item(&self, query: &ItemQuery) -> AppResult<Option<ItemRow>> {
        let first = ItemQuery {
            limit: Some(1),
            ..query.clone()
        };
        Ok(self.find_items(&first).await?.into_iter().next())
    }

    async fn find_or_create(&self, entity: NamedEntity, key: &ScopedName) -> AppResult<i64> {
        let mut conn = self.pool.acquire().await?;
        Ok(find_or_create_in(&mut conn, entity, key).await?)
    }

    async fn find_named(&self, entity: NamedEntity, key: &ScopedName) -> AppResult<Option<i64>> {
        let sql = format!(
            "SELECT id FROM {} WHERE library_slug IS NOT DISTINCT FROM $1 AND name = $2",
            entity.table()
        );
        let id = sqlx::query_scalar(&sql)
            .bind(key.library_slug())
            .bind(key.name())
            .fetch_optional(&self.pool)
            .await?;
        Ok(id)
    }

    async fn list_named(&self, entity: NamedEntity, library_slug: Option<String>) -> AppResult<Vec<SelectOption>> {
        let sql = format!(
            "SELECT id, name FROM {} WHERE library_slug IS NOT DISTINCT FROM $1 ORDER BY name",
            entity.table()
        );
        let options = sqlx::query_as::<_, SelectOption>(&sql)
            .bind(library_slug)
            .fetch_all(&self.pool)
            .await?;
        Ok(options)
    }

    async fn create_user(&self, user: &UserCommand) -> AppResult<i64> {
        let id = sqlx::query_scalar(
            r#"
            INSERT INTO users (name, email_address, gender, phone_number, date_of_birth)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id
            "#,
        )
        .bind(&user.name)
        .bind(&user.email_address)
        .bind(&user.gender)
        .bind(&user.phone_number)
        .bind(user.date_of_birth)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(ref db) if db.is_unique_violation() => {
                AppError::Conflict(format!("Email address '{}' is already registered", user.email_address))
            }
            other => AppError::Database(other),
        })?;
        Ok(id)
    }

    async fn close(&self) {
        self.pool.close().await;
    }
}
