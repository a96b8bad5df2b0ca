//! In-process backend for tests.
//!
//! Implements [`DataApi`] and [`AuthApi`] over plain JSON rows with the same
//! filter, ordering, embedding and upsert semantics as the managed backend.
//! Row-level security is not modelled: every bearer sees every row.
//!
//! Failures can be injected per table to exercise error paths:
//!
//! ```rust,ignore
//! let backend = MemoryBackend::new();
//! backend.fail_writes_after(Table::OrderItems, 1); // second write fails
//! ```

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, SubsecRound, TimeDelta, Utc};
use golzar_core::{Email, Role, UserId};
use secrecy::{ExposeSecret, SecretString};
use serde_json::{Map, Value, json};
use uuid::Uuid;

use super::{
    AuthApi, AuthTokens, AuthUser, BackendError, DataApi, Filter, Query, SignUpOutcome,
    SortOrder, Table, types::UserMetadata,
};

type Row = Map<String, Value>;

/// Many-to-one relations: `(from, to) -> column on from referencing to.id`.
const FOREIGN_KEYS: &[(Table, Table, &str)] = &[
    (Table::Products, Table::Stores, "store_id"),
    (Table::ProductFeatures, Table::Products, "product_id"),
    (Table::Orders, Table::Stores, "store_id"),
    (Table::Orders, Table::Addresses, "address_id"),
    (Table::Orders, Table::Profiles, "customer_id"),
    (Table::OrderItems, Table::Orders, "order_id"),
    (Table::OrderItems, Table::Products, "product_id"),
    (Table::Stores, Table::Profiles, "owner_id"),
    (Table::UserRoles, Table::Profiles, "user_id"),
    (Table::Addresses, Table::Profiles, "user_id"),
    (Table::Notifications, Table::Orders, "related_order_id"),
];

fn foreign_key(from: Table, to: Table) -> Option<&'static str> {
    FOREIGN_KEYS
        .iter()
        .find(|(f, t, _)| *f == from && *t == to)
        .map(|(_, _, column)| *column)
}

/// Unique constraints besides the primary key.
fn unique_keys(table: Table) -> &'static [&'static [&'static str]] {
    match table {
        Table::CartItems => &[&["user_id", "product_id"]],
        Table::UserRoles => &[&["user_id", "role"]],
        Table::Stores => &[&["owner_id"]],
        _ => &[],
    }
}

/// Column defaults applied on insert.
fn column_defaults(table: Table) -> Vec<(&'static str, Value)> {
    match table {
        Table::Stores => vec![("is_active", json!(true))],
        Table::Products => vec![
            ("is_available", json!(true)),
            ("category", json!("general")),
            ("stock", json!(0)),
        ],
        Table::Orders => vec![("status", json!("pending"))],
        Table::Addresses => vec![("is_default", json!(false))],
        Table::Notifications => vec![("is_read", json!(false))],
        _ => Vec::new(),
    }
}

struct MemoryUser {
    id: UserId,
    email: String,
    password: String,
    full_name: String,
}

impl MemoryUser {
    fn to_auth_user(&self) -> AuthUser {
        AuthUser {
            id: self.id,
            email: Some(self.email.clone()),
            user_metadata: UserMetadata {
                full_name: Some(self.full_name.clone()),
            },
        }
    }
}

#[derive(Default)]
struct MemoryState {
    tables: BTreeMap<Table, Vec<Row>>,
    users: Vec<MemoryUser>,
    sessions: HashMap<String, UserId>,
    read_failures: HashSet<Table>,
    write_budgets: HashMap<Table, usize>,
    require_confirmation: bool,
    last_created: Option<DateTime<Utc>>,
}

/// In-memory implementation of the managed backend.
#[derive(Clone, Default)]
pub struct MemoryBackend {
    inner: Arc<Mutex<MemoryState>>,
}

impl MemoryBackend {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, MemoryState> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Failure injection
    // ─────────────────────────────────────────────────────────────────────────

    /// Make every read of `table` fail.
    pub fn fail_reads(&self, table: Table) {
        self.state().read_failures.insert(table);
    }

    /// Allow `allowed` more write calls on `table`, then fail the rest.
    pub fn fail_writes_after(&self, table: Table, allowed: usize) {
        self.state().write_budgets.insert(table, allowed);
    }

    /// Make every write to `table` fail.
    pub fn fail_writes(&self, table: Table) {
        self.fail_writes_after(table, 0);
    }

    /// Clear injected failures for `table`.
    pub fn heal(&self, table: Table) {
        let mut state = self.state();
        state.read_failures.remove(&table);
        state.write_budgets.remove(&table);
    }

    /// Sign-up returns a pending confirmation instead of a session.
    pub fn require_email_confirmation(&self, required: bool) {
        self.state().require_confirmation = required;
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Seeding and inspection
    // ─────────────────────────────────────────────────────────────────────────

    /// Create a confirmed account with a profile and the given roles.
    pub fn seed_user(&self, email: &str, password: &str, full_name: &str, roles: &[Role]) -> UserId {
        let mut state = self.state();
        let id = state.create_user(email, password, full_name);
        for role in roles {
            state.grant_role(id, *role);
        }
        id
    }

    /// Grant an additional role.
    pub fn grant_role(&self, user: UserId, role: Role) {
        self.state().grant_role(user, role);
    }

    /// Issue an access token for `user` without a password.
    pub fn access_token_for(&self, user: UserId) -> String {
        let token = format!("mem-{}", Uuid::new_v4());
        self.state().sessions.insert(token.clone(), user);
        token
    }

    /// Insert a row directly, bypassing injected failures. Returns the stored row.
    pub fn insert_row(&self, table: Table, row: Value) -> Value {
        let mut state = self.state();
        let Value::Object(row) = row else {
            return Value::Null;
        };
        Value::Object(state.store_row(table, row))
    }

    /// Snapshot of every row in `table`, in insertion order.
    pub fn rows(&self, table: Table) -> Vec<Value> {
        self.state()
            .table(table)
            .iter()
            .cloned()
            .map(Value::Object)
            .collect()
    }
}

impl MemoryState {
    fn table(&self, table: Table) -> &[Row] {
        self.tables.get(&table).map_or(&[], Vec::as_slice)
    }

    fn table_mut(&mut self, table: Table) -> &mut Vec<Row> {
        self.tables.entry(table).or_default()
    }

    fn next_timestamp(&mut self) -> String {
        let now = Utc::now().trunc_subsecs(6);
        let stamp = match self.last_created {
            Some(last) if now <= last => last + TimeDelta::microseconds(1),
            _ => now,
        };
        self.last_created = Some(stamp);
        stamp.to_rfc3339_opts(SecondsFormat::Micros, true)
    }

    fn check_read(&self, table: Table) -> Result<(), BackendError> {
        if self.read_failures.contains(&table) {
            return Err(BackendError::Unavailable(format!(
                "injected read failure on {table}"
            )));
        }
        Ok(())
    }

    fn check_write(&mut self, table: Table) -> Result<(), BackendError> {
        if let Some(budget) = self.write_budgets.get_mut(&table) {
            if *budget == 0 {
                return Err(BackendError::Unavailable(format!(
                    "injected write failure on {table}"
                )));
            }
            *budget -= 1;
        }
        Ok(())
    }

    fn create_user(&mut self, email: &str, password: &str, full_name: &str) -> UserId {
        let id = UserId::random();
        self.users.push(MemoryUser {
            id,
            email: email.to_lowercase(),
            password: password.to_string(),
            full_name: full_name.to_string(),
        });
        let mut profile = Row::new();
        profile.insert("id".into(), json!(id));
        profile.insert("full_name".into(), json!(full_name));
        profile.insert("phone".into(), Value::Null);
        self.store_row(Table::Profiles, profile);
        id
    }

    fn grant_role(&mut self, user: UserId, role: Role) {
        let mut row = Row::new();
        row.insert("user_id".into(), json!(user));
        row.insert("role".into(), json!(role));
        if self.find_conflict(Table::UserRoles, &row).is_none() {
            self.store_row(Table::UserRoles, row);
        }
    }

    fn issue_tokens(&mut self, user: &AuthUser) -> AuthTokens {
        let access_token = format!("mem-{}", Uuid::new_v4());
        self.sessions.insert(access_token.clone(), user.id);
        AuthTokens {
            access_token,
            refresh_token: format!("mem-refresh-{}", Uuid::new_v4()),
            expires_in: Some(3600),
            user: user.clone(),
        }
    }

    /// Fill the primary key, `created_at` and column defaults, then append.
    fn store_row(&mut self, table: Table, mut row: Row) -> Row {
        if !row.contains_key("id") && table != Table::UserRoles {
            row.insert("id".into(), json!(Uuid::new_v4()));
        }
        if !row.contains_key("created_at") {
            let stamp = self.next_timestamp();
            row.insert("created_at".into(), json!(stamp));
        }
        for (column, default) in column_defaults(table) {
            row.entry(column).or_insert(default);
        }
        self.table_mut(table).push(row.clone());
        row
    }

    /// Index of an existing row colliding with `row` on any unique key.
    fn find_conflict(&self, table: Table, row: &Row) -> Option<usize> {
        let rows = self.table(table);
        if let Some(id) = row.get("id")
            && let Some(index) = rows.iter().position(|r| r.get("id") == Some(id))
        {
            return Some(index);
        }
        unique_keys(table).iter().find_map(|columns| {
            rows.iter()
                .position(|existing| same_on(existing, row, columns))
        })
    }

    fn matching(&self, table: Table, query: &Query) -> Vec<usize> {
        self.table(table)
            .iter()
            .enumerate()
            .filter(|(_, row)| query.filters().iter().all(|f| filter_matches(row, f)))
            .map(|(index, _)| index)
            .collect()
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Column selection
    // ─────────────────────────────────────────────────────────────────────────

    fn project(&self, table: Table, row: &Row, select: &str) -> Result<Value, BackendError> {
        let mut out = Map::new();
        for item in split_top_level(select) {
            match parse_select_item(item)? {
                SelectItem::Star => out.extend(row.clone()),
                SelectItem::Column(column) => {
                    out.insert(
                        column.to_string(),
                        row.get(column).cloned().unwrap_or(Value::Null),
                    );
                }
                SelectItem::Embed { key, table: target, columns } => {
                    let embedded = self.embed(table, row, target, columns)?;
                    out.insert(key.to_string(), embedded);
                }
            }
        }
        Ok(Value::Object(out))
    }

    fn embed(&self, from: Table, row: &Row, to: Table, columns: &str) -> Result<Value, BackendError> {
        if let Some(column) = foreign_key(from, to) {
            let target = row.get(column).filter(|v| !v.is_null());
            let found = target.and_then(|id| self.table(to).iter().find(|r| r.get("id") == Some(id)));
            return match found {
                Some(found) => self.project(to, found, columns),
                None => Ok(Value::Null),
            };
        }
        if let Some(column) = foreign_key(to, from) {
            let id = row.get("id");
            let children = self
                .table(to)
                .iter()
                .filter(|r| id.is_some() && r.get(column) == id)
                .map(|r| self.project(to, r, columns))
                .collect::<Result<Vec<_>, _>>()?;
            return Ok(Value::Array(children));
        }
        Err(BackendError::Api {
            status: 400,
            message: format!("Could not find a relationship between '{from}' and '{to}'"),
        })
    }
}

fn same_on(a: &Row, b: &Row, columns: &[&str]) -> bool {
    columns.iter().all(|column| {
        let left = a.get(*column).filter(|v| !v.is_null());
        left.is_some() && left == b.get(*column)
    })
}

enum SelectItem<'a> {
    Star,
    Column(&'a str),
    Embed {
        key: &'a str,
        table: Table,
        columns: &'a str,
    },
}

/// Split a select list on commas outside parentheses.
fn split_top_level(select: &str) -> Vec<&str> {
    let mut items = Vec::new();
    let mut depth = 0usize;
    let mut start = 0;
    for (index, c) in select.char_indices() {
        match c {
            '(' => depth += 1,
            ')' => depth = depth.saturating_sub(1),
            ',' if depth == 0 => {
                items.push(select[start..index].trim());
                start = index + 1;
            }
            _ => {}
        }
    }
    items.push(select[start..].trim());
    items.into_iter().filter(|item| !item.is_empty()).collect()
}

/// Parse `*`, `column`, or `[alias:]table[!hint](columns)`.
fn parse_select_item(item: &str) -> Result<SelectItem<'_>, BackendError> {
    if item == "*" {
        return Ok(SelectItem::Star);
    }
    let Some(open) = item.find('(') else {
        return Ok(SelectItem::Column(item));
    };
    let head = item[..open].trim();
    let columns = item[open + 1..].strip_suffix(')').ok_or_else(|| BackendError::Api {
        status: 400,
        message: format!("unbalanced select item '{item}'"),
    })?;
    // `alias:relation!hint(...)`; without an alias the key is the bare relation.
    let (alias, relation) = head.split_once(':').map_or((None, head), |(a, r)| (Some(a), r));
    let name = relation.split('!').next().unwrap_or(relation).trim();
    let key = alias.unwrap_or(name);
    let table = Table::from_name(name).ok_or_else(|| BackendError::Api {
        status: 400,
        message: format!("unknown relation '{name}'"),
    })?;
    Ok(SelectItem::Embed {
        key: key.trim(),
        table,
        columns: columns.trim(),
    })
}

// ─────────────────────────────────────────────────────────────────────────────
// Filtering and ordering
// ─────────────────────────────────────────────────────────────────────────────

/// Text form of a column value, as the data API compares it.
fn as_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Null | Value::Array(_) | Value::Object(_) => None,
    }
}

fn text_equals(left: &str, right: &str) -> bool {
    match (left.parse::<f64>(), right.parse::<f64>()) {
        (Ok(a), Ok(b)) => (a - b).abs() < f64::EPSILON,
        _ => left == right,
    }
}

fn filter_matches(row: &Row, filter: &Filter) -> bool {
    let Some(cell) = row.get(filter.column()).and_then(as_text) else {
        return false;
    };
    match filter {
        Filter::Eq(_, value) => text_equals(&cell, value),
        Filter::Neq(_, value) => !text_equals(&cell, value),
        Filter::Gt(_, value) => match (cell.parse::<f64>(), value.parse::<f64>()) {
            (Ok(a), Ok(b)) => a > b,
            _ => cell.as_str() > value.as_str(),
        },
        Filter::In(_, values) => values.iter().any(|v| text_equals(&cell, v)),
        Filter::Contains(_, needle) => cell.to_lowercase().contains(&needle.to_lowercase()),
    }
}

/// Nulls sort last in both directions.
fn compare_cells(a: Option<&Value>, b: Option<&Value>, order: SortOrder) -> std::cmp::Ordering {
    use std::cmp::Ordering;

    let a = a.and_then(as_text);
    let b = b.and_then(as_text);
    let ordering = match (&a, &b) {
        (None, None) => return Ordering::Equal,
        (None, Some(_)) => return Ordering::Greater,
        (Some(_), None) => return Ordering::Less,
        (Some(a), Some(b)) => match (a.parse::<f64>(), b.parse::<f64>()) {
            (Ok(x), Ok(y)) => x.partial_cmp(&y).unwrap_or(Ordering::Equal),
            _ => a.cmp(b),
        },
    };
    match order {
        SortOrder::Asc => ordering,
        SortOrder::Desc => ordering.reverse(),
    }
}

fn into_rows(rows: Vec<Value>) -> Result<Vec<Row>, BackendError> {
    rows.into_iter()
        .map(|row| match row {
            Value::Object(row) => Ok(row),
            other => Err(BackendError::Api {
                status: 400,
                message: format!("expected an object row, got {other}"),
            }),
        })
        .collect()
}

// ─────────────────────────────────────────────────────────────────────────────
// Data API
// ─────────────────────────────────────────────────────────────────────────────

#[async_trait]
impl DataApi for MemoryBackend {
    async fn select(
        &self,
        _bearer: Option<&str>,
        table: Table,
        query: &Query,
    ) -> Result<Vec<Value>, BackendError> {
        let state = self.state();
        state.check_read(table)?;

        let rows = state.table(table);
        let mut selected: Vec<&Row> = state.matching(table, query).into_iter().map(|i| &rows[i]).collect();
        selected.sort_by(|a, b| {
            query
                .ordering()
                .iter()
                .map(|(column, order)| compare_cells(a.get(column), b.get(column), *order))
                .find(|ordering| ordering.is_ne())
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        if let Some(limit) = query.row_limit() {
            selected.truncate(limit);
        }

        let columns = query.selected_columns().unwrap_or("*");
        selected
            .into_iter()
            .map(|row| state.project(table, row, columns))
            .collect()
    }

    async fn count(
        &self,
        _bearer: Option<&str>,
        table: Table,
        query: &Query,
    ) -> Result<u64, BackendError> {
        let state = self.state();
        state.check_read(table)?;
        Ok(state.matching(table, query).len() as u64)
    }

    async fn insert(
        &self,
        _bearer: Option<&str>,
        table: Table,
        rows: Vec<Value>,
    ) -> Result<Vec<Value>, BackendError> {
        let mut state = self.state();
        state.check_write(table)?;
        let rows = into_rows(rows)?;

        // All-or-nothing, like a single INSERT statement.
        for (index, row) in rows.iter().enumerate() {
            let clashes_with_batch = rows[..index]
                .iter()
                .any(|earlier| unique_keys(table).iter().any(|cols| same_on(earlier, row, cols)));
            if clashes_with_batch || state.find_conflict(table, row).is_some() {
                return Err(BackendError::Conflict(format!(
                    "duplicate key value violates unique constraint on {table}"
                )));
            }
        }

        Ok(rows
            .into_iter()
            .map(|row| Value::Object(state.store_row(table, row)))
            .collect())
    }

    async fn upsert(
        &self,
        _bearer: Option<&str>,
        table: Table,
        rows: Vec<Value>,
        on_conflict: &[&str],
    ) -> Result<Vec<Value>, BackendError> {
        let mut state = self.state();
        state.check_write(table)?;
        let rows = into_rows(rows)?;

        let mut stored = Vec::with_capacity(rows.len());
        for row in rows {
            let existing = state
                .table(table)
                .iter()
                .position(|r| same_on(r, &row, on_conflict));
            match existing {
                Some(index) => {
                    let target = &mut state.table_mut(table)[index];
                    for (column, value) in row {
                        target.insert(column, value);
                    }
                    stored.push(Value::Object(target.clone()));
                }
                None => stored.push(Value::Object(state.store_row(table, row))),
            }
        }
        Ok(stored)
    }

    async fn update(
        &self,
        _bearer: Option<&str>,
        table: Table,
        query: &Query,
        patch: Value,
    ) -> Result<Vec<Value>, BackendError> {
        let mut state = self.state();
        state.check_write(table)?;
        let Value::Object(patch) = patch else {
            return Err(BackendError::Api {
                status: 400,
                message: "update body must be an object".to_string(),
            });
        };

        let indices = state.matching(table, query);
        let rows = state.table_mut(table);
        Ok(indices
            .into_iter()
            .map(|index| {
                let row = &mut rows[index];
                for (column, value) in &patch {
                    row.insert(column.clone(), value.clone());
                }
                Value::Object(row.clone())
            })
            .collect())
    }

    async fn delete(
        &self,
        _bearer: Option<&str>,
        table: Table,
        query: &Query,
    ) -> Result<Vec<Value>, BackendError> {
        let mut state = self.state();
        state.check_write(table)?;
        let rows = std::mem::take(state.table_mut(table));
        let (removed, kept): (Vec<Row>, Vec<Row>) = rows
            .into_iter()
            .partition(|row| query.filters().iter().all(|f| filter_matches(row, f)));
        *state.table_mut(table) = kept;
        Ok(removed.into_iter().map(Value::Object).collect())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Auth API
// ─────────────────────────────────────────────────────────────────────────────

#[async_trait]
impl AuthApi for MemoryBackend {
    async fn sign_up(
        &self,
        email: &Email,
        password: &SecretString,
        full_name: &str,
    ) -> Result<SignUpOutcome, BackendError> {
        let mut state = self.state();
        if state.users.iter().any(|u| u.email == email.as_str()) {
            return Err(BackendError::Api {
                status: 422,
                message: "User already registered".to_string(),
            });
        }

        let id = state.create_user(email.as_str(), password.expose_secret(), full_name);
        state.grant_role(id, Role::Customer);
        let user = state
            .users
            .iter()
            .find(|u| u.id == id)
            .map(MemoryUser::to_auth_user)
            .ok_or_else(|| BackendError::NotFound("user".to_string()))?;

        if state.require_confirmation {
            return Ok(SignUpOutcome::ConfirmationPending(user));
        }
        Ok(SignUpOutcome::Session(state.issue_tokens(&user)))
    }

    async fn sign_in_with_password(
        &self,
        email: &Email,
        password: &SecretString,
    ) -> Result<AuthTokens, BackendError> {
        let mut state = self.state();
        let user = state
            .users
            .iter()
            .find(|u| u.email == email.as_str() && u.password == password.expose_secret())
            .map(MemoryUser::to_auth_user)
            .ok_or_else(|| BackendError::Api {
                status: 400,
                message: "Invalid login credentials".to_string(),
            })?;
        Ok(state.issue_tokens(&user))
    }

    async fn sign_out(&self, access_token: &str) -> Result<(), BackendError> {
        self.state().sessions.remove(access_token);
        Ok(())
    }

    async fn get_user(&self, access_token: &str) -> Result<AuthUser, BackendError> {
        let state = self.state();
        let id = state
            .sessions
            .get(access_token)
            .copied()
            .ok_or_else(|| BackendError::Unauthorized("invalid JWT".to_string()))?;
        state
            .users
            .iter()
            .find(|u| u.id == id)
            .map(MemoryUser::to_auth_user)
            .ok_or_else(|| BackendError::NotFound("user".to_string()))
    }
}
