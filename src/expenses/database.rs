//! SQLite storage for expense records and their sums.

use chrono::{DateTime, Datelike, Utc};
use chrono_tz::Tz;
use rusqlite::types::Value;
use rusqlite::{Connection, params, params_from_iter};
use std::collections::HashMap;
use std::fmt;
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use tracing::{debug, info};

use crate::expenses::record::{ExpenseRecord, NewExpense};

/// Storage failure. Never shown to users.
#[derive(Debug)]
pub struct StorageError(rusqlite::Error);

impl fmt::Display for StorageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "database error: {}", self.0)
    }
}

impl std::error::Error for StorageError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.0)
    }
}

impl From<rusqlite::Error> for StorageError {
    fn from(e: rusqlite::Error) -> Self {
        Self(e)
    }
}

/// Calendar month, e.g. `2024-01`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct YearMonth {
    pub year: i32,
    pub month: u32,
}

impl YearMonth {
    pub fn of<D: Datelike>(date: &D) -> Self {
        Self {
            year: date.year(),
            month: date.month(),
        }
    }
}

impl fmt::Display for YearMonth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month)
    }
}

/// Which records an aggregate covers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EntryFilter {
    pub month: Option<YearMonth>,
    pub flagged_only: bool,
}

impl EntryFilter {
    pub fn month(month: YearMonth) -> Self {
        Self {
            month: Some(month),
            flagged_only: false,
        }
    }

    pub fn flagged(self) -> Self {
        Self {
            flagged_only: true,
            ..self
        }
    }
}

/// Field sums can be grouped by.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GroupField {
    Category,
    Person,
}

impl GroupField {
    fn column(self) -> &'static str {
        match self {
            GroupField::Category => "category",
            GroupField::Person => "person",
        }
    }
}

/// Persistence and aggregation of expense records.
pub trait ExpenseStore {
    /// Persist an expense; the store assigns id and timestamp.
    fn store(&self, expense: NewExpense) -> Result<ExpenseRecord, StorageError>;

    /// Sum of amounts matching `filter`, `None` if nothing matches.
    fn aggregate_sum(&self, filter: &EntryFilter) -> Result<Option<i64>, StorageError>;

    /// One `(label, sum)` pair per label, in the order given.
    fn aggregate_sum_grouped_by(
        &self,
        field: GroupField,
        labels: &[String],
        filter: &EntryFilter,
    ) -> Result<Vec<(String, Option<i64>)>, StorageError>;
}

/// SQLite-backed expense store.
pub struct Database {
    conn: Mutex<Connection>,
    tz: Tz,
}

impl Database {
    /// Create a new in-memory database.
    pub fn in_memory(tz: Tz) -> Result<Self, StorageError> {
        let db = Self {
            conn: Mutex::new(Connection::open_in_memory()?),
            tz,
        };
        db.init_schema()?;
        Ok(db)
    }

    /// Open the database file, creating it and the schema if needed.
    pub fn load_or_new(path: &Path, tz: Tz) -> Result<Self, StorageError> {
        let db = Self {
            conn: Mutex::new(Connection::open(path)?),
            tz,
        };
        db.init_schema()?;
        info!("Loaded database from {:?} ({} expenses)", path, db.entry_count()?);
        Ok(db)
    }

    fn init_schema(&self) -> Result<(), StorageError> {
        self.lock().execute_batch(r#"
            CREATE TABLE IF NOT EXISTS expenses (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                category TEXT NOT NULL,
                person TEXT NOT NULL,
                amount INTEGER NOT NULL DEFAULT 0,
                description TEXT NOT NULL DEFAULT '',
                flagged INTEGER NOT NULL DEFAULT 0,
                created_at TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_expenses_created_at ON expenses(created_at);
        "#)?;
        Ok(())
    }

    fn lock(&self) -> MutexGuard<'_, Connection> {
        // A panic mid-statement leaves nothing half-written in SQLite.
        self.conn.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn entry_count(&self) -> Result<usize, StorageError> {
        let count: i64 = self
            .lock()
            .query_row("SELECT COUNT(*) FROM expenses", [], |row| row.get(0))?;
        Ok(count as usize)
    }

    /// Store an expense stamped with the given instant.
    pub fn store_at(&self, expense: NewExpense, at: DateTime<Utc>) -> Result<ExpenseRecord, StorageError> {
        let created_at = at.with_timezone(&self.tz).format("%Y-%m-%d %H:%M").to_string();
        let conn = self.lock();
        conn.execute(
            "INSERT INTO expenses (category, person, amount, description, flagged, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                expense.category,
                expense.person,
                expense.amount,
                expense.description,
                expense.flagged,
                created_at
            ],
        )?;
        let id = conn.last_insert_rowid();
        debug!("Stored expense #{id} ({} {})", expense.category, expense.amount);

        Ok(ExpenseRecord {
            id,
            category: expense.category,
            person: expense.person,
            amount: expense.amount,
            description: expense.description,
            flagged: expense.flagged,
            created_at,
        })
    }
}

/// WHERE clause and its positional values for a filter.
fn filter_sql(filter: &EntryFilter) -> (String, Vec<Value>) {
    let mut conditions = Vec::new();
    let mut values = Vec::new();
    if let Some(month) = filter.month {
        conditions.push("substr(created_at, 1, 7) = ?");
        values.push(Value::Text(month.to_string()));
    }
    if filter.flagged_only {
        conditions.push("flagged = 1");
    }
    let clause = if conditions.is_empty() {
        String::new()
    } else {
        format!(" WHERE {}", conditions.join(" AND "))
    };
    (clause, values)
}

impl ExpenseStore for Database {
    fn store(&self, expense: NewExpense) -> Result<ExpenseRecord, StorageError> {
        self.store_at(expense, Utc::now())
    }

    fn aggregate_sum(&self, filter: &EntryFilter) -> Result<Option<i64>, StorageError> {
        let (clause, values) = filter_sql(filter);
        let sql = format!("SELECT SUM(amount) FROM expenses{clause}");
        let sum = self
            .lock()
            .query_row(&sql, params_from_iter(values), |row| row.get::<_, Option<i64>>(0))?;
        Ok(sum)
    }

    fn aggregate_sum_grouped_by(
        &self,
        field: GroupField,
        labels: &[String],
        filter: &EntryFilter,
    ) -> Result<Vec<(String, Option<i64>)>, StorageError> {
        let (clause, values) = filter_sql(filter);
        let column = field.column();
        let sql = format!("SELECT {column}, SUM(amount) FROM expenses{clause} GROUP BY {column}");

        let conn = self.lock();
        let mut stmt = conn.prepare(&sql)?;
        let sums = stmt
            .query_map(params_from_iter(values), |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, Option<i64>>(1)?))
            })?
            .collect::<Result<HashMap<_, _>, _>>()?;

        Ok(labels
            .iter()
            .map(|label| (label.clone(), sums.get(label).copied().flatten()))
            .collect())
    }
}
