//! Expense records and their one-line summaries.

use std::fmt;

use crate::expenses::database::StorageError;
use crate::parser::{Slot, Slots};

/// Why a parsed entry did not become a stored record.
#[derive(Debug)]
pub enum EntryError {
    /// The line parsed but lacks a required slot.
    MissingSlot(Slot),
    /// The digit run is larger than `u32::MAX`.
    InvalidAmount(String),
    Storage(StorageError),
}

impl fmt::Display for EntryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingSlot(slot) => write!(f, "missing {}", slot),
            Self::InvalidAmount(digits) => write!(f, "amount out of range: {}", digits),
            Self::Storage(e) => write!(f, "storage failure: {}", e),
        }
    }
}

impl std::error::Error for EntryError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Storage(e) => Some(e),
            _ => None,
        }
    }
}

impl From<StorageError> for EntryError {
    fn from(e: StorageError) -> Self {
        Self::Storage(e)
    }
}

/// A complete entry waiting to be stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewExpense {
    pub category: String,
    pub person: String,
    pub amount: i64,
    pub description: String,
    pub flagged: bool,
}

impl NewExpense {
    /// Build an expense from parsed slots. Category and amount are required.
    pub fn from_slots(slots: &Slots, person: &str) -> Result<Self, EntryError> {
        let category = slots.category.clone().ok_or(EntryError::MissingSlot(Slot::Category))?;
        let digits = slots.amount.as_deref().ok_or(EntryError::MissingSlot(Slot::Amount))?;
        // Amounts fit u32, so SUM(amount) over a month stays within i64.
        let amount = digits
            .parse::<u32>()
            .map(i64::from)
            .map_err(|_| EntryError::InvalidAmount(digits.to_string()))?;

        Ok(Self {
            category,
            person: person.to_string(),
            amount,
            description: slots.description.clone(),
            flagged: slots.flag,
        })
    }
}

/// A stored expense.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExpenseRecord {
    pub id: i64,
    pub category: String,
    pub person: String,
    pub amount: i64,
    pub description: String,
    pub flagged: bool,
    /// Local time of insertion, `%Y-%m-%d %H:%M`.
    pub created_at: String,
}

impl ExpenseRecord {
    /// Reply sent back after a successful save.
    ///
    /// ```text
    /// Сохранено: категория еда, сумма 300, описание обед, буржуйство нет, кто аня
    /// ```
    pub fn summary(&self) -> String {
        format!(
            "Сохранено: категория {}, сумма {}, описание {}, буржуйство {}, кто {}",
            self.category,
            self.amount,
            self.description,
            yes_no(self.flagged),
            self.person
        )
    }
}

/// What was recovered from a line that could not be saved.
pub fn unsaved_summary(slots: &Slots, person: &str) -> String {
    format!(
        "категория {}, сумма {}, описание {}, буржуйство {} кто {}",
        slots.category.as_deref().unwrap_or(MISSING),
        slots.amount.as_deref().unwrap_or(MISSING),
        slots.description,
        yes_no(slots.flag),
        person
    )
}

const MISSING: &str = "—";

fn yes_no(flag: bool) -> &'static str {
    if flag { "да" } else { "нет" }
}
