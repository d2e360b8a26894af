//! Expense tracking - records entries and reports monthly sums.

pub mod database;
pub mod dialogue;
pub mod record;
pub mod replies;
pub mod stats;
pub mod telegram;

#[cfg(test)]
mod tests;

pub use database::{Database, EntryFilter, ExpenseStore, GroupField, StorageError, YearMonth};
pub use dialogue::Dialogue;
pub use record::{EntryError, ExpenseRecord, NewExpense};
pub use telegram::{InboundEvent, MalformedEvent, TelegramClient};
