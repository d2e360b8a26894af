//! Dialogue handler - turns one inbound text into one reply.

use chrono::Utc;
use chrono_tz::Tz;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::classifier::{Command, Intent, classify};
use crate::config::{Person, Vocabulary};
use crate::expenses::database::{ExpenseStore, YearMonth};
use crate::expenses::record::{EntryError, ExpenseRecord, NewExpense};
use crate::expenses::replies::Replies;
use crate::expenses::stats::monthly_report;
use crate::parser::{SlotParser, Slots};

pub struct Dialogue<S> {
    vocabulary: Arc<Vocabulary>,
    parser: SlotParser,
    replies: Replies,
    store: S,
    tz: Tz,
}

impl<S: ExpenseStore> Dialogue<S> {
    pub fn new(vocabulary: Arc<Vocabulary>, store: S, admin_username: &str, tz: Tz) -> Self {
        Self {
            parser: SlotParser::new(&vocabulary),
            replies: Replies::new(&vocabulary, admin_username),
            vocabulary,
            store,
            tz,
        }
    }

    pub fn vocabulary(&self) -> &Vocabulary {
        &self.vocabulary
    }

    /// Classify `text` from `person` and produce the reply.
    pub fn respond(&self, person: &Person, text: &str) -> String {
        let intent = classify(text, &self.vocabulary.commands, &self.parser);
        info!("{} → {}", person.name, intent.name());
        self.handle(intent, person)
    }

    pub fn handle(&self, intent: Intent, person: &Person) -> String {
        match intent {
            Intent::Command(Command::Help) => self.replies.help().to_string(),
            Intent::Command(Command::Stats) => {
                let now = Utc::now().with_timezone(&self.tz);
                self.stats(YearMonth::of(&now))
            }
            Intent::AddEntry(slots) => self.add_entry(&slots, person),
            Intent::Unknown(failure) => {
                debug!("Unparsed input: {failure}");
                self.replies.unknown().to_string()
            }
        }
    }

    /// Report for the given month.
    pub fn stats(&self, month: YearMonth) -> String {
        match monthly_report(&self.store, &self.vocabulary, month) {
            Ok(report) => report,
            Err(e) => {
                warn!("Failed to build stats for {month}: {e}");
                self.replies.stats_unavailable()
            }
        }
    }

    fn add_entry(&self, slots: &Slots, person: &Person) -> String {
        match self.save(slots, person) {
            Ok(record) => {
                info!("💾 Saved #{}: {} {} by {}", record.id, record.category, record.amount, record.person);
                record.summary()
            }
            Err(EntryError::Storage(e)) => {
                warn!("Failed to save entry: {e}");
                self.replies.not_saved(slots, &person.name)
            }
            Err(e) => {
                debug!("Entry not saved: {e}");
                self.replies.not_saved(slots, &person.name)
            }
        }
    }

    fn save(&self, slots: &Slots, person: &Person) -> Result<ExpenseRecord, EntryError> {
        let expense = NewExpense::from_slots(slots, &person.name)?;
        Ok(self.store.store(expense)?)
    }
}
