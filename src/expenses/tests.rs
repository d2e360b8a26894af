//! Dialogue scenarios: one inbound text in, one reply out.
//!
//! Run with: cargo test expenses

use std::sync::Arc;

use super::*;
use crate::classifier::{Command, Intent};
use crate::config::{Person, Vocabulary};
use crate::parser::Slots;

fn vocabulary() -> Arc<Vocabulary> {
    Arc::new(
        Vocabulary::new(
            vec!["еда".into(), "транспорт".into()],
            vec![Person::new("alice", "аня"), Person::new("bob", "боря")],
            "буржуйство",
        )
        .unwrap(),
    )
}

fn dialogue() -> Dialogue<Database> {
    let db = Database::in_memory(chrono_tz::UTC).unwrap();
    Dialogue::new(vocabulary(), db, "boss", chrono_tz::UTC)
}

fn anya() -> Person {
    Person::new("alice", "аня")
}

/// Store whose writes and reads always fail.
struct BrokenStore;

fn broken() -> StorageError {
    StorageError::from(rusqlite::Error::QueryReturnedNoRows)
}

impl ExpenseStore for BrokenStore {
    fn store(&self, _expense: NewExpense) -> Result<ExpenseRecord, StorageError> {
        Err(broken())
    }

    fn aggregate_sum(&self, _filter: &EntryFilter) -> Result<Option<i64>, StorageError> {
        Err(broken())
    }

    fn aggregate_sum_grouped_by(
        &self,
        _field: GroupField,
        _labels: &[String],
        _filter: &EntryFilter,
    ) -> Result<Vec<(String, Option<i64>)>, StorageError> {
        Err(broken())
    }
}

// =============================================================================
// COMMANDS
// =============================================================================

mod commands {
    use super::*;

    #[test]
    fn test_help() {
        let reply = dialogue().respond(&anya(), "help");
        assert!(reply.starts_with("/help : помощь"));
        assert!(reply.contains("Категории:\nеда\nтранспорт"));
    }

    #[test]
    fn test_unknown_includes_help() {
        let reply = dialogue().respond(&anya(), "еда 300руб");
        assert!(reply.starts_with("Неизвестная команда\n\n/help"));
    }

    #[test]
    fn test_whitespace_is_unknown() {
        let reply = dialogue().respond(&anya(), "   ");
        assert!(reply.starts_with("Неизвестная команда"));
    }

    #[test]
    fn test_stats_without_entries() {
        let reply = dialogue().respond(&anya(), "STATS");
        assert!(reply.starts_with("общая сумма: 0"));
        assert!(reply.contains("аня: 0\nборя: 0"));
    }
}

// =============================================================================
// ADDING ENTRIES
// =============================================================================

mod add_entry {
    use super::*;

    #[test]
    fn test_saves_and_echoes_record() {
        let dialogue = dialogue();
        let reply = dialogue.respond(&anya(), "еда 300 обед");
        assert_eq!(
            reply,
            "Сохранено: категория еда, сумма 300, описание обед, буржуйство нет, кто аня"
        );
    }

    #[test]
    fn test_flagged_entry_counts_in_stats() {
        let dialogue = dialogue();
        dialogue.respond(&anya(), "300 сытный обед еда буржуйство");
        dialogue.respond(&Person::new("bob", "боря"), "транспорт 50 такси");

        let reply = dialogue.respond(&anya(), "stats");
        assert!(reply.starts_with("общая сумма: 350\n\n"));
        assert!(reply.contains("еда: 300\nтранспорт: 50"));
        assert!(reply.contains("буржуйство: 300\n\nаня: 300\nборя: 0"));
    }

    #[test]
    fn test_missing_amount_is_not_saved() {
        let dialogue = dialogue();
        let reply = dialogue.respond(&anya(), "еда обед");
        assert!(reply.starts_with("Не могу сохранить покупку: категория еда, сумма —"));
        assert!(reply.contains("кто аня"));
        assert!(reply.ends_with("@boss"));
        assert!(dialogue.respond(&anya(), "stats").starts_with("общая сумма: 0"));
    }

    #[test]
    fn test_missing_category_is_not_saved() {
        let reply = dialogue().respond(&anya(), "300 обед");
        assert!(reply.starts_with("Не могу сохранить покупку: категория —, сумма 300"));
    }

    #[test]
    fn test_storage_failure_falls_back_to_explanation() {
        let dialogue = Dialogue::new(vocabulary(), BrokenStore, "boss", chrono_tz::UTC);
        let reply = dialogue.respond(&anya(), "еда 300 обед");
        assert!(reply.starts_with("Не могу сохранить покупку: категория еда, сумма 300, описание обед"));
        assert!(!reply.contains("database"));
    }

    #[test]
    fn test_stats_failure_is_explained() {
        let dialogue = Dialogue::new(vocabulary(), BrokenStore, "boss", chrono_tz::UTC);
        let reply = dialogue.respond(&anya(), "stats");
        assert!(reply.starts_with("Не могу посчитать статистику"));
    }

    #[test]
    fn test_saved_reply_round_trips_slots() {
        let dialogue = dialogue();
        let slots = Slots {
            category: Some("транспорт".to_string()),
            amount: Some("120".to_string()),
            description: "метро туда и обратно".to_string(),
            flag: true,
        };
        let reply = dialogue.handle(Intent::AddEntry(slots), &anya());
        assert_eq!(
            reply,
            "Сохранено: категория транспорт, сумма 120, описание метро туда и обратно, буржуйство да, кто аня"
        );
    }

    #[test]
    fn test_last_category_word_wins() {
        let dialogue = dialogue();
        let reply = dialogue.respond(&anya(), "еда 100 транспорт");
        assert_eq!(
            reply,
            "Сохранено: категория транспорт, сумма 100, описание , буржуйство нет, кто аня"
        );
        let report = dialogue.respond(&anya(), "stats");
        assert!(report.contains("еда: 0\nтранспорт: 100"));
    }

    #[test]
    fn test_oversized_amount_is_not_saved() {
        let dialogue = dialogue();
        let reply = dialogue.respond(&anya(), "еда 9223372036854775807 x");
        assert!(reply.starts_with("Не могу сохранить покупку"));

        let reply = dialogue.respond(&anya(), "еда 1 y");
        assert!(reply.starts_with("Сохранено: категория еда, сумма 1"));
        assert!(dialogue.respond(&anya(), "stats").starts_with("общая сумма: 1\n\n"));
    }

    #[test]
    fn test_stats_with_largest_amounts() {
        let dialogue = dialogue();
        for _ in 0..3 {
            let reply = dialogue.respond(&anya(), "еда 4294967295 буржуйство");
            assert!(reply.starts_with("Сохранено"), "{reply}");
        }
        let report = dialogue.respond(&anya(), "stats");
        assert!(report.starts_with("общая сумма: 12884901885\n\n"), "{report}");
        assert!(report.contains("буржуйство: 12884901885"));
    }

    #[test]
    fn test_command_intent_skips_parsing() {
        let reply = dialogue().handle(Intent::Command(Command::Help), &anya());
        assert!(reply.starts_with("/help"));
    }
}
