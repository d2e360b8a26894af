//! Monthly spending report.
//!
//! ```text
//! общая сумма: 1550
//!
//! еда: 1500
//! транспорт: 50
//!
//! аня: 1350
//! боря: 200
//!
//! буржуйство: 250
//!
//! аня: 50
//! боря: 200
//! ```

use crate::config::Vocabulary;
use crate::expenses::database::{EntryFilter, ExpenseStore, GroupField, StorageError, YearMonth};

/// Compose the report for one month. Groups with no records show 0.
pub fn monthly_report<S: ExpenseStore + ?Sized>(
    store: &S,
    vocabulary: &Vocabulary,
    month: YearMonth,
) -> Result<String, StorageError> {
    let all = EntryFilter::month(month);
    let flagged = all.flagged();
    let people = vocabulary.person_names();

    let total = store.aggregate_sum(&all)?;
    let by_category = store.aggregate_sum_grouped_by(GroupField::Category, &vocabulary.categories, &all)?;
    let by_person = store.aggregate_sum_grouped_by(GroupField::Person, &people, &all)?;
    let flagged_total = store.aggregate_sum(&flagged)?;
    let flagged_by_person = store.aggregate_sum_grouped_by(GroupField::Person, &people, &flagged)?;

    let blocks = [
        format!("общая сумма: {}", amount(total)),
        lines(&by_category),
        lines(&by_person),
        format!("{}: {}", vocabulary.flag_token, amount(flagged_total)),
        lines(&flagged_by_person),
    ];
    Ok(blocks.join("\n\n"))
}

fn lines(sums: &[(String, Option<i64>)]) -> String {
    sums.iter()
        .map(|(label, sum)| format!("{}: {}", label, amount(*sum)))
        .collect::<Vec<_>>()
        .join("\n")
}

fn amount(sum: Option<i64>) -> i64 {
    sum.unwrap_or(0)
}
