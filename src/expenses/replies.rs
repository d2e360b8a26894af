//! Fixed reply texts, rendered once from the vocabulary.

use crate::classifier::Command;
use crate::config::Vocabulary;
use crate::expenses::record::unsaved_summary;
use crate::parser::Slots;

pub struct Replies {
    help: String,
    unknown: String,
    admin: String,
}

impl Replies {
    pub fn new(vocabulary: &Vocabulary, admin_username: &str) -> Self {
        let admin = if admin_username.is_empty() {
            String::new()
        } else {
            format!(
                "\n\nПо всем вопросам обращайтесь к админу @{}",
                admin_username.trim_start_matches('@')
            )
        };

        let commands = vocabulary
            .commands
            .iter()
            .map(|c| format!("/{} : {}", c.keyword(), command_help(*c)))
            .collect::<Vec<_>>()
            .join("\n");

        let how_to = format!(
            "Чтобы добавить покупку, введите в любом порядке через пробел: категорию, \
             сумму (целое число), описание (не должно содержать названий категорий и чисел), \
             например:\n\"300 сытный обед {}\"\n\n\
             Чтобы отметить покупку как {}, добавьте это слово.\n\nКатегории:\n{}",
            vocabulary.categories.first().map(String::as_str).unwrap_or_default(),
            vocabulary.flag_token,
            vocabulary.categories.join("\n")
        );

        let help = format!("{}\n{}{}", commands, how_to, admin);
        let unknown = format!("Неизвестная команда\n\n{}", help);
        Self { help, unknown, admin }
    }

    pub fn help(&self) -> &str {
        &self.help
    }

    pub fn unknown(&self) -> &str {
        &self.unknown
    }

    /// Explains what was recovered from an entry that was not saved.
    pub fn not_saved(&self, slots: &Slots, person: &str) -> String {
        format!("Не могу сохранить покупку: {}{}", unsaved_summary(slots, person), self.admin)
    }

    pub fn stats_unavailable(&self) -> String {
        format!("Не могу посчитать статистику, попробуйте позже{}", self.admin)
    }
}

fn command_help(command: Command) -> &'static str {
    match command {
        Command::Help => "помощь",
        Command::Stats => "статистика расходов за месяц",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Person;

    fn vocabulary() -> Vocabulary {
        Vocabulary::new(
            vec!["еда".into(), "транспорт".into()],
            vec![Person::new("alice", "аня")],
            "буржуйство",
        )
        .unwrap()
    }

    #[test]
    fn test_help_lists_commands_and_categories() {
        let replies = Replies::new(&vocabulary(), "boss");
        let help = replies.help();
        assert!(help.starts_with("/help : помощь\n/stats : статистика расходов за месяц\n"));
        assert!(help.contains("Категории:\nеда\nтранспорт"));
        assert!(help.ends_with("обращайтесь к админу @boss"));
    }

    #[test]
    fn test_unknown_prefixes_help() {
        let replies = Replies::new(&vocabulary(), "@boss");
        assert_eq!(replies.unknown(), format!("Неизвестная команда\n\n{}", replies.help()));
        assert!(!replies.help().contains("@@"));
    }

    #[test]
    fn test_no_admin_line_without_admin() {
        let replies = Replies::new(&vocabulary(), "");
        assert!(!replies.help().contains("админу"));
    }

    #[test]
    fn test_not_saved() {
        let replies = Replies::new(&vocabulary(), "boss");
        let slots = Slots {
            category: Some("еда".to_string()),
            amount: None,
            description: "обед".to_string(),
            flag: false,
        };
        let text = replies.not_saved(&slots, "аня");
        assert!(text.starts_with("Не могу сохранить покупку: категория еда, сумма —"));
        assert!(text.contains("кто аня"));
        assert!(text.ends_with("@boss"));
    }
}
