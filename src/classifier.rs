use teloxide::utils::command::BotCommands;

use crate::parser::{ParseFailure, SlotParser, Slots};

/// Literal commands the bot answers to.
#[derive(BotCommands, Debug, Clone, Copy, PartialEq, Eq)]
#[command(rename_rule = "lowercase", description = "Команды:")]
pub enum Command {
    #[command(description = "помощь")]
    Help,
    #[command(description = "статистика расходов за месяц")]
    Stats,
}

impl Command {
    pub const ALL: [Command; 2] = [Command::Help, Command::Stats];

    pub fn keyword(self) -> &'static str {
        match self {
            Command::Help => "help",
            Command::Stats => "stats",
        }
    }
}

/// What an inbound message is asking for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Intent {
    Command(Command),
    /// The line segmented as an expense entry; slots travel with the intent.
    AddEntry(Slots),
    Unknown(ParseFailure),
}

impl Intent {
    pub fn name(&self) -> &'static str {
        match self {
            Intent::Command(command) => command.keyword(),
            Intent::AddEntry(_) => "add_entry",
            Intent::Unknown(_) => "unknown",
        }
    }
}

/// Trim and lowercase a message before classification.
pub fn normalize(text: &str) -> String {
    text.trim().to_lowercase()
}

/// Exact command match wins; otherwise the line is tried as an entry.
pub fn classify(text: &str, commands: &[Command], parser: &SlotParser) -> Intent {
    let text = normalize(text);
    if let Some(command) = commands.iter().find(|c| c.keyword() == text) {
        return Intent::Command(*command);
    }
    match parser.parse(&text) {
        Ok(slots) => Intent::AddEntry(slots),
        Err(failure) => Intent::Unknown(failure),
    }
}
