use clap::{Parser, Subcommand, ValueEnum};

#[derive(Parser, Debug)]
#[command(name = "onion-forum-scanner")]
#[command(about = "Detect and extract discussion forums on onion services")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Command>,
}

impl Cli {
    /// The requested command, `run` when none was given.
    #[must_use]
    pub fn command(self) -> Command {
        self.command.unwrap_or(Command::Run)
    }
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Start the persistence worker and the watchlist scheduler
    Run,

    /// Scan a single address and print the result as JSON
    Scan {
        /// Onion address or URL
        url: String,

        /// Pick a random user agent from the stored pool
        #[arg(long)]
        random_ua: bool,
    },

    /// Manage watchlist entries
    Watch {
        #[command(subcommand)]
        action: WatchAction,
    },

    /// Manage category keywords
    Keyword {
        #[command(subcommand)]
        action: KeywordAction,
    },

    /// Manage the user-agent pool
    Agent {
        #[command(subcommand)]
        action: AgentAction,
    },
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum WatchAction {
    /// Track an address
    Add {
        url: String,

        /// Minutes between scans
        #[arg(long, default_value_t = 60, value_parser = clap::value_parser!(i64).range(1..))]
        interval: i64,

        #[arg(long)]
        description: Option<String>,
    },

    /// List all entries
    List,

    /// Enable or disable an entry
    Toggle { id: i64, state: Toggle },
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Toggle {
    On,
    Off,
}

impl Toggle {
    #[must_use]
    pub const fn is_on(self) -> bool {
        matches!(self, Self::On)
    }
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum KeywordAction {
    /// Add a keyword. Earlier keywords win when several match.
    Add {
        word: String,
        category: String,

        /// Display color for the category
        #[arg(long, default_value = "")]
        color: String,
    },
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum AgentAction {
    /// Add a user agent
    Add { user_agent: String },
}
