use clap::{Parser, ValueEnum};

#[derive(Copy, Clone, PartialEq, Eq, Debug, ValueEnum)]
pub enum Command {
    Post,
    Fetch,
    Sweep,
    Whoami,
}

#[derive(Parser, Debug, Default)]
#[command(
    about = concat!(env!("CARGO_CRATE_NAME"), " - ephemeral anonymous posts, gone in 24 hours"),
)]
pub struct Flags {
    /// post, fetch, sweep or whoami; opens the feed when omitted
    #[arg(default_value = None)]
    pub command: Option<Command>,

    /// post body, skips $EDITOR
    #[arg(short, long)]
    pub message: Option<String>,

    /// image URL attached to the post
    #[arg(short, long)]
    pub image: Option<String>,

    /// run against an in-memory backend
    #[arg(long)]
    pub offline: bool,
}

impl Flags {
    /// Parse from `std::env::args_os()`, [exit][clap::Error::exit] on error.
    pub fn from_args() -> Self {
        Self::parse()
    }

    /// Check if the command is "post"
    pub fn post(&self) -> bool {
        matches!(self.command, Some(Command::Post))
    }

    /// Check if the command is "fetch"
    pub fn fetch(&self) -> bool {
        matches!(self.command, Some(Command::Fetch))
    }

    pub fn sweep(&self) -> bool {
        matches!(self.command, Some(Command::Sweep))
    }

    pub fn whoami(&self) -> bool {
        matches!(self.command, Some(Command::Whoami))
    }
}
