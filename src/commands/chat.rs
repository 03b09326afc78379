use std::io::{BufRead, IsTerminal, Lines, StdinLock};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::Args;
use rand::rngs::StdRng;
use rand::{RngCore, SeedableRng};

use super::doctor::OutputFormat;
use crate::agent::{Author, ConversationSession, ThreadScheduler, TurnScheduler};
use crate::config::resolve_lexicon;
use crate::error::{CompanionError, ExitError};
use crate::render::{self, Renderer};

const QUIT: &str = "/quit";
const POLL_INTERVAL: Duration = Duration::from_millis(25);

#[derive(Debug, Args)]
pub struct ChatArgs {
    /// Lexicon file (defaults to $COMPANION_CONFIG, then the user config dir)
    #[arg(long)]
    pub config: Option<PathBuf>,
    /// Override the reply delay in milliseconds
    #[arg(long)]
    pub delay_ms: Option<u64>,
    /// Seed for fallback reply selection (reproducible sessions)
    #[arg(long)]
    pub seed: Option<u64>,
    /// Output format (json prints one turn object per line)
    #[arg(long, value_enum)]
    pub format: Option<OutputFormat>,
}

enum InputSource {
    Terminal,
    Piped(Lines<StdinLock<'static>>),
}

impl InputSource {
    fn detect() -> Self {
        if std::io::stdin().is_terminal() && std::io::stdout().is_terminal() {
            InputSource::Terminal
        } else {
            InputSource::Piped(std::io::stdin().lock().lines())
        }
    }

    fn is_terminal(&self) -> bool {
        matches!(self, InputSource::Terminal)
    }

    /// Next line of input, or None at end of input.
    fn next_line(&mut self) -> anyhow::Result<Option<String>> {
        match self {
            InputSource::Terminal => {
                let line = dialoguer::Input::<String>::new()
                    .with_prompt(render::USER_NAME)
                    .allow_empty(true)
                    .interact_text();
                match line {
                    Ok(line) => Ok(Some(line)),
                    Err(dialoguer::Error::IO(e))
                        if e.kind() == std::io::ErrorKind::UnexpectedEof =>
                    {
                        Ok(None)
                    }
                    Err(e) => Err(e).context("reading user input"),
                }
            }
            InputSource::Piped(lines) => lines.next().transpose().context("reading stdin"),
        }
    }
}

struct TurnPrinter {
    renderer: Renderer,
    format: OutputFormat,
    echo_user: bool,
    shown: usize,
}

impl TurnPrinter {
    /// Print turns appended since the last call.
    fn flush(&mut self, session: &ConversationSession) -> anyhow::Result<()> {
        let turns = session.current_turns();
        for turn in turns.iter().skip(self.shown) {
            if turn.author == Author::User && !self.echo_user {
                continue;
            }
            match self.format {
                OutputFormat::Json => println!("{}", serde_json::to_string(turn)?),
                OutputFormat::Pretty | OutputFormat::Text => {
                    println!("{}", self.renderer.turn_line(turn)?);
                }
            }
        }
        self.shown = turns.len();
        Ok(())
    }
}

impl ChatArgs {
    pub fn execute(&self) -> anyhow::Result<()> {
        let (mut lexicon, source) = resolve_lexicon(self.config.as_deref())?;
        if let Some(delay_ms) = self.delay_ms {
            lexicon.reply_delay_ms = delay_ms;
            lexicon.validate().map_err(ExitError::from)?;
        }
        let format = OutputFormat::resolve(self.format);
        tracing::info!(lexicon = %source.describe(), ?format, "starting chat");

        let scheduler = Arc::new(ThreadScheduler::new());
        let rng: Box<dyn RngCore + Send> = match self.seed {
            Some(seed) => Box::new(StdRng::seed_from_u64(seed)),
            None => Box::new(StdRng::from_os_rng()),
        };
        let session = ConversationSession::new(&lexicon, scheduler.clone(), rng)
            .map_err(ExitError::from)?;

        let interrupt = Arc::clone(&scheduler);
        if let Err(e) = ctrlc::set_handler(move || {
            interrupt.cancel_all();
            eprintln!("\nGoodbye. Take care of yourself.");
            std::process::exit(130);
        }) {
            tracing::warn!("failed to install Ctrl-C handler: {e}");
        }

        let mut input = InputSource::detect();
        let mut printer = TurnPrinter {
            renderer: Renderer::new()?,
            format,
            echo_user: !input.is_terminal(),
            shown: 0,
        };

        if format != OutputFormat::Json {
            render::print_banner(format == OutputFormat::Pretty);
        }
        printer.flush(&session)?;

        let mut reported: Option<CompanionError> = None;
        while let Some(line) = input.next_line()? {
            if line.trim() == QUIT {
                break;
            }
            match session.submit_user_turn(&line) {
                Ok(_) => {}
                Err(CompanionError::EmptyInputRejected) => continue,
                Err(e) => return Err(ExitError::from(e).into()),
            }
            printer.flush(&session)?;

            if format == OutputFormat::Pretty && session.is_agent_composing() {
                eprintln!("{}", printer.renderer.typing_line()?);
            }
            while session.is_agent_composing() {
                std::thread::sleep(POLL_INTERVAL);
            }
            let last_error = session.last_error();
            if last_error != reported {
                if let Some(e) = &last_error {
                    tracing::error!("reply failed: {e}");
                }
                reported = last_error;
            }
            printer.flush(&session)?;
        }

        session.close();
        if format != OutputFormat::Json {
            println!("Goodbye. Take care of yourself.");
        }
        Ok(())
    }
}
