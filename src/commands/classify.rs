use std::path::PathBuf;

use clap::Args;

use super::doctor::OutputFormat;
use crate::agent::{Classification, IntentClassifier};
use crate::config::resolve_lexicon;
use crate::error::{CompanionError, ExitError};

#[derive(Debug, Args)]
pub struct ClassifyArgs {
    /// Message to classify
    pub text: String,
    /// Lexicon file (defaults to $COMPANION_CONFIG, then the user config dir)
    #[arg(long)]
    pub config: Option<PathBuf>,
    /// Output format
    #[arg(long, value_enum)]
    pub format: Option<OutputFormat>,
}

impl ClassifyArgs {
    pub fn execute(&self) -> anyhow::Result<()> {
        if self.text.trim().is_empty() {
            return Err(ExitError::from(CompanionError::EmptyInputRejected).into());
        }

        let (lexicon, _) = resolve_lexicon(self.config.as_deref())?;
        let classifier = IntentClassifier::new(&lexicon).map_err(ExitError::from)?;
        let result = classifier.explain(&self.text);

        match OutputFormat::resolve(self.format) {
            OutputFormat::Json => println!("{}", serde_json::to_string(&result)?),
            OutputFormat::Text => println!("{}", text_line(&result)),
            OutputFormat::Pretty => println!("{}", pretty_line(&result)),
        }
        Ok(())
    }
}

fn text_line(result: &Classification) -> String {
    match &result.trigger {
        Some(trigger) => format!("category={}  trigger={trigger:?}", result.category),
        None => format!("category={}", result.category),
    }
}

fn pretty_line(result: &Classification) -> String {
    match &result.trigger {
        Some(trigger) => format!("{} (matched {trigger:?})", result.category),
        None => format!("{} (no trigger matched)", result.category),
    }
}
