use std::path::PathBuf;

use clap::Args;

use crate::config::resolve_lexicon;

#[derive(Debug, Args)]
pub struct LexiconArgs {
    /// Lexicon file (defaults to $COMPANION_CONFIG, then the user config dir)
    #[arg(long)]
    pub config: Option<PathBuf>,
}

impl LexiconArgs {
    /// Print the effective lexicon as commented TOML.
    pub fn execute(&self) -> anyhow::Result<()> {
        let (lexicon, source) = resolve_lexicon(self.config.as_deref())?;
        tracing::debug!(source = %source.describe(), "printing lexicon");
        print!("{}", lexicon.to_toml()?);
        Ok(())
    }
}
