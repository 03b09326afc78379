use std::io::IsTerminal;
use std::path::PathBuf;

use clap::Args;
use serde::{Deserialize, Serialize};

use crate::agent::IntentClassifier;
use crate::config::{Lexicon, LexiconSource, resolve_lexicon};

#[derive(Debug, Args)]
pub struct DoctorArgs {
    /// Lexicon file (defaults to $COMPANION_CONFIG, then the user config dir)
    #[arg(long)]
    pub config: Option<PathBuf>,
    /// Output format
    #[arg(long, value_enum)]
    pub format: Option<OutputFormat>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    Pretty,
    Text,
    Json,
}

impl OutputFormat {
    /// Explicit choice, else pretty on a terminal and text otherwise.
    pub fn resolve(format: Option<Self>) -> Self {
        format.unwrap_or_else(|| {
            if std::io::stdout().is_terminal() {
                OutputFormat::Pretty
            } else {
                OutputFormat::Text
            }
        })
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct DoctorReport {
    pub source: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lexicon: Option<LexiconSummary>,
    pub issues: Vec<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct LexiconSummary {
    pub version: String,
    pub fingerprint: String,
    pub reply_delay_ms: u64,
    pub fallback_replies: usize,
    /// Categories in evaluation order.
    pub categories: Vec<CategoryStatus>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CategoryStatus {
    pub name: String,
    pub triggers: usize,
}

impl DoctorArgs {
    pub fn execute(&self) -> anyhow::Result<()> {
        let format = OutputFormat::resolve(self.format);

        let report = match resolve_lexicon(self.config.as_deref()) {
            Ok((lexicon, source)) => summarize(&lexicon, &source)?,
            Err(e) => DoctorReport {
                source: self
                    .config
                    .as_ref()
                    .map_or_else(|| "unknown".to_string(), |p| p.display().to_string()),
                lexicon: None,
                issues: vec![format!("{e:#}")],
            },
        };

        let issue_count = report.issues.len();

        match format {
            OutputFormat::Pretty => print_pretty(&report),
            OutputFormat::Text => print_text(&report),
            OutputFormat::Json => {
                println!("{}", serde_json::to_string_pretty(&report)?);
            }
        }

        if issue_count > 0 {
            return Err(crate::error::ExitError::new(
                u8::try_from(issue_count.min(125)).unwrap_or(125),
                format!("{issue_count} issue(s) found"),
            )
            .into());
        }

        Ok(())
    }
}

fn summarize(lexicon: &Lexicon, source: &LexiconSource) -> anyhow::Result<DoctorReport> {
    let mut issues = Vec::new();
    let mut categories = Vec::new();

    match IntentClassifier::new(lexicon) {
        Ok(classifier) => {
            for category in classifier.priority() {
                let triggers = lexicon.rule(category).map_or(0, |r| r.triggers.len());
                categories.push(CategoryStatus {
                    name: category.to_string(),
                    triggers,
                });
            }
        }
        Err(e) => issues.push(e.to_string()),
    }

    Ok(DoctorReport {
        source: source.describe(),
        lexicon: Some(LexiconSummary {
            version: lexicon.version.clone(),
            fingerprint: lexicon.fingerprint()?,
            reply_delay_ms: lexicon.reply_delay_ms,
            fallback_replies: lexicon.fallback.len(),
            categories,
        }),
        issues,
    })
}

fn print_pretty(report: &DoctorReport) {
    println!("=== Companion Doctor ===\n");
    println!("Lexicon: {}", report.source);
    if let Some(lexicon) = &report.lexicon {
        println!("Version:     {}", lexicon.version);
        println!("Fingerprint: {}", lexicon.fingerprint);
        println!("Reply delay: {} ms", lexicon.reply_delay_ms);
        println!();

        println!("Categories (evaluation order):");
        for (i, category) in lexicon.categories.iter().enumerate() {
            if category.name == "uncategorized" {
                println!(
                    "  {}. {} ({} fallback replies)",
                    i + 1,
                    category.name,
                    lexicon.fallback_replies
                );
            } else {
                println!(
                    "  {}. {} ({} triggers)",
                    i + 1,
                    category.name,
                    category.triggers
                );
            }
        }
    }

    if report.issues.is_empty() {
        println!("\n✓ No issues found");
    } else {
        println!("\nIssues ({}):", report.issues.len());
        for issue in &report.issues {
            println!("  • {issue}");
        }
    }
}

fn print_text(report: &DoctorReport) {
    match &report.lexicon {
        Some(lexicon) => {
            println!(
                "companion-doctor  source={}  version={}  fingerprint={}  delay_ms={}",
                report.source, lexicon.version, lexicon.fingerprint, lexicon.reply_delay_ms
            );
            for category in &lexicon.categories {
                println!(
                    "category  {}  triggers={}",
                    category.name, category.triggers
                );
            }
            println!("fallback  replies={}", lexicon.fallback_replies);
        }
        None => println!("companion-doctor  source={}", report.source),
    }

    if !report.issues.is_empty() {
        println!("issues  count={}", report.issues.len());
        for issue in &report.issues {
            println!("issue  {issue}");
        }
    }
}
