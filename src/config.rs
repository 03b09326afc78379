use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Context;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::agent::Category;
use crate::error::{CompanionError, ExitError};

/// Lexicon file name looked up in the user config directory.
pub const LEXICON_FILE: &str = "companion.toml";
/// Environment variable naming an explicit lexicon file.
pub const LEXICON_ENV: &str = "COMPANION_CONFIG";
/// Current lexicon format version.
pub const LEXICON_VERSION: &str = "1";

/// Upper bound on the configured reply delay.
pub const MAX_REPLY_DELAY_MS: u64 = 10_000;

/// Where the effective lexicon came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LexiconSource {
    File(PathBuf),
    BuiltIn,
}

impl LexiconSource {
    pub fn describe(&self) -> String {
        match self {
            LexiconSource::File(path) => path.display().to_string(),
            LexiconSource::BuiltIn => "built-in".to_string(),
        }
    }
}

/// Pick the lexicon file to load.
///
/// Priority order (highest first):
/// 1. An explicit `--config` path
/// 2. `$COMPANION_CONFIG`
/// 3. `<config_dir>/safespace/companion.toml`, only if it exists
///
/// Returns None when the built-in table should be used.
pub fn locate_lexicon(
    explicit: Option<&Path>,
    env_path: Option<PathBuf>,
    config_dir: Option<PathBuf>,
) -> Option<PathBuf> {
    if let Some(path) = explicit {
        return Some(path.to_path_buf());
    }
    if let Some(path) = env_path.filter(|p| !p.as_os_str().is_empty()) {
        return Some(path);
    }
    config_dir
        .map(|dir| dir.join("safespace").join(LEXICON_FILE))
        .filter(|path| path.exists())
}

/// Resolve and load the effective lexicon for this process.
pub fn resolve_lexicon(explicit: Option<&Path>) -> anyhow::Result<(Lexicon, LexiconSource)> {
    let env_path = std::env::var_os(LEXICON_ENV).map(PathBuf::from);
    match locate_lexicon(explicit, env_path, dirs::config_dir()) {
        Some(path) => {
            let lexicon = Lexicon::load(&path)?;
            tracing::info!(path = %path.display(), "loaded lexicon");
            Ok((lexicon, LexiconSource::File(path)))
        }
        None => Ok((Lexicon::default(), LexiconSource::BuiltIn)),
    }
}

/// The static category table consumed by the classifier and response selector.
///
/// Rule order is classification priority, except that the crisis rule is
/// always evaluated first wherever it appears.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct Lexicon {
    pub version: String,
    /// Opening agent turn of every session.
    pub greeting: String,
    /// Simulated typing latency before each agent reply.
    #[serde(default = "default_reply_delay_ms")]
    pub reply_delay_ms: u64,
    /// Replies for messages no rule matches, picked uniformly at random.
    pub fallback: Vec<String>,
    pub rules: Vec<Rule>,
}

/// One category with its trigger phrases and fixed reply.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct Rule {
    pub category: Category,
    /// Lowercase substrings; any one of them selects this category.
    pub triggers: Vec<String>,
    pub response: String,
}

fn default_reply_delay_ms() -> u64 {
    1500
}

impl Default for Lexicon {
    fn default() -> Self {
        Self {
            version: LEXICON_VERSION.to_string(),
            greeting: "Hello. I'm your SafeSpace Companion. I'm here to listen and support you. How are you feeling today?".into(),
            reply_delay_ms: default_reply_delay_ms(),
            fallback: vec![
                "I'm listening. Please go on.".into(),
                "That sounds difficult. How have you been coping with this?".into(),
                "Thank you for sharing that with me. It takes courage to open up.".into(),
                "I hear you. Tell me more about that.".into(),
                "Your feelings are valid. I'm here for you.".into(),
            ],
            rules: vec![
                Rule::new(
                    Category::Crisis,
                    &["suicide", "kill myself", "die", "hurt myself"],
                    "I hear that you're in a lot of pain, and I want you to be safe. Please, if you are in immediate danger, call emergency services (911) or the Suicide & Crisis Lifeline (988) right away. You are not alone.",
                ),
                Rule::new(
                    Category::Sadness,
                    &["sad", "depress", "unhappy"],
                    "I'm sorry to hear that you're feeling down. It's okay to feel this way. Would you like to talk more about what's making you feel sad?",
                ),
                Rule::new(
                    Category::Anxiety,
                    &["anxious", "worry", "fear", "panic"],
                    "Anxiety can be really overwhelming. Try to take a slow, deep breath with me. Breathe in... and breathe out. What is on your mind right now?",
                ),
                Rule::new(
                    Category::Loneliness,
                    &["lonely", "alone"],
                    "Loneliness is a heavy feeling. But please remember, you are connected to us here at SafeSpace. I'm here with you. What would make you feel a little less alone right now?",
                ),
                Rule::new(
                    Category::Gratitude,
                    &["thank"],
                    "You're very welcome. I'm glad I could be here for you.",
                ),
                Rule::new(
                    Category::Greeting,
                    &["hello", "hi", "hey"],
                    "Hello there. How can I support you today?",
                ),
            ],
        }
    }
}

impl Rule {
    pub fn new(category: Category, triggers: &[&str], response: &str) -> Self {
        Self {
            category,
            triggers: triggers.iter().map(|s| s.to_string()).collect(),
            response: response.to_string(),
        }
    }
}

impl Lexicon {
    /// Load and validate a lexicon from a TOML file.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("reading {}", path.display()))?;
        Self::parse_toml(&contents)
    }

    /// Parse and validate a lexicon from a TOML string.
    pub fn parse_toml(toml_str: &str) -> anyhow::Result<Self> {
        let lexicon: Self = toml::from_str(toml_str).map_err(|e| {
            anyhow::Error::from(ExitError::Config(format!("invalid {LEXICON_FILE}: {e}")))
        })?;
        lexicon.validate().map_err(ExitError::from)?;
        Ok(lexicon)
    }

    /// Check the invariants the engine relies on.
    pub fn validate(&self) -> Result<(), CompanionError> {
        let invalid = |msg: String| Err(CompanionError::InvalidLexicon(msg));

        if self.version.trim().is_empty() {
            return invalid("version must not be empty".into());
        }
        if self.greeting.trim().is_empty() {
            return invalid("greeting must not be empty".into());
        }
        if self.reply_delay_ms > MAX_REPLY_DELAY_MS {
            return invalid(format!(
                "reply_delay_ms {} exceeds the {MAX_REPLY_DELAY_MS} ms limit",
                self.reply_delay_ms
            ));
        }
        if self.fallback.is_empty() {
            return invalid("fallback pool must not be empty".into());
        }
        if self.fallback.iter().any(|r| r.trim().is_empty()) {
            return invalid("fallback pool contains a blank reply".into());
        }
        if self.rules.is_empty() {
            return invalid("at least one rule is required".into());
        }

        let mut seen = HashSet::new();
        for rule in &self.rules {
            let category = rule.category;
            if !category.has_fixed_response() {
                return invalid(format!("{category} cannot have a rule; use the fallback pool"));
            }
            if !seen.insert(category) {
                return invalid(format!("duplicate rule for {category}"));
            }
            if rule.response.trim().is_empty() {
                return invalid(format!("{category} response must not be empty"));
            }
            for trigger in &rule.triggers {
                if trigger.is_empty() {
                    return invalid(format!("{category} has an empty trigger"));
                }
                if *trigger != trigger.to_lowercase() {
                    return invalid(format!("{category} trigger {trigger:?} must be lowercase"));
                }
            }
        }

        match self.rule(Category::Crisis) {
            Some(rule) if !rule.triggers.is_empty() => Ok(()),
            Some(_) => invalid("crisis rule must have at least one trigger".into()),
            None => invalid("a crisis rule is required".into()),
        }
    }

    /// Look up the rule for a category.
    pub fn rule(&self, category: Category) -> Option<&Rule> {
        self.rules.iter().find(|r| r.category == category)
    }

    pub fn reply_delay(&self) -> Duration {
        Duration::from_millis(self.reply_delay_ms)
    }

    /// Short content digest: first 16 hex chars of SHA-256 over the canonical TOML.
    pub fn fingerprint(&self) -> anyhow::Result<String> {
        let canonical = toml::to_string(self).context("serializing lexicon for fingerprint")?;
        let mut hasher = Sha256::new();
        hasher.update(canonical.as_bytes());
        let digest = format!("{:x}", hasher.finalize());
        Ok(digest[..16].to_string())
    }

    /// Serialize to TOML with section comments.
    pub fn to_toml(&self) -> anyhow::Result<String> {
        let raw = toml::to_string_pretty(self).context("serializing lexicon to TOML")?;

        let mut doc: toml_edit::DocumentMut = raw
            .parse()
            .context("parsing generated TOML for comment injection")?;

        doc.decor_mut().set_prefix(
            "# SafeSpace Companion lexicon\n# Triggers are lowercase substrings; the crisis rule is always checked first.\n\n",
        );

        if let Some(mut key) = doc.key_mut("fallback") {
            key.leaf_decor_mut()
                .set_prefix("\n# Replies used when no rule matches (picked uniformly at random)\n");
        }

        if let Some(rules) = doc
            .get_mut("rules")
            .and_then(|item| item.as_array_of_tables_mut())
        {
            if let Some(first) = rules.iter_mut().next() {
                first
                    .decor_mut()
                    .set_prefix("\n# Rules in priority order (first match wins)\n");
            }
        }

        Ok(doc.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINIMAL: &str = r#"
version = "1"
greeting = "Hi, I'm here."
fallback = ["Go on."]

[[rules]]
category = "crisis"
triggers = ["suicide"]
response = "Call 988."
"#;

    #[test]
    fn default_lexicon_is_valid() {
        let lexicon = Lexicon::default();
        lexicon.validate().unwrap();
        assert_eq!(lexicon.rules.len(), 6);
        assert_eq!(lexicon.rules[0].category, Category::Crisis);
        assert_eq!(lexicon.fallback.len(), 5);
        assert_eq!(lexicon.reply_delay(), Duration::from_millis(1500));
    }

    #[test]
    fn crisis_response_references_emergency_numbers() {
        let lexicon = Lexicon::default();
        let crisis = lexicon.rule(Category::Crisis).unwrap();
        assert!(crisis.response.contains("911"));
        assert!(crisis.response.contains("988"));
    }

    #[test]
    fn parse_minimal_toml() {
        let lexicon = Lexicon::parse_toml(MINIMAL).unwrap();
        assert_eq!(lexicon.greeting, "Hi, I'm here.");
        assert_eq!(lexicon.reply_delay_ms, 1500);
        assert_eq!(lexicon.rules.len(), 1);
        assert!(lexicon.rule(Category::Greeting).is_none());
    }

    #[test]
    fn parse_malformed_toml() {
        let err = Lexicon::parse_toml("not valid toml [[[").unwrap_err();
        assert!(err.to_string().contains("invalid companion.toml"));
        assert!(err.downcast_ref::<ExitError>().is_some());
    }

    #[test]
    fn parse_unknown_category() {
        let toml_str = MINIMAL.replace("\"crisis\"", "\"boredom\"");
        assert!(Lexicon::parse_toml(&toml_str).is_err());
    }

    #[test]
    fn parse_missing_required_fields() {
        assert!(Lexicon::parse_toml(r#"version = "1""#).is_err());
    }

    #[test]
    fn parse_rejects_invalid_table_as_config_error() {
        let toml_str = MINIMAL.replace("[\"suicide\"]", "[]");
        let err = Lexicon::parse_toml(&toml_str).unwrap_err();
        let exit = err.downcast_ref::<ExitError>().unwrap();
        assert!(matches!(exit, ExitError::Config(m) if m.contains("at least one trigger")));
    }

    fn rejected(lexicon: &Lexicon) -> String {
        match lexicon.validate() {
            Err(CompanionError::InvalidLexicon(msg)) => msg,
            other => panic!("expected InvalidLexicon, got {other:?}"),
        }
    }

    #[test]
    fn validate_requires_crisis_rule() {
        let mut lexicon = Lexicon::default();
        lexicon.rules.retain(|r| r.category != Category::Crisis);
        assert!(rejected(&lexicon).contains("crisis rule is required"));
    }

    #[test]
    fn validate_rejects_uppercase_trigger() {
        let mut lexicon = Lexicon::default();
        lexicon.rules[1].triggers.push("Sad".into());
        assert!(rejected(&lexicon).contains("must be lowercase"));
    }

    #[test]
    fn validate_rejects_empty_trigger() {
        let mut lexicon = Lexicon::default();
        lexicon.rules[2].triggers.push(String::new());
        assert!(rejected(&lexicon).contains("empty trigger"));
    }

    #[test]
    fn validate_rejects_duplicate_category() {
        let mut lexicon = Lexicon::default();
        lexicon.rules.push(Rule::new(Category::Greeting, &["yo"], "Yo."));
        assert!(rejected(&lexicon).contains("duplicate rule for greeting"));
    }

    #[test]
    fn validate_rejects_uncategorized_rule() {
        let mut lexicon = Lexicon::default();
        lexicon.rules.push(Rule::new(Category::Uncategorized, &["x"], "X."));
        assert!(rejected(&lexicon).contains("uncategorized cannot have a rule"));
    }

    #[test]
    fn validate_rejects_empty_fallback() {
        let mut lexicon = Lexicon::default();
        lexicon.fallback.clear();
        assert!(rejected(&lexicon).contains("fallback pool must not be empty"));

        lexicon.fallback.push("  ".into());
        assert!(rejected(&lexicon).contains("blank reply"));
    }

    #[test]
    fn validate_rejects_blank_response_and_greeting() {
        let mut lexicon = Lexicon::default();
        lexicon.rules[0].response = " ".into();
        assert!(rejected(&lexicon).contains("crisis response must not be empty"));

        let mut lexicon = Lexicon::default();
        lexicon.greeting = String::new();
        assert!(rejected(&lexicon).contains("greeting"));
    }

    #[test]
    fn validate_rejects_long_delay() {
        let mut lexicon = Lexicon::default();
        lexicon.reply_delay_ms = MAX_REPLY_DELAY_MS + 1;
        assert!(rejected(&lexicon).contains("exceeds"));
    }

    #[test]
    fn roundtrip_toml() {
        let lexicon = Lexicon::default();
        let toml_str = lexicon.to_toml().unwrap();
        let reparsed = Lexicon::parse_toml(&toml_str).unwrap();
        assert_eq!(reparsed, lexicon);
    }

    #[test]
    fn to_toml_includes_comments() {
        let toml_str = Lexicon::default().to_toml().unwrap();
        assert!(toml_str.starts_with("# SafeSpace Companion lexicon"));
        assert!(toml_str.contains("# Rules in priority order"));
        assert!(toml_str.contains("# Replies used when no rule matches"));
        assert!(toml_str.contains("[[rules]]"));
    }

    #[test]
    fn fingerprint_is_stable_and_content_sensitive() {
        let a = Lexicon::default();
        let mut b = Lexicon::default();
        assert_eq!(a.fingerprint().unwrap(), b.fingerprint().unwrap());
        assert_eq!(a.fingerprint().unwrap().len(), 16);

        b.rules[5].triggers.push("howdy".into());
        assert_ne!(a.fingerprint().unwrap(), b.fingerprint().unwrap());
    }

    #[test]
    fn locate_prefers_explicit_path() {
        let dir = tempfile::tempdir().unwrap();
        let explicit = dir.path().join("mine.toml");
        let found = locate_lexicon(
            Some(&explicit),
            Some(dir.path().join("env.toml")),
            Some(dir.path().to_path_buf()),
        );
        assert_eq!(found, Some(explicit));
    }

    #[test]
    fn locate_uses_env_before_config_dir() {
        let dir = tempfile::tempdir().unwrap();
        let env = dir.path().join("env.toml");
        let found = locate_lexicon(None, Some(env.clone()), Some(dir.path().to_path_buf()));
        assert_eq!(found, Some(env));
    }

    #[test]
    fn locate_ignores_empty_env() {
        let dir = tempfile::tempdir().unwrap();
        let found = locate_lexicon(None, Some(PathBuf::new()), Some(dir.path().to_path_buf()));
        assert_eq!(found, None);
    }

    #[test]
    fn locate_config_dir_only_when_present() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(
            locate_lexicon(None, None, Some(dir.path().to_path_buf())),
            None
        );

        let app_dir = dir.path().join("safespace");
        std::fs::create_dir_all(&app_dir).unwrap();
        std::fs::write(app_dir.join(LEXICON_FILE), MINIMAL).unwrap();
        assert_eq!(
            locate_lexicon(None, None, Some(dir.path().to_path_buf())),
            Some(app_dir.join(LEXICON_FILE))
        );
    }

    #[test]
    fn load_reads_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(LEXICON_FILE);
        std::fs::write(&path, MINIMAL).unwrap();
        let lexicon = Lexicon::load(&path).unwrap();
        assert_eq!(lexicon.fallback, vec!["Go on."]);
    }

    #[test]
    fn load_missing_file_names_path() {
        let err = Lexicon::load(Path::new("/nonexistent/companion.toml")).unwrap_err();
        assert!(err.to_string().contains("/nonexistent/companion.toml"));
    }
}
