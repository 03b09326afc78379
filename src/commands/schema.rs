use schemars::schema_for;

use crate::config::Lexicon;

/// JSON Schema describing `companion.toml`.
pub fn lexicon_schema() -> anyhow::Result<String> {
    Ok(serde_json::to_string_pretty(&schema_for!(Lexicon))?)
}

pub fn run_schema() -> anyhow::Result<()> {
    println!("{}", lexicon_schema()?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn schema_describes_rules_and_categories() {
        let schema: serde_json::Value = serde_json::from_str(&lexicon_schema().unwrap()).unwrap();
        let required = schema["required"].as_array().unwrap();
        for field in ["version", "greeting", "fallback", "rules"] {
            assert!(required.iter().any(|v| v == field), "{field}");
        }
        // reply_delay_ms has a default
        assert!(!required.iter().any(|v| v == "reply_delay_ms"));

        let text = schema.to_string();
        assert!(text.contains("\"crisis\""));
        assert!(text.contains("\"uncategorized\""));
    }
}
