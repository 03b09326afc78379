//! Terminal rendering for the chat front end.

use chrono::Local;
use minijinja::{Environment, context};
use serde::Serialize;

use crate::agent::{Author, Turn};

const TURN_TEMPLATE: &str = "[{{ time }}] {{ speaker }}: {{ text }}";
const TYPING_TEMPLATE: &str = "{{ speaker }} is typing...";

const BANNER: &str = r"# SafeSpace Companion

*An automated support tool. It does not replace professional therapy.*

**If you are in immediate danger, call emergency services (911) or the Suicide & Crisis Lifeline (988).**

Type `/quit` to leave.
";

pub const AGENT_NAME: &str = "Companion";
pub const USER_NAME: &str = "You";

#[derive(Debug, Serialize)]
struct TurnView<'a> {
    time: String,
    speaker: &'static str,
    text: &'a str,
}

/// Templates for turn lines and the composing indicator.
pub struct Renderer {
    env: Environment<'static>,
}

impl Renderer {
    pub fn new() -> anyhow::Result<Self> {
        let mut env = Environment::new();
        env.add_template("turn", TURN_TEMPLATE)?;
        env.add_template("typing", TYPING_TEMPLATE)?;
        Ok(Self { env })
    }

    /// One line per turn, timestamp in local `HH:MM`.
    pub fn turn_line(&self, turn: &Turn) -> anyhow::Result<String> {
        let view = TurnView {
            time: turn.created_at.with_timezone(&Local).format("%H:%M").to_string(),
            speaker: speaker(turn.author),
            text: &turn.text,
        };
        Ok(self.env.get_template("turn")?.render(&view)?)
    }

    pub fn typing_line(&self) -> anyhow::Result<String> {
        Ok(self
            .env
            .get_template("typing")?
            .render(context! { speaker => AGENT_NAME })?)
    }
}

pub fn speaker(author: Author) -> &'static str {
    match author {
        Author::User => USER_NAME,
        Author::Agent => AGENT_NAME,
    }
}

/// Disclaimer shown when a chat opens.
pub fn print_banner(pretty: bool) {
    if pretty {
        termimad::MadSkin::default().print_text(BANNER);
    } else {
        println!("{}", banner_plain());
    }
}

fn banner_plain() -> String {
    BANNER
        .lines()
        .map(|line| line.trim_start_matches("# ").replace(['*', '`'], ""))
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};

    use super::*;

    fn turn(author: Author, text: &str) -> Turn {
        Turn {
            id: 1,
            text: text.to_string(),
            author,
            created_at: Utc.with_ymd_and_hms(2026, 3, 1, 14, 5, 0).unwrap(),
        }
    }

    #[test]
    fn turn_line_has_time_speaker_and_text() {
        let r = Renderer::new().unwrap();
        let t = turn(Author::Agent, "Hello there.");
        let expected_time = t
            .created_at
            .with_timezone(&Local)
            .format("%H:%M")
            .to_string();
        assert_eq!(
            r.turn_line(&t).unwrap(),
            format!("[{expected_time}] Companion: Hello there.")
        );
    }

    #[test]
    fn user_text_is_not_html_escaped() {
        let r = Renderer::new().unwrap();
        let line = r.turn_line(&turn(Author::User, "I'm <fine> & ok")).unwrap();
        assert!(line.ends_with("You: I'm <fine> & ok"));
    }

    #[test]
    fn typing_line_names_agent() {
        let r = Renderer::new().unwrap();
        assert_eq!(r.typing_line().unwrap(), "Companion is typing...");
    }

    #[test]
    fn plain_banner_strips_markdown() {
        let plain = banner_plain();
        assert!(plain.starts_with("SafeSpace Companion"));
        assert!(plain.contains("(911)"));
        assert!(!plain.contains('*'));
        assert!(plain.contains("Type /quit to leave."));
    }
}
