use anyhow::{Context, Result};
use tracing::{debug, error, info, warn};

use crate::ai::{PromptEngine, PromptSource};
use crate::analytics::{EntrySummary, NO_EMOTION_DATA, NO_TIMELINE_DATA};
use crate::auth::{AuthClient, Session};
use crate::config::{Config, ConfigManager};
use crate::journal::{EntryCategory, JournalStore, NewEntry};
use crate::session::SessionStore;
use crate::speech::SpeechEngine;

/// What the main loop should do after a command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopControl {
    Continue,
    Quit,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Command {
    Login { email: String },
    Verify { code: String },
    Logout,
    Prompt {
        category: EntryCategory,
        context: Option<String>,
    },
    Deeper,
    Speak,
    Write { text: String },
    Stats,
    Help,
    Quit,
}

/// The whole application state, owned explicitly and passed where needed:
/// initialized on start, session cleared on sign-out.
pub struct ReflectApp {
    config_manager: ConfigManager,
    current_config: Config,
    auth: Option<AuthClient>,
    store: Option<JournalStore>,
    prompts: PromptEngine,
    speech: SpeechEngine,
    session_store: SessionStore,
    session: Option<Session>,
    pending_email: Option<String>,
    current_prompt: Option<(EntryCategory, String)>,
}

impl ReflectApp {
    pub fn new(config_manager: ConfigManager) -> Result<Self> {
        let config = config_manager.get();

        let auth = AuthClient::from_config(&config).context("Failed to configure auth client")?;
        let store =
            JournalStore::from_config(&config).context("Failed to configure journal store")?;
        let prompts =
            PromptEngine::from_config(&config).context("Failed to configure prompt engine")?;
        let speech =
            SpeechEngine::from_config(&config).context("Failed to configure speech engine")?;

        let session_store = SessionStore::new(config_manager.session_file_path());
        let session = session_store.load();
        if let Some(session) = &session {
            info!(
                "Restored session for {}",
                session.user.email.as_deref().unwrap_or(&session.user.id)
            );
        }

        if auth.is_none() {
            warn!("Journal store not configured; login and stats are unavailable");
        }
        if !prompts.is_online() {
            info!("Running in offline mode (no GEMINI_API_KEY); prompts come from the curated set");
        }

        Ok(Self {
            config_manager,
            current_config: config,
            auth,
            store,
            prompts,
            speech,
            session_store,
            session,
            pending_email: None,
            current_prompt: None,
        })
    }

    /// Rebuild the remote clients when the config file changes on disk.
    pub fn apply_config_update(&mut self, new_config: Config) -> Result<()> {
        if new_config == self.current_config {
            debug!("Config unchanged; ignoring update");
            return Ok(());
        }

        self.auth =
            AuthClient::from_config(&new_config).context("Failed to reconfigure auth client")?;
        self.store = JournalStore::from_config(&new_config)
            .context("Failed to reconfigure journal store")?;
        self.prompts = PromptEngine::from_config(&new_config)
            .context("Failed to reconfigure prompt engine")?;
        self.speech = SpeechEngine::from_config(&new_config)
            .context("Failed to reconfigure speech engine")?;
        self.current_config = new_config;

        info!("Configuration updated");
        Ok(())
    }

    /// Handle one line of user input.
    pub async fn handle_line(&mut self, line: &str) -> Result<LoopControl> {
        let command = match parse_command(line) {
            Ok(Some(command)) => command,
            Ok(None) => return Ok(LoopControl::Continue),
            Err(message) => {
                println!("{message}");
                return Ok(LoopControl::Continue);
            }
        };

        match command {
            Command::Login { email } => self.handle_login(email).await,
            Command::Verify { code } => self.handle_verify(code).await,
            Command::Logout => self.handle_logout().await,
            Command::Prompt { category, context } => {
                self.handle_prompt(category, context.as_deref()).await
            }
            Command::Deeper => self.handle_deeper().await,
            Command::Speak => self.handle_speak().await,
            Command::Write { text } => self.handle_write(text).await,
            Command::Stats => self.handle_stats().await,
            Command::Help => {
                println!("{}", help_text());
                Ok(LoopControl::Continue)
            }
            Command::Quit => Ok(LoopControl::Quit),
        }
    }

    async fn handle_login(&mut self, email: String) -> Result<LoopControl> {
        let Some(auth) = &self.auth else {
            println!("Journal store not configured; set store_url and store_api_key first.");
            return Ok(LoopControl::Continue);
        };

        match auth.request_otp(&email).await {
            Ok(()) => {
                println!("Check your email for the login code, then run: verify <code>");
                self.pending_email = Some(email);
            }
            Err(err) => {
                error!("Failed to send login code: {}", err);
                println!("Could not send the login code. Try again.");
            }
        }

        Ok(LoopControl::Continue)
    }

    async fn handle_verify(&mut self, code: String) -> Result<LoopControl> {
        let Some(auth) = &self.auth else {
            println!("Journal store not configured; set store_url and store_api_key first.");
            return Ok(LoopControl::Continue);
        };

        let Some(email) = self.pending_email.clone() else {
            println!("Request a code first with: login <email>");
            return Ok(LoopControl::Continue);
        };

        match auth.verify_otp(&email, &code).await {
            Ok(session) => {
                if let Err(err) = self.session_store.save(&session) {
                    warn!("Could not cache session: {:#}", err);
                }
                println!(
                    "Signed in as {}.",
                    session.user.email.as_deref().unwrap_or(&session.user.id)
                );
                self.session = Some(session);
                self.pending_email = None;
            }
            Err(err) => {
                error!("Verification failed: {}", err);
                println!("That code did not work. Try again or request a new one.");
            }
        }

        Ok(LoopControl::Continue)
    }

    async fn handle_logout(&mut self) -> Result<LoopControl> {
        let Some(session) = self.session.take() else {
            println!("Not signed in.");
            return Ok(LoopControl::Continue);
        };

        if let Some(auth) = &self.auth {
            auth.sign_out(&session).await;
        }
        self.session_store
            .clear()
            .context("Failed to clear session cache")?;
        self.current_prompt = None;

        println!("Signed out.");
        Ok(LoopControl::Continue)
    }

    async fn handle_prompt(
        &mut self,
        category: EntryCategory,
        context: Option<&str>,
    ) -> Result<LoopControl> {
        let prompt = self.prompts.generate_prompt(category, context).await;

        if prompt.source == PromptSource::Curated {
            info!("Offline mode: showing a curated prompt");
        }

        println!("\n  {}\n", prompt.text);
        self.current_prompt = Some((category, prompt.text));
        Ok(LoopControl::Continue)
    }

    async fn handle_deeper(&mut self) -> Result<LoopControl> {
        let Some((category, prompt)) = self.current_prompt.clone() else {
            println!("Generate a prompt first with: prompt <category>");
            return Ok(LoopControl::Continue);
        };

        match self.prompts.dig_deeper(&prompt).await {
            Some(follow_up) => {
                println!("\n  {}\n", follow_up);
                self.current_prompt = Some((category, follow_up));
            }
            None => {
                println!("No follow-up available right now.");
            }
        }

        Ok(LoopControl::Continue)
    }

    async fn handle_speak(&mut self) -> Result<LoopControl> {
        let Some((_, prompt)) = &self.current_prompt else {
            println!("Generate a prompt first with: prompt <category>");
            return Ok(LoopControl::Continue);
        };

        if let Err(err) = self.speech.speak(prompt).await {
            warn!("Could not speak the prompt: {}", err);
        }

        Ok(LoopControl::Continue)
    }

    async fn handle_write(&mut self, text: String) -> Result<LoopControl> {
        let (Some(store), Some(session)) = (&self.store, &self.session) else {
            println!("Sign in first with: login <email>");
            return Ok(LoopControl::Continue);
        };

        let category = self
            .current_prompt
            .as_ref()
            .map(|(category, _)| *category)
            .unwrap_or(EntryCategory::Daily);

        let sentiment = if self.prompts.is_online() {
            match self.prompts.analyze_entry(&text).await {
                Ok(analysis) => {
                    println!("\n  {}\n", analysis.insight);
                    Some(analysis.category)
                }
                Err(err) => {
                    warn!("Could not analyze the entry: {}", err);
                    None
                }
            }
        } else {
            debug!("Offline mode; saving entry without analysis");
            None
        };

        let entry = NewEntry {
            user_id: session.user.id.clone(),
            category,
            content: text,
            sentiment,
        };

        match store.insert(session, &entry).await {
            Ok(()) => println!("Entry saved under {}.", category),
            Err(err) => {
                error!("Failed to save entry: {}", err);
                println!("Could not save the entry. It was not persisted.");
            }
        }

        Ok(LoopControl::Continue)
    }

    async fn handle_stats(&mut self) -> Result<LoopControl> {
        let (Some(store), Some(session)) = (&self.store, &self.session) else {
            println!("Sign in first with: login <email>");
            return Ok(LoopControl::Continue);
        };

        let entries = match store.list(session).await {
            Ok(entries) => entries,
            Err(err) => {
                error!("Failed to fetch entries: {}", err);
                println!("Could not load your entries. Try again.");
                return Ok(LoopControl::Continue);
            }
        };

        let summary = EntrySummary::from_entries(&entries);

        println!("\nCategories");
        println!("{}", summary.render_categories());

        println!("\nEmotion breakdown");
        if summary.has_emotion_data() {
            println!("{}", summary.render_emotions());
        } else {
            println!("{NO_EMOTION_DATA}");
        }

        println!("\nFeelings timeline");
        if summary.timeline.is_empty() {
            println!("{NO_TIMELINE_DATA}");
        } else {
            println!("{}", summary.render_timeline());
        }

        if summary.unmapped_categories > 0 {
            println!(
                "\n{} entries have categories this build does not chart.",
                summary.unmapped_categories
            );
        }

        Ok(LoopControl::Continue)
    }
}

fn parse_command(line: &str) -> Result<Option<Command>, String> {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }

    let (word, rest) = match trimmed.split_once(char::is_whitespace) {
        Some((word, rest)) => (word, rest.trim()),
        None => (trimmed, ""),
    };

    match word.to_ascii_lowercase().as_str() {
        "login" => {
            if rest.is_empty() {
                Err("Usage: login <email>".to_string())
            } else {
                Ok(Some(Command::Login {
                    email: rest.to_string(),
                }))
            }
        }
        "verify" => {
            if rest.is_empty() {
                Err("Usage: verify <code>".to_string())
            } else {
                Ok(Some(Command::Verify {
                    code: rest.to_string(),
                }))
            }
        }
        "logout" => Ok(Some(Command::Logout)),
        "prompt" => {
            let (category_word, context) = match rest.split_once(char::is_whitespace) {
                Some((category_word, context)) => (category_word, Some(context.trim())),
                None => (rest, None),
            };

            let Some(category) = EntryCategory::parse(category_word) else {
                return Err(format!(
                    "Unknown category {:?}. Use one of: daily, weekly, monthly, stumped, ai.",
                    category_word
                ));
            };

            Ok(Some(Command::Prompt {
                category,
                context: context.filter(|c| !c.is_empty()).map(str::to_string),
            }))
        }
        "deeper" => Ok(Some(Command::Deeper)),
        "speak" => Ok(Some(Command::Speak)),
        "write" => {
            if rest.is_empty() {
                Err("Usage: write <your entry>".to_string())
            } else {
                Ok(Some(Command::Write {
                    text: rest.to_string(),
                }))
            }
        }
        "stats" => Ok(Some(Command::Stats)),
        "help" => Ok(Some(Command::Help)),
        "quit" | "exit" => Ok(Some(Command::Quit)),
        other => Err(format!("Unknown command {other:?}. Type 'help' for a list.")),
    }
}

pub fn help_text() -> &'static str {
    "Commands:\n\
     \x20 login <email>               email yourself a one-time login code\n\
     \x20 verify <code>               finish signing in with the emailed code\n\
     \x20 logout                      sign out and clear the cached session\n\
     \x20 prompt <category> [context] get a journaling prompt (daily, weekly, monthly, stumped, ai)\n\
     \x20 deeper                      ask a follow-up question about the current prompt\n\
     \x20 speak                       read the current prompt aloud\n\
     \x20 write <text>                save a journal entry under the current category\n\
     \x20 stats                       show category and emotion analytics\n\
     \x20 quit                        exit"
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_lines_are_ignored() {
        assert_eq!(parse_command("   ").unwrap(), None);
        assert_eq!(parse_command("").unwrap(), None);
    }

    #[test]
    fn login_requires_an_email() {
        assert!(parse_command("login").is_err());
        assert_eq!(
            parse_command("login a@b.c").unwrap(),
            Some(Command::Login {
                email: "a@b.c".to_string()
            })
        );
    }

    #[test]
    fn prompt_parses_category_and_context() {
        assert_eq!(
            parse_command("prompt daily").unwrap(),
            Some(Command::Prompt {
                category: EntryCategory::Daily,
                context: None
            })
        );
        assert_eq!(
            parse_command("PROMPT ai feeling stuck at work").unwrap(),
            Some(Command::Prompt {
                category: EntryCategory::Ai,
                context: Some("feeling stuck at work".to_string())
            })
        );
        assert!(parse_command("prompt yearly").is_err());
    }

    #[test]
    fn write_keeps_the_entry_text_verbatim() {
        assert_eq!(
            parse_command("write Today I shipped the release.").unwrap(),
            Some(Command::Write {
                text: "Today I shipped the release.".to_string()
            })
        );
        assert!(parse_command("write").is_err());
    }

    #[test]
    fn quit_has_an_alias() {
        assert_eq!(parse_command("quit").unwrap(), Some(Command::Quit));
        assert_eq!(parse_command("exit").unwrap(), Some(Command::Quit));
    }

    #[test]
    fn unknown_commands_point_at_help() {
        let err = parse_command("dance").unwrap_err();
        assert!(err.contains("help"));
    }
}
