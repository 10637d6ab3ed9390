//! Interactive read-eval-print loop
//!
//! Reads lines with `rustyline`, turns them into commands and runs them one
//! at a time against a [`Session`]. Each command is awaited to completion
//! before the next prompt is shown.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use directories::ProjectDirs;
use rand::Rng;
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;

use crate::commands::{Command, Outcome, Session};
use crate::data::Transport;

const PROMPT: &str = "Pokedex > ";

/// Splits an input line into lowercase words
///
/// # Examples
/// ```
/// use pokedex::repl::clean_input;
///
/// assert_eq!(clean_input("  Catch   PIKACHU "), vec!["catch", "pikachu"]);
/// ```
pub fn clean_input(input: &str) -> Vec<String> {
    input
        .split_whitespace()
        .map(str::to_lowercase)
        .collect()
}

/// Returns the default location of the history file
///
/// Uses `~/.local/share/pokedex/history.txt` on Linux, or the equivalent XDG
/// path on other platforms. Returns `None` if no home directory is known.
pub fn default_history_path() -> Option<PathBuf> {
    let project_dirs = ProjectDirs::from("", "", "pokedex")?;
    Some(project_dirs.data_dir().join("history.txt"))
}

/// Creates the directory a file will be written into
fn ensure_parent_dir(path: &Path) -> io::Result<()> {
    match path.parent() {
        Some(parent) => fs::create_dir_all(parent),
        None => Ok(()),
    }
}

/// The interactive loop around a [`Session`]
pub struct Repl<T, R> {
    session: Session<T, R>,
    editor: DefaultEditor,
    history_path: Option<PathBuf>,
}

impl<T: Transport, R: Rng> Repl<T, R> {
    /// Creates a REPL, loading line history from `history_path` if given
    pub fn new(session: Session<T, R>, history_path: Option<PathBuf>) -> Result<Self, ReadlineError> {
        let mut editor = DefaultEditor::new()?;
        if let Some(path) = &history_path {
            // A missing history file is normal on first run
            if editor.load_history(path).is_err() {
                tracing::debug!(path = %path.display(), "no history loaded");
            }
        }

        Ok(Self {
            session,
            editor,
            history_path,
        })
    }

    /// Runs until `exit`, Ctrl-C or end of input
    pub async fn run(&mut self) -> Result<(), ReadlineError> {
        let mut stdout = io::stdout();

        loop {
            let line = match self.editor.readline(PROMPT) {
                Ok(line) => line,
                Err(ReadlineError::Interrupted | ReadlineError::Eof) => break,
                Err(e) => return Err(e),
            };

            let words = clean_input(&line);
            if words.is_empty() {
                continue;
            }
            if let Err(e) = self.editor.add_history_entry(line.trim()) {
                tracing::debug!(error = %e, "failed to record history entry");
            }

            let command = match Command::parse(&words) {
                Ok(command) => command,
                Err(e) => {
                    println!("{e}");
                    continue;
                }
            };

            if self.session.execute(&command, &mut stdout).await? == Outcome::Exit {
                break;
            }
        }

        self.session.api().cache().stop_reap_loop();
        self.save_history();
        Ok(())
    }

    fn save_history(&mut self) {
        let Some(path) = &self.history_path else {
            return;
        };
        if let Err(e) = ensure_parent_dir(path) {
            tracing::warn!(path = %path.display(), error = %e, "failed to create history directory");
            return;
        }
        if let Err(e) = self.editor.save_history(path) {
            tracing::warn!(path = %path.display(), error = %e, "failed to save history");
        }
    }
}
