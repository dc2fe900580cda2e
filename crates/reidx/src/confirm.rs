//! ⌨️ Confirmation: asking a human "are you sure?" and actually listening to the answer.
//!
//! Accepts `y`/`yes`/`n`/`no` in any casing. Anything else earns a polite re-ask.
//! A closed or broken input stream is fatal: we don't guess what a human meant.
//!
//! Two answerers: [`TerminalConfirmation`] asks a real human through dialoguer, and
//! [`PromptConfirmation`] reads scripted lines from any reader, so tests feed canned
//! answers from a `Cursor` instead of waiting for somebody to type.

use std::io::{BufRead, Write};

use dialoguer::Input;
use dialoguer::theme::ColorfulTheme;
use tokio::runtime::{Handle, RuntimeFlavor};
use tracing::warn;

use crate::error::MigrationError;

/// 🙋 Anything that can answer a yes/no question.
pub trait Confirmation {
    fn confirm(&mut self, question: &str) -> Result<bool, MigrationError>;
}

/// 🔤 `Some(true)` for yes-ish, `Some(false)` for no-ish, `None` for "what?".
pub fn parse_answer(answer: &str) -> Option<bool> {
    let answer = answer.trim();
    if answer.eq_ignore_ascii_case("y") || answer.eq_ignore_ascii_case("yes") {
        Some(true)
    } else if answer.eq_ignore_ascii_case("n") || answer.eq_ignore_ascii_case("no") {
        Some(false)
    } else {
        None
    }
}

/// ⌨️ Line-based prompt over any reader/writer pair.
///
/// `max_attempts` None re-asks forever (the interactive default). Some(n) gives up after
/// n unrecognized answers with [`MigrationError::Confirmation`].
pub struct PromptConfirmation<R, W> {
    input: R,
    output: W,
    max_attempts: Option<usize>,
}

impl<R: BufRead, W: Write> PromptConfirmation<R, W> {
    pub fn new(input: R, output: W) -> Self {
        Self {
            input,
            output,
            max_attempts: None,
        }
    }

    pub fn with_max_attempts(mut self, max_attempts: usize) -> Self {
        self.max_attempts = Some(max_attempts);
        self
    }

    /// 📤 Give back the writer, so tests can read what we asked.
    pub fn into_output(self) -> W {
        self.output
    }
}

/// ✅ Validator for the interactive prompt: the error text is what the human sees.
#[allow(clippy::ptr_arg)] // dialoguer validates `Input<String>` through `&String`
fn validate_answer(answer: &String) -> Result<(), String> {
    parse_answer(answer)
        .map(|_| ())
        .ok_or_else(|| format!("'{}' is neither yes nor no", answer.trim()))
}

/// 🖥️ The real thing. dialoguer draws on stderr (stdout stays clean) and re-asks
/// until the answer parses. No terminal attached is a [`MigrationError::Confirmation`].
pub struct TerminalConfirmation {
    theme: ColorfulTheme,
}

impl Default for TerminalConfirmation {
    fn default() -> Self {
        Self::new()
    }
}

impl TerminalConfirmation {
    pub fn new() -> Self {
        Self {
            theme: ColorfulTheme::default(),
        }
    }
}

impl Confirmation for TerminalConfirmation {
    fn confirm(&mut self, question: &str) -> Result<bool, MigrationError> {
        let answer: String = Input::with_theme(&self.theme)
            .with_prompt(format!("{} (yes/no)", question))
            .validate_with(validate_answer)
            .interact_text()
            .map_err(|e| MigrationError::Confirmation(e.to_string()))?;

        parse_answer(&answer).ok_or_else(|| {
            MigrationError::Confirmation(format!("'{}' is neither yes nor no", answer.trim()))
        })
    }
}

pub fn terminal() -> TerminalConfirmation {
    TerminalConfirmation::new()
}

/// 🧵 Ask from inside async code. On a multi-thread runtime the read happens under
/// `block_in_place`, so the worker hands its other tasks away while a human thinks.
/// A current-thread runtime has nobody to hand them to, so there it's a plain call.
pub(crate) fn confirm_blocking(
    confirmation: &mut dyn Confirmation,
    question: &str,
) -> Result<bool, MigrationError> {
    match Handle::try_current() {
        Ok(handle) if handle.runtime_flavor() == RuntimeFlavor::MultiThread => {
            tokio::task::block_in_place(|| confirmation.confirm(question))
        }
        _ => confirmation.confirm(question),
    }
}

impl<R: BufRead, W: Write> Confirmation for PromptConfirmation<R, W> {
    fn confirm(&mut self, question: &str) -> Result<bool, MigrationError> {
        let mut attempts = 0usize;
        loop {
            write!(self.output, "{} (yes/no) ", question)
                .and_then(|_| self.output.flush())
                .map_err(|e| MigrationError::Confirmation(e.to_string()))?;

            let mut line = String::new();
            let read = self
                .input
                .read_line(&mut line)
                .map_err(|e| MigrationError::Confirmation(e.to_string()))?;
            if read == 0 {
                return Err(MigrationError::Confirmation(
                    "input closed before an answer was given".to_string(),
                ));
            }

            if let Some(answer) = parse_answer(&line) {
                return Ok(answer);
            }

            attempts += 1;
            warn!("🤔 '{}' is neither yes nor no, asking again", line.trim());
            if self.max_attempts.is_some_and(|max| attempts >= max) {
                return Err(MigrationError::Confirmation(format!(
                    "no recognizable answer after {} attempts",
                    attempts
                )));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn prompt(script: &str) -> PromptConfirmation<Cursor<Vec<u8>>, Vec<u8>> {
        PromptConfirmation::new(Cursor::new(script.as_bytes().to_vec()), Vec::new())
    }

    #[test]
    fn the_one_where_every_flavor_of_yes_and_no_is_understood() {
        for yes in ["y", "Y", "yes", "Yes", "YES", "yEs", "  y  "] {
            assert_eq!(parse_answer(yes), Some(true), "{yes:?} should be yes");
        }
        for no in ["n", "N", "no", "No", "NO", "nO"] {
            assert_eq!(parse_answer(no), Some(false), "{no:?} should be no");
        }
        for what in ["", "yep", "nah", "ye s", "1"] {
            assert_eq!(parse_answer(what), None, "{what:?} should be ignored");
        }
    }

    #[test]
    fn the_one_where_gibberish_earns_another_question() {
        let mut the_prompt = prompt("maybe\n\nsure\nNO\n");
        let the_answer = the_prompt.confirm("Continue?").expect("a no is still an answer");
        assert!(!the_answer);

        let the_transcript = String::from_utf8(the_prompt.into_output()).expect("utf-8");
        assert_eq!(the_transcript.matches("Continue? (yes/no) ").count(), 4);
    }

    #[test]
    fn the_one_where_the_input_stream_dies_mid_conversation() {
        let mut the_prompt = prompt("hmm\n");
        assert!(matches!(
            the_prompt.confirm("Continue?"),
            Err(MigrationError::Confirmation(_))
        ));
    }

    #[test]
    fn the_one_where_patience_is_bounded_when_asked() {
        let mut the_prompt = prompt("a\nb\nc\nyes\n").with_max_attempts(2);
        assert!(matches!(
            the_prompt.confirm("Continue?"),
            Err(MigrationError::Confirmation(_))
        ));
    }

    #[test]
    fn the_one_where_the_terminal_validator_turns_gibberish_away() {
        assert_eq!(validate_answer(&"YES".to_string()), Ok(()));
        assert_eq!(validate_answer(&" n ".to_string()), Ok(()));
        let the_complaint = validate_answer(&"maybe".to_string()).expect_err("maybe is not an answer");
        assert!(the_complaint.contains("maybe"));
        assert!(validate_answer(&String::new()).is_err());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn the_one_where_a_busy_runtime_still_gets_its_answer() {
        let mut the_prompt = prompt("y\n");
        assert!(confirm_blocking(&mut the_prompt, "Continue?").expect("yes is an answer"));
    }

    #[tokio::test]
    async fn the_one_where_a_single_threaded_runtime_asks_directly() {
        let mut the_prompt = prompt("no\n");
        assert!(!confirm_blocking(&mut the_prompt, "Continue?").expect("no is an answer"));
    }

    #[test]
    fn the_one_where_yes_means_yes() {
        let mut the_prompt = prompt("Yes\n");
        assert!(the_prompt.confirm("Continue?").expect("yes is an answer"));
    }
}
