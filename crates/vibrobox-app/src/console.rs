//! Operator console
//!
//! Reads the patient's answers from stdin, one per line, while a run is in
//! progress. Besides answers the operator can type `q` to stop the run, and
//! during discrimination `demo` or `rewrite <motor>`.

use tokio::io::{AsyncBufReadExt, BufReader, Lines, Stdin};
use vibrobox_core::{Category, MotorIndex};
use vibrobox_native::{AnswerError, ProcedureEvent, RunHandle};

/// One line of operator input
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Command {
    /// Anything that is not a control word
    Answer(String),
    /// Stop the run
    Quit,
    /// Replay the training demo, then resume
    Demo,
    /// Re-run a motor from scratch
    Rewrite(MotorIndex),
    /// Blank line
    Empty,
}

/// Parse one input line.
pub fn parse_command(line: &str) -> Command {
    let line = line.trim();
    let mut words = line.split_whitespace();
    match (words.next(), words.next(), words.next()) {
        (None, _, _) => Command::Empty,
        (Some(word), None, None) if word.eq_ignore_ascii_case("q") => Command::Quit,
        (Some(word), None, None) if word.eq_ignore_ascii_case("demo") => Command::Demo,
        (Some(word), Some(motor), None) if word.eq_ignore_ascii_case("rewrite") => {
            match motor.parse() {
                Ok(motor) => Command::Rewrite(motor),
                Err(_) => Command::Answer(line.to_string()),
            }
        }
        _ => Command::Answer(line.to_string()),
    }
}

/// Yes/no answer for the threshold test.
pub fn parse_felt(text: &str) -> Option<bool> {
    match text.to_lowercase().as_str() {
        "y" | "yes" | "+" | "1" | "д" | "да" => Some(true),
        "n" | "no" | "-" | "0" | "н" | "нет" => Some(false),
        _ => None,
    }
}

/// Numbered answer (region or level).
pub fn parse_category(text: &str) -> Option<Category> {
    text.parse().ok()
}

/// What the operator asked for besides answering
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Interruption {
    /// `q`, or stdin closed
    Quit,
    /// `demo`
    Demo,
    /// `rewrite <motor>`
    Rewrite(MotorIndex),
}

/// Line reader over stdin
pub struct Console {
    lines: Lines<BufReader<Stdin>>,
    closed: bool,
}

impl Console {
    /// Console on the process stdin
    pub fn stdin() -> Self {
        Self {
            lines: BufReader::new(tokio::io::stdin()).lines(),
            closed: false,
        }
    }

    async fn next_line(&mut self) -> Option<String> {
        if self.closed {
            return std::future::pending().await;
        }
        match self.lines.next_line().await {
            Ok(Some(line)) => Some(line),
            Ok(None) => {
                self.closed = true;
                None
            }
            Err(e) => {
                tracing::warn!(error = %e, "Failed to read stdin");
                self.closed = true;
                None
            }
        }
    }

    /// Drive a run to its end: print prompts, forward answers, handle control
    /// words. Returns the first interruption the operator asked for, if any.
    ///
    /// `allow_session_commands` enables `demo` and `rewrite`.
    pub async fn drive<A, T>(
        &mut self,
        handle: &mut RunHandle<A, T>,
        parse: impl Fn(&str) -> Option<A>,
        allow_session_commands: bool,
        mut on_event: impl FnMut(&ProcedureEvent),
    ) -> Option<Interruption> {
        let mut interruption = None;
        loop {
            tokio::select! {
                event = handle.next_event() => match event {
                    Some(event) => {
                        describe(&event);
                        on_event(&event);
                    }
                    None => break,
                },
                line = self.next_line(), if interruption.is_none() => {
                    let Some(line) = line else {
                        interruption = Some(Interruption::Quit);
                        handle.cancel();
                        continue;
                    };
                    match parse_command(&line) {
                        Command::Empty => {}
                        Command::Quit => {
                            interruption = Some(Interruption::Quit);
                            handle.cancel();
                        }
                        Command::Demo if allow_session_commands => {
                            interruption = Some(Interruption::Demo);
                            handle.cancel();
                        }
                        Command::Rewrite(motor) if allow_session_commands => {
                            interruption = Some(Interruption::Rewrite(motor));
                            handle.cancel();
                        }
                        Command::Demo | Command::Rewrite(_) => {
                            println!("Not available in this test");
                        }
                        Command::Answer(text) => match parse(&text) {
                            Some(answer) => match handle.set_answer(answer) {
                                Ok(()) => {}
                                Err(AnswerError::SlotOccupied) => println!("Answer already given, wait for the next stimulus"),
                                Err(AnswerError::RunFinished) => {}
                            },
                            None => println!("Unrecognised answer: {text}"),
                        },
                    }
                }
            }
        }
        interruption
    }
}

/// Print the operator-facing part of an event.
fn describe(event: &ProcedureEvent) {
    match event {
        ProcedureEvent::Progress(progress) => match (progress.motor, progress.direction) {
            (Some(motor), Some(direction)) => println!(
                "Motor {motor}: pass {}/{} ({direction})",
                progress.done, progress.total
            ),
            (Some(motor), None) => {
                println!("Motor {motor}: {}/{}", progress.done, progress.total);
            }
            (None, _) => println!("Stimulus {}/{}", progress.done, progress.total),
        },
        ProcedureEvent::AwaitingResponse => println!("> answer:"),
        ProcedureEvent::PassFinished {
            motor, threshold, ..
        } => println!("Motor {motor}: pass result {threshold} PWM"),
        ProcedureEvent::MotorCompleted { motor, trials } => {
            let correct = trials.iter().filter(|t| t.is_correct()).count();
            println!("Motor {motor} done: {correct}/{} correct", trials.len());
        }
        ProcedureEvent::StateChanged { state } => {
            tracing::debug!(%state, "Engine state");
        }
        ProcedureEvent::Presenting { .. }
        | ProcedureEvent::StaircaseStep(_)
        | ProcedureEvent::TrialRecorded(_) => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_command() {
        assert_eq!(parse_command("  "), Command::Empty);
        assert_eq!(parse_command("q"), Command::Quit);
        assert_eq!(parse_command("Q"), Command::Quit);
        assert_eq!(parse_command("demo"), Command::Demo);
        assert_eq!(parse_command("rewrite 4"), Command::Rewrite(4));
        assert_eq!(parse_command("rewrite x"), Command::Answer("rewrite x".into()));
        assert_eq!(parse_command(" 3 "), Command::Answer("3".into()));
    }

    #[test]
    fn test_parse_felt() {
        assert_eq!(parse_felt("Y"), Some(true));
        assert_eq!(parse_felt("0"), Some(false));
        assert_eq!(parse_felt("да"), Some(true));
        assert_eq!(parse_felt("maybe"), None);
    }

    #[test]
    fn test_parse_category() {
        assert_eq!(parse_category("2"), Some(2));
        assert_eq!(parse_category("-1"), None);
        assert_eq!(parse_category("two"), None);
    }
}
