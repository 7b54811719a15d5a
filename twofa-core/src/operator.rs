//! Operator console used by the audit and enforcement commands

use std::collections::VecDeque;

/// Where command output goes and where confirmations come from.
///
/// `say` is regular output, `warn` goes to the error stream.
pub trait Operator: Send {
    fn say(&mut self, line: &str);

    fn warn(&mut self, line: &str);

    /// Ask a yes/no question; only an explicit "yes" counts
    fn confirm(&mut self, prompt: &str) -> bool;
}

/// Only `yes` (any case, surrounding whitespace ignored) is affirmative
pub fn is_affirmative(answer: &str) -> bool {
    answer.trim().eq_ignore_ascii_case("yes")
}

/// Operator with canned answers that records everything it is told
#[derive(Debug, Default)]
pub struct ScriptedOperator {
    answers: VecDeque<String>,
    pub stdout: Vec<String>,
    pub stderr: Vec<String>,
    pub prompts: Vec<String>,
}

impl ScriptedOperator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue answers for upcoming prompts; an exhausted queue answers ""
    pub fn answering<I, S>(answers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            answers: answers.into_iter().map(Into::into).collect(),
            ..Self::default()
        }
    }

    pub fn output(&self) -> String {
        self.stdout.join("\n")
    }

    pub fn errors(&self) -> String {
        self.stderr.join("\n")
    }
}

impl Operator for ScriptedOperator {
    fn say(&mut self, line: &str) {
        self.stdout.push(line.to_string());
    }

    fn warn(&mut self, line: &str) {
        self.stderr.push(line.to_string());
    }

    fn confirm(&mut self, prompt: &str) -> bool {
        self.prompts.push(prompt.to_string());
        let answer = self.answers.pop_front().unwrap_or_default();
        is_affirmative(&answer)
    }
}
