//! Interactive capabilities the engine is driven through.

use std::collections::VecDeque;

use intake_core::SessionMemory;

const YES_WORDS: [&str; 8] = ["y", "yes", "ye", "yep", "yeah", "sure", "ok", "okay"];
const NO_WORDS: [&str; 3] = ["n", "no", "nope"];

/// Blocking question/answer channel with the user.
///
/// `ask` returns the trimmed answer; an exhausted input source answers blank.
pub trait Prompter {
    fn ask(&mut self, question: &str) -> String;
    fn say(&mut self, message: &str);
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Confirmation {
    Yes,
    No,
    Unclear,
}

impl Confirmation {
    pub fn parse(answer: &str) -> Self {
        let lowered = answer.trim().to_lowercase();
        if YES_WORDS.contains(&lowered.as_str()) {
            Self::Yes
        } else if NO_WORDS.contains(&lowered.as_str()) {
            Self::No
        } else {
            Self::Unclear
        }
    }

    pub fn is_yes(&self) -> bool {
        matches!(self, Self::Yes)
    }
}

/// Receives a persistable memory snapshot after every answer.
pub trait CheckpointSink {
    fn checkpoint(&self, snapshot: &SessionMemory);
}

#[derive(Clone, Copy, Debug, Default)]
pub struct NoCheckpoint;

impl CheckpointSink for NoCheckpoint {
    fn checkpoint(&self, _snapshot: &SessionMemory) {}
}

/// Answers from a fixed queue; blank once the queue runs dry.
#[derive(Clone, Debug, Default)]
pub struct ScriptedPrompter {
    answers: VecDeque<String>,
    pub asked: Vec<String>,
    pub said: Vec<String>,
}

impl ScriptedPrompter {
    pub fn new<I, S>(answers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            answers: answers.into_iter().map(Into::into).collect(),
            asked: Vec::new(),
            said: Vec::new(),
        }
    }

    pub fn remaining(&self) -> usize {
        self.answers.len()
    }
}

impl Prompter for ScriptedPrompter {
    fn ask(&mut self, question: &str) -> String {
        self.asked.push(question.to_string());
        self.answers.pop_front().map(|answer| answer.trim().to_string()).unwrap_or_default()
    }

    fn say(&mut self, message: &str) {
        self.said.push(message.to_string());
    }
}
