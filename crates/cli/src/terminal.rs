use std::io::{self, BufRead, Write};

use intake_agent::Prompter;

/// Line-oriented prompter over any reader/writer pair.
///
/// A closed or failing input answers blank so the engine can run to completion.
pub struct LinePrompter<R, W> {
    input: R,
    output: W,
}

impl LinePrompter<io::StdinLock<'static>, io::Stdout> {
    pub fn stdio() -> Self {
        Self::new(io::stdin().lock(), io::stdout())
    }
}

impl<R: BufRead, W: Write> LinePrompter<R, W> {
    pub fn new(input: R, output: W) -> Self {
        Self { input, output }
    }

    pub fn into_output(self) -> W {
        self.output
    }
}

impl<R: BufRead, W: Write> Prompter for LinePrompter<R, W> {
    fn ask(&mut self, question: &str) -> String {
        let _ = writeln!(self.output, "{question}");
        let _ = write!(self.output, "> ");
        let _ = self.output.flush();

        let mut line = String::new();
        match self.input.read_line(&mut line) {
            Ok(0) | Err(_) => {
                let _ = writeln!(self.output);
                String::new()
            }
            Ok(_) => line.trim().to_string(),
        }
    }

    fn say(&mut self, message: &str) {
        let _ = writeln!(self.output, "{message}");
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use intake_agent::Prompter;

    use super::LinePrompter;

    #[test]
    fn answers_are_trimmed_and_eof_reads_blank() {
        let mut prompter = LinePrompter::new(Cursor::new("  Toronto \n"), Vec::new());

        assert_eq!(prompter.ask("Where?"), "Toronto");
        assert_eq!(prompter.ask("Anything else?"), "");
        prompter.say("Thanks.");

        let transcript = String::from_utf8(prompter.into_output()).expect("utf8");
        assert!(transcript.starts_with("Where?\n> "));
        assert!(transcript.contains("Anything else?\n> "));
        assert!(transcript.ends_with("Thanks.\n"));
    }
}
