//! Interactive terminal operator

use std::io::{self, BufRead, Write};
use twofa_core::{is_affirmative, Operator};

/// Prints to stdout/stderr and reads confirmations from stdin
#[derive(Debug, Default)]
pub struct TerminalOperator;

impl Operator for TerminalOperator {
    fn say(&mut self, line: &str) {
        println!("{}", line);
    }

    fn warn(&mut self, line: &str) {
        eprintln!("{}", line);
    }

    fn confirm(&mut self, prompt: &str) -> bool {
        print!("{}", prompt);
        if io::stdout().flush().is_err() {
            return false;
        }

        let mut answer = String::new();
        match io::stdin().lock().read_line(&mut answer) {
            // EOF counts as "no"
            Ok(0) | Err(_) => false,
            Ok(_) => is_affirmative(&answer),
        }
    }
}
