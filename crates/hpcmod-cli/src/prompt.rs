use std::io::{self, BufRead, Write};

use anyhow::{Context, Result};
use hpcmod_core::traits::Confirm;

/// Asks on stderr and reads the answer from stdin.
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct TerminalConfirm;

impl Confirm for TerminalConfirm {
    fn confirm(&self, message: &str) -> Result<bool> {
        let stdin = io::stdin();
        let mut input = stdin.lock();
        let mut output = io::stderr();
        read_answer(&mut input, &mut output, message)
    }
}

/// Re-asks until the answer is yes or no. End of input declines.
pub(crate) fn read_answer<R: BufRead, W: Write>(
    input: &mut R,
    output: &mut W,
    message: &str,
) -> Result<bool> {
    loop {
        write!(output, "{message} [y/n] ").context("failed to write prompt")?;
        output.flush().context("failed to flush prompt")?;

        let mut line = String::new();
        let read = input
            .read_line(&mut line)
            .context("failed to read confirmation")?;
        if read == 0 {
            writeln!(output).context("failed to write prompt")?;
            return Ok(false);
        }

        match line.trim().to_ascii_lowercase().as_str() {
            "y" | "yes" => return Ok(true),
            "n" | "no" => return Ok(false),
            _ => writeln!(output, "please answer y or n").context("failed to write prompt")?,
        }
    }
}
