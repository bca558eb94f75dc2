//! Plain-text rendering of errors, including server context when present.

use std::fmt;

use crate::error::Error;

struct DisplayError<'a>(&'a Error, bool);

/// Render an error for terminal output.
///
/// With `verbose` the server traceback and all attached headers are
/// included.
pub fn display_error(e: &Error, verbose: bool) -> impl fmt::Display + '_ {
    DisplayError(e, verbose)
}

impl fmt::Display for DisplayError<'_> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let DisplayError(e, verbose) = self;
        write!(f, "{e}")?;
        if let Some((line, col)) = e.line().zip(e.column()) {
            write!(f, " (on line {line}, column {col})")?;
        }
        if *verbose {
            if let Some(traceback) = e.server_traceback() {
                write!(f, "\n  Server traceback:")?;
                for line in traceback.lines() {
                    write!(f, "\n      {line}")?;
                }
            }
        }
        Ok(())
    }
}
