//! Terminal status sink
//!
//! Paints transient phase messages as a spinner line on stderr and keeps
//! persistent progress lines on stdout. When stderr is not a terminal the
//! spinner stays silent and only progress lines are printed, so piped
//! output stays clean.

use std::io::{IsTerminal, Write};
use std::sync::atomic::{AtomicUsize, Ordering};

use conclave_core::StatusSink;

const FRAMES: [&str; 10] = ["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"];

/// Status sink for interactive terminals
#[derive(Debug)]
pub struct SpinnerSink {
    tty: bool,
    frame: AtomicUsize,
}

impl SpinnerSink {
    pub fn new() -> Self {
        Self {
            tty: std::io::stderr().is_terminal(),
            frame: AtomicUsize::new(0),
        }
    }
}

impl Default for SpinnerSink {
    fn default() -> Self {
        Self::new()
    }
}

impl StatusSink for SpinnerSink {
    fn progress(&self, line: &str) {
        if self.tty {
            eprint!("\r\x1b[K");
        }
        println!("{}", line);
    }

    fn phase(&self, message: &str) {
        if !self.tty {
            return;
        }
        let i = self.frame.fetch_add(1, Ordering::Relaxed) % FRAMES.len();
        eprint!("\r\x1b[K{} {}", FRAMES[i], message);
        let _ = std::io::stderr().flush();
    }

    fn clear(&self) {
        if self.tty {
            eprint!("\r\x1b[K");
            let _ = std::io::stderr().flush();
        }
    }

    fn enabled(&self) -> bool {
        self.tty
    }
}
