//! Terminal view of a session.

use std::io::{self, Write};

use aia_conversation::SessionState;
use aia_core::Role;
use tokio::sync::watch;

/// Prints assistant messages as they appear in the transcript.
///
/// Reads snapshots only; it never touches the session itself.
pub struct TranscriptRenderer {
    updates: watch::Receiver<SessionState>,
    printed: usize,
    generation: u64,
}

impl TranscriptRenderer {
    pub fn new(updates: watch::Receiver<SessionState>) -> Self {
        let generation = updates.borrow().generation;
        Self {
            updates,
            printed: 0,
            generation,
        }
    }

    /// Print what was added since the last call.
    ///
    /// A transcript that shrank (clear or rollback) prints nothing; the
    /// renderer just resynchronises its position. After a clear, everything
    /// past the greeting is new, however many turns landed in between.
    pub fn render(&mut self, out: &mut impl Write) -> io::Result<()> {
        let state = self.updates.borrow_and_update().clone();
        let len = state.transcript.len();

        if state.generation != self.generation {
            self.generation = state.generation;
            self.printed = self.printed.min(1);
        }

        if len > self.printed {
            for message in &state.transcript[self.printed..] {
                if message.role == Role::Assistant {
                    writeln!(out, "\nAsteca: {}\n", message.content)?;
                }
            }
        }

        self.printed = len;
        out.flush()
    }
}
