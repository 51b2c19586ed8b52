//! Terminal presenter for the chat commands.

use std::io::Write;

use crate::history::Role;
use crate::render::{PlainText, TextRenderer};
use crate::session::{PENDING_TEXT, Presenter};

const DIM: &str = "\x1b[2m";
const RESET: &str = "\x1b[0m";
const CLEAR_LINE: &str = "\r\x1b[2K";

/// Writes assistant messages to a terminal. User messages are not echoed
/// because the line editor already shows what was typed.
pub struct TerminalPresenter<W, R = PlainText> {
    out: W,
    renderer: R,
    replies_only: bool,
    seen_user: bool,
}

impl<W: Write> TerminalPresenter<W> {
    pub fn new(out: W) -> Self {
        Self {
            out,
            renderer: PlainText,
            replies_only: false,
            seen_user: false,
        }
    }

    /// Only print assistant messages that answer a user message, no indicator.
    pub fn replies_only(out: W) -> Self {
        Self {
            replies_only: true,
            ..Self::new(out)
        }
    }
}

impl<W: Write, R: TextRenderer> TerminalPresenter<W, R> {
    pub fn with_renderer<R2: TextRenderer>(self, renderer: R2) -> TerminalPresenter<W, R2> {
        TerminalPresenter {
            out: self.out,
            renderer,
            replies_only: self.replies_only,
            seen_user: self.seen_user,
        }
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write, R: TextRenderer> Presenter for TerminalPresenter<W, R> {
    fn message(&mut self, text: &str, sender: Role) {
        match sender {
            Role::User => self.seen_user = true,
            Role::System => {}
            Role::Assistant => {
                if self.replies_only && !self.seen_user {
                    return;
                }
                let rendered = self.renderer.render(text);
                let _ = writeln!(self.out, "{}\n", rendered.trim_end());
                let _ = self.out.flush();
            }
        }
    }

    fn pending(&mut self) {
        if self.replies_only {
            return;
        }
        let _ = write!(self.out, "{DIM}{PENDING_TEXT}{RESET}");
        let _ = self.out.flush();
    }

    fn settle(&mut self) {
        if self.replies_only {
            return;
        }
        let _ = write!(self.out, "{CLEAR_LINE}");
        let _ = self.out.flush();
    }
}
