//! Shared test utilities.
//!
//! All tests that manipulate environment variables or the current directory
//! must use the shared `env_lock()` to prevent race conditions.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, OnceLock};

use crate::dispatch::{HttpReply, Transport};
use crate::history::Role;
use crate::session::Presenter;

/// Global lock for tests that modify environment variables or current directory.
/// All such tests MUST hold this lock to prevent race conditions.
pub fn env_lock() -> std::sync::MutexGuard<'static, ()> {
    static LOCK: OnceLock<Mutex<()>> = OnceLock::new();
    LOCK.get_or_init(|| Mutex::new(()))
        .lock()
        .unwrap_or_else(|e| e.into_inner())
}

/// RAII guard for temporarily setting an environment variable.
pub struct EnvGuard {
    key: String,
    old: Option<String>,
}

impl EnvGuard {
    pub fn set(key: &str, value: &str) -> Self {
        let old = std::env::var(key).ok();
        unsafe {
            std::env::set_var(key, value);
        }
        Self {
            key: key.to_string(),
            old,
        }
    }
}

impl Drop for EnvGuard {
    fn drop(&mut self) {
        if let Some(val) = &self.old {
            unsafe {
                std::env::set_var(&self.key, val);
            }
        } else {
            unsafe {
                std::env::remove_var(&self.key);
            }
        }
    }
}

/// RAII guard for temporarily changing the current directory.
pub struct DirGuard {
    original: PathBuf,
}

impl DirGuard {
    pub fn set(path: &Path) -> anyhow::Result<Self> {
        let original = std::env::current_dir()?;
        std::env::set_current_dir(path)?;
        Ok(Self { original })
    }
}

impl Drop for DirGuard {
    fn drop(&mut self) {
        let _ = std::env::set_current_dir(&self.original);
    }
}

#[derive(Debug, Clone)]
pub struct SentRequest {
    pub url: String,
    pub bearer: String,
    pub body: String,
}

/// In-memory transport that replays queued replies in order.
#[derive(Default)]
pub struct ScriptedTransport {
    replies: RefCell<VecDeque<Result<HttpReply, String>>>,
    sent: RefCell<Vec<SentRequest>>,
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_reply(&self, status: u16, body: &str) {
        self.replies.borrow_mut().push_back(Ok(HttpReply {
            status,
            body: body.to_string(),
        }));
    }

    pub fn push_failure(&self, message: &str) {
        self.replies.borrow_mut().push_back(Err(message.to_string()));
    }

    pub fn requests(&self) -> Vec<SentRequest> {
        self.sent.borrow().clone()
    }
}

impl Transport for ScriptedTransport {
    fn post_json(&self, url: &str, bearer: &str, body: &str) -> anyhow::Result<HttpReply> {
        self.sent.borrow_mut().push(SentRequest {
            url: url.to_string(),
            bearer: bearer.to_string(),
            body: body.to_string(),
        });
        match self.replies.borrow_mut().pop_front() {
            Some(Ok(reply)) => Ok(reply),
            Some(Err(message)) => Err(anyhow::anyhow!(message)),
            None => Err(anyhow::anyhow!("no scripted reply left")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Presented {
    Message(Role, String),
    Pending,
    Settled,
}

#[derive(Debug, Default)]
pub struct RecordingPresenter {
    pub events: Vec<Presented>,
}

impl RecordingPresenter {
    pub fn last_text(&self) -> Option<&str> {
        self.events.iter().rev().find_map(|e| match e {
            Presented::Message(_, text) => Some(text.as_str()),
            _ => None,
        })
    }

    /// Pending indicators shown minus those cleared.
    pub fn pending_balance(&self) -> i64 {
        self.events.iter().fold(0, |acc, e| match e {
            Presented::Pending => acc + 1,
            Presented::Settled => acc - 1,
            Presented::Message(..) => acc,
        })
    }
}

impl Presenter for RecordingPresenter {
    fn message(&mut self, text: &str, sender: Role) {
        self.events.push(Presented::Message(sender, text.to_string()));
    }

    fn pending(&mut self) {
        self.events.push(Presented::Pending);
    }

    fn settle(&mut self) {
        self.events.push(Presented::Settled);
    }
}
