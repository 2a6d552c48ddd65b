//! In-memory [`Transport`] fake for scenario tests (§8).
//!
//! Responses are queued per command/AT-string. A queue with more than one
//! entry is consumed front-to-back, one call per response; a queue with
//! exactly one entry is treated as "sticky" and repeats for every further
//! call, which is what the recovery-ladder and ping-storm scenarios need
//! (e.g. `lsusb` keeps answering the same way across many polls).
//! Unqueued commands default to an empty success, so a test only has to
//! program the fragments it cares about.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

use async_trait::async_trait;

use super::Transport;
use crate::error::TransportError;

#[derive(Debug, Clone)]
enum Canned {
    Ok(String),
    Err,
}

#[derive(Default)]
pub struct FakeTransport {
    shell: Mutex<HashMap<String, VecDeque<Canned>>>,
    at: Mutex<HashMap<String, VecDeque<Canned>>>,
    calls: Mutex<Vec<String>>,
}

impl FakeTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a successful reply for the next call to `run_shell(command, _)`.
    pub fn queue_shell_ok(&self, command: &str, reply: impl Into<String>) {
        Self::push(&self.shell, command, Canned::Ok(reply.into()));
    }

    /// Queue a failing call to `run_shell(command, _)`.
    pub fn queue_shell_err(&self, command: &str) {
        Self::push(&self.shell, command, Canned::Err);
    }

    /// Queue a successful reply for the next call to `run_at(at_command)`.
    pub fn queue_at_ok(&self, at_command: &str, reply: impl Into<String>) {
        Self::push(&self.at, at_command, Canned::Ok(reply.into()));
    }

    /// Queue a failing call to `run_at(at_command)`.
    pub fn queue_at_err(&self, at_command: &str) {
        Self::push(&self.at, at_command, Canned::Err);
    }

    /// Every `run_shell`/`run_at` command string, in call order, so a
    /// scenario test can assert an action was (or wasn't) invoked.
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    fn push(table: &Mutex<HashMap<String, VecDeque<Canned>>>, key: &str, canned: Canned) {
        table.lock().unwrap().entry(key.to_string()).or_default().push_back(canned);
    }

    fn take(table: &Mutex<HashMap<String, VecDeque<Canned>>>, key: &str) -> Canned {
        let mut guard = table.lock().unwrap();
        let Some(queue) = guard.get_mut(key) else {
            return Canned::Ok(String::new());
        };

        if queue.len() > 1 {
            queue.pop_front().expect("len > 1 implies a front element")
        } else {
            queue.front().cloned().unwrap_or(Canned::Ok(String::new()))
        }
    }
}

#[async_trait]
impl Transport for FakeTransport {
    async fn run_shell(&self, command: &str, _args: &[&str]) -> Result<String, TransportError> {
        self.calls.lock().unwrap().push(command.to_string());
        match Self::take(&self.shell, command) {
            Canned::Ok(reply) => Ok(reply),
            Canned::Err => Err(TransportError::NonZeroExit { command: command.to_string(), status: 1 }),
        }
    }

    async fn run_at(&self, at_command: &str) -> Result<String, TransportError> {
        self.calls.lock().unwrap().push(at_command.to_string());
        match Self::take(&self.at, at_command) {
            Canned::Ok(reply) => Ok(reply),
            Canned::Err => Err(TransportError::NonZeroExit { command: at_command.to_string(), status: 1 }),
        }
    }
}
