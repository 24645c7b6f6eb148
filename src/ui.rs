//! Local display seam shared by the operator console and the client.

use std::sync::{Arc, Mutex};

/// Something that can show a line to the local user
pub trait ChatUi: Send + Sync {
    fn display(&self, message: &str);
}

impl<T: ChatUi + ?Sized> ChatUi for Arc<T> {
    fn display(&self, message: &str) {
        (**self).display(message)
    }
}

/// Prints to stdout with a fixed prefix
#[derive(Debug, Clone, Copy)]
pub struct StdoutUi {
    prefix: &'static str,
}

impl StdoutUi {
    pub fn server() -> Self {
        StdoutUi { prefix: "SERVER MESSAGE> " }
    }

    pub fn client() -> Self {
        StdoutUi { prefix: "> " }
    }
}

impl ChatUi for StdoutUi {
    fn display(&self, message: &str) {
        println!("{}{}", self.prefix, message);
    }
}

/// Keeps every displayed line in memory, for embedding and tests
#[derive(Debug, Default)]
pub struct MemoryUi {
    lines: Mutex<Vec<String>>,
}

impl MemoryUi {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lines(&self) -> Vec<String> {
        self.lines.lock().map(|l| l.clone()).unwrap_or_default()
    }

    pub fn last(&self) -> Option<String> {
        self.lines().pop()
    }

    pub fn contains(&self, needle: &str) -> bool {
        self.lines().iter().any(|l| l.contains(needle))
    }
}

impl ChatUi for MemoryUi {
    fn display(&self, message: &str) {
        if let Ok(mut lines) = self.lines.lock() {
            lines.push(message.to_string());
        }
    }
}
