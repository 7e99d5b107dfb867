// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

//! Plain-text request log
//!
//! One line per request and per response, appended to `logs/requests.log`.
//! Write failures are logged and swallowed: the log is an operator aid,
//! never part of the proxy's correctness.

use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::Local;
use parking_lot::Mutex;

/// Log file name inside the log directory
pub const REQUESTS_FILE: &str = "requests.log";

/// Append-only request/response line log
pub struct RequestLog {
    path: PathBuf,
    lock: Mutex<()>,
}

impl RequestLog {
    /// Create a log writing into `dir`
    pub fn new(dir: impl AsRef<Path>) -> Self {
        Self {
            path: dir.as_ref().join(REQUESTS_FILE),
            lock: Mutex::new(()),
        }
    }

    /// Log the request phase of a transaction
    pub fn request(&self, method: &str, url: &str, user_agent: &str, client_addr: &str) {
        self.append(&format!(
            "REQ {} {} UA:{} from:{}",
            method, url, user_agent, client_addr
        ));
    }

    /// Log the response phase of a transaction
    pub fn response(&self, method: &str, url: &str, status: u16, content_type: &str) {
        self.append(&format!(
            "RES {} {} -> {} ({})",
            method, url, status, content_type
        ));
    }

    fn append(&self, line: &str) {
        let stamped = format!("[{}] {}\n", Local::now().format("%Y-%m-%d %H:%M:%S"), line);
        let _guard = self.lock.lock();
        let result = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .and_then(|mut file| file.write_all(stamped.as_bytes()));
        if let Err(e) = result {
            tracing::warn!("failed to append request log: {}", e);
        }
    }

    /// Path of the underlying log file
    pub fn path(&self) -> &Path {
        &self.path
    }
}
