// src/notify.rs - Out-of-band message delivery capability
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use log::{info, warn};

/// Delivery channel for one-time codes.
///
/// Returns true when the message was handed off to the recipient. The engine
/// only requires that a code reaches the user out of band.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn deliver(&self, recipient: &str, subject: &str, body: &str) -> bool;
}

/// Prints the message to the console instead of sending it; always succeeds
pub struct ConsoleNotifier;

#[async_trait]
impl Notifier for ConsoleNotifier {
    async fn deliver(&self, recipient: &str, subject: &str, body: &str) -> bool {
        println!(
            "Email to {}: Subject: {}, Body: {} (simulated)",
            recipient, subject, body
        );
        // Keep the code itself out of the log file
        info!("delivered '{}' message to {}", subject, recipient);
        true
    }
}

/// Test double that captures the trailing numeric code of each message into a
/// shared mailbox
pub struct MailboxNotifier {
    mailbox: Arc<Mutex<Option<String>>>,
    fail_delivery: bool,
}

impl MailboxNotifier {
    pub fn new() -> (Self, Arc<Mutex<Option<String>>>) {
        let mailbox = Arc::new(Mutex::new(None));
        (
            MailboxNotifier {
                mailbox: mailbox.clone(),
                fail_delivery: false,
            },
            mailbox,
        )
    }

    /// A channel that refuses every message
    pub fn failing() -> Self {
        MailboxNotifier {
            mailbox: Arc::new(Mutex::new(None)),
            fail_delivery: true,
        }
    }
}

#[async_trait]
impl Notifier for MailboxNotifier {
    async fn deliver(&self, _recipient: &str, _subject: &str, body: &str) -> bool {
        if self.fail_delivery {
            return false;
        }

        let code = body
            .split_whitespace()
            .rev()
            .find(|token| !token.is_empty() && token.chars().all(|c| c.is_ascii_digit()));
        match code {
            Some(code) => {
                *self.mailbox.lock().unwrap() = Some(code.to_string());
                true
            }
            None => {
                warn!("no numeric code found in message body");
                false
            }
        }
    }
}
