// ✉️ Mail - messages sent to account owners
//
// Delivery goes through the `Mailer` trait. The console mailer logs each
// message; the memory mailer keeps them for inspection.

use crate::error::{Result, TrackerError};
use serde::Serialize;
use std::sync::{Arc, Mutex};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Mail {
    pub to: String,
    pub subject: String,
    pub body: String,
}

pub trait Mailer: Send + Sync {
    fn send(&self, mail: Mail) -> Result<()>;
}

/// Writes messages to the log
#[derive(Debug, Default, Clone, Copy)]
pub struct ConsoleMailer;

impl Mailer for ConsoleMailer {
    fn send(&self, mail: Mail) -> Result<()> {
        tracing::info!(to = %mail.to, subject = %mail.subject, "mail sent\n{}", mail.body);
        Ok(())
    }
}

/// Keeps every message in memory
#[derive(Debug, Default, Clone)]
pub struct MemoryMailer {
    outbox: Arc<Mutex<Vec<Mail>>>,
}

impl MemoryMailer {
    pub fn new() -> Self {
        MemoryMailer::default()
    }

    pub fn sent(&self) -> Vec<Mail> {
        self.outbox.lock().map(|o| o.clone()).unwrap_or_default()
    }

    pub fn last(&self) -> Option<Mail> {
        self.sent().pop()
    }
}

impl Mailer for MemoryMailer {
    fn send(&self, mail: Mail) -> Result<()> {
        self.outbox
            .lock()
            .map_err(|_| TrackerError::LockPoisoned)?
            .push(mail);
        Ok(())
    }
}

// ============================================================================
// MESSAGES
// ============================================================================

pub fn activation_url(site_url: &str, key: &str) -> String {
    format!(
        "{}/api/tracker/user_activation/{}",
        site_url.trim_end_matches('/'),
        key
    )
}

pub fn password_reset_url(site_url: &str, key: &str) -> String {
    format!(
        "{}/api/tracker/password_reset_confirm/{}",
        site_url.trim_end_matches('/'),
        key
    )
}

pub fn creation_mail(to: &str, username: &str, site_url: &str, key: &str, validity_days: i64) -> Mail {
    Mail {
        to: to.to_string(),
        subject: "Complete your account creation".to_string(),
        body: format!(
            "To complete the creation of the account \"{}\", please visit the following URL \
             within {} days:\n\n{}\n",
            username,
            validity_days,
            activation_url(site_url, key)
        ),
    }
}

pub fn deletion_mail(to: &str, username: &str, site_url: &str, key: &str, validity_days: i64) -> Mail {
    Mail {
        to: to.to_string(),
        subject: "Your account has been deleted".to_string(),
        body: format!(
            "The account \"{}\" has been deactivated and will be removed. To restore it, \
             visit the following URL within {} days:\n\n{}\n",
            username,
            validity_days,
            activation_url(site_url, key)
        ),
    }
}

pub fn password_reset_mail(to: &str, username: &str, site_url: &str, key: &str) -> Mail {
    Mail {
        to: to.to_string(),
        subject: "Password reset".to_string(),
        body: format!(
            "A password reset was requested for the account \"{}\". Choose a new password \
             at the following URL:\n\n{}\n\nIgnore this message if you did not ask for it.\n",
            username,
            password_reset_url(site_url, key)
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_activation_url() {
        assert_eq!(
            activation_url("http://localhost:3000/", "abc"),
            "http://localhost:3000/api/tracker/user_activation/abc"
        );
    }

    #[test]
    fn test_memory_mailer_keeps_messages() {
        let mailer = MemoryMailer::new();
        let clone = mailer.clone();
        clone
            .send(creation_mail("a@b.org", "alice", "http://x", "k", 30))
            .unwrap();

        let mail = mailer.last().unwrap();
        assert_eq!(mail.to, "a@b.org");
        assert!(mail.body.contains("http://x/api/tracker/user_activation/k"));
        assert!(mail.body.contains("alice"));
    }
}
