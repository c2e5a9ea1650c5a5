//! In-memory [EmailSender] fake, used to test that one site's send failure
//! must not affect any other site.

use std::collections::HashSet;
use std::sync::Mutex;

use async_trait::async_trait;

use crate::artifact::Artifact;
use crate::error::{Result, SyncError};

use super::EmailSender;

#[derive(Debug, Default)]
pub struct FakeEmailSender {
    pub fail_recipients: HashSet<String>,
    pub sent: Mutex<Vec<(String, Artifact)>>,
}

impl FakeEmailSender {
    pub fn failing(recipients: impl IntoIterator<Item = String>) -> Self {
        Self {
            fail_recipients: recipients.into_iter().collect(),
            sent: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl EmailSender for FakeEmailSender {
    async fn send(&self, to: &str, artifact: &Artifact) -> Result<()> {
        if self.fail_recipients.contains(to) {
            return Err(SyncError::Delivery(format!("fake delivery failure for {to}")));
        }
        self.sent.lock().unwrap().push((to.to_string(), artifact.clone()));
        Ok(())
    }
}
