//! The Delivery component: sends one site's artifact as an email
//! attachment. Trait mirrors [crate::source::SourceConnector]'s shape.

use async_trait::async_trait;
use lettre::message::{header::ContentType, Attachment, MultiPart, SinglePart};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};

use crate::artifact::Artifact;
use crate::error::Result;
use crate::model::EmailTransport;

#[cfg(any(test, feature = "testing"))]
pub mod fake;

#[async_trait]
pub trait EmailSender: Send + Sync {
    async fn send(&self, to: &str, artifact: &Artifact) -> Result<()>;
}

pub struct LettreSender {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from_address: String,
}

impl LettreSender {
    pub fn new(config: &EmailTransport) -> Result<Self> {
        let mut builder = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.smtp_host)
            .map_err(crate::error::SyncError::from)?
            .port(config.smtp_port);

        if let (Some(username), Some(password)) = (&config.username, &config.password) {
            builder = builder.credentials(Credentials::new(username.clone(), password.clone()));
        }

        Ok(Self {
            transport: builder.build(),
            from_address: config.from_address.clone(),
        })
    }

    /// Renders the body text as one `<table>: <n> records` line per table,
    /// in artifact order.
    fn body(artifact: &Artifact) -> String {
        let total: usize = artifact.table_counts.iter().map(|(_, n)| n).sum();
        let mut body = format!(
            "Database Sync - {} - {} tables, {} records\n\n",
            artifact.site,
            artifact.table_counts.len(),
            total
        );
        for (table, count) in &artifact.table_counts {
            body.push_str(&format!("{table}: {count} records\n"));
        }
        body
    }

    fn subject(artifact: &Artifact) -> String {
        let total: usize = artifact.table_counts.iter().map(|(_, n)| n).sum();
        format!(
            "Database Sync - {} - {} tables, {} records",
            artifact.site,
            artifact.table_counts.len(),
            total
        )
    }
}

#[async_trait]
impl EmailSender for LettreSender {
    async fn send(&self, to: &str, artifact: &Artifact) -> Result<()> {
        let file_name = artifact
            .path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("sync.csv")
            .to_string();
        let attachment_bytes = tokio::fs::read(&artifact.path).await?;

        let attachment = Attachment::new(file_name).body(
            attachment_bytes,
            ContentType::parse("text/csv").map_err(|e| {
                crate::error::SyncError::Internal(format!("invalid content type: {e}"))
            })?,
        );

        let body = MultiPart::mixed()
            .singlepart(SinglePart::plain(Self::body(artifact)))
            .singlepart(attachment);

        let email = Message::builder()
            .from(self.from_address.parse()?)
            .to(to.parse()?)
            .subject(Self::subject(artifact))
            .multipart(body)?;

        self.transport.send(email).await.map_err(crate::error::SyncError::from)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{SiteCode, TableName};
    use std::path::PathBuf;

    #[test]
    fn subject_matches_original_format() {
        let artifact = Artifact {
            path: PathBuf::from("/tmp/sync_SITE_A_20260101_000000.csv"),
            site: SiteCode::from("SITE_A"),
            table_counts: vec![(TableName::from("PRODUCTS"), 10), (TableName::from("ORDERS"), 5)],
        };
        assert_eq!(
            LettreSender::subject(&artifact),
            "Database Sync - SITE_A - 2 tables, 15 records"
        );
    }

    #[test]
    fn body_lists_one_line_per_table() {
        let artifact = Artifact {
            path: PathBuf::from("/tmp/sync_SITE_A_20260101_000000.csv"),
            site: SiteCode::from("SITE_A"),
            table_counts: vec![(TableName::from("PRODUCTS"), 10)],
        };
        let body = LettreSender::body(&artifact);
        assert!(body.contains("PRODUCTS: 10 records"));
    }
}
