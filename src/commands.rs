// 💬 Commands - the text surface a chat layer (or CLI / HTTP) talks to
// Every command authorizes first, then runs against the tracker, then renders text

use crate::access::{AccessPolicy, Requester};
use crate::db::LedgerEntry;
use crate::error::LedgerError;
use crate::ingest::{ImageUpload, IngestReport, Tracker};
use crate::recognizer::Recognizer;
use std::sync::Arc;
use tracing::error;

/// How a command ended, for surfaces that map it to a status code
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplyStatus {
    Done,
    Denied,
    Rejected,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    pub status: ReplyStatus,
    pub text: String,
}

impl Reply {
    fn done(text: String) -> Self {
        Self {
            status: ReplyStatus::Done,
            text,
        }
    }

    fn from_error(err: &LedgerError) -> Self {
        let status = match err {
            LedgerError::AuthorizationDenied { .. } => ReplyStatus::Denied,
            LedgerError::NoAttachments => ReplyStatus::Rejected,
            // "No data" is an answer, not a fault
            LedgerError::EmptyLedger => ReplyStatus::Done,
            _ => {
                error!(error = %err, "command failed");
                ReplyStatus::Failed
            }
        };

        Self {
            status,
            text: err.user_message(),
        }
    }
}

pub struct CommandHandler {
    tracker: Arc<Tracker>,
    recognizer: Box<dyn Recognizer>,
    policy: AccessPolicy,
    default_limit: usize,
}

impl CommandHandler {
    pub fn new(
        tracker: Arc<Tracker>,
        recognizer: Box<dyn Recognizer>,
        policy: AccessPolicy,
        default_limit: usize,
    ) -> Self {
        Self {
            tracker,
            recognizer,
            policy,
            default_limit,
        }
    }

    pub fn tracker(&self) -> &Arc<Tracker> {
        &self.tracker
    }

    /// `process`: OCR the attached screenshots and update the ledger
    pub fn process(&self, requester: &Requester, images: &[ImageUpload]) -> Reply {
        let result = self
            .policy
            .check(requester)
            .and_then(|_| self.tracker.ingest(self.recognizer.as_ref(), images));

        match result {
            Ok(report) => Reply::done(render_summary(&report)),
            Err(e) => Reply::from_error(&e),
        }
    }

    /// `top`: ranked listing, `limit` defaults to the configured size
    pub fn top(&self, requester: &Requester, limit: Option<usize>) -> Reply {
        let limit = limit.unwrap_or(self.default_limit);
        let result = self
            .policy
            .check(requester)
            .and_then(|_| self.tracker.top(limit));

        match result {
            Ok(entries) => Reply::done(render_leaderboard(&entries)),
            Err(e) => Reply::from_error(&e),
        }
    }

    /// `reset`: wipe the event standings
    pub fn reset(&self, requester: &Requester) -> Reply {
        let result = self
            .policy
            .check(requester)
            .and_then(|_| self.tracker.reset(&requester.display_name));

        match result {
            Ok(_) => Reply::done("🧹 **Event data has been reset.** Ledger cleared.".to_string()),
            Err(e) => Reply::from_error(&e),
        }
    }
}

// ============================================================================
// RENDERING
// ============================================================================

pub fn render_summary(report: &IngestReport) -> String {
    let mut msg = format!(
        "✅ Successfully processed **{} entries** from **{} images**.",
        report.total_records, report.images_processed
    );

    if report.skipped.total() > 0 {
        msg.push_str(&format!(
            "\n⚠️ Skipped {} unreadable lines.",
            report.skipped.total()
        ));
    }

    let failed: Vec<&str> = report
        .images
        .iter()
        .filter(|img| img.error.is_some())
        .map(|img| img.filename.as_str())
        .collect();
    if !failed.is_empty() {
        msg.push_str(&format!("\n⚠️ Could not read: {}", failed.join(", ")));
    }

    msg
}

pub fn render_leaderboard(entries: &[LedgerEntry]) -> String {
    let mut msg = String::from("**🏆 Top Damage Rankings:**\n\n");
    for entry in entries {
        msg.push_str(&format!(
            "**{}** — `{}`\n",
            entry.name,
            format_thousands(entry.damage)
        ));
    }
    msg
}

/// 1234567 → "1,234,567"
pub fn format_thousands(value: u64) -> String {
    let digits = value.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);

    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::MemoryAuditLog;
    use crate::db::LedgerStore;
    use crate::recognizer::PlainTextRecognizer;

    fn handler(policy: AccessPolicy) -> CommandHandler {
        let tracker = Tracker::new(
            LedgerStore::open_in_memory().unwrap(),
            Box::new(MemoryAuditLog::default()),
        );
        CommandHandler::new(Arc::new(tracker), Box::new(PlainTextRecognizer), policy, 10)
    }

    fn officer() -> Requester {
        Requester {
            actor_id: 42,
            display_name: "officer".to_string(),
            channel_id: 7,
            roles: vec!["OCR Access".to_string()],
        }
    }

    fn shot(text: &str) -> ImageUpload {
        ImageUpload::new(text.as_bytes().to_vec(), "shot.png", "officer")
    }

    #[test]
    fn test_format_thousands() {
        assert_eq!(format_thousands(0), "0");
        assert_eq!(format_thousands(999), "999");
        assert_eq!(format_thousands(1000), "1,000");
        assert_eq!(format_thousands(1234567), "1,234,567");
    }

    #[test]
    fn test_process_then_top() {
        let h = handler(AccessPolicy::default());

        let reply = h.process(
            &officer(),
            &[shot("[Player1]\nDamage: 1,234\n[Player2]\nDamage: 5,000\n")],
        );
        assert_eq!(reply.status, ReplyStatus::Done);
        assert!(reply.text.contains("**2 entries** from **1 images**"));

        let top = h.top(&officer(), None);
        assert_eq!(
            top.text,
            "**🏆 Top Damage Rankings:**\n\n**[Player2]** — `5,000`\n**[Player1]** — `1,234`\n"
        );
    }

    #[test]
    fn test_top_on_empty_ledger_is_no_data() {
        let reply = handler(AccessPolicy::default()).top(&officer(), Some(3));

        assert_eq!(reply.status, ReplyStatus::Done);
        assert_eq!(reply.text, "⚠️ No data found.");
    }

    #[test]
    fn test_process_without_images() {
        let reply = handler(AccessPolicy::default()).process(&officer(), &[]);

        assert_eq!(reply.status, ReplyStatus::Rejected);
        assert!(reply.text.contains("attach 1 or more"));
    }

    #[test]
    fn test_denied_requester_touches_nothing() {
        let h = handler(AccessPolicy::default());
        let outsider = Requester {
            roles: vec![],
            ..officer()
        };

        let reply = h.process(&outsider, &[shot("[A]\nDamage: 1\n")]);

        assert_eq!(reply.status, ReplyStatus::Denied);
        assert!(reply.text.contains("OCR Access"));
        assert!(h.tracker().entries().unwrap().is_empty());
    }

    #[test]
    fn test_reset_reply() {
        let h = handler(AccessPolicy::open());
        h.process(&officer(), &[shot("[A]\nDamage: 1\n")]);

        let reply = h.reset(&officer());

        assert_eq!(reply.status, ReplyStatus::Done);
        assert!(reply.text.contains("reset"));
        assert_eq!(h.top(&officer(), None).text, "⚠️ No data found.");
    }

    #[test]
    fn test_summary_mentions_skips() {
        let h = handler(AccessPolicy::open());

        let reply = h.process(&officer(), &[shot("[A]\nDamage: ???\n")]);

        assert!(reply.text.contains("**0 entries**"));
        assert!(reply.text.contains("Skipped 1 unreadable lines"));
    }
}
