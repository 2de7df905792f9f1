// 📥 Ingestion - screenshots → OCR lines → records → ledger + audit trail
// One mutex guards ledger and audit log together, so concurrent uploads and
// resets apply one after another instead of losing updates.

use crate::audit::{AuditEntry, AuditSink, FileAuditLog};
use crate::config::Settings;
use crate::db::{load_csv, LedgerEntry, LedgerStore};
use crate::error::{LedgerError, Result};
use crate::parser::{parse_lines, DamageRecord, SkipCounts};
use crate::recognizer::Recognizer;
use chrono::Utc;
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};
use tracing::{error, info, warn};

/// One uploaded screenshot
#[derive(Debug, Clone)]
pub struct ImageUpload {
    pub bytes: Vec<u8>,
    pub filename: String,
    /// Who uploaded it (goes into the audit trail)
    pub actor: String,
    /// Where the image was read from, when it came off disk
    pub path: Option<PathBuf>,
}

impl ImageUpload {
    pub fn new(bytes: Vec<u8>, filename: impl Into<String>, actor: impl Into<String>) -> Self {
        Self {
            bytes,
            filename: filename.into(),
            actor: actor.into(),
            path: None,
        }
    }

    pub fn with_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.path = Some(path.into());
        self
    }

    /// SHA-256 of the image bytes, hex encoded
    pub fn digest(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(&self.bytes);
        format!("{:x}", hasher.finalize())
    }
}

/// What happened to a single image
#[derive(Debug, Clone, Serialize)]
pub struct ImageOutcome {
    pub filename: String,
    pub digest: String,
    pub records: usize,
    pub skipped: SkipCounts,
    /// Set when the recognizer failed; the image then contributes nothing
    pub error: Option<String>,
}

/// Aggregate result of one `ingest` call
#[derive(Debug, Clone, Default, Serialize)]
pub struct IngestReport {
    pub total_records: usize,
    pub images_processed: usize,
    pub failed_images: usize,
    pub skipped: SkipCounts,
    /// Audit lines that could not be written (ledger still updated)
    pub audit_failures: usize,
    pub images: Vec<ImageOutcome>,
}

struct Stores {
    ledger: LedgerStore,
    audit: Box<dyn AuditSink>,
}

/// Ledger and audit trail behind a single lock
pub struct Tracker {
    stores: Mutex<Stores>,
}

impl Tracker {
    pub fn new(ledger: LedgerStore, audit: Box<dyn AuditSink>) -> Self {
        Self {
            stores: Mutex::new(Stores { ledger, audit }),
        }
    }

    /// Open the ledger database and audit file named in `settings`
    pub fn open(settings: &Settings) -> Result<Self> {
        let ledger = LedgerStore::open(&settings.ledger_path)?;
        let audit = FileAuditLog::open(&settings.audit_path)?;
        Ok(Self::new(ledger, Box::new(audit)))
    }

    fn lock(&self) -> Result<MutexGuard<'_, Stores>> {
        self.stores.lock().map_err(|_| LedgerError::LockPoisoned)
    }

    /// Run every image through OCR and the parser, applying records as they come.
    ///
    /// An image the recognizer cannot read is reported in its outcome and
    /// skipped. Records are committed one at a time, so a crash part-way
    /// through leaves the earlier records in place.
    pub fn ingest(&self, recognizer: &dyn Recognizer, images: &[ImageUpload]) -> Result<IngestReport> {
        if images.is_empty() {
            return Err(LedgerError::NoAttachments);
        }

        let mut report = IngestReport::default();
        let mut applied = Applied::default();

        for image in images {
            let digest = image.digest();
            report.images_processed += 1;

            // OCR runs outside the lock; only the writes are serialized
            let lines = match recognizer.recognize_upload(image) {
                Ok(lines) => lines,
                Err(e) => {
                    let failure = LedgerError::ImageProcessingFailed {
                        filename: image.filename.clone(),
                        reason: format!("{:#}", e),
                    };
                    warn!(engine = recognizer.name(), digest = %digest, "{}", failure);

                    report.failed_images += 1;
                    report.images.push(ImageOutcome {
                        filename: image.filename.clone(),
                        digest,
                        records: 0,
                        skipped: SkipCounts::default(),
                        error: Some(failure.to_string()),
                    });
                    continue;
                }
            };

            let parsed = parse_lines(&lines);
            self.apply(&image.actor, &image.filename, &parsed.records, &mut applied)
                .map_err(|e| {
                    error!(
                        committed = applied.records,
                        file = %image.filename,
                        error = %e,
                        "ingest aborted, earlier records stay applied"
                    );
                    LedgerError::BatchAborted {
                        committed: applied.records,
                        source: Box::new(e),
                    }
                })?;

            info!(
                file = %image.filename,
                digest = %digest,
                lines = lines.len(),
                records = parsed.records.len(),
                skipped = parsed.skipped.total(),
                "processed image"
            );

            report.total_records += parsed.records.len();
            report.skipped.absorb(parsed.skipped);
            report.images.push(ImageOutcome {
                filename: image.filename.clone(),
                digest,
                records: parsed.records.len(),
                skipped: parsed.skipped,
                error: None,
            });
        }

        report.audit_failures = applied.audit_failures;
        Ok(report)
    }

    /// Upsert each record and log it, tallying into `applied`.
    /// Ledger errors abort; audit errors are counted.
    fn apply(
        &self,
        actor: &str,
        source: &str,
        records: &[DamageRecord],
        applied: &mut Applied,
    ) -> Result<()> {
        let mut stores = self.lock()?;

        for record in records {
            stores.ledger.upsert(&record.name, record.damage)?;
            applied.records += 1;

            let entry = AuditEntry::new(actor, source, record);
            if let Err(e) = stores.audit.append(&entry) {
                warn!(name = %record.name, error = %e, "audit append failed");
                applied.audit_failures += 1;
            }
        }

        Ok(())
    }

    /// Leaderboard: top `limit` players by damage
    pub fn top(&self, limit: usize) -> Result<Vec<LedgerEntry>> {
        self.lock()?.ledger.rank(limit)
    }

    /// Full standings in first-seen order
    pub fn entries(&self) -> Result<Vec<LedgerEntry>> {
        self.lock()?.ledger.entries()
    }

    /// Wipe the event and leave a marker in the audit trail
    pub fn reset(&self, actor: &str) -> Result<usize> {
        let mut stores = self.lock()?;
        let removed = stores.ledger.reset()?;

        if let Err(e) = stores.audit.record_reset(actor, Utc::now()) {
            warn!(error = %e, "audit reset marker failed");
        }

        info!(actor, removed, "event reset");
        Ok(removed)
    }

    /// Upsert every row of a `name,damage` CSV, audited under the file name
    pub fn import_csv(&self, csv_path: &Path, actor: &str) -> Result<usize> {
        let records: Vec<DamageRecord> = load_csv(csv_path)?
            .into_iter()
            .map(|entry| DamageRecord::new(entry.name, entry.damage))
            .collect();

        let source = csv_path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("import.csv");

        let mut applied = Applied::default();
        self.apply(actor, source, &records, &mut applied)
            .map_err(|e| LedgerError::BatchAborted {
                committed: applied.records,
                source: Box::new(e),
            })?;
        if applied.audit_failures > 0 {
            warn!(failures = applied.audit_failures, "some imported rows were not audited");
        }

        info!(rows = records.len(), path = %csv_path.display(), "imported ledger rows");
        Ok(records.len())
    }

    pub fn export_csv(&self, csv_path: &Path) -> Result<usize> {
        self.lock()?.ledger.export_csv(csv_path)
    }
}

#[derive(Debug, Default)]
struct Applied {
    records: usize,
    audit_failures: usize,
}
