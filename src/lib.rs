// Bear Hunt Ledger - Core Library
// OCR line parsing, damage ledger, audit trail; shared by the CLI and the API server

pub mod error;
pub mod parser;
pub mod db;
pub mod audit;
pub mod recognizer;
pub mod access;
pub mod config;
pub mod ingest;
pub mod commands;

// Re-export commonly used types
pub use error::{LedgerError, Result};
pub use parser::{
    parse, parse_lines, parse_damage_value, classify,
    DamageRecord, LineKind, LineParser, ParseOutcome, ParserState, SkipCounts,
};
pub use db::{
    LedgerEntry, LedgerStore, Upsert,
    setup_database, load_csv, DEFAULT_LIMIT,
};
pub use audit::{read_log_lines, AuditEntry, AuditSink, FileAuditLog, MemoryAuditLog, LOG_HEADER};
pub use recognizer::{
    Recognizer, CommandRecognizer, PlainTextRecognizer, SidecarRecognizer, StaticRecognizer,
    EngineSettings, build_recognizer,
};
pub use access::{AccessDecision, AccessPolicy, Requester};
pub use config::Settings;
pub use ingest::{ImageOutcome, ImageUpload, IngestReport, Tracker};
pub use commands::{CommandHandler, Reply, ReplyStatus, render_leaderboard, render_summary};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
