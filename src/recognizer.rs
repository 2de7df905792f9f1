// 👁️ Recognizers - image bytes → ordered text lines
// The OCR engine is a black box; the ledger only needs line-ordered text

use crate::ingest::ImageUpload;
use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

/// Recognition boundary.
///
/// Implementations return the lines of text found in one image, top to
/// bottom. An `Err` marks this image as unreadable; callers keep going with
/// the rest of the batch.
pub trait Recognizer: Send + Sync {
    fn recognize(&self, image: &[u8]) -> Result<Vec<String>>;

    /// Entry point used by ingestion. Engines that need more than the bytes
    /// (file name, path on disk) override this one.
    fn recognize_upload(&self, upload: &ImageUpload) -> Result<Vec<String>> {
        self.recognize(&upload.bytes)
    }

    /// Engine name (for logs)
    fn name(&self) -> &str;
}

fn split_lines(text: &str) -> Vec<String> {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect()
}

// ============================================================================
// EXTERNAL PROGRAM
// ============================================================================

/// Runs an OCR program that reads the image on stdin and prints text on stdout.
///
/// The default is `tesseract stdin stdout`.
#[derive(Debug, Clone)]
pub struct CommandRecognizer {
    program: String,
    args: Vec<String>,
}

impl CommandRecognizer {
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
        }
    }

    pub fn tesseract() -> Self {
        Self::new("tesseract", vec!["stdin".to_string(), "stdout".to_string()])
    }
}

impl Recognizer for CommandRecognizer {
    fn recognize(&self, image: &[u8]) -> Result<Vec<String>> {
        let mut child = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .with_context(|| format!("Failed to start OCR program {}", self.program))?;

        // Feed stdin from a separate thread so a chatty engine cannot deadlock us
        let mut stdin = child.stdin.take().context("OCR program has no stdin")?;
        let bytes = image.to_vec();
        let writer = std::thread::spawn(move || stdin.write_all(&bytes));

        let output = child
            .wait_with_output()
            .context("Failed to collect OCR output")?;

        match writer.join() {
            Ok(result) => result.context("Failed to send image to OCR program")?,
            Err(_) => bail!("OCR stdin writer panicked"),
        }

        if !output.status.success() {
            bail!(
                "{} exited with {}: {}",
                self.program,
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            );
        }

        Ok(split_lines(&String::from_utf8_lossy(&output.stdout)))
    }

    fn name(&self) -> &str {
        &self.program
    }
}

// ============================================================================
// PRE-RECOGNIZED TEXT
// ============================================================================

/// Treats the upload as text that was already recognized elsewhere
#[derive(Debug, Clone, Copy, Default)]
pub struct PlainTextRecognizer;

impl Recognizer for PlainTextRecognizer {
    fn recognize(&self, image: &[u8]) -> Result<Vec<String>> {
        let text = std::str::from_utf8(image).context("Upload is not UTF-8 text")?;
        Ok(split_lines(text))
    }

    fn name(&self) -> &str {
        "plain-text"
    }
}

/// Reads text recognized ahead of time from `<image>.txt`.
///
/// The sidecar sits next to the image when the upload knows its path
/// (`shots/a.png` → `shots/a.png.txt`); otherwise it is looked up by file
/// name under `dir`.
#[derive(Debug, Clone, Default)]
pub struct SidecarRecognizer {
    dir: Option<PathBuf>,
}

impl SidecarRecognizer {
    pub fn new(dir: Option<PathBuf>) -> Self {
        Self { dir }
    }

    pub fn sidecar_path(&self, upload: &ImageUpload) -> Option<PathBuf> {
        match (&upload.path, &self.dir) {
            (Some(image), _) => Some(with_txt_suffix(image)),
            (None, Some(dir)) => Some(dir.join(format!("{}.txt", upload.filename))),
            (None, None) => None,
        }
    }
}

fn with_txt_suffix(image: &Path) -> PathBuf {
    let mut name = image.as_os_str().to_os_string();
    name.push(".txt");
    PathBuf::from(name)
}

impl Recognizer for SidecarRecognizer {
    fn recognize(&self, _image: &[u8]) -> Result<Vec<String>> {
        bail!("sidecar text is looked up by image path, not by bytes")
    }

    fn recognize_upload(&self, upload: &ImageUpload) -> Result<Vec<String>> {
        let path = self
            .sidecar_path(upload)
            .with_context(|| format!("No path or sidecar directory for {}", upload.filename))?;

        let text = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read sidecar {}", path.display()))?;
        Ok(split_lines(&text))
    }

    fn name(&self) -> &str {
        "sidecar"
    }
}

/// Returns the same lines for every image
#[derive(Debug, Clone, Default)]
pub struct StaticRecognizer {
    lines: Vec<String>,
}

impl StaticRecognizer {
    pub fn new<I, S>(lines: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            lines: lines.into_iter().map(Into::into).collect(),
        }
    }
}

impl Recognizer for StaticRecognizer {
    fn recognize(&self, _image: &[u8]) -> Result<Vec<String>> {
        Ok(self.lines.clone())
    }

    fn name(&self) -> &str {
        "static"
    }
}

// ============================================================================
// FACTORY
// ============================================================================

/// Which engine to build, as stored in settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EngineSettings {
    Command {
        program: String,
        #[serde(default)]
        args: Vec<String>,
    },
    PlainText,
    Sidecar {
        #[serde(default)]
        dir: Option<PathBuf>,
    },
    Static {
        #[serde(default)]
        lines: Vec<String>,
    },
}

impl Default for EngineSettings {
    fn default() -> Self {
        EngineSettings::Command {
            program: "tesseract".to_string(),
            args: vec!["stdin".to_string(), "stdout".to_string()],
        }
    }
}

pub fn build_recognizer(settings: &EngineSettings) -> Box<dyn Recognizer> {
    match settings {
        EngineSettings::Command { program, args } => {
            Box::new(CommandRecognizer::new(program.clone(), args.clone()))
        }
        EngineSettings::PlainText => Box::new(PlainTextRecognizer),
        EngineSettings::Sidecar { dir } => Box::new(SidecarRecognizer::new(dir.clone())),
        EngineSettings::Static { lines } => Box::new(StaticRecognizer::new(lines.clone())),
    }
}
