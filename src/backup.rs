use crate::model::{Message, Student, Task};
use crate::repo::Repository;
use crate::store::Store;
use anyhow::{anyhow, Context};
use serde::de::DeserializeOwned;
use serde_json::json;
use sha2::{Digest, Sha256};
use std::fs::File;
use std::io::{Read, Write};
use std::path::Path;
use zip::write::FileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

const MANIFEST_ENTRY: &str = "manifest.json";
const STUDENTS_ENTRY: &str = "collections/students.json";
const TASKS_ENTRY: &str = "collections/tasks.json";
const MESSAGES_ENTRY: &str = "collections/messages.json";
pub const BUNDLE_FORMAT_V1: &str = "taskboard-workspace-v1";

#[derive(Debug, Clone)]
pub struct ExportSummary {
    pub bundle_format: String,
    pub entry_count: usize,
    pub students: usize,
    pub tasks: usize,
    pub messages: usize,
}

#[derive(Debug, Clone)]
pub struct ImportSummary {
    pub bundle_format_detected: String,
    pub students: usize,
    pub tasks: usize,
    pub messages: usize,
}

fn sha256_hex(bytes: &[u8]) -> String {
    format!("{:x}", Sha256::digest(bytes))
}

pub fn export_bundle<S: Store>(
    repo: &Repository<S>,
    out_path: &Path,
) -> anyhow::Result<ExportSummary> {
    let students = repo.students()?;
    let tasks = repo.tasks()?;
    let messages = repo.messages()?;

    let entries = [
        (
            STUDENTS_ENTRY,
            serde_json::to_vec_pretty(&students).context("failed to serialize students")?,
        ),
        (
            TASKS_ENTRY,
            serde_json::to_vec_pretty(&tasks).context("failed to serialize tasks")?,
        ),
        (
            MESSAGES_ENTRY,
            serde_json::to_vec_pretty(&messages).context("failed to serialize messages")?,
        ),
    ];

    if let Some(parent) = out_path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create directory {}", parent.to_string_lossy()))?;
    }

    let out_file = File::create(out_path).with_context(|| {
        format!(
            "failed to create output file {}",
            out_path.to_string_lossy()
        )
    })?;
    let mut zip = ZipWriter::new(out_file);
    let opts = FileOptions::default().compression_method(CompressionMethod::Deflated);

    let checksums: serde_json::Map<String, serde_json::Value> = entries
        .iter()
        .map(|(name, bytes)| (name.to_string(), json!(sha256_hex(bytes))))
        .collect();
    let manifest = json!({
        "format": BUNDLE_FORMAT_V1,
        "version": 1,
        "appVersion": env!("CARGO_PKG_VERSION"),
        "exportedAt": chrono::Utc::now().to_rfc3339(),
        "sha256": checksums,
    });
    zip.start_file(MANIFEST_ENTRY, opts)
        .context("failed to start manifest entry")?;
    zip.write_all(
        serde_json::to_string_pretty(&manifest)
            .context("failed to serialize manifest")?
            .as_bytes(),
    )
    .context("failed to write manifest entry")?;

    for (name, bytes) in &entries {
        zip.start_file(*name, opts)
            .with_context(|| format!("failed to start entry {name}"))?;
        zip.write_all(bytes)
            .with_context(|| format!("failed to write entry {name}"))?;
    }

    zip.finish().context("failed to finalize zip bundle")?;

    Ok(ExportSummary {
        bundle_format: BUNDLE_FORMAT_V1.to_string(),
        entry_count: entries.len() + 1,
        students: students.len(),
        tasks: tasks.len(),
        messages: messages.len(),
    })
}

/// Validates every checksum before touching the store; the three collections are then
/// replaced together.
pub fn import_bundle<S: Store>(
    repo: &mut Repository<S>,
    in_path: &Path,
) -> anyhow::Result<ImportSummary> {
    let in_file = File::open(in_path)
        .with_context(|| format!("failed to open bundle {}", in_path.to_string_lossy()))?;
    let mut archive = ZipArchive::new(in_file).context("invalid zip archive")?;

    let mut manifest_text = String::new();
    archive
        .by_name(MANIFEST_ENTRY)
        .context("bundle missing manifest.json")?
        .read_to_string(&mut manifest_text)
        .context("failed to read manifest.json")?;
    let manifest: serde_json::Value =
        serde_json::from_str(&manifest_text).context("manifest.json is invalid JSON")?;
    let format = manifest
        .get("format")
        .and_then(|v| v.as_str())
        .unwrap_or("");
    if format != BUNDLE_FORMAT_V1 {
        return Err(anyhow!("unsupported bundle format: {}", format));
    }

    let students: Vec<Student> = read_checked(&mut archive, &manifest, STUDENTS_ENTRY)?;
    let tasks: Vec<Task> = read_checked(&mut archive, &manifest, TASKS_ENTRY)?;
    let messages: Vec<Message> = read_checked(&mut archive, &manifest, MESSAGES_ENTRY)?;

    repo.replace_all(&students, &tasks, &messages)?;

    Ok(ImportSummary {
        bundle_format_detected: BUNDLE_FORMAT_V1.to_string(),
        students: students.len(),
        tasks: tasks.len(),
        messages: messages.len(),
    })
}

fn read_checked<T: DeserializeOwned>(
    archive: &mut ZipArchive<File>,
    manifest: &serde_json::Value,
    name: &str,
) -> anyhow::Result<Vec<T>> {
    let mut bytes = Vec::new();
    archive
        .by_name(name)
        .with_context(|| format!("bundle missing {name}"))?
        .read_to_end(&mut bytes)
        .with_context(|| format!("failed to read {name}"))?;

    let expected = manifest
        .get("sha256")
        .and_then(|m| m.get(name))
        .and_then(|v| v.as_str())
        .ok_or_else(|| anyhow!("manifest has no checksum for {}", name))?;
    let actual = sha256_hex(&bytes);
    if !expected.eq_ignore_ascii_case(&actual) {
        return Err(anyhow!("checksum mismatch for {}", name));
    }

    serde_json::from_slice(&bytes).with_context(|| format!("{name} is invalid"))
}
