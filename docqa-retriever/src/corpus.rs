//! Reading extracted corpus text from disk

use crate::error::Result;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

const CORPUS_EXTENSIONS: &[&str] = &["txt", "md"];

/// Read the corpus at `path`.
///
/// A file is read as-is. For a directory, its `.txt` and `.md` files (not
/// descending into subdirectories, skipping anything its `.gitignore` excludes)
/// are concatenated in file-name order, separated by a blank line.
pub async fn read_corpus(path: &Path) -> Result<String> {
    let metadata = tokio::fs::metadata(path).await?;
    if metadata.is_file() {
        let text = tokio::fs::read_to_string(path).await?;
        info!("Read corpus file {} ({} bytes)", path.display(), text.len());
        return Ok(text);
    }

    let files = corpus_files(path).await?;
    let mut sections = Vec::with_capacity(files.len());
    for file in &files {
        debug!("Reading {}", file.display());
        let text = tokio::fs::read_to_string(file).await?;
        let text = text.trim();
        if !text.is_empty() {
            sections.push(text.to_string());
        }
    }

    info!(
        "Read {} corpus documents from {}",
        sections.len(),
        path.display()
    );
    Ok(sections.join("\n\n"))
}

/// Corpus documents directly inside `dir`, sorted by file name.
pub async fn corpus_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let gitignore = ignore::gitignore::Gitignore::new(dir.join(".gitignore")).0;
    let mut files = Vec::new();

    let mut read_dir = tokio::fs::read_dir(dir).await?;
    while let Some(entry) = read_dir.next_entry().await? {
        let path = entry.path();
        if !entry.file_type().await?.is_file() {
            continue;
        }
        let wanted = path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| {
                CORPUS_EXTENSIONS
                    .iter()
                    .any(|known| ext.eq_ignore_ascii_case(known))
            });
        if !wanted {
            continue;
        }
        if gitignore.matched(&path, false).is_ignore() {
            debug!("Skipping ignored {}", path.display());
            continue;
        }
        files.push(path);
    }

    files.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
    Ok(files)
}
