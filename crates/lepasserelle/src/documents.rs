// Document Loading
//
// *Les Documents* - Pre-extracted tender text files fed to the in-memory index

use anyhow::{bail, Context, Result};
use lerecherche::{Chunker, InMemoryIndex};
use std::fs;
use std::path::Path;

/// Page separator written by `pdftotext` and most text extractors
pub const PAGE_BREAK: char = '\u{c}';

/// Split extracted text into pages on form feeds
///
/// A trailing form feed does not start a new page.
pub fn split_pages(text: &str) -> Vec<String> {
    let text = text.strip_suffix(PAGE_BREAK).unwrap_or(text);
    text.split(PAGE_BREAK).map(str::to_string).collect()
}

/// Name reported as the answer source for `path`
pub fn source_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

/// Read one text document as pages
pub fn read_pages(path: &Path) -> Result<Vec<String>> {
    let is_pdf = path
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("pdf"));
    if is_pdf {
        bail!(
            "{} is a PDF; extract its text first (for example `pdftotext -layout {} out.txt`)",
            path.display(),
            path.display()
        );
    }

    let text = fs::read_to_string(path)
        .with_context(|| format!("Failed to read document: {:?}", path))?;
    Ok(split_pages(&text))
}

/// Chunk and ingest every document; returns the number of chunks added
pub fn load_documents<P: AsRef<Path>>(index: &InMemoryIndex, chunker: &Chunker, paths: &[P]) -> Result<usize> {
    let mut added = 0;
    for path in paths {
        let path = path.as_ref();
        let pages = read_pages(path)?;
        let chunks = chunker.split_pages(&source_name(path), &pages);
        if chunks.is_empty() {
            tracing::warn!(path = %path.display(), "document has no text, skipped");
            continue;
        }
        added += index.ingest(chunks);
        tracing::info!(path = %path.display(), pages = pages.len(), "document loaded");
    }
    Ok(added)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use tempfile::TempDir;

    #[rstest]
    #[case("una página", 1)]
    #[case("uno\u{c}dos\u{c}tres", 3)]
    #[case("uno\u{c}dos\u{c}", 2)]
    #[case("", 1)]
    fn test_split_pages(#[case] text: &str, #[case] pages: usize) {
        assert_eq!(split_pages(text).len(), pages);
    }

    #[test]
    fn test_load_documents_uses_file_name_as_source() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("pliego.txt");
        fs::write(&path, "Plazo de entrega: 90 días.\u{c}Garantía: 5% del contrato.\u{c}").unwrap();

        let index = InMemoryIndex::new();
        let added = load_documents(&index, &Chunker::default(), &[&path]).unwrap();
        assert_eq!(added, 2);

        let stats = index.stats();
        assert_eq!(stats.sources, vec!["pliego.txt"]);
        assert_eq!(stats.chunks, 2);
        assert_eq!(index.snapshot()[1].page_number, 2);
    }

    #[test]
    fn test_pdf_is_rejected_with_a_hint() {
        let err = read_pages(Path::new("pliego.PDF")).unwrap_err();
        assert!(err.to_string().contains("pdftotext"));
    }

    #[test]
    fn test_missing_file_names_the_path() {
        let index = InMemoryIndex::new();
        let err = load_documents(&index, &Chunker::default(), &["/nonexistent/anexo.txt"]).unwrap_err();
        assert!(format!("{err:#}").contains("anexo.txt"));
    }
}
