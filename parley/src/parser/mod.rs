mod sentence;

use lazy_static::lazy_static;
use regex::Regex;
use std::{
    fs, io,
    path::{Path, PathBuf},
};

pub use sentence::split_sentences;

lazy_static! {
    static ref HEADING_RE: Regex = Regex::new(r"^#{1,6}\s+").unwrap();
}

/// Splits markdown content into sentences, one line at a time.
///
/// Heading markers and code fences are dropped; everything else is treated as prose.
pub fn extract_sentences(content: &str) -> Vec<String> {
    content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with("```"))
        .flat_map(|line| split_sentences(&HEADING_RE.replace(line, "")))
        .collect()
}

/// Lists the markdown files directly inside `dir`, sorted by path.
///
/// # Errors
///
/// Returns an error if the directory cannot be read.
pub fn markdown_files(dir: &Path) -> io::Result<Vec<PathBuf>> {
    let mut files = fs::read_dir(dir)?
        .map(|entry| entry.map(|e| e.path()))
        .collect::<io::Result<Vec<_>>>()?
        .into_iter()
        .filter(|path| path.is_file() && path.extension().map_or(false, |ext| ext == "md"))
        .collect::<Vec<_>>();

    files.sort();
    Ok(files)
}

/// Reads every markdown file directly inside `dir` and returns its sentences.
///
/// # Errors
///
/// Returns an error if the directory or one of its files cannot be read.
pub fn read_sentences(dir: &Path) -> io::Result<Vec<String>> {
    let mut sentences = Vec::new();

    for file in markdown_files(dir)? {
        sentences.extend(extract_sentences(&fs::read_to_string(file)?));
    }

    Ok(sentences)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_headings_and_fences() {
        let sentences = extract_sentences(
            "# Tents\n\nOur tents are waterproof. They sleep four.\n```\ncode\n```\n## Boots\nBoots run small.",
        );

        assert_eq!(
            sentences,
            vec![
                "Tents",
                "Our tents are waterproof.",
                "They sleep four.",
                "code",
                "Boots",
                "Boots run small.",
            ]
        );
    }

    #[test]
    fn reads_only_markdown_files() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("b.md"), "Second file.").unwrap();
        fs::write(dir.path().join("a.md"), "First file. Still first.").unwrap();
        fs::write(dir.path().join("notes.txt"), "Ignored.").unwrap();

        let sentences = read_sentences(dir.path()).unwrap();

        assert_eq!(sentences, vec!["First file.", "Still first.", "Second file."]);
    }
}
