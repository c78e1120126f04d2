use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    static ref BOUNDARY_RE: Regex = Regex::new(r#"[.!?]+["'’”)\]]*\s+"#).unwrap();
}

const ABBREVIATIONS: &[&str] = &[
    "e.g.", "i.e.", "etc.", "vs.", "mr.", "mrs.", "ms.", "dr.", "prof.", "st.", "no.",
];

/// Splits a line of prose into sentences, keeping terminal punctuation.
pub fn split_sentences(text: &str) -> Vec<String> {
    let mut sentences = Vec::new();
    let mut start = 0;

    for boundary in BOUNDARY_RE.find_iter(text) {
        let candidate = text[start..boundary.end()].trim();
        if ends_with_abbreviation(candidate) {
            continue;
        }

        if !candidate.is_empty() {
            sentences.push(candidate.to_owned());
        }
        start = boundary.end();
    }

    let rest = text[start..].trim();
    if !rest.is_empty() {
        sentences.push(rest.to_owned());
    }

    sentences
}

fn ends_with_abbreviation(sentence: &str) -> bool {
    let last = sentence
        .rsplit(char::is_whitespace)
        .next()
        .unwrap_or_default()
        .to_lowercase();

    ABBREVIATIONS.contains(&last.as_str())
}
