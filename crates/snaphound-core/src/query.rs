use std::collections::HashSet;
use std::path::Path;

const SNIPPET_MAX_CHARS: usize = 200;

/// A text query broken down for matching against names and content.
#[derive(Clone, Debug)]
pub struct TextQuery {
    raw: String,
    phrase: String,
    terms: Vec<String>,
}

/// Best match found inside a document.
#[derive(Clone, Debug, PartialEq)]
pub struct ContentMatch {
    pub score: f32,
    pub line: Option<usize>,
    pub snippet: Option<String>,
}

impl TextQuery {
    pub fn parse(raw: &str) -> Self {
        let phrase = normalize(raw);
        let mut terms: Vec<String> = phrase
            .split(' ')
            .filter(|t| t.chars().count() >= 2)
            .map(str::to_string)
            .collect();
        if terms.is_empty() {
            terms = phrase
                .split(' ')
                .filter(|t| !t.is_empty())
                .map(str::to_string)
                .collect();
        }
        let mut seen = HashSet::new();
        terms.retain(|term| seen.insert(term.clone()));
        Self {
            raw: raw.trim().to_string(),
            phrase,
            terms,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.phrase.is_empty()
    }

    pub fn raw(&self) -> &str {
        &self.raw
    }

    pub fn terms(&self) -> &[String] {
        &self.terms
    }

    /// Score a file name against the query, in `[0, 1]`.
    pub fn score_name(&self, path: &Path) -> f32 {
        if self.is_empty() {
            return 0.0;
        }
        let Some(stem) = path.file_stem().map(|s| s.to_string_lossy()) else {
            return 0.0;
        };
        let name = normalize(&stem);
        if contains_phrase(&name, &self.phrase) {
            return 1.0;
        }
        let tokens: Vec<&str> = name.split(' ').collect();
        0.6 * self.term_fraction(|term| tokens.contains(&term))
    }

    /// Score document text against the query. Returns `None` when neither
    /// the phrase nor any term occurs.
    pub fn score_content(&self, text: &str) -> Option<ContentMatch> {
        if self.is_empty() {
            return None;
        }

        let mut first: Option<(usize, &str)> = None;
        let mut occurrences = 0usize;
        for (index, line) in text.lines().enumerate() {
            if contains_phrase(&normalize(line), &self.phrase) {
                occurrences += 1;
                if first.is_none() {
                    first = Some((index + 1, line));
                }
            }
        }

        if let Some((line_number, line)) = first {
            let extra = occurrences.saturating_sub(1).min(4) as f32;
            return Some(ContentMatch {
                score: 0.8 + 0.05 * extra,
                line: Some(line_number),
                snippet: Some(snippet(line)),
            });
        }

        let normalized = normalize(text);
        let tokens: Vec<&str> = normalized.split(' ').collect();
        let fraction = self.term_fraction(|term| tokens.contains(&term));
        if fraction > 0.0 {
            Some(ContentMatch {
                score: 0.4 * fraction,
                line: None,
                snippet: None,
            })
        } else {
            None
        }
    }

    fn term_fraction(&self, present: impl Fn(&str) -> bool) -> f32 {
        if self.terms.is_empty() {
            return 0.0;
        }
        let found = self.terms.iter().filter(|t| present(t.as_str())).count();
        found as f32 / self.terms.len() as f32
    }
}

/// Lowercase and collapse every run of non-alphanumeric characters into a
/// single space.
pub fn normalize(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut pending_space = false;
    for c in text.chars() {
        if c.is_alphanumeric() {
            if pending_space && !out.is_empty() {
                out.push(' ');
            }
            pending_space = false;
            out.extend(c.to_lowercase());
        } else {
            pending_space = true;
        }
    }
    out
}

/// Phrase containment on word boundaries of normalized text.
fn contains_phrase(haystack: &str, phrase: &str) -> bool {
    if phrase.is_empty() {
        return false;
    }
    let padded = format!(" {haystack} ");
    padded.contains(&format!(" {phrase} "))
}

fn snippet(line: &str) -> String {
    let trimmed = line.trim();
    if trimmed.chars().count() <= SNIPPET_MAX_CHARS {
        return trimmed.to_string();
    }
    trimmed.chars().take(SNIPPET_MAX_CHARS).collect()
}
