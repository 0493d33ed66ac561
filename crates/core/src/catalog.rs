//! Catalog extraction from the storefront's JavaScript data module.
//!
//! The catalog lives in a file such as `clothes.js` that exports an array
//! literal (`export const clothesData = [ ... ];`). The array is located by
//! name, split into its top-level elements, and each element is read as
//! JSON5 (bare keys, single quotes, comments, trailing commas) into a
//! [`CatalogEntry`].
//!
//! A malformed element is logged and counted in [`Catalog::rejected`];
//! only an unreadable file or a missing/empty collection is fatal.

use std::iter::Peekable;
use std::path::Path;
use std::str::CharIndices;

use regex::Regex;
use serde_json::Value;

use crate::error::CoreError;
use crate::types::CatalogEntry;

/// Name of the exported collection in the storefront data module.
pub const DEFAULT_CATALOG_EXPORT: &str = "clothesData";

/// Entries extracted from a catalog source, in source order.
#[derive(Debug, Default)]
pub struct Catalog {
    pub entries: Vec<CatalogEntry>,
    /// Number of collection elements that failed structural validation.
    pub rejected: usize,
}

/// Read and parse the catalog file at `path`.
pub fn extract_catalog(path: &Path, export: &str) -> Result<Catalog, CoreError> {
    let source = std::fs::read_to_string(path).map_err(|source| CoreError::Read {
        path: path.to_path_buf(),
        source,
    })?;

    let catalog = parse_catalog(&source, export)?;
    tracing::info!(
        path = %path.display(),
        entries = catalog.entries.len(),
        rejected = catalog.rejected,
        "Catalog extracted",
    );
    Ok(catalog)
}

/// Parse catalog source text already in memory.
pub fn parse_catalog(source: &str, export: &str) -> Result<Catalog, CoreError> {
    let body = find_collection(source, export).ok_or_else(|| CoreError::CollectionNotFound {
        export: export.to_string(),
    })?;

    let mut catalog = Catalog::default();
    for (index, literal) in split_elements(body).into_iter().enumerate() {
        match parse_entry(literal) {
            Ok(entry) => catalog.entries.push(entry),
            Err(e) => {
                tracing::warn!(
                    index,
                    error = %e,
                    literal = %literal.trim(),
                    "Skipping malformed catalog entry",
                );
                catalog.rejected += 1;
            }
        }
    }

    if catalog.entries.is_empty() {
        return Err(CoreError::EmptyCollection {
            export: export.to_string(),
        });
    }
    Ok(catalog)
}

/// Return the text between the brackets of `export const <export> = [...]`.
fn find_collection<'a>(source: &'a str, export: &str) -> Option<&'a str> {
    let pattern = format!(r"export\s+const\s+{}\s*=\s*\[", regex::escape(export));
    let re = Regex::new(&pattern).ok()?;
    let found = re.find(source)?;

    // The match ends just past the opening bracket.
    let open = found.end() - 1;
    let tail = &source[open..];
    let mut depth = 0usize;
    for (idx, c) in CodeChars::new(tail) {
        match c {
            '[' => depth += 1,
            ']' => {
                depth = depth.saturating_sub(1);
                if depth == 0 {
                    return Some(&tail[1..idx]);
                }
            }
            _ => {}
        }
    }
    None
}

/// Split an array body into its top-level elements.
///
/// Elements are separated by commas outside any bracket, string or
/// comment. Stretches holding nothing but whitespace and comments (such
/// as after a trailing comma) are dropped.
fn split_elements(body: &str) -> Vec<&str> {
    let mut elements = Vec::new();
    let mut depth = 0usize;
    let mut start = 0;
    let mut has_code = false;

    for (idx, c) in CodeChars::new(body) {
        match c {
            '{' | '[' | '(' => depth += 1,
            '}' | ']' | ')' => depth = depth.saturating_sub(1),
            ',' if depth == 0 => {
                if has_code {
                    elements.push(&body[start..idx]);
                }
                start = idx + 1;
                has_code = false;
                continue;
            }
            _ => {}
        }
        if !c.is_whitespace() {
            has_code = true;
        }
    }
    if has_code {
        elements.push(&body[start..]);
    }
    elements
}

fn parse_entry(literal: &str) -> Result<CatalogEntry, CoreError> {
    let value: Value = json5::from_str(literal)?;
    let obj = value
        .as_object()
        .ok_or_else(|| CoreError::Validation(format!("catalog element is not an object: {value}")))?;

    let text_field = |key: &str| -> Result<Option<String>, CoreError> {
        match obj.get(key) {
            None | Some(Value::Null) => Ok(None),
            Some(Value::String(s)) => Ok(Some(s.clone())),
            Some(other) => Err(CoreError::Validation(format!(
                "`{key}` must be a string, got {other}"
            ))),
        }
    };

    Ok(CatalogEntry {
        id: text_field("id")?,
        color_name: text_field("colorName")?.unwrap_or_default(),
        name_key: text_field("nameKey")?.unwrap_or_default(),
        style_key: text_field("styleKey")?.unwrap_or_default(),
    })
}

// ---------------------------------------------------------------------------
// JavaScript literal scanning
// ---------------------------------------------------------------------------

/// Characters of JavaScript source that sit outside comments and string
/// literals, paired with their byte offsets. A string literal is reported
/// once, as its opening quote.
struct CodeChars<'a> {
    chars: Peekable<CharIndices<'a>>,
}

impl<'a> CodeChars<'a> {
    fn new(source: &'a str) -> Self {
        Self {
            chars: source.char_indices().peekable(),
        }
    }

    fn skip_string(&mut self, quote: char) {
        while let Some((_, c)) = self.chars.next() {
            match c {
                '\\' => {
                    self.chars.next();
                }
                c if c == quote => return,
                _ => {}
            }
        }
    }

    fn skip_line_comment(&mut self) {
        while let Some(&(_, c)) = self.chars.peek() {
            if c == '\n' {
                return;
            }
            self.chars.next();
        }
    }

    fn skip_block_comment(&mut self) {
        let mut prev = '\0';
        for (_, c) in self.chars.by_ref() {
            if prev == '*' && c == '/' {
                return;
            }
            prev = c;
        }
    }
}

impl Iterator for CodeChars<'_> {
    type Item = (usize, char);

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let (idx, c) = self.chars.next()?;
            match c {
                '\'' | '"' | '`' => {
                    self.skip_string(c);
                    return Some((idx, c));
                }
                '/' if matches!(self.chars.peek(), Some((_, '/'))) => self.skip_line_comment(),
                '/' if matches!(self.chars.peek(), Some((_, '*'))) => {
                    self.chars.next();
                    self.skip_block_comment();
                }
                _ => return Some((idx, c)),
            }
        }
    }
}
