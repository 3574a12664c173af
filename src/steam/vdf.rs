//! Text VDF (Valve Data Format) parser
//!
//! Parses the KeyValues text files Steam keeps on disk: appmanifest_*.acf,
//! libraryfolders.vdf and loginusers.vdf. Key lookups are case-insensitive
//! because Steam has changed key casing between client versions
//! (`LibraryFolders`/`libraryfolders`, `MostRecent`/`mostrecent`).

use crate::error::SkipReason;

/// A VDF value - either a string or a nested object
#[derive(Debug, Clone, PartialEq)]
pub enum VdfValue {
    String(String),
    /// Entries in file order
    Object(Vec<(String, VdfValue)>),
}

impl VdfValue {
    /// Get as string reference
    pub fn as_str(&self) -> Option<&str> {
        match self {
            VdfValue::String(s) => Some(s),
            VdfValue::Object(_) => None,
        }
    }

    /// Get object entries in file order
    pub fn entries(&self) -> &[(String, VdfValue)] {
        match self {
            VdfValue::String(_) => &[],
            VdfValue::Object(o) => o,
        }
    }

    /// Get a nested value by key (case-insensitive, first match wins)
    pub fn get(&self, key: &str) -> Option<&VdfValue> {
        self.entries()
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(key))
            .map(|(_, v)| v)
    }

    /// Get a string value by key
    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.get(key)?.as_str()
    }
}

/// Parse a VDF file content into a root object
pub fn parse_vdf(content: &str) -> Option<VdfValue> {
    let mut chars = content.chars().peekable();
    parse_object(&mut chars, true)
}

/// Parse an object (including the root level)
fn parse_object<I: Iterator<Item = char>>(
    chars: &mut std::iter::Peekable<I>,
    is_root: bool,
) -> Option<VdfValue> {
    let mut entries = Vec::new();

    loop {
        skip_whitespace_and_comments(chars);

        match chars.peek() {
            // An unclosed nested object means the file was truncated
            None if is_root => break,
            None => return None,
            Some('}') => {
                chars.next();
                if is_root {
                    return None;
                }
                break;
            }
            Some('{') => return None,
            Some(_) => {
                let key = parse_token(chars)?;
                skip_whitespace_and_comments(chars);
                skip_conditional(chars);

                match chars.peek() {
                    Some('{') => {
                        chars.next();
                        let value = parse_object(chars, false)?;
                        entries.push((key, value));
                    }
                    Some('}') | None => return None,
                    Some(_) => {
                        let value = parse_token(chars)?;
                        entries.push((key, VdfValue::String(value)));
                        skip_whitespace_and_comments(chars);
                        skip_conditional(chars);
                    }
                }
            }
        }
    }

    Some(VdfValue::Object(entries))
}

/// Parse a quoted "..." string or a bare word
fn parse_token<I: Iterator<Item = char>>(chars: &mut std::iter::Peekable<I>) -> Option<String> {
    if chars.peek() == Some(&'"') {
        return parse_quoted_string(chars);
    }

    let mut result = String::new();
    while let Some(&c) = chars.peek() {
        if c.is_whitespace() || c == '{' || c == '}' || c == '"' {
            break;
        }
        result.push(c);
        chars.next();
    }

    if result.is_empty() {
        None
    } else {
        Some(result)
    }
}

/// Parse a quoted string "..."
fn parse_quoted_string<I: Iterator<Item = char>>(
    chars: &mut std::iter::Peekable<I>,
) -> Option<String> {
    if chars.next() != Some('"') {
        return None;
    }

    let mut result = String::new();

    loop {
        match chars.next() {
            None => return None, // Unterminated string
            Some('"') => break,
            Some('\\') => match chars.next() {
                Some('n') => result.push('\n'),
                Some('t') => result.push('\t'),
                Some('r') => result.push('\r'),
                Some('\\') => result.push('\\'),
                Some('"') => result.push('"'),
                Some('u') => push_unicode_escape(chars, &mut result),
                Some(c) => {
                    result.push('\\');
                    result.push(c);
                }
                None => return None,
            },
            Some(c) => result.push(c),
        }
    }

    Some(result)
}

/// `\uXXXX` after the `u`; anything else is kept as written
fn push_unicode_escape<I: Iterator<Item = char>>(
    chars: &mut std::iter::Peekable<I>,
    result: &mut String,
) {
    let mut hex = String::with_capacity(4);
    while hex.len() < 4 {
        match chars.peek() {
            Some(c) if c.is_ascii_hexdigit() => {
                hex.push(*c);
                chars.next();
            }
            _ => break,
        }
    }

    let decoded = (hex.len() == 4)
        .then(|| u32::from_str_radix(&hex, 16).ok())
        .flatten()
        .and_then(char::from_u32);
    match decoded {
        Some(ch) => result.push(ch),
        None => {
            result.push_str("\\u");
            result.push_str(&hex);
        }
    }
}

/// Skip a platform conditional such as `[$WIN32]`
fn skip_conditional<I: Iterator<Item = char>>(chars: &mut std::iter::Peekable<I>) {
    if chars.peek() == Some(&'[') {
        while let Some(c) = chars.next() {
            if c == ']' {
                break;
            }
        }
        skip_whitespace_and_comments(chars);
    }
}

/// Skip whitespace and // comments
fn skip_whitespace_and_comments<I: Iterator<Item = char>>(chars: &mut std::iter::Peekable<I>) {
    loop {
        while chars.peek().is_some_and(|c| c.is_whitespace()) {
            chars.next();
        }

        if chars.peek() == Some(&'/') {
            chars.next();
            if chars.peek() == Some(&'/') {
                while chars.peek().is_some_and(|c| *c != '\n') {
                    chars.next();
                }
                continue;
            }
            // A lone '/' is not valid VDF; drop it
        }

        break;
    }
}

// ============================================================================
// appmanifest_*.acf
// ============================================================================

/// StateFlags bit set once every depot of the app is on disk
pub const STATE_FULLY_INSTALLED: u32 = 4;

/// The fields of an appmanifest_*.acf that the index cares about
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppManifest {
    pub app_id: u32,
    pub name: String,
    pub install_dir: Option<String>,
    pub state_flags: Option<u32>,
}

impl AppManifest {
    /// Parse from VDF content
    pub fn from_vdf(content: &str) -> Result<Self, SkipReason> {
        let root = parse_vdf(content).ok_or(SkipReason::Malformed)?;
        let app_state = root
            .get("AppState")
            .filter(|v| matches!(v, VdfValue::Object(_)))
            .ok_or(SkipReason::MissingField("AppState"))?;

        let raw_id = app_state
            .get_str("appid")
            .ok_or(SkipReason::MissingField("appid"))?;
        let app_id = raw_id
            .trim()
            .parse::<u32>()
            .map_err(|_| SkipReason::InvalidAppId(raw_id.to_string()))?;
        let name = app_state
            .get_str("name")
            .ok_or(SkipReason::MissingField("name"))?
            .to_string();

        Ok(Self {
            app_id,
            name,
            install_dir: app_state
                .get_str("installdir")
                .filter(|d| !d.trim().is_empty())
                .map(str::to_string),
            state_flags: app_state
                .get_str("StateFlags")
                .and_then(|f| f.trim().parse().ok()),
        })
    }

    /// Manifests written before StateFlags existed count as installed
    pub fn is_installed(&self) -> bool {
        self.state_flags
            .map_or(true, |flags| flags & STATE_FULLY_INSTALLED != 0)
    }
}

// ============================================================================
// libraryfolders.vdf
// ============================================================================

/// Parse libraryfolders.vdf and extract library paths in index order
///
/// Accepts the current layout, where each numbered entry is an object with a
/// `path` key, and the legacy layout, where the numbered entry is the path.
pub fn parse_library_folders(content: &str) -> Vec<String> {
    let Some(root) = parse_vdf(content) else {
        return Vec::new();
    };

    let Some(library_folders) = root.get("libraryfolders") else {
        return Vec::new();
    };

    let mut numbered: Vec<(u32, String)> = library_folders
        .entries()
        .iter()
        .filter_map(|(key, value)| {
            let index = key.parse::<u32>().ok()?;
            let path = match value {
                VdfValue::String(path) => path.as_str(),
                VdfValue::Object(_) => value.get_str("path")?,
            };
            Some((index, path.to_string()))
        })
        .filter(|(_, path)| !path.trim().is_empty())
        .collect();

    numbered.sort_by_key(|(index, _)| *index);
    numbered.into_iter().map(|(_, path)| path).collect()
}
