//! Steam shortcuts.vdf binary format parser
//!
//! Reads the non-Steam game shortcuts a Steam user has registered. The file
//! is a binary KeyValues tree: each node starts with a type byte, a
//! NUL-terminated key, then the value; `0x08` closes a map.

use std::fs;
use std::path::Path;

const TYPE_MAP: u8 = 0x00;
const TYPE_STRING: u8 = 0x01;
const TYPE_INT32: u8 = 0x02;
const TYPE_FLOAT32: u8 = 0x03;
const TYPE_UINT64: u8 = 0x07;
const TYPE_END: u8 = 0x08;

/// A Steam non-Steam game shortcut
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Shortcut {
    /// AppID Steam assigned; absent in files written by old clients
    pub appid: Option<u32>,
    pub app_name: String,
    pub exe: String,
    pub start_dir: String,
    pub icon: String,
    pub launch_options: String,
    pub is_hidden: bool,
}

/// Result of reading one shortcuts.vdf
#[derive(Debug, Default)]
pub struct ShortcutsVdf {
    /// Entries in file order
    pub shortcuts: Vec<Shortcut>,
    /// Set when the file ended or broke mid-entry; `shortcuts` then holds
    /// everything read before that point
    pub truncated: bool,
}

#[derive(Debug, Clone, PartialEq)]
enum BinValue {
    Str(String),
    Int(u32),
    Float(f32),
    Long(u64),
    Map(Vec<(String, BinValue)>),
}

struct Reader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    fn read_u8(&mut self) -> Option<u8> {
        let byte = *self.data.get(self.pos)?;
        self.pos += 1;
        Some(byte)
    }

    fn read_array<const N: usize>(&mut self) -> Option<[u8; N]> {
        let bytes = self.data.get(self.pos..self.pos + N)?;
        self.pos += N;
        bytes.try_into().ok()
    }

    fn read_cstr(&mut self) -> Option<String> {
        let rest = self.data.get(self.pos..)?;
        let len = rest.iter().position(|b| *b == 0)?;
        let value = String::from_utf8_lossy(&rest[..len]).into_owned();
        self.pos += len + 1;
        Some(value)
    }

    fn read_map(&mut self) -> Option<Vec<(String, BinValue)>> {
        let mut entries = Vec::new();
        loop {
            let value_type = self.read_u8()?;
            if value_type == TYPE_END {
                return Some(entries);
            }
            let key = self.read_cstr()?;
            let value = match value_type {
                TYPE_MAP => BinValue::Map(self.read_map()?),
                TYPE_STRING => BinValue::Str(self.read_cstr()?),
                TYPE_INT32 => BinValue::Int(u32::from_le_bytes(self.read_array()?)),
                TYPE_FLOAT32 => BinValue::Float(f32::from_le_bytes(self.read_array()?)),
                TYPE_UINT64 => BinValue::Long(u64::from_le_bytes(self.read_array()?)),
                _ => return None,
            };
            entries.push((key, value));
        }
    }
}

impl Shortcut {
    fn from_fields(fields: &[(String, BinValue)]) -> Self {
        let mut shortcut = Shortcut::default();

        for (key, value) in fields {
            match (key.to_lowercase().as_str(), value) {
                ("appid", BinValue::Int(id)) => shortcut.appid = Some(*id),
                ("appname", BinValue::Str(s)) => shortcut.app_name = s.clone(),
                ("exe", BinValue::Str(s)) => shortcut.exe = s.clone(),
                ("startdir", BinValue::Str(s)) => shortcut.start_dir = s.clone(),
                ("icon", BinValue::Str(s)) => shortcut.icon = s.clone(),
                ("launchoptions", BinValue::Str(s)) => shortcut.launch_options = s.clone(),
                ("ishidden", BinValue::Int(v)) => shortcut.is_hidden = *v != 0,
                _ => {}
            }
        }

        shortcut
    }
}

impl ShortcutsVdf {
    /// Read and parse a shortcuts.vdf file
    pub fn load(path: &Path) -> std::io::Result<Self> {
        Ok(Self::parse(&fs::read(path)?))
    }

    /// Parse shortcuts.vdf bytes, keeping every complete entry
    pub fn parse(data: &[u8]) -> Self {
        let mut reader = Reader::new(data);
        let mut result = ShortcutsVdf::default();

        // Header: 0x00 "shortcuts" 0x00
        let header_ok = reader.read_u8() == Some(TYPE_MAP)
            && reader
                .read_cstr()
                .is_some_and(|k| k.eq_ignore_ascii_case("shortcuts"));
        if !header_ok {
            result.truncated = !data.is_empty();
            return result;
        }

        loop {
            match reader.read_u8() {
                Some(TYPE_END) => break,
                Some(TYPE_MAP) => {
                    let entry = reader.read_cstr().and_then(|_index| reader.read_map());
                    match entry {
                        Some(fields) => result.shortcuts.push(Shortcut::from_fields(&fields)),
                        None => {
                            result.truncated = true;
                            break;
                        }
                    }
                }
                _ => {
                    result.truncated = true;
                    break;
                }
            }
        }

        result
    }

    /// Encode shortcuts in the binary layout the Steam client writes
    pub fn encode(shortcuts: &[Shortcut]) -> Vec<u8> {
        let mut data = Vec::new();

        data.push(TYPE_MAP);
        data.extend_from_slice(b"shortcuts");
        data.push(0x00);

        for (idx, shortcut) in shortcuts.iter().enumerate() {
            data.push(TYPE_MAP);
            data.extend_from_slice(idx.to_string().as_bytes());
            data.push(0x00);

            if let Some(appid) = shortcut.appid {
                write_int(&mut data, "appid", appid);
            }
            write_string(&mut data, "AppName", &shortcut.app_name);
            write_string(&mut data, "Exe", &shortcut.exe);
            write_string(&mut data, "StartDir", &shortcut.start_dir);
            write_string(&mut data, "icon", &shortcut.icon);
            write_string(&mut data, "LaunchOptions", &shortcut.launch_options);
            write_int(&mut data, "IsHidden", shortcut.is_hidden as u32);
            write_int(&mut data, "LastPlayTime", 0);

            data.push(TYPE_MAP);
            data.extend_from_slice(b"tags");
            data.push(0x00);
            data.push(TYPE_END); // Empty tags

            data.push(TYPE_END); // End shortcut
        }

        data.push(TYPE_END); // End shortcuts section
        data.push(TYPE_END); // End root map

        data
    }
}

fn write_string(data: &mut Vec<u8>, key: &str, value: &str) {
    data.push(TYPE_STRING);
    data.extend_from_slice(key.as_bytes());
    data.push(0x00);
    data.extend_from_slice(value.as_bytes());
    data.push(0x00);
}

fn write_int(data: &mut Vec<u8>, key: &str, value: u32) {
    data.push(TYPE_INT32);
    data.extend_from_slice(key.as_bytes());
    data.push(0x00);
    data.extend_from_slice(&value.to_le_bytes());
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(name: &str, exe: &str) -> Shortcut {
        Shortcut {
            appid: Some(0x8000_1234),
            app_name: name.to_string(),
            exe: format!("\"{}\"", exe),
            start_dir: "\"/opt/games\"".to_string(),
            launch_options: "-fullscreen".to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_parse_written_file() {
        let written = vec![sample("Dwarf Fortress", "/opt/games/df"), sample("RetroArch", "/usr/bin/retroarch")];
        let parsed = ShortcutsVdf::parse(&ShortcutsVdf::encode(&written));

        assert!(!parsed.truncated);
        assert_eq!(parsed.shortcuts, written);
    }

    #[test]
    fn test_empty_input() {
        let parsed = ShortcutsVdf::parse(&[]);
        assert!(parsed.shortcuts.is_empty());
        assert!(!parsed.truncated);
    }

    #[test]
    fn test_truncated_keeps_complete_entries() {
        let data = ShortcutsVdf::encode(&[sample("First", "/a"), sample("Second", "/b")]);
        // Cut inside the second entry
        let cut = data.len() - 20;
        let parsed = ShortcutsVdf::parse(&data[..cut]);

        assert!(parsed.truncated);
        assert_eq!(parsed.shortcuts.len(), 1);
        assert_eq!(parsed.shortcuts[0].app_name, "First");
    }

    #[test]
    fn test_lowercase_keys_and_unknown_fields() {
        let mut data = vec![TYPE_MAP];
        data.extend_from_slice(b"shortcuts\0");
        data.push(TYPE_MAP);
        data.extend_from_slice(b"0\0");
        write_string(&mut data, "appname", "Lowercase Client");
        write_string(&mut data, "exe", "/bin/game");
        data.push(TYPE_UINT64);
        data.extend_from_slice(b"SomeFutureField\0");
        data.extend_from_slice(&42u64.to_le_bytes());
        data.push(TYPE_MAP);
        data.extend_from_slice(b"tags\0");
        write_string(&mut data, "0", "favorite");
        data.push(TYPE_END);
        write_int(&mut data, "IsHidden", 1);
        data.extend_from_slice(&[TYPE_END, TYPE_END, TYPE_END]);

        let parsed = ShortcutsVdf::parse(&data);
        assert!(!parsed.truncated);
        assert_eq!(parsed.shortcuts.len(), 1);
        let shortcut = &parsed.shortcuts[0];
        assert_eq!(shortcut.app_name, "Lowercase Client");
        assert_eq!(shortcut.exe, "/bin/game");
        assert_eq!(shortcut.appid, None);
        assert!(shortcut.is_hidden);
    }

    #[test]
    fn test_garbage_is_truncated() {
        let parsed = ShortcutsVdf::parse(b"not a vdf file");
        assert!(parsed.truncated);
        assert!(parsed.shortcuts.is_empty());
    }
}
