//! Serialization of the raw webhook payload.
//!
//! Downstream reports compare `raw_payload` strings byte for byte with rows
//! written by earlier versions of the service, so the layout is fixed:
//! `", "` between members, `": "` after keys, and every non-ASCII character
//! escaped as lowercase `\uXXXX` (UTF-16 code units).

use crate::domain::model::FormPayload;
use crate::utils::error::Result;
use serde::ser::{SerializeMap, Serializer};
use serde_json::ser::Formatter;
use std::io::{self, Write};

struct AsciiSpacedFormatter;

impl Formatter for AsciiSpacedFormatter {
    fn begin_array_value<W>(&mut self, writer: &mut W, first: bool) -> io::Result<()>
    where
        W: ?Sized + Write,
    {
        if first {
            Ok(())
        } else {
            writer.write_all(b", ")
        }
    }

    fn begin_object_key<W>(&mut self, writer: &mut W, first: bool) -> io::Result<()>
    where
        W: ?Sized + Write,
    {
        if first {
            Ok(())
        } else {
            writer.write_all(b", ")
        }
    }

    fn begin_object_value<W>(&mut self, writer: &mut W) -> io::Result<()>
    where
        W: ?Sized + Write,
    {
        writer.write_all(b": ")
    }

    fn write_string_fragment<W>(&mut self, writer: &mut W, fragment: &str) -> io::Result<()>
    where
        W: ?Sized + Write,
    {
        for ch in fragment.chars() {
            if ch == '\x7f' {
                writer.write_all(b"\\u007f")?;
            } else if ch.is_ascii() {
                writer.write_all(&[ch as u8])?;
            } else {
                let mut units = [0u16; 2];
                for unit in ch.encode_utf16(&mut units) {
                    write!(writer, "\\u{:04x}", unit)?;
                }
            }
        }
        Ok(())
    }
}

pub fn raw_payload(form: &FormPayload) -> Result<String> {
    let mut buffer = Vec::with_capacity(form.len() * 32);
    {
        let mut serializer =
            serde_json::Serializer::with_formatter(&mut buffer, AsciiSpacedFormatter);
        let mut map = (&mut serializer).serialize_map(Some(form.len()))?;
        for (key, value) in form.iter() {
            map.serialize_entry(key, value)?;
        }
        map.end()?;
    }
    // 格式器只輸出 ASCII
    Ok(String::from_utf8_lossy(&buffer).into_owned())
}
