//! Binary buffer encodings for geometry lists and transforms.
//!
//! Two interchangeable forms are produced, both bit-exact reversible:
//! - hex: `ListIntHex("0100000002000000")`
//! - zip: `ListInt(ZIP("..."))`, where the payload is the hex of
//!   `[raw length: u32 LE][zlib stream]`.
//!
//! Elements are always written little-endian.

use std::io::{Read, Write};

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use flate2::read::ZlibDecoder;
use flate2::write::ZlibEncoder;
use flate2::Compression;
use serde::{Deserialize, Serialize};

use crate::util::{from_row_major, row_major, Error, Mat4, Result, Vec3};

/// Global choice of list encoding.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BufferFormat {
    #[default]
    Hex,
    Zip,
}

/// Element kind of an encoded list.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ListKind {
    Int,
    Float,
    Vector,
    Color,
}

impl ListKind {
    fn base_name(self) -> &'static str {
        match self {
            ListKind::Int => "ListInt",
            ListKind::Float => "ListFloat",
            ListKind::Vector => "ListVector",
            ListKind::Color => "ListColor",
        }
    }

    fn from_base_name(name: &str) -> Option<Self> {
        match name {
            "ListInt" => Some(ListKind::Int),
            "ListFloat" => Some(ListKind::Float),
            "ListVector" => Some(ListKind::Vector),
            "ListColor" => Some(ListKind::Color),
            _ => None,
        }
    }
}

/// A decoded list: its kind and raw little-endian element bytes.
#[derive(Clone, Debug, PartialEq)]
pub struct DecodedList {
    pub kind: ListKind,
    pub bytes: Vec<u8>,
}

impl DecodedList {
    /// Interpret the bytes as `i32` elements.
    pub fn to_ints(&self) -> Result<Vec<i32>> {
        let mut rdr = self.bytes.as_slice();
        let mut out = Vec::with_capacity(self.bytes.len() / 4);
        while !rdr.is_empty() {
            out.push(rdr.read_i32::<LittleEndian>()?);
        }
        Ok(out)
    }

    /// Interpret the bytes as `f32` elements.
    pub fn to_floats(&self) -> Result<Vec<f32>> {
        let mut rdr = self.bytes.as_slice();
        let mut out = Vec::with_capacity(self.bytes.len() / 4);
        while !rdr.is_empty() {
            out.push(rdr.read_f32::<LittleEndian>()?);
        }
        Ok(out)
    }
}

const HEX_DIGITS: &[u8; 16] = b"0123456789ABCDEF";

fn to_hex(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len() * 2);
    for &b in bytes {
        out.push(HEX_DIGITS[(b >> 4) as usize] as char);
        out.push(HEX_DIGITS[(b & 0x0f) as usize] as char);
    }
    out
}

fn hex_nibble(c: u8) -> Result<u8> {
    match c {
        b'0'..=b'9' => Ok(c - b'0'),
        b'a'..=b'f' => Ok(c - b'a' + 10),
        b'A'..=b'F' => Ok(c - b'A' + 10),
        _ => Err(Error::encoding(format!("invalid hex digit {:?}", c as char))),
    }
}

fn from_hex(text: &str) -> Result<Vec<u8>> {
    let bytes = text.as_bytes();
    if bytes.len() % 2 != 0 {
        return Err(Error::encoding("odd hex length"));
    }
    bytes
        .chunks_exact(2)
        .map(|pair| Ok((hex_nibble(pair[0])? << 4) | hex_nibble(pair[1])?))
        .collect()
}

fn zip_payload(raw: &[u8]) -> Result<String> {
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(raw)?;
    let compressed = encoder.finish()?;

    let mut payload = Vec::with_capacity(4 + compressed.len());
    payload.write_u32::<LittleEndian>(raw.len() as u32)?;
    payload.extend_from_slice(&compressed);
    Ok(to_hex(&payload))
}

fn unzip_payload(hex: &str) -> Result<Vec<u8>> {
    let payload = from_hex(hex)?;
    let mut rdr = payload.as_slice();
    let raw_len = rdr.read_u32::<LittleEndian>()? as usize;
    let mut decoder = ZlibDecoder::new(rdr);
    let mut raw = Vec::with_capacity(raw_len);
    decoder.read_to_end(&mut raw)?;
    if raw.len() != raw_len {
        return Err(Error::encoding(format!(
            "zip payload size mismatch: header {} vs {}",
            raw_len,
            raw.len()
        )));
    }
    Ok(raw)
}

/// Encode raw element bytes as a list literal of the given kind.
pub fn encode_bytes(kind: ListKind, raw: &[u8], format: BufferFormat) -> Result<String> {
    match format {
        BufferFormat::Hex => Ok(format!("{}Hex(\"{}\")", kind.base_name(), to_hex(raw))),
        BufferFormat::Zip => Ok(format!("{}(ZIP(\"{}\"))", kind.base_name(), zip_payload(raw)?)),
    }
}

/// Encode `i32` elements.
pub fn encode_ints(data: &[i32], format: BufferFormat) -> Result<String> {
    let mut raw = Vec::with_capacity(data.len() * 4);
    for &v in data {
        raw.write_i32::<LittleEndian>(v)?;
    }
    encode_bytes(ListKind::Int, &raw, format)
}

/// Encode `f32` elements.
pub fn encode_floats(data: &[f32], format: BufferFormat) -> Result<String> {
    encode_bytes(ListKind::Float, &f32_bytes(data.iter().copied())?, format)
}

/// Encode 3-component vectors.
pub fn encode_vectors(data: &[Vec3], format: BufferFormat) -> Result<String> {
    let raw = f32_bytes(data.iter().flat_map(|v| v.to_array()))?;
    encode_bytes(ListKind::Vector, &raw, format)
}

/// Encode colors (3 components each).
pub fn encode_colors(data: &[Vec3], format: BufferFormat) -> Result<String> {
    let raw = f32_bytes(data.iter().flat_map(|v| v.to_array()))?;
    encode_bytes(ListKind::Color, &raw, format)
}

fn f32_bytes(values: impl Iterator<Item = f32>) -> Result<Vec<u8>> {
    let mut raw = Vec::new();
    for v in values {
        raw.write_f32::<LittleEndian>(v)?;
    }
    Ok(raw)
}

/// Decode a list literal produced by any `encode_*` function.
pub fn decode_list(text: &str) -> Result<DecodedList> {
    let text = text.trim();
    let open = text
        .find('(')
        .ok_or_else(|| Error::encoding("missing '(' in list literal"))?;
    let head = &text[..open];
    let body = text[open + 1..]
        .strip_suffix(')')
        .ok_or_else(|| Error::encoding("missing ')' in list literal"))?;

    if let Some(base) = head.strip_suffix("Hex") {
        let kind = ListKind::from_base_name(base)
            .ok_or_else(|| Error::encoding(format!("unknown list type {}", head)))?;
        let hex = unquote(body)?;
        return Ok(DecodedList { kind, bytes: from_hex(hex)? });
    }

    let kind = ListKind::from_base_name(head)
        .ok_or_else(|| Error::encoding(format!("unknown list type {}", head)))?;
    let inner = body
        .strip_prefix("ZIP(")
        .and_then(|s| s.strip_suffix(')'))
        .ok_or_else(|| Error::encoding("expected ZIP(...) payload"))?;
    Ok(DecodedList { kind, bytes: unzip_payload(unquote(inner)?)? })
}

fn unquote(s: &str) -> Result<&str> {
    s.strip_prefix('"')
        .and_then(|s| s.strip_suffix('"'))
        .ok_or_else(|| Error::encoding("expected quoted payload"))
}

/// `TransformHex("...")`: 16 row-major `f32` elements, little-endian.
pub fn transform_hex(m: &Mat4) -> String {
    let mut raw = [0u8; 64];
    for (chunk, v) in raw.chunks_exact_mut(4).zip(row_major(m)) {
        chunk.copy_from_slice(&v.to_le_bytes());
    }
    format!("TransformHex(\"{}\")", to_hex(&raw))
}

/// Parse a `TransformHex("...")` literal back into a matrix.
pub fn decode_transform_hex(text: &str) -> Result<Mat4> {
    let body = text
        .trim()
        .strip_prefix("TransformHex(")
        .and_then(|s| s.strip_suffix(')'))
        .ok_or_else(|| Error::encoding("expected TransformHex(...)"))?;
    let bytes = from_hex(unquote(body)?)?;
    if bytes.len() != 64 {
        return Err(Error::encoding(format!("TransformHex needs 64 bytes, got {}", bytes.len())));
    }
    let mut rows = [0f32; 16];
    let mut rdr = bytes.as_slice();
    for v in rows.iter_mut() {
        *v = rdr.read_f32::<LittleEndian>()?;
    }
    Ok(from_row_major(&rows))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hex_layout() {
        let text = encode_ints(&[1, -1], BufferFormat::Hex).unwrap();
        assert_eq!(text, "ListIntHex(\"01000000FFFFFFFF\")");
        assert_eq!(encode_ints(&[], BufferFormat::Hex).unwrap(), "ListIntHex(\"\")");
    }

    #[test]
    fn test_both_forms_reversible() {
        let ints: Vec<i32> = (0..500).map(|i| i * 7 - 100).collect();
        for format in [BufferFormat::Hex, BufferFormat::Zip] {
            let decoded = decode_list(&encode_ints(&ints, format).unwrap()).unwrap();
            assert_eq!(decoded.kind, ListKind::Int);
            assert_eq!(decoded.to_ints().unwrap(), ints);
        }

        let verts = vec![Vec3::new(0.1, -2.5, 1e-7), Vec3::new(f32::MAX, 0.0, -0.0)];
        let text = encode_vectors(&verts, BufferFormat::Zip).unwrap();
        assert!(text.starts_with("ListVector(ZIP(\""));
        let floats = decode_list(&text).unwrap().to_floats().unwrap();
        let bits: Vec<u32> = floats.iter().map(|f| f.to_bits()).collect();
        let expected: Vec<u32> = verts.iter().flat_map(|v| v.to_array()).map(f32::to_bits).collect();
        assert_eq!(bits, expected);
    }

    #[test]
    fn test_transform_hex() {
        let m = Mat4::from_translation(Vec3::new(1.0, 2.0, 3.0));
        let text = transform_hex(&m);
        assert_eq!(text.len(), "TransformHex(\"\")".len() + 128);
        assert_eq!(decode_transform_hex(&text).unwrap(), m);
    }

    #[test]
    fn test_decode_rejects_garbage() {
        assert!(decode_list("ListIntHex(\"0\")").is_err());
        assert!(decode_list("ListBogusHex(\"00\")").is_err());
        assert!(decode_list("ListInt(\"00\")").is_err());
    }
}
