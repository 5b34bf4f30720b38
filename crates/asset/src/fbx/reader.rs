//! Binary FBX node-record reader.
//!
//! Layout: 27-byte header (magic, 0x1A 0x00, u32 version) followed by a list
//! of node records terminated by a null record. Each record is
//! `end_offset, num_properties, property_list_len` (u32, or u64 from version
//! 7500), a length-prefixed name, the properties, then nested records.

use std::io::Read;

use anyhow::{Context, Result, anyhow, bail};
use flate2::read::ZlibDecoder;

const MAGIC: &[u8] = b"Kaydara FBX Binary  \0";
const HEADER_LEN: usize = 27;
/// Records nested deeper than this are rejected.
const MAX_DEPTH: usize = 128;
/// Upper bound of the deflate expansion ratio.
const MAX_INFLATE_RATIO: usize = 1032;

#[derive(Clone, Debug, PartialEq)]
pub enum Property {
    Bool(bool),
    I16(i16),
    I32(i32),
    I64(i64),
    F32(f32),
    F64(f64),
    String(String),
    Raw(Vec<u8>),
    BoolArray(Vec<bool>),
    I32Array(Vec<i32>),
    I64Array(Vec<i64>),
    F32Array(Vec<f32>),
    F64Array(Vec<f64>),
}

impl Property {
    pub fn as_i64(&self) -> Option<i64> {
        match *self {
            Property::I16(v) => Some(v as i64),
            Property::I32(v) => Some(v as i64),
            Property::I64(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match *self {
            Property::F32(v) => Some(v as f64),
            Property::F64(v) => Some(v),
            Property::I16(v) => Some(v as f64),
            Property::I32(v) => Some(v as f64),
            Property::I64(v) => Some(v as f64),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Property::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn to_f64_vec(&self) -> Option<Vec<f64>> {
        match self {
            Property::F64Array(v) => Some(v.clone()),
            Property::F32Array(v) => Some(v.iter().map(|&x| x as f64).collect()),
            _ => None,
        }
    }

    pub fn to_i32_vec(&self) -> Option<Vec<i32>> {
        match self {
            Property::I32Array(v) => Some(v.clone()),
            Property::I64Array(v) => Some(v.iter().map(|&x| x as i32).collect()),
            _ => None,
        }
    }
}

#[derive(Clone, Debug, Default)]
pub struct FbxNode {
    pub name: String,
    pub properties: Vec<Property>,
    pub children: Vec<FbxNode>,
}

impl FbxNode {
    pub fn child(&self, name: &str) -> Option<&FbxNode> {
        self.children.iter().find(|c| c.name == name)
    }

    pub fn children_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a FbxNode> + 'a {
        self.children.iter().filter(move |c| c.name == name)
    }

    #[inline]
    pub fn prop(&self, index: usize) -> Option<&Property> {
        self.properties.get(index)
    }
}

#[derive(Clone, Debug)]
pub struct FbxDocument {
    pub version: u32,
    pub nodes: Vec<FbxNode>,
}

impl FbxDocument {
    pub fn node(&self, name: &str) -> Option<&FbxNode> {
        self.nodes.iter().find(|n| n.name == name)
    }
}

/// Parse a binary FBX file held in memory.
pub fn parse(bytes: &[u8]) -> Result<FbxDocument> {
    if bytes.starts_with(b"; FBX") {
        bail!("ASCII FBX is not supported; export as binary");
    }
    if bytes.len() < HEADER_LEN || &bytes[..MAGIC.len()] != MAGIC {
        bail!("Not a binary FBX file (bad magic)");
    }

    let mut cursor = Cursor {
        data: bytes,
        pos: MAGIC.len() + 2,
        wide: false,
    };
    let version = cursor.u32()?;
    cursor.wide = version >= 7500;
    log::debug!("FBX binary version {}", version);

    let mut nodes = Vec::new();
    while cursor.remaining() >= cursor.record_header_len() {
        match cursor.node(0)? {
            Some(node) => nodes.push(node),
            None => break,
        }
    }

    Ok(FbxDocument { version, nodes })
}

struct Cursor<'a> {
    data: &'a [u8],
    pos: usize,
    wide: bool,
}

impl<'a> Cursor<'a> {
    #[inline]
    fn remaining(&self) -> usize {
        self.data.len().saturating_sub(self.pos)
    }

    #[inline]
    fn record_header_len(&self) -> usize {
        if self.wide { 25 } else { 13 }
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8]> {
        if self.remaining() < n {
            bail!(
                "Unexpected end of FBX data at offset {} (need {} bytes)",
                self.pos,
                n
            );
        }
        let data = self.data;
        let slice = &data[self.pos..self.pos + n];
        self.pos += n;
        Ok(slice)
    }

    fn array<const N: usize>(&mut self) -> Result<[u8; N]> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.take(N)?);
        Ok(out)
    }

    fn u8(&mut self) -> Result<u8> {
        Ok(self.take(1)?[0])
    }

    fn u32(&mut self) -> Result<u32> {
        Ok(u32::from_le_bytes(self.array()?))
    }

    /// Offset/count field: u32 before version 7500, u64 after.
    fn word(&mut self) -> Result<u64> {
        if self.wide {
            Ok(u64::from_le_bytes(self.array()?))
        } else {
            Ok(self.u32()? as u64)
        }
    }

    fn node(&mut self, depth: usize) -> Result<Option<FbxNode>> {
        if depth > MAX_DEPTH {
            bail!("FBX nesting deeper than {} at offset {}", MAX_DEPTH, self.pos);
        }
        let start = self.pos;
        let end_offset = self.word()? as usize;
        let num_props = self.word()?;
        let _prop_list_len = self.word()?;
        let name_len = self.u8()? as usize;

        if end_offset == 0 {
            return Ok(None);
        }
        if end_offset <= start || end_offset > self.data.len() {
            bail!(
                "FBX record at offset {} has bad end offset {}",
                start,
                end_offset
            );
        }

        let name = String::from_utf8_lossy(self.take(name_len)?).into_owned();
        let mut properties = Vec::with_capacity(num_props.min(64) as usize);
        for i in 0..num_props {
            let prop = self
                .property()
                .with_context(|| format!("Property {} of FBX node '{}'", i, name))?;
            properties.push(prop);
        }

        let mut children = Vec::new();
        while self.pos < end_offset {
            match self.node(depth + 1)? {
                Some(child) => children.push(child),
                None => break,
            }
        }
        self.pos = end_offset;

        Ok(Some(FbxNode {
            name,
            properties,
            children,
        }))
    }

    fn property(&mut self) -> Result<Property> {
        let code = self.u8()?;
        Ok(match code {
            b'Y' => Property::I16(i16::from_le_bytes(self.array()?)),
            b'C' => Property::Bool(self.u8()? != 0),
            b'I' => Property::I32(i32::from_le_bytes(self.array()?)),
            b'F' => Property::F32(f32::from_le_bytes(self.array()?)),
            b'D' => Property::F64(f64::from_le_bytes(self.array()?)),
            b'L' => Property::I64(i64::from_le_bytes(self.array()?)),
            b'S' => {
                let len = self.u32()? as usize;
                Property::String(String::from_utf8_lossy(self.take(len)?).into_owned())
            }
            b'R' => {
                let len = self.u32()? as usize;
                Property::Raw(self.take(len)?.to_vec())
            }
            b'f' => Property::F32Array(
                self.packed_array(4)?
                    .chunks_exact(4)
                    .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
                    .collect(),
            ),
            b'd' => Property::F64Array(
                self.packed_array(8)?
                    .chunks_exact(8)
                    .map(|c| f64::from_le_bytes([c[0], c[1], c[2], c[3], c[4], c[5], c[6], c[7]]))
                    .collect(),
            ),
            b'i' => Property::I32Array(
                self.packed_array(4)?
                    .chunks_exact(4)
                    .map(|c| i32::from_le_bytes([c[0], c[1], c[2], c[3]]))
                    .collect(),
            ),
            b'l' => Property::I64Array(
                self.packed_array(8)?
                    .chunks_exact(8)
                    .map(|c| i64::from_le_bytes([c[0], c[1], c[2], c[3], c[4], c[5], c[6], c[7]]))
                    .collect(),
            ),
            b'b' => Property::BoolArray(self.packed_array(1)?.into_iter().map(|b| b != 0).collect()),
            other => bail!("Unknown FBX property type {:?}", other as char),
        })
    }

    /// Array payload, inflated when stored with zlib encoding.
    fn packed_array(&mut self, elem_size: usize) -> Result<Vec<u8>> {
        let len = self.u32()? as usize;
        let encoding = self.u32()?;
        let stored_len = self.u32()? as usize;
        let raw = self.take(stored_len)?;
        let expected = len
            .checked_mul(elem_size)
            .ok_or_else(|| anyhow!("FBX array length overflow"))?;

        let bytes = match encoding {
            0 => raw.to_vec(),
            1 => {
                if expected > stored_len.saturating_mul(MAX_INFLATE_RATIO) {
                    bail!(
                        "FBX array claims {} bytes from {} compressed bytes",
                        expected,
                        stored_len
                    );
                }
                // one extra byte so an oversized stream shows up as a length mismatch
                let mut out = Vec::new();
                ZlibDecoder::new(raw)
                    .take(expected as u64 + 1)
                    .read_to_end(&mut out)
                    .context("Failed to inflate FBX array")?;
                out
            }
            other => bail!("Unknown FBX array encoding {}", other),
        };

        if bytes.len() != expected {
            bail!(
                "FBX array holds {} bytes, expected {} ({} x {})",
                bytes.len(),
                expected,
                len,
                elem_size
            );
        }
        Ok(bytes)
    }
}

/// Minimal binary FBX writer for tests.
#[cfg(test)]
pub(crate) mod testing {
    use std::io::Write;

    use flate2::{Compression, write::ZlibEncoder};

    pub struct Record {
        pub name: &'static str,
        pub props: Vec<Vec<u8>>,
        pub children: Vec<Record>,
    }

    pub fn rec(name: &'static str, props: Vec<Vec<u8>>, children: Vec<Record>) -> Record {
        Record {
            name,
            props,
            children,
        }
    }

    pub fn long(v: i64) -> Vec<u8> {
        let mut out = vec![b'L'];
        out.extend_from_slice(&v.to_le_bytes());
        out
    }

    pub fn double(v: f64) -> Vec<u8> {
        let mut out = vec![b'D'];
        out.extend_from_slice(&v.to_le_bytes());
        out
    }

    pub fn string(s: &str) -> Vec<u8> {
        let mut out = vec![b'S'];
        out.extend_from_slice(&(s.len() as u32).to_le_bytes());
        out.extend_from_slice(s.as_bytes());
        out
    }

    pub fn zlib(payload: &[u8]) -> Vec<u8> {
        let mut enc = ZlibEncoder::new(Vec::new(), Compression::default());
        enc.write_all(payload).unwrap();
        enc.finish().unwrap()
    }

    /// Array property with an arbitrary declared count and stored payload.
    pub fn packed(code: u8, count: u32, encoding: u32, stored: &[u8]) -> Vec<u8> {
        let mut out = vec![code];
        out.extend_from_slice(&count.to_le_bytes());
        out.extend_from_slice(&encoding.to_le_bytes());
        out.extend_from_slice(&(stored.len() as u32).to_le_bytes());
        out.extend_from_slice(stored);
        out
    }

    fn array(code: u8, count: usize, payload: Vec<u8>, compress: bool) -> Vec<u8> {
        if compress {
            packed(code, count as u32, 1, &zlib(&payload))
        } else {
            packed(code, count as u32, 0, &payload)
        }
    }

    pub fn doubles(values: &[f64], compress: bool) -> Vec<u8> {
        let payload = values.iter().flat_map(|v| v.to_le_bytes()).collect();
        array(b'd', values.len(), payload, compress)
    }

    pub fn ints(values: &[i32]) -> Vec<u8> {
        let payload = values.iter().flat_map(|v| v.to_le_bytes()).collect();
        array(b'i', values.len(), payload, false)
    }

    fn emit(out: &mut Vec<u8>, record: &Record) {
        let start = out.len();
        out.extend_from_slice(&[0u8; 12]);
        out.push(record.name.len() as u8);
        out.extend_from_slice(record.name.as_bytes());
        let props_start = out.len();
        for p in &record.props {
            out.extend_from_slice(p);
        }
        let props_len = (out.len() - props_start) as u32;
        for child in &record.children {
            emit(out, child);
        }
        if !record.children.is_empty() {
            out.extend_from_slice(&[0u8; 13]);
        }
        let end = out.len() as u32;
        out[start..start + 4].copy_from_slice(&end.to_le_bytes());
        out[start + 4..start + 8].copy_from_slice(&(record.props.len() as u32).to_le_bytes());
        out[start + 8..start + 12].copy_from_slice(&props_len.to_le_bytes());
    }

    /// Encode a version-7400 document.
    pub fn document(records: &[Record]) -> Vec<u8> {
        let mut out = Vec::new();
        out.extend_from_slice(super::MAGIC);
        out.extend_from_slice(&[0x1A, 0x00]);
        out.extend_from_slice(&7400u32.to_le_bytes());
        for r in records {
            emit(&mut out, r);
        }
        out.extend_from_slice(&[0u8; 13]);
        out
    }
}

#[cfg(test)]
mod tests {
    use super::testing::*;
    use super::*;

    #[test]
    fn parses_nested_records_and_scalar_properties() {
        let bytes = document(&[rec(
            "Top",
            vec![long(42), string("hello")],
            vec![rec("Leaf", vec![double(1.5)], vec![])],
        )]);
        let doc = parse(&bytes).expect("parse fbx");
        assert_eq!(doc.version, 7400);
        let top = doc.node("Top").unwrap();
        assert_eq!(top.prop(0).and_then(Property::as_i64), Some(42));
        assert_eq!(top.prop(1).and_then(Property::as_str), Some("hello"));
        let leaf = top.child("Leaf").unwrap();
        assert_eq!(leaf.prop(0).and_then(Property::as_f64), Some(1.5));
    }

    #[test]
    fn inflates_compressed_arrays() {
        let values: Vec<f64> = (0..64).map(|i| i as f64 * 0.25).collect();
        let bytes = document(&[rec("V", vec![doubles(&values, true)], vec![])]);
        let doc = parse(&bytes).unwrap();
        let arr = doc.node("V").unwrap().prop(0).unwrap().to_f64_vec().unwrap();
        assert_eq!(arr, values);
    }

    #[test]
    fn rejects_ascii_and_garbage() {
        let ascii = parse(b"; FBX 7.4.0 project file\n").unwrap_err();
        assert!(ascii.to_string().contains("ASCII"));
        assert!(parse(b"PK\x03\x04 zip").is_err());
    }

    #[test]
    fn oversized_array_count_is_rejected_without_allocating() {
        let bytes = document(&[rec(
            "V",
            vec![packed(b'd', u32::MAX, 1, &zlib(&[0u8; 8]))],
            vec![],
        )]);
        let err = parse(&bytes).unwrap_err();
        assert!(format!("{err:#}").contains("compressed bytes"), "{err:#}");
    }

    #[test]
    fn array_count_must_match_inflated_payload() {
        // 16 KiB of zeros compresses well within the ratio bound
        let payload = vec![0u8; 16 * 1024];
        let bytes = document(&[rec(
            "V",
            vec![packed(b'd', 4, 1, &zlib(&payload))],
            vec![],
        )]);
        let err = parse(&bytes).unwrap_err();
        assert!(format!("{err:#}").contains("expected 32"), "{err:#}");

        let raw = document(&[rec("V", vec![packed(b'i', 1000, 0, &[0u8; 8])], vec![])]);
        assert!(parse(&raw).is_err());
    }

    #[test]
    fn deep_nesting_is_an_error() {
        let mut record = rec("Leaf", vec![], vec![]);
        for _ in 0..MAX_DEPTH + 10 {
            record = rec("N", vec![], vec![record]);
        }
        let err = parse(&document(&[record])).unwrap_err();
        assert!(err.to_string().contains("nesting deeper than 128"), "{err}");
    }

    #[test]
    fn nesting_at_the_limit_parses() {
        let mut record = rec("Leaf", vec![], vec![]);
        for _ in 0..MAX_DEPTH {
            record = rec("N", vec![], vec![record]);
        }
        let doc = parse(&document(&[record])).unwrap();
        let mut node = doc.node("N").unwrap();
        let mut levels = 0;
        while let Some(child) = node.children.first() {
            node = child;
            levels += 1;
        }
        assert_eq!(levels, MAX_DEPTH);
        assert_eq!(node.name, "Leaf");
    }

    #[test]
    fn truncated_file_is_an_error() {
        let bytes = document(&[rec("Top", vec![long(1)], vec![])]);
        assert!(parse(&bytes[..bytes.len() - 20]).is_err());
    }
}
