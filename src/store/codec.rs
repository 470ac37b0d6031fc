// Copyright 2026 The prodspec Authors
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
// http://www.apache.org/licenses/LICENSE-2.0
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.
use crate::psensure;
use anyhow::Context;
use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use static_assertions::const_assert;
use std::io::{Cursor, Read, Seek, SeekFrom, Write};

pub const PRD_SIG: [u8; 2] = *b"PS";
pub const PRS_NAME_BYTES: usize = 16;
pub const PRD_HDR_SIZE: i32 = 2 + 2 + 4 + 4 + PRS_NAME_BYTES as i32;
pub const PRS_HDR_SIZE: i32 = 4 + 4;
pub const PRS_REC_SIZE: i32 = 1 + 4 + 2 + 4;
pub const MIN_NAME_LEN: u16 = 4;
pub const MAX_QTY: i16 = i16::MAX;

const_assert!(PRD_HDR_SIZE == 28);
const_assert!(PRS_REC_SIZE == 11);

/// A component record occupies `deleted + first_spec + next + name field`.
pub fn comp_rec_size(name_len: u16) -> i32 {
    1 + 4 + 4 + name_len as i32
}

// On-disk `deleted` flag. Zero is active; we write -1, but any non-zero
// value reads back as deleted.
pub const DELETED: i8 = -1;
pub const ACTIVE: i8 = 0;

macro_rules! def_ref {
    ($name: ident, $doc: literal) => {
        #[doc = $doc]
        #[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
        pub struct $name(i32);

        impl $name {
            pub const NIL: $name = $name(-1);

            pub fn new(off: i32) -> $name {
                $name(off)
            }

            pub fn get(self) -> i32 {
                self.0
            }

            pub fn is_nil(self) -> bool {
                self.0 == -1
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

def_ref!(CRef, "Byte offset of a record in the component file, -1 = nil.");
def_ref!(SRef, "Byte offset of a record in the specification file, -1 = nil.");

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum CompType {
    Product,
    Assembly,
    Detail,
}

impl CompType {
    pub fn letter(self) -> char {
        match self {
            CompType::Product => 'I',
            CompType::Assembly => 'U',
            CompType::Detail => 'D',
        }
    }

    pub fn from_letter(c: char) -> Option<CompType> {
        match c {
            'I' => Some(CompType::Product),
            'U' => Some(CompType::Assembly),
            'D' => Some(CompType::Detail),
            _ => None,
        }
    }
}

impl std::fmt::Display for CompType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.letter())
    }
}

#[derive(Clone, Debug)]
pub struct CompRec {
    pub off: CRef,
    pub deleted: i8,
    pub first_spec: SRef,
    pub next: CRef,
    pub typ: CompType,
    pub name: String,
}

impl CompRec {
    pub fn is_active(&self) -> bool {
        self.deleted == ACTIVE
    }
}

#[derive(Clone, Copy, Debug)]
pub struct SpecRec {
    pub off: SRef,
    pub deleted: i8,
    pub comp: CRef,
    pub qty: i16,
    pub next: SRef,
}

impl SpecRec {
    pub fn is_active(&self) -> bool {
        self.deleted == ACTIVE
    }
}

#[derive(Clone, Debug)]
pub struct CHeader {
    pub name_len: u16,
    pub head: CRef,
    pub free: i32,
    // basename of the paired specification file
    pub sname: String,
}

#[derive(Clone, Copy, Debug)]
pub struct SHeader {
    pub head: SRef,
    pub free: i32,
}

fn read_at<R: Read + Seek>(r: &mut R, off: u64, len: usize, what: &str) -> anyhow::Result<Vec<u8>> {
    let mut buf = vec![0u8; len];
    r.seek(SeekFrom::Start(off))?;
    r.read_exact(&mut buf)
        .with_context(|| crate::errctx!(FormatError, "truncated {}. off={} len={}", what, off, len))?;
    return Ok(buf);
}

// ASCII with everything above 127 dropped, as the name fields are stored.
fn ascii_bytes(s: &str) -> Vec<u8> {
    s.bytes().filter(|b| b.is_ascii()).collect()
}

fn decode_sname(field: &[u8]) -> String {
    let end = field.iter().position(|&b| b == 0).unwrap_or(field.len());
    let s: String = field[..end]
        .iter()
        .filter(|b| b.is_ascii())
        .map(|&b| b as char)
        .collect();
    s.trim().to_string()
}

pub fn read_cheader<R: Read + Seek>(r: &mut R) -> anyhow::Result<CHeader> {
    let buf = read_at(r, 0, PRD_HDR_SIZE as usize, "component header")?;
    psensure!(
        buf[..2] == PRD_SIG,
        FormatError,
        "bad component file signature. sig={:?}",
        &buf[..2]
    );
    let mut cursor = Cursor::new(&buf[2..]);
    let name_len = cursor.read_u16::<LittleEndian>()?;
    let head = CRef::new(cursor.read_i32::<LittleEndian>()?);
    let free = cursor.read_i32::<LittleEndian>()?;
    psensure!(
        name_len >= MIN_NAME_LEN,
        FormatError,
        "bad name field width. name_len={}",
        name_len
    );
    let sname = decode_sname(&buf[(PRD_HDR_SIZE as usize - PRS_NAME_BYTES)..]);
    return Ok(CHeader {
        name_len,
        head,
        free,
        sname,
    });
}

pub fn write_cheader<W: Write + Seek>(w: &mut W, hdr: &CHeader) -> anyhow::Result<()> {
    w.seek(SeekFrom::Start(0))?;
    w.write_all(&PRD_SIG)?;
    w.write_u16::<LittleEndian>(hdr.name_len)?;
    w.write_i32::<LittleEndian>(hdr.head.get())?;
    w.write_i32::<LittleEndian>(hdr.free)?;
    let mut field = [0u8; PRS_NAME_BYTES];
    let nb = ascii_bytes(&hdr.sname);
    let n = std::cmp::min(PRS_NAME_BYTES, nb.len());
    field[..n].copy_from_slice(&nb[..n]);
    w.write_all(&field)?;
    return Ok(());
}

pub fn read_sheader<R: Read + Seek>(r: &mut R) -> anyhow::Result<SHeader> {
    let buf = read_at(r, 0, PRS_HDR_SIZE as usize, "specification header")?;
    let mut cursor = Cursor::new(&buf[..]);
    let head = SRef::new(cursor.read_i32::<LittleEndian>()?);
    let free = cursor.read_i32::<LittleEndian>()?;
    return Ok(SHeader { head, free });
}

pub fn write_sheader<W: Write + Seek>(w: &mut W, hdr: &SHeader) -> anyhow::Result<()> {
    w.seek(SeekFrom::Start(0))?;
    w.write_i32::<LittleEndian>(hdr.head.get())?;
    w.write_i32::<LittleEndian>(hdr.free)?;
    return Ok(());
}

fn decode_name_field(field: &[u8]) -> (CompType, String) {
    let raw: String = field
        .iter()
        .filter(|b| b.is_ascii())
        .map(|&b| b as char)
        .collect();
    let raw = raw.trim_end_matches(' ');
    let bytes = raw.as_bytes();
    if bytes.len() >= 2 && bytes[1] == b':' {
        if let Some(typ) = CompType::from_letter(bytes[0] as char) {
            return (typ, raw[2..].trim().to_string());
        }
    }
    (CompType::Product, raw.trim().to_string())
}

fn encode_name_field(typ: CompType, name: &str, name_len: u16) -> Vec<u8> {
    let payload = ascii_bytes(&format!("{}:{}", typ.letter(), name));
    let mut field = vec![b' '; name_len as usize];
    let n = std::cmp::min(field.len(), payload.len());
    field[..n].copy_from_slice(&payload[..n]);
    field
}

pub fn read_comp<R: Read + Seek>(r: &mut R, off: CRef, name_len: u16) -> anyhow::Result<CompRec> {
    let size = comp_rec_size(name_len) as usize;
    let buf = read_at(r, off.get() as u64, size, "component record")?;
    let mut cursor = Cursor::new(&buf[..]);
    let deleted = cursor.read_i8()?;
    let first_spec = SRef::new(cursor.read_i32::<LittleEndian>()?);
    let next = CRef::new(cursor.read_i32::<LittleEndian>()?);
    let (typ, name) = decode_name_field(&buf[9..]);
    return Ok(CompRec {
        off,
        deleted,
        first_spec,
        next,
        typ,
        name,
    });
}

pub fn write_comp<W: Write + Seek>(w: &mut W, rec: &CompRec, name_len: u16) -> anyhow::Result<()> {
    w.seek(SeekFrom::Start(rec.off.get() as u64))?;
    w.write_i8(rec.deleted)?;
    w.write_i32::<LittleEndian>(rec.first_spec.get())?;
    w.write_i32::<LittleEndian>(rec.next.get())?;
    w.write_all(&encode_name_field(rec.typ, &rec.name, name_len))?;
    return Ok(());
}

pub fn read_spec<R: Read + Seek>(r: &mut R, off: SRef) -> anyhow::Result<SpecRec> {
    let buf = read_at(r, off.get() as u64, PRS_REC_SIZE as usize, "specification record")?;
    let mut cursor = Cursor::new(&buf[..]);
    let deleted = cursor.read_i8()?;
    let comp = CRef::new(cursor.read_i32::<LittleEndian>()?);
    let qty = cursor.read_i16::<LittleEndian>()?;
    let next = SRef::new(cursor.read_i32::<LittleEndian>()?);
    return Ok(SpecRec {
        off,
        deleted,
        comp,
        qty,
        next,
    });
}

pub fn write_spec<W: Write + Seek>(w: &mut W, rec: &SpecRec) -> anyhow::Result<()> {
    w.seek(SeekFrom::Start(rec.off.get() as u64))?;
    w.write_i8(rec.deleted)?;
    w.write_i32::<LittleEndian>(rec.comp.get())?;
    w.write_i16::<LittleEndian>(rec.qty)?;
    w.write_i32::<LittleEndian>(rec.next.get())?;
    return Ok(());
}
