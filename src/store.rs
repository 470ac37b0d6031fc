/*
Copyright 2026 The prodspec Authors
Licensed under the Apache License, Version 2.0 (the "License");
you may not use this file except in compliance with the License.
You may obtain a copy of the License at
http://www.apache.org/licenses/LICENSE-2.0
Unless required by applicable law or agreed to in writing, software
distributed under the License is distributed on an "AS IS" BASIS,
WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
See the License for the specific language governing permissions and
limitations under the License.
*/
use crate::psensure;
use codec::{CHeader, CompRec, CRef, SHeader, SpecRec, SRef, PRD_HDR_SIZE, PRS_HDR_SIZE, PRS_REC_SIZE};
use std::collections::HashSet;
use std::fs::File;
use std::path::PathBuf;

pub mod codec;
pub mod comp;
pub mod compact;
pub mod files;
pub mod spec;
pub mod tree;

/// The engine value. Everything observable lives in the two paired files;
/// a `Db` only caches the headers of the currently open pair. Operations on
/// a closed `Db` fail with NotOpen.
#[derive(Default)]
pub struct Db {
    state: Option<OpenDb>,
}

struct OpenDb {
    cfile: File,
    sfile: File,
    cpath: PathBuf,
    spath: PathBuf,
    name_len: u16,
    chead: CRef,
    cfree: i32,
    shead: SRef,
    sfree: i32,
    // basename of the specification file, as recorded in the CFile header
    sname: String,
}

impl Db {
    pub fn new() -> Db {
        Db { state: None }
    }

    pub fn opened(&self) -> bool {
        self.state.is_some()
    }

    fn state(&mut self) -> anyhow::Result<&mut OpenDb> {
        match self.state.as_mut() {
            Some(st) => Ok(st),
            None => Err(crate::psanyhow!(NotOpen, "no open database. run Create or Open first")),
        }
    }
}

pub(crate) fn norm(s: &str) -> &str {
    s.trim()
}

// Names compare case-insensitively on their trimmed form; the same key
// orders the sorted list.
pub(crate) fn name_key(s: &str) -> String {
    s.trim().to_lowercase()
}

impl OpenDb {
    fn comp_rec_size(&self) -> i32 {
        codec::comp_rec_size(self.name_len)
    }

    // A ref that does not land inside the data region is a dangling pointer
    // on disk, not a caller mistake.
    fn comp_at(&mut self, off: CRef) -> anyhow::Result<CompRec> {
        let size = self.comp_rec_size();
        psensure!(
            off.get() >= PRD_HDR_SIZE && off.get() + size <= self.cfree,
            Corruption,
            "component ref out of range. off={} free={}",
            off,
            self.cfree
        );
        codec::read_comp(&mut self.cfile, off, self.name_len)
    }

    fn spec_at(&mut self, off: SRef) -> anyhow::Result<SpecRec> {
        psensure!(
            off.get() >= PRS_HDR_SIZE && off.get() + PRS_REC_SIZE <= self.sfree,
            Corruption,
            "specification ref out of range. off={} free={}",
            off,
            self.sfree
        );
        codec::read_spec(&mut self.sfile, off)
    }

    fn put_comp(&mut self, rec: &CompRec) -> anyhow::Result<()> {
        codec::write_comp(&mut self.cfile, rec, self.name_len)
    }

    fn put_spec(&mut self, rec: &SpecRec) -> anyhow::Result<()> {
        codec::write_spec(&mut self.sfile, rec)
    }

    fn write_cheader(&mut self) -> anyhow::Result<()> {
        let hdr = CHeader {
            name_len: self.name_len,
            head: self.chead,
            free: self.cfree,
            sname: self.sname.clone(),
        };
        codec::write_cheader(&mut self.cfile, &hdr)
    }

    fn write_sheader(&mut self) -> anyhow::Result<()> {
        let hdr = SHeader {
            head: self.shead,
            free: self.sfree,
        };
        codec::write_sheader(&mut self.sfile, &hdr)
    }

    /// Every component record slot between the header and `free`, in
    /// physical order, deleted ones included.
    fn scan_comps(&mut self) -> anyhow::Result<Vec<CompRec>> {
        let size = self.comp_rec_size();
        let mut out = Vec::new();
        let mut off = PRD_HDR_SIZE;
        while off + size <= self.cfree {
            out.push(codec::read_comp(&mut self.cfile, CRef::new(off), self.name_len)?);
            off += size;
        }
        return Ok(out);
    }

    fn scan_specs(&mut self) -> anyhow::Result<Vec<SpecRec>> {
        let mut out = Vec::new();
        let mut off = PRS_HDR_SIZE;
        while off + PRS_REC_SIZE <= self.sfree {
            out.push(codec::read_spec(&mut self.sfile, SRef::new(off))?);
            off += PRS_REC_SIZE;
        }
        return Ok(out);
    }

    /// Active components in sorted-list order. Deleted records may still sit
    /// on the list as pass-through nodes until the next rebuild; they are
    /// skipped here.
    fn iter_logical(&mut self) -> anyhow::Result<Vec<CompRec>> {
        let mut out = Vec::new();
        let mut seen: HashSet<CRef> = HashSet::new();
        let mut ptr = self.chead;
        while !ptr.is_nil() {
            psensure!(
                seen.insert(ptr),
                Corruption,
                "cycle in the sorted component list. off={}",
                ptr
            );
            let rec = self.comp_at(ptr)?;
            ptr = rec.next;
            if rec.is_active() {
                out.push(rec);
            }
        }
        return Ok(out);
    }

    fn find_any(&mut self, name: &str) -> anyhow::Result<Option<CompRec>> {
        let needle = name_key(name);
        for rec in self.scan_comps()? {
            if name_key(&rec.name) == needle {
                return Ok(Some(rec));
            }
        }
        Ok(None)
    }

    fn find_active(&mut self, name: &str) -> anyhow::Result<Option<CompRec>> {
        let needle = name_key(name);
        for rec in self.scan_comps()? {
            if rec.is_active() && name_key(&rec.name) == needle {
                return Ok(Some(rec));
            }
        }
        Ok(None)
    }
}
