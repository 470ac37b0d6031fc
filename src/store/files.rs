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
use super::{Db, OpenDb};
use crate::psensure;
use crate::store::codec::{self, CRef, SRef, MIN_NAME_LEN, PRD_HDR_SIZE, PRD_SIG, PRS_HDR_SIZE};
use anyhow::Context;
use std::fs::{File, OpenOptions};
use std::io::Read;
use std::path::{Path, PathBuf};

pub trait DbExt {
    /// Create (or overwrite) the pair `<base>.prd` / `<base>.prs`.
    fn create(&mut self, base: &str, name_len: u16) -> anyhow::Result<()>;
    /// Open `<base>.prd` and the specification file its header names.
    fn open(&mut self, base: &str) -> anyhow::Result<()>;
    /// Release the handles. Idempotent.
    fn close(&mut self);
}

/// Cheap probe: does `path` hold a component file? Front-ends use this to
/// ask before overwriting.
pub fn valid_signature<P: AsRef<Path>>(path: P) -> bool {
    let mut sig = [0u8; 2];
    match File::open(path) {
        Ok(mut f) => f.read_exact(&mut sig).is_ok() && sig == PRD_SIG,
        Err(_) => false,
    }
}

fn rw_handle(path: &Path, truncate: bool) -> anyhow::Result<File> {
    let mut opts = OpenOptions::new();
    opts.read(true).write(true);
    if truncate {
        opts.create(true).truncate(true);
    }
    let f = opts
        .open(path)
        .with_context(|| format!("open failed. path={:?}", path))?;
    Ok(f)
}

pub(crate) fn open_pair(cpath: PathBuf) -> anyhow::Result<OpenDb> {
    psensure!(
        cpath.exists(),
        NotFound,
        "component file not found. path={:?}",
        cpath
    );
    let mut cfile = rw_handle(&cpath, false)?;
    let chdr = codec::read_cheader(&mut cfile)?;
    let dir = cpath.parent().unwrap_or_else(|| Path::new(""));
    let spath = if dir.as_os_str().is_empty() {
        PathBuf::from(&chdr.sname)
    } else {
        dir.join(&chdr.sname)
    };
    psensure!(
        spath.exists(),
        NotFound,
        "paired specification file not found. path={:?}",
        spath
    );
    let mut sfile = rw_handle(&spath, false)?;
    let shdr = codec::read_sheader(&mut sfile)?;
    return Ok(OpenDb {
        cfile,
        sfile,
        cpath,
        spath,
        name_len: chdr.name_len,
        chead: chdr.head,
        cfree: chdr.free,
        shead: shdr.head,
        sfree: shdr.free,
        sname: chdr.sname,
    });
}

impl DbExt for Db {
    fn create(&mut self, base: &str, name_len: u16) -> anyhow::Result<()> {
        psensure!(
            name_len >= MIN_NAME_LEN,
            InvalidArgument,
            "name field width must be >= {}. name_len={}",
            MIN_NAME_LEN,
            name_len
        );
        self.close();
        let cpath = PathBuf::from(format!("{}.prd", base));
        let spath = PathBuf::from(format!("{}.prs", base));
        let sname = spath
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let cfile = rw_handle(&cpath, true)?;
        let sfile = rw_handle(&spath, true)?;
        let mut st = OpenDb {
            cfile,
            sfile,
            cpath,
            spath,
            name_len,
            chead: CRef::NIL,
            cfree: PRD_HDR_SIZE,
            shead: SRef::NIL,
            sfree: PRS_HDR_SIZE,
            sname,
        };
        st.write_cheader()?;
        st.write_sheader()?;
        log::info!("create database. base={} name_len={}", base, name_len);
        self.state = Some(st);
        return Ok(());
    }

    fn open(&mut self, base: &str) -> anyhow::Result<()> {
        self.close();
        let st = open_pair(PathBuf::from(format!("{}.prd", base)))?;
        log::info!("open database. base={} spec_file={}", base, st.sname);
        self.state = Some(st);
        return Ok(());
    }

    fn close(&mut self) {
        if let Some(st) = self.state.take() {
            // sync errors are ignored, the handles are going away either way
            let _ = st.cfile.sync_all();
            let _ = st.sfile.sync_all();
        }
    }
}
