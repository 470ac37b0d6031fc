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
use anyhow::anyhow;
use std::fs::File;
use std::io::Write;
use std::path::Path;
use tempfile::NamedTempFile;

pub mod err;

pub fn sync_dir<P: AsRef<Path>>(path: P) -> std::io::Result<()> {
    File::open(path)?.sync_data()
}

// The temp file is created next to `file` so the final rename never crosses
// a filesystem boundary.
pub fn persist<P: AsRef<Path>>(file: P, d: &[u8]) -> anyhow::Result<()> {
    let path = file.as_ref();
    let dir = path
        .parent()
        .ok_or_else(|| anyhow!("persist: invalid filepath. file={:?}", path))?;
    let dir = if dir.as_os_str().is_empty() {
        Path::new(".")
    } else {
        dir
    };
    {
        let mut tempf = NamedTempFile::new_in(dir)?;
        tempf.write_all(d)?;
        tempf.flush()?;
        let targetfile = tempf.persist(path)?;
        targetfile.sync_data()?;
    }
    sync_dir(dir)?;
    Ok(())
}
