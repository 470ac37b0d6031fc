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
use super::{files, name_key, Db, OpenDb};
use crate::store::codec::{
    self, CHeader, CompRec, CRef, SHeader, SpecRec, SRef, ACTIVE, PRD_HDR_SIZE, PRS_HDR_SIZE,
    PRS_REC_SIZE,
};
use crate::utils;
use std::collections::HashMap;
use std::io::Cursor;

pub trait DbExt {
    /// Rebuild the pair with only the active records, renumbering every
    /// offset, and atomically replace the originals. The only operation
    /// that moves data; all other deletion is logical.
    fn truncate(&mut self) -> anyhow::Result<()>;
}

struct Snapshot {
    active: Vec<CompRec>,
    // per entry of `active`: surviving children, already remapped
    buckets: Vec<Vec<(CRef, i16)>>,
    name_len: u16,
    sname: String,
}

fn snapshot(st: &mut OpenDb) -> anyhow::Result<Snapshot> {
    let crec_size = st.comp_rec_size();
    let mut active: Vec<CompRec> = st
        .scan_comps()?
        .into_iter()
        .filter(|r| r.is_active())
        .collect();
    active.sort_by_key(|r| name_key(&r.name));

    let mut new_off: HashMap<CRef, CRef> = HashMap::new();
    for (i, c) in active.iter().enumerate() {
        new_off.insert(c.off, CRef::new(PRD_HDR_SIZE + i as i32 * crec_size));
    }

    // A spec survives when it is active and its child survives; a spec
    // whose child is deleted is dropped here even if the spec itself was
    // never marked.
    let mut buckets = Vec::with_capacity(active.len());
    for p in &active {
        let mut keep = Vec::new();
        let mut ptr = p.first_spec;
        while !ptr.is_nil() {
            let sr = st.spec_at(ptr)?;
            if sr.is_active() {
                if let Some(&child_new) = new_off.get(&sr.comp) {
                    keep.push((child_new, sr.qty));
                }
            }
            ptr = sr.next;
        }
        buckets.push(keep);
    }
    return Ok(Snapshot {
        active,
        buckets,
        name_len: st.name_len,
        sname: st.sname.clone(),
    });
}

fn render(snap: &Snapshot) -> anyhow::Result<(Vec<u8>, Vec<u8>)> {
    let crec_size = codec::comp_rec_size(snap.name_len);

    // Lay the spec blocks out first so every component record can be
    // written with its final first_spec in one pass.
    let mut first_spec = Vec::with_capacity(snap.buckets.len());
    let mut sfree = PRS_HDR_SIZE;
    let mut shead = SRef::NIL;
    for keep in &snap.buckets {
        if keep.is_empty() {
            first_spec.push(SRef::NIL);
            continue;
        }
        if shead.is_nil() {
            shead = SRef::new(sfree);
        }
        first_spec.push(SRef::new(sfree));
        sfree += keep.len() as i32 * PRS_REC_SIZE;
    }

    let cfree = PRD_HDR_SIZE + snap.active.len() as i32 * crec_size;
    let chead = if snap.active.is_empty() {
        CRef::NIL
    } else {
        CRef::new(PRD_HDR_SIZE)
    };
    let mut cbuf = Cursor::new(Vec::with_capacity(cfree as usize));
    codec::write_cheader(
        &mut cbuf,
        &CHeader {
            name_len: snap.name_len,
            head: chead,
            free: cfree,
            sname: snap.sname.clone(),
        },
    )?;
    for (i, old) in snap.active.iter().enumerate() {
        let off = CRef::new(PRD_HDR_SIZE + i as i32 * crec_size);
        let next = if i + 1 == snap.active.len() {
            CRef::NIL
        } else {
            CRef::new(off.get() + crec_size)
        };
        let rec = CompRec {
            off,
            deleted: ACTIVE,
            first_spec: first_spec[i],
            next,
            typ: old.typ,
            name: old.name.clone(),
        };
        codec::write_comp(&mut cbuf, &rec, snap.name_len)?;
    }

    let mut sbuf = Cursor::new(Vec::with_capacity(sfree as usize));
    codec::write_sheader(
        &mut sbuf,
        &SHeader {
            head: shead,
            free: sfree,
        },
    )?;
    for (i, keep) in snap.buckets.iter().enumerate() {
        for (j, &(child, qty)) in keep.iter().enumerate() {
            let off = SRef::new(first_spec[i].get() + j as i32 * PRS_REC_SIZE);
            let next = if j + 1 == keep.len() {
                SRef::NIL
            } else {
                SRef::new(off.get() + PRS_REC_SIZE)
            };
            codec::write_spec(
                &mut sbuf,
                &SpecRec {
                    off,
                    deleted: ACTIVE,
                    comp: child,
                    qty,
                    next,
                },
            )?;
        }
    }
    return Ok((cbuf.into_inner(), sbuf.into_inner()));
}

impl DbExt for Db {
    fn truncate(&mut self) -> anyhow::Result<()> {
        let snap = snapshot(self.state()?)?;
        let (cbytes, sbytes) = render(&snap)?;
        let nspecs: usize = snap.buckets.iter().map(|b| b.len()).sum();

        // The handles go away before the swap; a failure from here on
        // leaves the database closed and the caller reopens.
        let st = self.state.take().unwrap();
        let OpenDb {
            cfile,
            sfile,
            cpath,
            spath,
            ..
        } = st;
        drop(cfile);
        drop(sfile);
        utils::persist(&cpath, &cbytes)?;
        utils::persist(&spath, &sbytes)?;
        self.state = Some(files::open_pair(cpath)?);
        log::info!(
            "truncate done. components={} specs={}",
            snap.active.len(),
            nspecs
        );
        return Ok(());
    }
}

#[cfg(test)]
mod compact_test {
    use crate::store::codec::{comp_rec_size, PRD_HDR_SIZE, PRS_HDR_SIZE, PRS_REC_SIZE};
    use crate::store::codec::CompType::{Assembly, Detail, Product};
    use crate::store::comp::DbExt as comp_ext;
    use crate::store::spec::DbExt as spec_ext;
    use crate::store::tree::DbExt as tree_ext;
    use crate::test::testdb;
    use super::DbExt as compact_ext;

    #[test]
    fn drops_deleted_records_and_shrinks_files() {
        let (dir, mut db) = testdb();
        db.add_component("Widget", Product).unwrap();
        db.add_component("Arm", Assembly).unwrap();
        db.add_component("Bolt", Detail).unwrap();
        db.add_spec("Widget", "Arm", 2).unwrap();
        db.add_spec("Arm", "Bolt", 3).unwrap();
        db.delete_spec("Arm", "Bolt").unwrap();
        db.delete_component("Bolt").unwrap();
        db.truncate().unwrap();
        let clen = std::fs::metadata(dir.path().join("db.prd")).unwrap().len();
        let slen = std::fs::metadata(dir.path().join("db.prs")).unwrap().len();
        assert_eq!(clen, (PRD_HDR_SIZE + 2 * comp_rec_size(40)) as u64);
        assert_eq!(slen, (PRS_HDR_SIZE + PRS_REC_SIZE) as u64);
        assert_eq!(
            db.list_components().unwrap(),
            vec![("Arm".to_string(), Assembly), ("Widget".to_string(), Product)]
        );
        assert_eq!(
            db.list_spec("Widget").unwrap(),
            vec![("Arm".to_string(), Assembly, 2)]
        );
        assert!(db.list_spec("Arm").unwrap().is_empty());
    }

    #[test]
    fn listings_and_tree_survive_compaction() {
        let (_dir, mut db) = testdb();
        db.add_component("Widget", Product).unwrap();
        db.add_component("Arm", Assembly).unwrap();
        db.add_component("Bolt", Detail).unwrap();
        db.add_spec("Widget", "Arm", 2).unwrap();
        db.add_spec("Widget", "Bolt", 4).unwrap();
        db.add_spec("Arm", "Bolt", 3).unwrap();
        let comps = db.list_components().unwrap();
        let specs = db.list_spec("Widget").unwrap();
        let tree = db.build_tree("Widget").unwrap();
        db.truncate().unwrap();
        assert_eq!(db.list_components().unwrap(), comps);
        assert_eq!(db.list_spec("Widget").unwrap(), specs);
        assert_eq!(db.build_tree("Widget").unwrap(), tree);
    }

    #[test]
    fn truncate_twice_is_a_no_op() {
        let (dir, mut db) = testdb();
        db.add_component("Widget", Product).unwrap();
        db.add_component("Bolt", Detail).unwrap();
        db.add_spec("Widget", "Bolt", 4).unwrap();
        db.delete_component("Widget").unwrap();
        db.truncate().unwrap();
        let clen = std::fs::metadata(dir.path().join("db.prd")).unwrap().len();
        let slen = std::fs::metadata(dir.path().join("db.prs")).unwrap().len();
        let comps = db.list_components().unwrap();
        db.truncate().unwrap();
        assert_eq!(
            clen,
            std::fs::metadata(dir.path().join("db.prd")).unwrap().len()
        );
        assert_eq!(
            slen,
            std::fs::metadata(dir.path().join("db.prs")).unwrap().len()
        );
        assert_eq!(db.list_components().unwrap(), comps);
    }

    #[test]
    fn empty_database_compacts_to_bare_headers() {
        let (dir, mut db) = testdb();
        db.add_component("Bolt", Detail).unwrap();
        db.delete_component("Bolt").unwrap();
        db.truncate().unwrap();
        let clen = std::fs::metadata(dir.path().join("db.prd")).unwrap().len();
        let slen = std::fs::metadata(dir.path().join("db.prs")).unwrap().len();
        assert_eq!(clen, PRD_HDR_SIZE as u64);
        assert_eq!(slen, PRS_HDR_SIZE as u64);
        assert!(db.list_components().unwrap().is_empty());
        // the freed name is usable again
        db.add_component("Bolt", Detail).unwrap();
        assert_eq!(db.list_components().unwrap().len(), 1);
    }
}
