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
use super::{name_key, norm, Db, OpenDb};
use crate::psensure;
use crate::store::codec::{CompRec, CompType, CRef, SRef, ACTIVE, DELETED};

pub trait DbExt {
    /// Append a component and splice it into the sorted list. The name must
    /// be unique against every record, deleted ones included: a deleted
    /// record still owns its name until compaction.
    fn add_component(&mut self, name: &str, typ: CompType) -> anyhow::Result<()>;
    /// Logically delete a component together with all specs on its chain.
    /// Fails while any other active component's active spec points at it.
    fn delete_component(&mut self, name: &str) -> anyhow::Result<()>;
    /// Clear the deleted flag on the named component and on every spec in
    /// its chain, then rebuild the sorted list.
    fn restore_one(&mut self, name: &str) -> anyhow::Result<()>;
    /// Clear the deleted flag on every record in both files, then rebuild
    /// the sorted list.
    fn restore_all(&mut self) -> anyhow::Result<()>;
    /// `(name, type)` pairs in sorted-list order.
    fn list_components(&mut self) -> anyhow::Result<Vec<(String, CompType)>>;
}

// The new record is already on disk at rec.off; rewrite it with its final
// next pointer and hook up prev (or the list head).
fn insert_sorted(st: &mut OpenDb, mut rec: CompRec) -> anyhow::Result<()> {
    let key = name_key(&rec.name);
    if st.chead.is_nil() {
        rec.next = CRef::NIL;
        st.put_comp(&rec)?;
        st.chead = rec.off;
        return Ok(());
    }
    let mut prev = CRef::NIL;
    let mut cur = st.chead;
    while !cur.is_nil() {
        let currec = st.comp_at(cur)?;
        if key < name_key(&currec.name) {
            break;
        }
        prev = cur;
        cur = currec.next;
    }
    rec.next = cur;
    st.put_comp(&rec)?;
    if prev.is_nil() {
        st.chead = rec.off;
    } else {
        let mut prevrec = st.comp_at(prev)?;
        prevrec.next = rec.off;
        st.put_comp(&prevrec)?;
    }
    return Ok(());
}

/// Rewrite the sorted list from scratch out of a physical scan. Restores
/// go through here because a restored record's old next pointer is stale.
pub(crate) fn rebuild_sorted(st: &mut OpenDb) -> anyhow::Result<()> {
    let mut active: Vec<CompRec> = st
        .scan_comps()?
        .into_iter()
        .filter(|r| r.is_active())
        .collect();
    active.sort_by_key(|r| name_key(&r.name));
    for i in 0..active.len() {
        active[i].next = if i + 1 == active.len() {
            CRef::NIL
        } else {
            active[i + 1].off
        };
        st.put_comp(&active[i])?;
    }
    st.chead = active.first().map(|r| r.off).unwrap_or(CRef::NIL);
    st.write_cheader()?;
    return Ok(());
}

impl DbExt for Db {
    fn add_component(&mut self, name: &str, typ: CompType) -> anyhow::Result<()> {
        let st = self.state()?;
        let name = norm(name);
        psensure!(!name.is_empty(), InvalidArgument, "empty component name");
        psensure!(
            st.find_any(name)?.is_none(),
            Duplicate,
            "duplicate component name. name={}",
            name
        );
        let rec = CompRec {
            off: CRef::new(st.cfree),
            deleted: ACTIVE,
            first_spec: SRef::NIL,
            next: CRef::NIL,
            typ,
            name: name.to_string(),
        };
        st.put_comp(&rec)?;
        log::debug!("add component. off={} name={} typ={}", rec.off, rec.name, typ);
        insert_sorted(st, rec)?;
        st.cfree += st.comp_rec_size();
        st.write_cheader()?;
        return Ok(());
    }

    fn delete_component(&mut self, name: &str) -> anyhow::Result<()> {
        let st = self.state()?;
        let mut comp = match st.find_active(name)? {
            Some(c) => c,
            None => crate::psbail!(NotFound, "component not found. name={}", norm(name)),
        };
        // Reference check first: the delete must not commit while another
        // active component's active spec still points here.
        for other in st.scan_comps()? {
            if !other.is_active() || other.off == comp.off {
                continue;
            }
            let mut ptr = other.first_spec;
            while !ptr.is_nil() {
                let sr = st.spec_at(ptr)?;
                psensure!(
                    !(sr.is_active() && sr.comp == comp.off),
                    ReferenceIntegrity,
                    "component is referenced by the specification of {}. name={}",
                    other.name,
                    comp.name
                );
                ptr = sr.next;
            }
        }
        comp.deleted = DELETED;
        st.put_comp(&comp)?;
        // Cascade over the whole chain; specs deleted earlier stay deleted.
        let mut ptr = comp.first_spec;
        while !ptr.is_nil() {
            let mut sr = st.spec_at(ptr)?;
            sr.deleted = DELETED;
            st.put_spec(&sr)?;
            ptr = sr.next;
        }
        log::debug!("delete component. off={} name={}", comp.off, comp.name);
        return Ok(());
    }

    fn restore_one(&mut self, name: &str) -> anyhow::Result<()> {
        let st = self.state()?;
        let mut comp = match st.find_any(name)? {
            Some(c) => c,
            None => crate::psbail!(NotFound, "component not found. name={}", norm(name)),
        };
        comp.deleted = ACTIVE;
        st.put_comp(&comp)?;
        let mut ptr = comp.first_spec;
        while !ptr.is_nil() {
            let mut sr = st.spec_at(ptr)?;
            sr.deleted = ACTIVE;
            st.put_spec(&sr)?;
            ptr = sr.next;
        }
        log::debug!("restore component. off={} name={}", comp.off, comp.name);
        return rebuild_sorted(st);
    }

    fn restore_all(&mut self) -> anyhow::Result<()> {
        let st = self.state()?;
        for mut c in st.scan_comps()? {
            if c.deleted != ACTIVE {
                c.deleted = ACTIVE;
                st.put_comp(&c)?;
            }
        }
        for mut s in st.scan_specs()? {
            if s.deleted != ACTIVE {
                s.deleted = ACTIVE;
                st.put_spec(&s)?;
            }
        }
        log::debug!("restore all components");
        return rebuild_sorted(st);
    }

    fn list_components(&mut self) -> anyhow::Result<Vec<(String, CompType)>> {
        let st = self.state()?;
        let out = st
            .iter_logical()?
            .into_iter()
            .map(|r| (r.name, r.typ))
            .collect();
        return Ok(out);
    }
}
