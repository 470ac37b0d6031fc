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
use super::{norm, Db, OpenDb};
use crate::psensure;
use crate::store::codec::{CompRec, CompType, CRef, SpecRec, SRef, ACTIVE, DELETED, MAX_QTY, PRS_REC_SIZE};
use std::collections::HashSet;

pub trait DbExt {
    /// Add the link a→b. An existing active (a, b) spec absorbs the qty
    /// instead of allocating a new record; otherwise the new spec is linked
    /// at the tail of a's chain.
    fn add_spec(&mut self, a: &str, b: &str, qty: i16) -> anyhow::Result<()>;
    /// Mark the first matching active spec on a's chain as deleted.
    fn delete_spec(&mut self, a: &str, b: &str) -> anyhow::Result<()>;
    /// Active children of a's chain with active child components,
    /// `(name, type, qty)` sorted by name.
    fn list_spec(&mut self, a: &str) -> anyhow::Result<Vec<(String, CompType, i16)>>;
}

fn lookup_parent(st: &mut OpenDb, name: &str) -> anyhow::Result<CompRec> {
    let parent = match st.find_active(name)? {
        Some(c) => c,
        None => crate::psbail!(NotFound, "component not found. name={}", norm(name)),
    };
    psensure!(
        parent.typ != CompType::Detail,
        TypeRule,
        "a detail cannot have a specification. name={}",
        parent.name
    );
    Ok(parent)
}

fn lookup_child(st: &mut OpenDb, name: &str) -> anyhow::Result<CompRec> {
    match st.find_active(name)? {
        Some(c) => Ok(c),
        None => crate::psbail!(NotFound, "component not found. name={}", norm(name)),
    }
}

pub(crate) fn list_spec_of(
    st: &mut OpenDb,
    parent: &CompRec,
) -> anyhow::Result<Vec<(String, CompType, i16)>> {
    let mut out = Vec::new();
    let mut ptr = parent.first_spec;
    while !ptr.is_nil() {
        let sr = st.spec_at(ptr)?;
        if sr.is_active() {
            let child = st.comp_at(sr.comp)?;
            if child.is_active() {
                out.push((child.name, child.typ, sr.qty));
            }
        }
        ptr = sr.next;
    }
    out.sort_by_key(|(name, _, _)| name.to_lowercase());
    return Ok(out);
}

// DFS over active specs and active components. The visited set is not
// needed on a well-formed database (the graph is a DAG by induction), but
// it bounds the walk when the on-disk graph is already broken.
fn has_path(st: &mut OpenDb, start: CRef, target: CRef) -> anyhow::Result<bool> {
    let mut stack = vec![start];
    let mut visited: HashSet<CRef> = HashSet::new();
    while let Some(cur) = stack.pop() {
        if cur == target {
            return Ok(true);
        }
        if !visited.insert(cur) {
            continue;
        }
        let currec = st.comp_at(cur)?;
        let mut ptr = currec.first_spec;
        while !ptr.is_nil() {
            let sr = st.spec_at(ptr)?;
            if sr.is_active() {
                let child = st.comp_at(sr.comp)?;
                if child.is_active() {
                    stack.push(child.off);
                }
            }
            ptr = sr.next;
        }
    }
    return Ok(false);
}

fn would_create_cycle(st: &mut OpenDb, parent: CRef, child: CRef) -> anyhow::Result<bool> {
    if parent == child {
        return Ok(true);
    }
    has_path(st, child, parent)
}

impl DbExt for Db {
    fn add_spec(&mut self, a: &str, b: &str, qty: i16) -> anyhow::Result<()> {
        let st = self.state()?;
        let mut parent = lookup_parent(st, a)?;
        let child = lookup_child(st, b)?;
        psensure!(qty >= 1, InvalidArgument, "qty must be in 1..={}. qty={}", MAX_QTY, qty);
        psensure!(
            !would_create_cycle(st, parent.off, child.off)?,
            CycleDetected,
            "cycle detected. parent={} child={}",
            parent.name,
            child.name
        );
        let mut ptr = parent.first_spec;
        while !ptr.is_nil() {
            let mut sr = st.spec_at(ptr)?;
            if sr.is_active() && sr.comp == child.off {
                let total = sr.qty as i32 + qty as i32;
                psensure!(
                    total <= MAX_QTY as i32,
                    InvalidArgument,
                    "qty overflow. existing={} adding={}",
                    sr.qty,
                    qty
                );
                sr.qty = total as i16;
                st.put_spec(&sr)?;
                return Ok(());
            }
            ptr = sr.next;
        }
        let rec = SpecRec {
            off: SRef::new(st.sfree),
            deleted: ACTIVE,
            comp: child.off,
            qty,
            next: SRef::NIL,
        };
        st.put_spec(&rec)?;
        if parent.first_spec.is_nil() {
            parent.first_spec = rec.off;
            st.put_comp(&parent)?;
        } else {
            // tail append, the chain keeps insertion order
            let mut last = parent.first_spec;
            loop {
                let sr = st.spec_at(last)?;
                if sr.next.is_nil() {
                    break;
                }
                last = sr.next;
            }
            let mut tail = st.spec_at(last)?;
            tail.next = rec.off;
            st.put_spec(&tail)?;
        }
        st.sfree += PRS_REC_SIZE;
        st.write_sheader()?;
        return Ok(());
    }

    fn delete_spec(&mut self, a: &str, b: &str) -> anyhow::Result<()> {
        let st = self.state()?;
        let parent = lookup_parent(st, a)?;
        let child = lookup_child(st, b)?;
        let mut ptr = parent.first_spec;
        while !ptr.is_nil() {
            let mut sr = st.spec_at(ptr)?;
            if sr.is_active() && sr.comp == child.off {
                sr.deleted = DELETED;
                st.put_spec(&sr)?;
                return Ok(());
            }
            ptr = sr.next;
        }
        crate::psbail!(
            NotFound,
            "specification not found. parent={} child={}",
            parent.name,
            child.name
        );
    }

    fn list_spec(&mut self, a: &str) -> anyhow::Result<Vec<(String, CompType, i16)>> {
        let st = self.state()?;
        let parent = lookup_parent(st, a)?;
        list_spec_of(st, &parent)
    }
}
