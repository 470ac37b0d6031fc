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
use crate::store::codec::{CompRec, CompType, CRef};
use crate::store::spec::list_spec_of;
use std::collections::HashSet;

pub trait DbExt {
    /// Render the transitive specification of `name` as a text tree. The
    /// first line is the root name; children are sorted, carry ` xN` when
    /// qty differs from 1, and non-Detail children recurse.
    fn build_tree(&mut self, name: &str) -> anyhow::Result<String>;
}

impl DbExt for Db {
    fn build_tree(&mut self, name: &str) -> anyhow::Result<String> {
        let st = self.state()?;
        let root = match st.find_active(name)? {
            Some(c) => c,
            None => crate::psbail!(NotFound, "component not found. name={}", super::norm(name)),
        };
        psensure!(
            root.typ != CompType::Detail,
            TypeRule,
            "a detail has no specification tree. name={}",
            root.name
        );
        let mut out = vec![root.name.clone()];
        let mut stack: HashSet<CRef> = HashSet::new();
        tree_dfs(st, &root, "", &mut stack, &mut out)?;
        return Ok(out.join("\n"));
    }
}

// Cycles cannot be created through the engine; the ancestor check keeps the
// walk bounded when the on-disk graph is broken anyway.
fn tree_dfs(
    st: &mut OpenDb,
    node: &CompRec,
    prefix: &str,
    stack: &mut HashSet<CRef>,
    out: &mut Vec<String>,
) -> anyhow::Result<()> {
    if stack.contains(&node.off) {
        out.push(format!("{}└─ [cycle detected]", prefix));
        return Ok(());
    }
    stack.insert(node.off);
    let items = list_spec_of(st, node)?;
    for (i, (child_name, child_typ, qty)) in items.iter().enumerate() {
        let last = i + 1 == items.len();
        let branch = if last { "└─ " } else { "├─ " };
        let suffix = if *qty != 1 {
            format!(" x{}", qty)
        } else {
            String::new()
        };
        out.push(format!("{}{}{}{}", prefix, branch, child_name, suffix));
        if *child_typ != CompType::Detail {
            if let Some(child) = st.find_active(child_name)? {
                let cont = format!("{}{}", prefix, if last { "   " } else { "│  " });
                tree_dfs(st, &child, &cont, stack, out)?;
            }
        }
    }
    stack.remove(&node.off);
    return Ok(());
}

#[cfg(test)]
mod tree_test {
    use super::CompType::{Assembly, Detail, Product};
    use super::*;
    use crate::store::comp::DbExt as comp_ext;
    use crate::store::spec::DbExt as spec_ext;
    use crate::test::testdb;
    use crate::utils::err::{kind, ErrKind};

    #[test]
    fn renders_branches_and_quantities() {
        let (_dir, mut db) = testdb();
        db.add_component("Widget", Product).unwrap();
        db.add_component("Arm", Assembly).unwrap();
        db.add_component("Bolt", Detail).unwrap();
        db.add_spec("Widget", "Arm", 2).unwrap();
        db.add_spec("Widget", "Bolt", 4).unwrap();
        db.add_spec("Arm", "Bolt", 3).unwrap();
        let tree = db.build_tree("Widget").unwrap();
        assert_eq!(
            tree,
            "Widget\n├─ Arm x2\n│  └─ Bolt x3\n└─ Bolt x4"
        );
    }

    #[test]
    fn qty_one_has_no_suffix() {
        let (_dir, mut db) = testdb();
        db.add_component("Widget", Product).unwrap();
        db.add_component("Bolt", Detail).unwrap();
        db.add_spec("Widget", "Bolt", 1).unwrap();
        assert_eq!(db.build_tree("Widget").unwrap(), "Widget\n└─ Bolt");
    }

    #[test]
    fn empty_assembly_is_just_the_root() {
        let (_dir, mut db) = testdb();
        db.add_component("Widget", Product).unwrap();
        assert_eq!(db.build_tree("Widget").unwrap(), "Widget");
    }

    #[test]
    fn detail_root_is_rejected() {
        let (_dir, mut db) = testdb();
        db.add_component("Bolt", Detail).unwrap();
        let err = db.build_tree("Bolt").unwrap_err();
        assert_eq!(kind(&err), Some(ErrKind::TypeRule));
        let err = db.build_tree("Ghost").unwrap_err();
        assert_eq!(kind(&err), Some(ErrKind::NotFound));
    }
}
