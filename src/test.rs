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

use crate::store::codec::CompType::{Assembly, Detail, Product};
use crate::store::codec::{comp_rec_size, CompType, PRD_HDR_SIZE, PRS_HDR_SIZE, PRS_REC_SIZE};
use crate::store::comp::DbExt as comp_ext;
use crate::store::compact::DbExt as compact_ext;
use crate::store::files::{self, DbExt as files_ext};
use crate::store::spec::DbExt as spec_ext;
use crate::store::tree::DbExt as tree_ext;
use crate::utils::err::{kind, ErrKind};
use crate::Db;
use byteorder::{LittleEndian, WriteBytesExt};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::fs::OpenOptions;
use std::io::{Seek, SeekFrom};
use std::path::Path;

pub fn testdb() -> (tempfile::TempDir, Db) {
    let dir = tempfile::TempDir::new().unwrap();
    let mut db = Db::new();
    db.create(base(&dir).as_str(), 40).unwrap();
    (dir, db)
}

pub fn base(dir: &tempfile::TempDir) -> String {
    dir.path().join("db").to_str().unwrap().to_string()
}

fn patch_i32(path: &Path, off: u64, val: i32) {
    let mut f = OpenOptions::new().write(true).open(path).unwrap();
    f.seek(SeekFrom::Start(off)).unwrap();
    f.write_i32::<LittleEndian>(val).unwrap();
}

#[test]
fn scenario_create_add_list() {
    let (_dir, mut db) = testdb();
    db.add_component("Widget", Product).unwrap();
    db.add_component("Bolt", Detail).unwrap();
    db.add_component("Arm", Assembly).unwrap();
    assert_eq!(
        db.list_components().unwrap(),
        vec![
            ("Arm".to_string(), Assembly),
            ("Bolt".to_string(), Detail),
            ("Widget".to_string(), Product),
        ]
    );
}

#[test]
fn scenario_spec_and_tree() {
    let (_dir, mut db) = testdb();
    db.add_component("Widget", Product).unwrap();
    db.add_component("Arm", Assembly).unwrap();
    db.add_component("Bolt", Detail).unwrap();
    db.add_spec("Widget", "Arm", 2).unwrap();
    db.add_spec("Widget", "Bolt", 4).unwrap();
    db.add_spec("Arm", "Bolt", 3).unwrap();
    assert_eq!(
        db.build_tree("Widget").unwrap(),
        "Widget\n├─ Arm x2\n│  └─ Bolt x3\n└─ Bolt x4"
    );
}

#[test]
fn scenario_cycle_rejected_without_side_effects() {
    let (dir, mut db) = testdb();
    db.add_component("Widget", Product).unwrap();
    db.add_component("Arm", Assembly).unwrap();
    db.add_spec("Widget", "Arm", 1).unwrap();
    let slen = std::fs::metadata(dir.path().join("db.prs")).unwrap().len();
    let err = db.add_spec("Arm", "Widget", 1).unwrap_err();
    assert_eq!(kind(&err), Some(ErrKind::CycleDetected));
    assert_eq!(
        slen,
        std::fs::metadata(dir.path().join("db.prs")).unwrap().len()
    );
    assert!(db.list_spec("Arm").unwrap().is_empty());
}

#[test]
fn scenario_referential_delete_restore() {
    let (_dir, mut db) = testdb();
    db.add_component("Widget", Product).unwrap();
    db.add_component("Arm", Assembly).unwrap();
    db.add_spec("Widget", "Arm", 1).unwrap();
    let err = db.delete_component("Arm").unwrap_err();
    assert_eq!(kind(&err), Some(ErrKind::ReferenceIntegrity));
    db.delete_component("Widget").unwrap();
    assert_eq!(
        db.list_components().unwrap(),
        vec![("Arm".to_string(), Assembly)]
    );
    let err = db.list_spec("Widget").unwrap_err();
    assert_eq!(kind(&err), Some(ErrKind::NotFound));
    db.restore_one("Widget").unwrap();
    assert_eq!(
        db.list_spec("Widget").unwrap(),
        vec![("Arm".to_string(), Assembly, 1)]
    );
}

#[test]
fn scenario_compaction_shrinks_by_one_record() {
    let (dir, mut db) = testdb();
    db.add_component("Widget", Product).unwrap();
    db.add_component("Arm", Assembly).unwrap();
    db.add_component("Bolt", Detail).unwrap();
    db.add_spec("Widget", "Arm", 2).unwrap();
    let clen = std::fs::metadata(dir.path().join("db.prd")).unwrap().len();
    db.delete_component("Bolt").unwrap();
    db.truncate().unwrap();
    assert_eq!(
        clen - comp_rec_size(40) as u64,
        std::fs::metadata(dir.path().join("db.prd")).unwrap().len()
    );
    assert_eq!(
        db.list_components().unwrap(),
        vec![("Arm".to_string(), Assembly), ("Widget".to_string(), Product)]
    );
    assert_eq!(
        db.list_spec("Widget").unwrap(),
        vec![("Arm".to_string(), Assembly, 2)]
    );
}

#[test]
fn reopen_round_trip_of_random_database() {
    let mut rng = StdRng::seed_from_u64(20181218);
    let (dir, mut db) = testdb();
    let types = [Product, Assembly, Detail];
    let mut names: Vec<(String, CompType)> = Vec::new();
    for i in 0..24 {
        let name = format!("part{:02}n{}", i, rng.gen_range(0..1000));
        let typ = types[rng.gen_range(0..3)];
        db.add_component(&name, typ).unwrap();
        names.push((name, typ));
    }
    // edges only point forward, the graph stays a DAG by construction
    for i in 0..names.len() {
        if names[i].1 == Detail {
            continue;
        }
        for j in (i + 1)..names.len() {
            if rng.gen_range(0..10) < 3 {
                let qty = rng.gen_range(1..6);
                db.add_spec(&names[i].0, &names[j].0, qty).unwrap();
            }
        }
    }
    let comps = db.list_components().unwrap();
    let mut specs = Vec::new();
    for (name, typ) in &names {
        if *typ != Detail {
            specs.push((name.clone(), db.list_spec(name).unwrap()));
        }
    }
    db.close();

    let mut db = Db::new();
    db.open(base(&dir).as_str()).unwrap();
    assert_eq!(db.list_components().unwrap(), comps);
    for (name, expected) in &specs {
        assert_eq!(&db.list_spec(name).unwrap(), expected);
    }

    // compaction preserves the same observable listings
    db.truncate().unwrap();
    assert_eq!(db.list_components().unwrap(), comps);
    for (name, expected) in &specs {
        assert_eq!(&db.list_spec(name).unwrap(), expected);
    }
}

#[test]
fn random_add_delete_restore_matches_model() {
    let mut rng = StdRng::seed_from_u64(7);
    let (_dir, mut db) = testdb();
    let mut model: Vec<(String, CompType, bool)> = Vec::new();
    for step in 0..200 {
        match rng.gen_range(0..4) {
            0 | 1 => {
                let name = format!("item{:03}", model.len());
                let typ = [Product, Assembly, Detail][rng.gen_range(0..3)];
                db.add_component(&name, typ).unwrap();
                model.push((name, typ, true));
            }
            2 => {
                if model.is_empty() {
                    continue;
                }
                let idx = rng.gen_range(0..model.len());
                if model[idx].2 {
                    db.delete_component(&model[idx].0).unwrap();
                    model[idx].2 = false;
                } else {
                    let err = db.delete_component(&model[idx].0).unwrap_err();
                    assert_eq!(kind(&err), Some(ErrKind::NotFound));
                }
            }
            _ => {
                if model.is_empty() {
                    continue;
                }
                let idx = rng.gen_range(0..model.len());
                db.restore_one(&model[idx].0).unwrap();
                model[idx].2 = true;
            }
        }
        if step % 25 == 0 {
            let mut expected: Vec<(String, CompType)> = model
                .iter()
                .filter(|(_, _, active)| *active)
                .map(|(n, t, _)| (n.clone(), *t))
                .collect();
            expected.sort_by_key(|(n, _)| n.to_lowercase());
            assert_eq!(db.list_components().unwrap(), expected);
        }
    }
}

#[test]
fn long_names_truncate_without_corrupting_neighbors() {
    let (_dir, mut db) = testdb();
    let long = "x".repeat(50);
    db.add_component(&long, Detail).unwrap();
    db.add_component("Widget", Product).unwrap();
    let got = db.list_components().unwrap();
    assert_eq!(got.len(), 2);
    assert_eq!(got[0], ("Widget".to_string(), Product));
    // 40-byte field minus the "D:" prefix
    assert_eq!(got[1], ("x".repeat(38), Detail));
}

#[test]
fn exact_fit_name_round_trips() {
    let dir = tempfile::TempDir::new().unwrap();
    let b = dir.path().join("db8").to_str().unwrap().to_string();
    let mut db = Db::new();
    db.create(&b, 8).unwrap();
    db.add_component("abcdef", Product).unwrap();
    db.close();
    db.open(&b).unwrap();
    assert_eq!(
        db.list_components().unwrap(),
        vec![("abcdef".to_string(), Product)]
    );
}

#[test]
fn signature_probe() {
    let (dir, mut db) = testdb();
    db.close();
    assert!(files::valid_signature(dir.path().join("db.prd")));
    assert!(!files::valid_signature(dir.path().join("db.prs")));
    assert!(!files::valid_signature(dir.path().join("absent.prd")));
}

#[test]
fn corrupted_sorted_list_cycle_is_reported() {
    let (dir, mut db) = testdb();
    db.add_component("aa", Detail).unwrap();
    db.add_component("bb", Detail).unwrap();
    db.close();
    // second record's next pointer back to the first
    let second = (PRD_HDR_SIZE + comp_rec_size(40)) as u64;
    patch_i32(&dir.path().join("db.prd"), second + 5, PRD_HDR_SIZE);
    db.open(base(&dir).as_str()).unwrap();
    let err = db.list_components().unwrap_err();
    assert_eq!(kind(&err), Some(ErrKind::Corruption));
}

#[test]
fn dangling_spec_ref_is_reported() {
    let (dir, mut db) = testdb();
    db.add_component("Widget", Product).unwrap();
    db.add_component("Bolt", Detail).unwrap();
    db.add_spec("Widget", "Bolt", 1).unwrap();
    db.close();
    // first spec's comp_off far past the component file's free offset
    patch_i32(&dir.path().join("db.prs"), PRS_HDR_SIZE as u64 + 1, 9999);
    db.open(base(&dir).as_str()).unwrap();
    let err = db.list_spec("Widget").unwrap_err();
    assert_eq!(kind(&err), Some(ErrKind::Corruption));
}

#[test]
fn tree_walk_is_bounded_on_a_corrupt_graph() {
    let (dir, mut db) = testdb();
    db.add_component("Prod", Product).unwrap();
    db.add_component("Quill", Assembly).unwrap();
    db.add_component("Rod", Detail).unwrap();
    db.add_spec("Prod", "Quill", 1).unwrap();
    db.add_spec("Quill", "Rod", 1).unwrap();
    db.close();
    // point Quill's spec back at Prod, forming a loop the engine forbids
    let second_spec = (PRS_HDR_SIZE + PRS_REC_SIZE) as u64;
    patch_i32(&dir.path().join("db.prs"), second_spec + 1, PRD_HDR_SIZE);
    db.open(base(&dir).as_str()).unwrap();
    assert_eq!(
        db.build_tree("Prod").unwrap(),
        "Prod\n└─ Quill\n   └─ Prod\n      └─ [cycle detected]"
    );
}

#[test]
fn closed_db_reports_not_open() {
    let (_dir, mut db) = testdb();
    db.close();
    let err = db.list_components().unwrap_err();
    assert_eq!(kind(&err), Some(ErrKind::NotOpen));
    let err = db.truncate().unwrap_err();
    assert_eq!(kind(&err), Some(ErrKind::NotOpen));
    let err = db.build_tree("Widget").unwrap_err();
    assert_eq!(kind(&err), Some(ErrKind::NotOpen));
}
