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
use clap::{App, Arg};
use prodspec::config::{self, Config};
use prodspec::store::comp::DbExt as comp_ext;
use prodspec::store::compact::DbExt as compact_ext;
use prodspec::store::files::DbExt as files_ext;
use prodspec::store::spec::DbExt as spec_ext;
use prodspec::store::tree::DbExt as tree_ext;
use prodspec::{init_log, psanyhow, psbail, CompType, Db, PS_VERSTR};
use std::io::{self, BufRead, Write};

const HELP_TEXT: &str = "
Available commands:

Create <name> [maxLen]      - create a new database pair
Open <name>                 - open an existing database
Add <name> <type>           - add a component (I, U, D)
Delete <name>               - logically delete a component
Restore <name>              - restore a component
RestoreAll                  - restore all components
SpecAdd <A> <B> [qty]       - add the link A/B with a quantity
SpecDel <A> <B>             - delete the link A/B
Print <name>                - print the product tree
Truncate                    - physically drop deleted records
Help                        - show this list
Exit                        - quit
";

fn arg<'a>(parts: &[&'a str], idx: usize, usage: &str) -> anyhow::Result<&'a str> {
    match parts.get(idx) {
        Some(v) => Ok(v),
        None => psbail!(InvalidArgument, "missing argument. usage: {}", usage),
    }
}

fn parse_type(s: &str) -> anyhow::Result<CompType> {
    let up = s.to_uppercase();
    let mut chars = up.chars();
    if let (Some(c), None) = (chars.next(), chars.next()) {
        if let Some(typ) = CompType::from_letter(c) {
            return Ok(typ);
        }
    }
    psbail!(InvalidArgument, "unknown component type. expected I, U or D. typ={}", s);
}

fn parse_qty(s: &str) -> anyhow::Result<i16> {
    s.parse().map_err(|_| {
        psanyhow!(InvalidArgument, "qty must be a number in 1..=32767. qty={}", s)
    })
}

fn parse_name_len(s: &str) -> anyhow::Result<u16> {
    s.parse().map_err(|_| {
        psanyhow!(InvalidArgument, "maxLen must be a number in 4..=65535. maxLen={}", s)
    })
}

// Returns false when the loop should stop.
fn dispatch(db: &mut Db, cfg: &Config, line: &str) -> anyhow::Result<bool> {
    let parts: Vec<&str> = line.split_whitespace().collect();
    if parts.is_empty() {
        return Ok(true);
    }
    match parts[0].to_lowercase().as_str() {
        "help" => println!("{}", HELP_TEXT),
        "exit" => {
            db.close();
            return Ok(false);
        }
        "create" => {
            let base = arg(&parts, 1, "Create <name> [maxLen]")?;
            let name_len = match parts.get(2) {
                Some(v) => parse_name_len(v)?,
                None => cfg.default_name_len,
            };
            db.create(base, name_len)?;
            println!("Database created.");
        }
        "open" => {
            db.open(arg(&parts, 1, "Open <name>")?)?;
            println!("Database opened.");
        }
        "add" => {
            let name = arg(&parts, 1, "Add <name> <type>")?;
            let typ = parse_type(arg(&parts, 2, "Add <name> <type>")?)?;
            db.add_component(name, typ)?;
            println!("Component added.");
        }
        "delete" => {
            db.delete_component(arg(&parts, 1, "Delete <name>")?)?;
            println!("Component marked as deleted.");
        }
        "restore" => {
            db.restore_one(arg(&parts, 1, "Restore <name>")?)?;
            println!("Component restored.");
        }
        "restoreall" => {
            db.restore_all()?;
            println!("All components restored.");
        }
        "specadd" => {
            let a = arg(&parts, 1, "SpecAdd <A> <B> [qty]")?;
            let b = arg(&parts, 2, "SpecAdd <A> <B> [qty]")?;
            let qty = match parts.get(3) {
                Some(v) => parse_qty(v)?,
                None => 1,
            };
            db.add_spec(a, b, qty)?;
            println!("Specification added.");
        }
        "specdel" => {
            let a = arg(&parts, 1, "SpecDel <A> <B>")?;
            let b = arg(&parts, 2, "SpecDel <A> <B>")?;
            db.delete_spec(a, b)?;
            println!("Specification deleted.");
        }
        "print" => {
            println!("{}", db.build_tree(arg(&parts, 1, "Print <name>")?)?);
        }
        "truncate" => {
            db.truncate()?;
            println!("Files truncated.");
        }
        _ => println!("Unknown command. Type \"Help\"."),
    }
    return Ok(true);
}

fn main() {
    let cmdline = App::new("prodspec")
        .version(PS_VERSTR)
        .about("prodspec is a small on-disk bill-of-materials database")
        .arg(
            Arg::with_name("config")
                .short("c")
                .long("config")
                .takes_value(true)
                .default_value("prodspec.conf")
                .help("path of the config file"),
        )
        .arg(
            Arg::with_name("database")
                .short("d")
                .long("database")
                .takes_value(true)
                .help("database base name to open at startup"),
        )
        .get_matches();
    let cfg = config::load(cmdline.value_of("config").unwrap()).unwrap();
    init_log(cfg.verbosity());

    let mut db = Db::new();
    let startup = cmdline
        .value_of("database")
        .map(str::to_string)
        .or_else(|| cfg.database.clone());
    if let Some(base) = startup {
        match db.open(&base) {
            Ok(()) => println!("Database opened."),
            Err(err) => println!("Error: {}", err),
        }
    }

    println!("prodspec console. Type \"Help\" for commands.");
    let stdin = io::stdin();
    let mut lines = stdin.lock().lines();
    loop {
        print!(">>> ");
        let _ = io::stdout().flush();
        let line = match lines.next() {
            Some(Ok(l)) => l,
            Some(Err(_)) | None => break,
        };
        match dispatch(&mut db, &cfg, &line) {
            Ok(true) => {}
            Ok(false) => break,
            Err(err) => {
                log::error!("command failed. {}", err);
                println!("Error: {}", err);
            }
        }
    }
    db.close();
}
