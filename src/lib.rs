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
use stderrlog::{ColorChoice, Timestamp};

pub mod config;
pub mod store;
pub mod utils;

#[cfg(test)]
mod test;

pub const PS_MAJOR: i32 = 0;
pub const PS_MINOR: i32 = 1;
pub const PS_PATCH: i32 = 0;
// change the version in Cargo.toml TOO!
pub const PS_VERSTR: &str = "0.1.0";

pub use store::codec::{CompType, CRef, SRef};
pub use store::Db;
pub use utils::err::ErrKind;

// stderrlog verbosity: 0=error 1=warn 2=info 3=debug 4=trace, see
// Config::verbosity().
pub fn init_log(verbosity: usize) {
    stderrlog::new()
        .verbosity(verbosity)
        .timestamp(Timestamp::Microsecond)
        .color(ColorChoice::Never)
        .init()
        .unwrap();
}
