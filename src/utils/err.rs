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

/// The conditions callers can react to. Everything else that can go wrong
/// (raw io errors and the like) reaches the caller without a kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrKind {
    NotOpen,
    NotFound,
    FormatError,
    InvalidArgument,
    Duplicate,
    TypeRule,
    ReferenceIntegrity,
    CycleDetected,
    Corruption,
}

#[derive(Debug)]
pub struct ErrCtx {
    pub kind: ErrKind,
    pub msg: String,
}

// kind() already exposes `kind`, so there is no need to output it here.
impl std::fmt::Display for ErrCtx {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.msg)
    }
}

pub fn kind(err: &anyhow::Error) -> Option<ErrKind> {
    err.downcast_ref::<ErrCtx>().map(|errctx| errctx.kind)
}

#[macro_export]
macro_rules! errctx {
    ($kind:ident, $msg:literal $(,)?) => {
        $crate::utils::err::ErrCtx {
            kind: $crate::utils::err::ErrKind::$kind,
            msg: $msg.to_string(),
        }
    };
    ($kind:ident, $fmt:expr, $($arg:tt)*) => {
        $crate::utils::err::ErrCtx {
            kind: $crate::utils::err::ErrKind::$kind,
            msg: format!($fmt, $($arg)*),
        }
    };
}

#[macro_export]
macro_rules! psanyhow {
    ($kind:ident, $msg:literal $(,)?) => {
        anyhow::anyhow!("").context($crate::errctx!($kind, $msg))
    };
    ($kind:ident, $fmt:expr, $($arg:tt)*) => {
        anyhow::anyhow!("").context($crate::errctx!($kind, $fmt, $($arg)*))
    };
}

#[macro_export]
macro_rules! psbail {
    ($kind:ident, $msg:literal $(,)?) => {
        return Err($crate::psanyhow!($kind, $msg))
    };
    ($kind:ident, $fmt:expr, $($arg:tt)*) => {
        return Err($crate::psanyhow!($kind, $fmt, $($arg)*))
    };
}

#[macro_export]
macro_rules! psensure {
    ($cond:expr, $kind:ident, $msg:literal $(,)?) => {
        if !$cond {
            return Err($crate::psanyhow!($kind, $msg));
        }
    };
    ($cond:expr, $kind:ident, $fmt:expr, $($arg:tt)*) => {
        if !$cond {
            return Err($crate::psanyhow!($kind, $fmt, $($arg)*));
        }
    };
}
