//! File mode notation: octal (`644`, `0755`) or symbolic (`u=rw,go=r`, `+x`, `a-r`).

use declarative::{Error, Result};
use regex::Regex;
use std::sync::LazyLock;

static OCTAL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[0-7]{1,4}$").expect("valid octal mode pattern"));

static CLAUSE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^([ugoa]*)((?:[-+=][rwxXst]*)+)$").expect("valid symbolic mode pattern")
});

static OPERATION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"([-+=])([rwxXst]*)").expect("valid mode operation pattern"));

const WHO_USER: u32 = 0o4700;
const WHO_GROUP: u32 = 0o2070;
const WHO_OTHER: u32 = 0o1007;

/// A parsed mode, resolved against a base mode with [`Mode::apply`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mode {
    Octal(u32),
    Symbolic(Vec<Clause>),
}

/// One comma-separated part of a symbolic mode
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Clause {
    /// Mask of the bits the clause may touch (user, group, other, special)
    who: u32,
    /// Whether `who` was left empty (equivalent to `a`)
    implicit: bool,
    ops: Vec<(char, String)>,
}

impl Mode {
    pub fn parse(spec: &str) -> Result<Self> {
        let spec = spec.trim();
        if OCTAL.is_match(spec) {
            let mode = u32::from_str_radix(spec, 8).map_err(|_| Error::InvalidMode(spec.into()))?;
            return Ok(Self::Octal(mode));
        }

        let clauses = spec
            .split(',')
            .map(|part| parse_clause(part).ok_or_else(|| Error::InvalidMode(spec.to_string())))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self::Symbolic(clauses))
    }

    /// Numeric mode this spec yields on top of `base`
    ///
    /// `is_dir` controls `X`, which adds execute only for directories or
    /// when some execute bit is already set.
    pub fn apply(&self, base: u32, is_dir: bool) -> u32 {
        match self {
            Self::Octal(mode) => *mode,
            Self::Symbolic(clauses) => clauses
                .iter()
                .fold(base & 0o7777, |mode, clause| clause.apply(mode, is_dir)),
        }
    }
}

fn parse_clause(part: &str) -> Option<Clause> {
    let caps = CLAUSE.captures(part)?;
    let who_spec = caps.get(1).map_or("", |m| m.as_str());

    let mut who = 0;
    for c in who_spec.chars() {
        who |= match c {
            'u' => WHO_USER,
            'g' => WHO_GROUP,
            'o' => WHO_OTHER,
            _ => WHO_USER | WHO_GROUP | WHO_OTHER,
        };
    }
    let implicit = who_spec.is_empty();
    if implicit {
        who = WHO_USER | WHO_GROUP | WHO_OTHER;
    }

    let ops = OPERATION
        .captures_iter(caps.get(2)?.as_str())
        .filter_map(|op| {
            let sign = op.get(1)?.as_str().chars().next()?;
            Some((sign, op.get(2).map_or("", |m| m.as_str()).to_string()))
        })
        .collect();

    Some(Clause { who, implicit, ops })
}

impl Clause {
    fn apply(&self, mut mode: u32, is_dir: bool) -> u32 {
        for (sign, perms) in &self.ops {
            let bits = self.bits(perms, mode, is_dir);
            match sign {
                '+' => mode |= bits,
                '-' => mode &= !bits,
                _ => mode = (mode & !self.who) | bits,
            }
        }
        mode
    }

    fn bits(&self, perms: &str, current: u32, is_dir: bool) -> u32 {
        let mut bits = 0;
        for p in perms.chars() {
            bits |= match p {
                'r' => 0o444,
                'w' => 0o222,
                'x' => 0o111,
                'X' if is_dir || current & 0o111 != 0 => 0o111,
                's' => 0o6000,
                't' if self.implicit || self.who & WHO_OTHER == WHO_OTHER => 0o1000,
                _ => 0,
            };
        }
        bits & self.who
    }
}
