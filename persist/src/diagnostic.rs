//! Diagnostics collected during save and load passes.

use std::fmt;

use crate::error::{DeserializeError, SerializeError};

/// One step of the path from a root entity to a member.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    Member(&'static str),
    Index(usize),
    Key,
    Value,
}

/// Location of a member relative to the root of a pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MemberPath {
    segments: Vec<Segment>,
}

impl MemberPath {
    pub fn push(&mut self, segment: Segment) {
        self.segments.push(segment);
    }

    pub fn pop(&mut self) {
        self.segments.pop();
    }

    pub fn is_root(&self) -> bool {
        self.segments.is_empty()
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }
}

impl fmt::Display for MemberPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.segments.is_empty() {
            return f.write_str("<root>");
        }
        for (i, segment) in self.segments.iter().enumerate() {
            match segment {
                Segment::Member(name) if i == 0 => write!(f, "{name}")?,
                Segment::Member(name) => write!(f, ".{name}")?,
                Segment::Index(index) => write!(f, "[{index}]")?,
                Segment::Key => f.write_str(".Key")?,
                Segment::Value => f.write_str(".Value")?,
            }
        }
        Ok(())
    }
}

/// The failure a diagnostic records.
#[derive(Debug, Clone, PartialEq)]
pub enum Problem {
    Save(SerializeError),
    Load(DeserializeError),
}

impl fmt::Display for Problem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Problem::Save(err) => err.fmt(f),
            Problem::Load(err) => err.fmt(f),
        }
    }
}

/// A failure scoped to one member or entity. The pass that produced it
/// carried on with everything else.
#[derive(Debug, Clone, PartialEq)]
pub struct Diagnostic {
    path: String,
    problem: Problem,
}

impl Diagnostic {
    pub(crate) fn new(path: &MemberPath, problem: Problem) -> Self {
        Self {
            path: path.to_string(),
            problem,
        }
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn problem(&self) -> &Problem {
        &self.problem
    }

    pub fn save_error(&self) -> Option<&SerializeError> {
        match &self.problem {
            Problem::Save(err) => Some(err),
            Problem::Load(_) => None,
        }
    }

    pub fn load_error(&self) -> Option<&DeserializeError> {
        match &self.problem {
            Problem::Load(err) => Some(err),
            Problem::Save(_) => None,
        }
    }

    /// Cycles are an expected part of graph traversal; everything else is an
    /// error.
    pub fn level(&self) -> log::Level {
        match self.problem {
            Problem::Save(SerializeError::ReferenceCycle { .. }) => log::Level::Warn,
            _ => log::Level::Error,
        }
    }

    pub(crate) fn emit(&self) {
        log::log!(self.level(), "{self}");
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.path, self.problem)
    }
}

/// Result of a save or load pass together with its diagnostics.
#[derive(Debug, Clone)]
pub struct Outcome<T> {
    pub value: T,
    pub diagnostics: Vec<Diagnostic>,
}

impl<T> Outcome<T> {
    pub fn is_clean(&self) -> bool {
        self.diagnostics.is_empty()
    }

    pub fn into_parts(self) -> (T, Vec<Diagnostic>) {
        (self.value, self.diagnostics)
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Outcome<U> {
        Outcome {
            value: f(self.value),
            diagnostics: self.diagnostics,
        }
    }
}
