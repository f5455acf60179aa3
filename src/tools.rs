//! Tool-specific extraction of candidate paths.
//!
//! Each gated tool names its target differently. This module turns a raw
//! `tool_input` object into the list of strings that must be checked, tagged
//! with where they came from. Tools outside the closed [`ToolKind`] set yield
//! nothing and are allowed through untouched.

use crate::rules::RULES;
use serde_json::{Map, Value};
use smallvec::SmallVec;

/// Tools this guard knows how to inspect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ToolKind {
    Read,
    Write,
    Edit,
    Grep,
    NotebookEdit,
    /// Anything else: not gated.
    Other,
}

impl ToolKind {
    /// Map a host tool name onto a kind. Names are case-sensitive.
    #[must_use]
    pub fn from_name(name: &str) -> Self {
        match name {
            "Read" => Self::Read,
            "Write" => Self::Write,
            "Edit" => Self::Edit,
            "Grep" => Self::Grep,
            "NotebookEdit" => Self::NotebookEdit,
            _ => Self::Other,
        }
    }

    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Read => "Read",
            Self::Write => "Write",
            Self::Edit => "Edit",
            Self::Grep => "Grep",
            Self::NotebookEdit => "NotebookEdit",
            Self::Other => "Other",
        }
    }

    /// Whether requests for this tool are inspected at all.
    #[must_use]
    pub const fn is_gated(&self) -> bool {
        !matches!(self, Self::Other)
    }
}

/// Which parameter a candidate was taken from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CandidateOrigin {
    FilePath,
    Path,
    Glob,
    NotebookPath,
}

impl CandidateOrigin {
    /// The `tool_input` key this origin corresponds to.
    #[must_use]
    pub const fn param(&self) -> &'static str {
        match self {
            Self::FilePath => "file_path",
            Self::Path => "path",
            Self::Glob => "glob",
            Self::NotebookPath => "notebook_path",
        }
    }
}

/// One string to classify.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CandidatePath {
    pub path: String,
    pub origin: CandidateOrigin,
    /// Subject to the sensitive-directory tier.
    pub directory: bool,
}

impl CandidatePath {
    fn new(path: impl Into<String>, origin: CandidateOrigin) -> Self {
        Self {
            path: path.into(),
            origin,
            directory: false,
        }
    }

    /// Globs are pattern text and never resolved on disk.
    #[must_use]
    pub const fn is_glob(&self) -> bool {
        matches!(self.origin, CandidateOrigin::Glob)
    }
}

/// Candidates for one request; at most two in practice.
pub type Candidates = SmallVec<[CandidatePath; 2]>;

/// A parsed tool request.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolInvocation {
    /// Name exactly as the host sent it.
    pub tool_name: String,
    pub kind: ToolKind,
    /// Parameters; a non-object `tool_input` becomes an empty map.
    pub tool_input: Map<String, Value>,
}

impl ToolInvocation {
    #[must_use]
    pub fn new(tool_name: impl Into<String>, tool_input: Option<Value>) -> Self {
        let tool_name = tool_name.into();
        let kind = ToolKind::from_name(&tool_name);
        let tool_input = match tool_input {
            Some(Value::Object(map)) => map,
            _ => Map::new(),
        };
        Self {
            tool_name,
            kind,
            tool_input,
        }
    }

    /// A non-empty string parameter. Anything else counts as absent.
    #[must_use]
    pub fn str_param(&self, key: &str) -> Option<&str> {
        self.tool_input
            .get(key)
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
    }

    /// The paths this request would touch.
    #[must_use]
    pub fn candidates(&self) -> Candidates {
        extract(self)
    }
}

/// Extract candidate paths from `invocation`.
///
/// - `Read`/`Write`/`Edit`: `file_path`
/// - `NotebookEdit`: `notebook_path`
/// - `Grep`: `path` (directory-checked, `.` when absent but a glob is given)
///   and `glob` when it hits a sensitivity heuristic
#[must_use]
pub fn extract(invocation: &ToolInvocation) -> Candidates {
    let mut out = Candidates::new();

    match invocation.kind {
        ToolKind::Read | ToolKind::Write | ToolKind::Edit => {
            if let Some(path) = invocation.str_param("file_path") {
                out.push(CandidatePath::new(path, CandidateOrigin::FilePath));
            }
        }
        ToolKind::NotebookEdit => {
            if let Some(path) = invocation.str_param("notebook_path") {
                out.push(CandidatePath::new(path, CandidateOrigin::NotebookPath));
            }
        }
        ToolKind::Grep => {
            let glob = invocation.str_param("glob");
            let path = invocation
                .str_param("path")
                .or_else(|| glob.map(|_| "."));

            if let Some(path) = path {
                let mut candidate = CandidatePath::new(path, CandidateOrigin::Path);
                candidate.directory = true;
                out.push(candidate);
            }
            if let Some(glob) = glob {
                if RULES.glob_heuristic_hit(glob).is_some() {
                    out.push(CandidatePath::new(glob, CandidateOrigin::Glob));
                }
            }
        }
        ToolKind::Other => {}
    }

    out
}
