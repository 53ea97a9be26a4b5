//! Generic remote operations.
//!
//! Every endpoint of the store API is described once as an [`Endpoint`]
//! (method, path template, JSON body fields). An [`OperationCall`] pairs an
//! [`Operation`] with string arguments and renders into a request that
//! [`HttpStoreClient::invoke`](crate::HttpStoreClient::invoke) sends. This
//! replaces one hand-written wrapper per endpoint.
//!
//! Argument routing:
//! - `{name}` placeholders in the path template are filled from the argument
//!   of the same name (required)
//! - arguments named by a body field go into the JSON body, typed by the
//!   field's [`FieldKind`]
//! - every other argument becomes a query parameter

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;

use bytes::Bytes;
use reqwest::Method;
use serde_json::{Map, Value};

use crate::error::{ClientError, ClientResult};

/// HTTP verbs used by the store API.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Delete,
    Head,
}

impl HttpMethod {
    pub fn as_method(self) -> Method {
        match self {
            Self::Get => Method::GET,
            Self::Post => Method::POST,
            Self::Put => Method::PUT,
            Self::Delete => Method::DELETE,
            Self::Head => Method::HEAD,
        }
    }
}

/// How a body argument is encoded into JSON.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FieldKind {
    Text,
    Integer,
    /// The argument is itself a JSON document (object, array...).
    Json,
}

/// A JSON body field of an endpoint.
#[derive(Clone, Copy, Debug)]
pub struct BodyField {
    pub name: &'static str,
    pub kind: FieldKind,
    pub required: bool,
}

// Struct literals rather than `const fn` calls so the field tables are
// promoted to `'static`.
macro_rules! text {
    ($name:literal) => {
        BodyField { name: $name, kind: FieldKind::Text, required: true }
    };
}

macro_rules! opt_text {
    ($name:literal) => {
        BodyField { name: $name, kind: FieldKind::Text, required: false }
    };
}

macro_rules! integer {
    ($name:literal, $required:literal) => {
        BodyField { name: $name, kind: FieldKind::Integer, required: $required }
    };
}

macro_rules! json_field {
    ($name:literal, $required:literal) => {
        BodyField { name: $name, kind: FieldKind::Json, required: $required }
    };
}

/// Static description of one API endpoint.
#[derive(Clone, Copy, Debug)]
pub struct Endpoint {
    pub method: HttpMethod,
    /// Path relative to the API base, with `{arg}` placeholders.
    pub path: &'static str,
    pub body: &'static [BodyField],
}

const fn endpoint(method: HttpMethod, path: &'static str, body: &'static [BodyField]) -> Endpoint {
    Endpoint { method, path, body }
}

macro_rules! operations {
    ($($variant:ident => $name:literal),+ $(,)?) => {
        /// Remote operations of the store API, addressable by name.
        #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub enum Operation {
            $($variant),+
        }

        impl Operation {
            /// Every operation, in declaration order.
            pub const ALL: &'static [Operation] = &[$(Operation::$variant),+];

            /// Kebab-case operation name, e.g. `"get-branch"`.
            pub fn name(self) -> &'static str {
                match self {
                    $(Operation::$variant => $name),+
                }
            }
        }

        impl FromStr for Operation {
            type Err = ClientError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($name => Ok(Operation::$variant),)+
                    other => Err(ClientError::InvalidRequest(format!("unknown operation: {other}"))),
                }
            }
        }
    };
}

operations! {
    ListBranches => "list-branches",
    CreateBranch => "create-branch",
    GetBranch => "get-branch",
    DeleteBranch => "delete-branch",
    DiffBranch => "diff-branch",
    ResetBranch => "reset-branch",
    RevertBranch => "revert-branch",
    CherryPick => "cherry-pick",
    Commit => "commit",
    GetCommit => "get-commit",
    LogBranchCommits => "log-branch-commits",
    LogCommits => "log-commits",
    DiffRefs => "diff-refs",
    FindMergeBase => "find-merge-base",
    MergeIntoBranch => "merge-into-branch",
    DumpRefs => "dump-refs",
    RestoreRefs => "restore-refs",
    CopyObject => "copy-object",
    DeleteObject => "delete-object",
    DeleteObjects => "delete-objects",
    GetObject => "get-object",
    HeadObject => "head-object",
    StatObject => "stat-object",
    ListObjects => "list-objects",
    GetUnderlyingProperties => "get-underlying-properties",
    StageObject => "stage-object",
}

impl Operation {
    /// The endpoint this operation calls.
    pub fn endpoint(self) -> Endpoint {
        use HttpMethod::*;

        const BRANCH: &str = "repositories/{repository}/branches/{branch}";
        match self {
            Self::ListBranches => endpoint(Get, "repositories/{repository}/branches", &[]),
            Self::CreateBranch => endpoint(
                Post,
                "repositories/{repository}/branches",
                &[text!("name"), text!("source")],
            ),
            Self::GetBranch => endpoint(Get, BRANCH, &[]),
            Self::DeleteBranch => endpoint(Delete, BRANCH, &[]),
            Self::DiffBranch => endpoint(Get, "repositories/{repository}/branches/{branch}/diff", &[]),
            Self::ResetBranch => endpoint(Put, BRANCH, &[text!("type"), opt_text!("path")]),
            Self::RevertBranch => endpoint(
                Post,
                "repositories/{repository}/branches/{branch}/revert",
                &[text!("ref"), integer!("parent_number", false)],
            ),
            Self::CherryPick => endpoint(
                Post,
                "repositories/{repository}/branches/{branch}/cherry-pick",
                &[text!("ref"), integer!("parent_number", false)],
            ),
            Self::Commit => endpoint(
                Post,
                "repositories/{repository}/branches/{branch}/commits",
                &[text!("message"), json_field!("metadata", false), integer!("date", false)],
            ),
            Self::GetCommit => endpoint(Get, "repositories/{repository}/commits/{commit_id}", &[]),
            Self::LogBranchCommits => {
                endpoint(Get, "repositories/{repository}/branches/{branch}/commits", &[])
            }
            Self::LogCommits => endpoint(Get, "repositories/{repository}/refs/{ref}/commits", &[]),
            Self::DiffRefs => endpoint(
                Get,
                "repositories/{repository}/refs/{left_ref}/diff/{right_ref}",
                &[],
            ),
            Self::FindMergeBase => endpoint(
                Get,
                "repositories/{repository}/refs/{source_ref}/merge/{destination_branch}",
                &[],
            ),
            Self::MergeIntoBranch => endpoint(
                Post,
                "repositories/{repository}/refs/{source_ref}/merge/{destination_branch}",
                &[opt_text!("message"), json_field!("metadata", false), opt_text!("strategy")],
            ),
            Self::DumpRefs => endpoint(Put, "repositories/{repository}/refs/dump", &[]),
            Self::RestoreRefs => endpoint(
                Put,
                "repositories/{repository}/refs/restore",
                &[
                    text!("commits_meta_range_id"),
                    text!("tags_meta_range_id"),
                    text!("branches_meta_range_id"),
                ],
            ),
            Self::CopyObject => endpoint(
                Post,
                "repositories/{repository}/branches/{branch}/objects/copy",
                &[text!("src_path"), opt_text!("src_ref")],
            ),
            Self::DeleteObject => {
                endpoint(Delete, "repositories/{repository}/branches/{branch}/objects", &[])
            }
            Self::DeleteObjects => endpoint(
                Post,
                "repositories/{repository}/branches/{branch}/objects/delete",
                &[json_field!("paths", true)],
            ),
            Self::GetObject => endpoint(Get, "repositories/{repository}/refs/{ref}/objects", &[]),
            Self::HeadObject => endpoint(Head, "repositories/{repository}/refs/{ref}/objects", &[]),
            Self::StatObject => {
                endpoint(Get, "repositories/{repository}/refs/{ref}/objects/stat", &[])
            }
            Self::ListObjects => endpoint(Get, "repositories/{repository}/refs/{ref}/objects/ls", &[]),
            Self::GetUnderlyingProperties => endpoint(
                Get,
                "repositories/{repository}/refs/{ref}/objects/underlyingProperties",
                &[],
            ),
            Self::StageObject => endpoint(
                Put,
                "repositories/{repository}/branches/{branch}/objects",
                &[text!("physical_address"), text!("checksum"), integer!("size_bytes", true)],
            ),
        }
    }

    /// Names of the path placeholders, in template order.
    pub fn path_params(self) -> Vec<&'static str> {
        self.endpoint()
            .path
            .split('/')
            .filter_map(|piece| piece.strip_prefix('{')?.strip_suffix('}'))
            .collect()
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// An operation together with its arguments.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OperationCall {
    pub operation: Operation,
    pub args: BTreeMap<String, String>,
}

/// A fully rendered request, ready to send.
#[derive(Clone, Debug, PartialEq)]
pub struct RenderedRequest {
    pub method: HttpMethod,
    /// Unencoded path segments, appended to the API base URL.
    pub segments: Vec<String>,
    pub query: Vec<(String, String)>,
    pub body: Option<Value>,
}

impl OperationCall {
    pub fn new(operation: Operation) -> Self {
        Self {
            operation,
            args: BTreeMap::new(),
        }
    }

    pub fn arg(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.args.insert(name.into(), value.into());
        self
    }

    pub fn with_args(mut self, args: impl IntoIterator<Item = (String, String)>) -> Self {
        self.args.extend(args);
        self
    }

    /// Route every argument to the path, the body or the query string.
    pub fn render(&self) -> ClientResult<RenderedRequest> {
        let endpoint = self.operation.endpoint();
        let mut consumed = BTreeSet::new();

        let mut segments = Vec::new();
        for piece in endpoint.path.split('/') {
            match piece.strip_prefix('{').and_then(|p| p.strip_suffix('}')) {
                Some(name) => {
                    let value = self
                        .args
                        .get(name)
                        .filter(|v| !v.is_empty())
                        .ok_or_else(|| self.missing(name))?;
                    consumed.insert(name);
                    segments.push(value.clone());
                }
                None => segments.push(piece.to_string()),
            }
        }

        let body = if endpoint.body.is_empty() {
            None
        } else {
            let mut object = Map::new();
            for field in endpoint.body {
                match self.args.get(field.name) {
                    Some(raw) => {
                        consumed.insert(field.name);
                        object.insert(field.name.to_string(), self.encode_field(field, raw)?);
                    }
                    None if field.required => return Err(self.missing(field.name)),
                    None => {}
                }
            }
            Some(Value::Object(object))
        };

        let query = self
            .args
            .iter()
            .filter(|(name, _)| !consumed.contains(name.as_str()))
            .map(|(name, value)| (name.clone(), value.clone()))
            .collect();

        Ok(RenderedRequest {
            method: endpoint.method,
            segments,
            query,
            body,
        })
    }

    fn encode_field(&self, field: &BodyField, raw: &str) -> ClientResult<Value> {
        match field.kind {
            FieldKind::Text => Ok(Value::String(raw.to_string())),
            FieldKind::Integer => raw.trim().parse::<i64>().map(Value::from).map_err(|e| {
                ClientError::InvalidRequest(format!(
                    "{}: argument `{}` must be an integer: {e}",
                    self.operation, field.name
                ))
            }),
            FieldKind::Json => serde_json::from_str(raw).map_err(|e| {
                ClientError::InvalidRequest(format!(
                    "{}: argument `{}` must be JSON: {e}",
                    self.operation, field.name
                ))
            }),
        }
    }

    fn missing(&self, name: &str) -> ClientError {
        ClientError::InvalidRequest(format!(
            "{}: missing required argument `{name}`",
            self.operation
        ))
    }
}

/// What an invoked operation returned.
#[derive(Clone, Debug, PartialEq)]
pub enum OperationOutput {
    Json(Value),
    Bytes(Bytes),
    Empty,
}
