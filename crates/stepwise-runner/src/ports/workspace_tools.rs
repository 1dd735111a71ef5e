use std::path::{Component, Path, PathBuf};

use anyhow::Result;
use async_trait::async_trait;
use serde_json::{json, Map, Value};
use stepwise_core::ToolSpec;
use tracing::{debug, warn};

use super::{ToolOutcome, ToolPort};

/// Tool gateway confined to one workspace directory.
///
/// Every path parameter is relative to the root. Absolute paths, `..`
/// segments that climb out of the root and symlinks that lead outside it
/// are tool failures.
pub struct WorkspaceTools {
    root: PathBuf,
}

impl WorkspaceTools {
    /// The root is canonicalized once so symlinked workspaces compare correctly.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        let root = std::fs::canonicalize(&root).unwrap_or(root);
        Self { root }
    }

    /// The tools this gateway advertises.
    pub fn specs() -> Vec<ToolSpec> {
        vec![
            ToolSpec {
                name: "list_directory".into(),
                description: "List the entries of a directory in the workspace".into(),
                parameters: json!({
                    "type": "object",
                    "properties": {"path": {"type": "string"}},
                    "required": ["path"]
                }),
            },
            ToolSpec {
                name: "read_file".into(),
                description: "Read a UTF-8 text file from the workspace".into(),
                parameters: json!({
                    "type": "object",
                    "properties": {"path": {"type": "string"}},
                    "required": ["path"]
                }),
            },
            ToolSpec {
                name: "write_file".into(),
                description: "Create or overwrite a text file in the workspace".into(),
                parameters: json!({
                    "type": "object",
                    "properties": {
                        "path": {"type": "string"},
                        "content": {"type": "string"}
                    },
                    "required": ["path", "content"]
                }),
            },
        ]
    }

    /// Resolve a workspace-relative path, refusing anything outside the root.
    ///
    /// Only the text of the path is checked here; [`Self::confine`] follows
    /// symlinks on disk.
    pub fn resolve(&self, relative: &str) -> Result<PathBuf, String> {
        let mut parts: Vec<&std::ffi::OsStr> = Vec::new();
        for component in Path::new(relative).components() {
            match component {
                Component::Normal(part) => parts.push(part),
                Component::CurDir => {}
                Component::ParentDir => {
                    if parts.pop().is_none() {
                        return Err(format!("path `{relative}` escapes the workspace"));
                    }
                }
                Component::RootDir | Component::Prefix(_) => {
                    return Err(format!("absolute path `{relative}` is not allowed"));
                }
            }
        }
        let mut resolved = self.root.clone();
        resolved.extend(parts);
        Ok(resolved)
    }

    /// Canonicalize a resolved path, or its nearest existing ancestor when
    /// it does not exist yet, and require the result to stay under the root.
    pub fn confine(&self, resolved: &Path, relative: &str) -> Result<PathBuf, String> {
        let mut existing = resolved;
        let mut pending = Vec::new();
        // symlink_metadata so a dangling link stops the walk and fails below
        while std::fs::symlink_metadata(existing).is_err() {
            match (existing.parent(), existing.file_name()) {
                (Some(parent), Some(name)) => {
                    pending.push(name.to_os_string());
                    existing = parent;
                }
                _ => break,
            }
        }
        let mut canonical = existing
            .canonicalize()
            .map_err(|e| format!("cannot resolve `{relative}`: {e}"))?;
        canonical.extend(pending.into_iter().rev());
        if !canonical.starts_with(&self.root) {
            warn!(
                path = %relative,
                resolved = %canonical.display(),
                "path resolves outside the workspace"
            );
            return Err(format!("path `{relative}` resolves outside the workspace"));
        }
        Ok(canonical)
    }

    async fn list_directory(&self, path: &Path) -> std::io::Result<String> {
        let mut dir = tokio::fs::read_dir(path).await?;
        let mut names = Vec::new();
        while let Some(entry) = dir.next_entry().await? {
            let mut name = entry.file_name().to_string_lossy().to_string();
            if entry.file_type().await?.is_dir() {
                name.push('/');
            }
            names.push(name);
        }
        names.sort();
        Ok(names.join("\n"))
    }

    async fn write_file(&self, path: &Path, content: &str) -> std::io::Result<()> {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(path, content).await
    }
}

fn string_param<'a>(params: &'a Map<String, Value>, name: &str) -> Result<&'a str, String> {
    match params.get(name) {
        Some(Value::String(s)) => Ok(s),
        Some(_) => Err(format!("parameter `{name}` must be a string")),
        None => Err(format!("missing parameter `{name}`")),
    }
}

#[async_trait]
impl ToolPort for WorkspaceTools {
    async fn list_tools(&self) -> Result<Vec<ToolSpec>> {
        Ok(Self::specs())
    }

    async fn invoke(&self, tool: &str, params: &Map<String, Value>) -> Result<ToolOutcome> {
        debug!("tool {} {:?}", tool, params);
        let rel = match tool {
            "list_directory" | "read_file" | "write_file" => match string_param(params, "path") {
                Ok(p) => p,
                Err(e) => return Ok(ToolOutcome::err(e)),
            },
            other => return Ok(ToolOutcome::err(format!("unknown tool `{other}`"))),
        };
        let path = match self.resolve(rel).and_then(|p| self.confine(&p, rel)) {
            Ok(p) => p,
            Err(e) => return Ok(ToolOutcome::err(e)),
        };

        let outcome = match tool {
            "list_directory" => match self.list_directory(&path).await {
                Ok(listing) => ToolOutcome::ok(listing),
                Err(e) => ToolOutcome::err(format!("list {rel}: {e}")),
            },
            "read_file" => match tokio::fs::read_to_string(&path).await {
                Ok(content) => ToolOutcome::ok(content),
                Err(e) => ToolOutcome::err(format!("read {rel}: {e}")),
            },
            _ => {
                let content = match string_param(params, "content") {
                    Ok(c) => c,
                    Err(e) => return Ok(ToolOutcome::err(e)),
                };
                match self.write_file(&path, content).await {
                    Ok(()) => ToolOutcome::ok(format!("wrote {} bytes to {rel}", content.len())),
                    Err(e) => ToolOutcome::err(format!("write {rel}: {e}")),
                }
            }
        };
        Ok(outcome)
    }
}
