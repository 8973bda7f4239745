//! View-tree snapshot types supplied by the platform per fill request.

use std::path::Path;

use serde::{Deserialize, Serialize};

/// Failure loading a [`FillRequest`] from disk.
#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    #[error("reading {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("decoding {path}: {source}")]
    Decode {
        path: String,
        #[source]
        source: serde_json::Error,
    },
}

/// One UI element in a window's view tree.
///
/// Children are owned by their parent; the tree is acyclic.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ViewNode {
    /// Platform autofill identifier.
    pub id: String,
    #[serde(default)]
    pub focused: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub class_name: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub autofill_hints: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hint: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<ViewNode>,
}

impl ViewNode {
    /// A bare unfocused node with no children.
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            focused: false,
            class_name: None,
            autofill_hints: Vec::new(),
            text: None,
            hint: None,
            children: Vec::new(),
        }
    }

    pub fn focused(mut self, focused: bool) -> Self {
        self.focused = focused;
        self
    }

    pub fn with_hints<I, S>(mut self, hints: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.autofill_hints = hints.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_child(mut self, child: ViewNode) -> Self {
        self.children.push(child);
        self
    }
}

impl Drop for ViewNode {
    // Flatten before dropping so deep trees do not recurse.
    fn drop(&mut self) {
        let mut stack = std::mem::take(&mut self.children);
        while let Some(mut node) = stack.pop() {
            stack.append(&mut node.children);
        }
    }
}

/// A window and its root view.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WindowNode {
    pub root: ViewNode,
}

/// The view structure captured for one fill attempt.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FillContext {
    #[serde(default)]
    pub windows: Vec<WindowNode>,
}

impl FillContext {
    pub fn new(roots: impl IntoIterator<Item = ViewNode>) -> Self {
        Self {
            windows: roots.into_iter().map(|root| WindowNode { root }).collect(),
        }
    }
}

/// A platform fill request: every fill context of the session so far,
/// oldest first.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FillRequest {
    #[serde(default)]
    pub request_id: u32,
    #[serde(default)]
    pub fill_contexts: Vec<FillContext>,
}

impl FillRequest {
    /// Read a request from a JSON file.
    pub fn from_path(path: &Path) -> Result<Self, LoadError> {
        let raw = std::fs::read_to_string(path).map_err(|source| LoadError::Io {
            path: path.display().to_string(),
            source,
        })?;
        serde_json::from_str(&raw).map_err(|source| LoadError::Decode {
            path: path.display().to_string(),
            source,
        })
    }
}
