use std::path::{Component, Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// The project a journal belongs to.
///
/// Passed explicitly to every engine operation, so one process can journal
/// for several projects at once. `root` is the project's working directory;
/// journal storage lives in a subdirectory of it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Project {
    pub id: String,
    pub root: PathBuf,
}

impl Project {
    pub fn new(id: impl Into<String>, root: impl Into<PathBuf>) -> Self {
        Self {
            id: id.into(),
            root: root.into(),
        }
    }

    /// A project named after its directory.
    pub fn from_dir(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        let id = root
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| root.display().to_string());
        Self { id, root }
    }

    /// Resolve `name` as a direct child directory of `workspace`.
    ///
    /// Names containing separators, `.` or `..` are rejected so a caller cannot
    /// escape the workspace.
    pub fn in_workspace(workspace: &Path, name: &str) -> Result<Self> {
        let mut components = Path::new(name).components();
        match (components.next(), components.next()) {
            (Some(Component::Normal(_)), None) if !name.contains(['/', '\\']) => {
                Ok(Self::new(name, workspace.join(name)))
            }
            _ => Err(Error::InvalidProject(name.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn in_workspace_joins_simple_names() {
        let project = Project::in_workspace(Path::new("/work"), "alpha").unwrap();
        assert_eq!(project.id, "alpha");
        assert_eq!(project.root, PathBuf::from("/work/alpha"));
    }

    #[test]
    fn in_workspace_rejects_traversal() {
        for name in ["..", ".", "a/b", "../etc", "", "/abs"] {
            assert!(
                Project::in_workspace(Path::new("/work"), name).is_err(),
                "accepted {:?}",
                name
            );
        }
    }

    #[test]
    fn from_dir_uses_directory_name() {
        let project = Project::from_dir("/home/me/rover");
        assert_eq!(project.id, "rover");
    }
}
