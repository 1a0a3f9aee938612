//! Projects: the user's own craft projects, kept on-device only.

use std::fmt;

use stitchline_core::UserId;

/// Placeholder stored for yarn attributes the user left blank.
pub const NOT_SPECIFIED: &str = "Not Specified";

/// Local row id of a project.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ProjectId(pub i64);

impl fmt::Debug for ProjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ProjectId({})", self.0)
    }
}

impl fmt::Display for ProjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A stored project.
#[derive(Debug, Clone, PartialEq)]
pub struct Project {
    pub id: ProjectId,
    pub name: String,
    pub yarn_name: String,
    pub yarn_type: String,
    pub yarn_weight: String,
    pub hook_size: f64,
    pub needle_size: f64,
    pub is_completed: bool,
    pub image_file: String,
    pub owner: UserId,
}

/// Attributes for creating a project. Blank yarn fields are stored as
/// [`NOT_SPECIFIED`], blank sizes as `0.0`.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct NewProject {
    pub name: String,
    pub yarn_name: Option<String>,
    pub yarn_type: Option<String>,
    pub yarn_weight: Option<String>,
    pub hook_size: Option<f64>,
    pub needle_size: Option<f64>,
    pub is_completed: bool,
    pub image_file: String,
    pub owner: UserId,
}

impl NewProject {
    pub fn new(name: impl Into<String>, owner: UserId) -> Self {
        Self {
            name: name.into(),
            owner,
            ..Self::default()
        }
    }

    /// Fill in defaults and assign the id.
    pub(crate) fn into_project(self, id: ProjectId) -> Project {
        let or_default = |v: Option<String>| v.unwrap_or_else(|| NOT_SPECIFIED.to_string());
        Project {
            id,
            name: self.name,
            yarn_name: or_default(self.yarn_name),
            yarn_type: or_default(self.yarn_type),
            yarn_weight: or_default(self.yarn_weight),
            hook_size: self.hook_size.unwrap_or(0.0),
            needle_size: self.needle_size.unwrap_or(0.0),
            is_completed: self.is_completed,
            image_file: self.image_file,
            owner: self.owner,
        }
    }
}

/// Sort projects the way `fetch_all` returns them: by name, then id.
pub(crate) fn sort_projects(projects: &mut [Project]) {
    projects.sort_by(|a, b| a.name.cmp(&b.name).then(a.id.cmp(&b.id)));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_fill_blank_fields() {
        let project = NewProject::new("Scarf", UserId::new("u1")).into_project(ProjectId(1));
        assert_eq!(project.yarn_name, NOT_SPECIFIED);
        assert_eq!(project.yarn_weight, NOT_SPECIFIED);
        assert_eq!(project.hook_size, 0.0);
        assert!(!project.is_completed);
    }
}
