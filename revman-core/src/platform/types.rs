//! Small platform-shared helpers.

/// URL-encodes a `repo` identifier for use as a GitLab path-segment project ID
/// (numeric ID or "group/project"), or passes GitHub/Bitbucket "owner/repo"
/// slugs through unencoded-path-segment usage at the call site.
pub fn encode_project_path(repo: &str) -> String {
    urlencoding::encode(repo).into_owned()
}
