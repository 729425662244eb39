//! Release notes rendered from commit metadata.

use serde::{Deserialize, Serialize};

/// Where a release was built from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitInfo {
    /// Base URL of the source host, e.g. `https://github.com`
    pub server_url: String,
    /// `owner/name`
    pub repository: String,
    pub sha: String,
    pub ref_name: String,
    pub actor: String,
}

pub struct ReleaseNotes;

impl ReleaseNotes {
    /// Render the single-line HTML body linking commit, branch and author.
    ///
    /// The body is padded with one space on each side, matching notes
    /// already stored on existing releases.
    pub fn from_commit(commit: &CommitInfo) -> String {
        let server = commit.server_url.trim_end_matches('/');
        let repo = format!("{}/{}", server, commit.repository);

        let lines = [
            format!(
                "<b>Commit</b>: <a href={}/commit/{}>{}</a>",
                repo, commit.sha, commit.sha
            ),
            "<br>".to_string(),
            "<br>".to_string(),
            format!(
                "<b>Branch name</b>: <a href={}/tree/{}>{}</a>",
                repo, commit.ref_name, commit.ref_name
            ),
            "<br>".to_string(),
            "<br>".to_string(),
            format!(
                "<b>Created by </b>: <a href={}/{}>{}</a>",
                server, commit.actor, commit.actor
            ),
        ];
        format!(" {} ", lines.join(" "))
    }
}
