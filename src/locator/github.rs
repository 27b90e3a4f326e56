//! `github:ORG[/REPO][/PATH][@BRANCH]` shorthand.

use serde::Deserialize;
use tracing::debug;

use super::name::{trim_yaml_ext, validate_name};
use crate::error::{Result, TemplateError};
use crate::fetch::FetchContext;

pub const SCHEME: &str = "github:";

/// File used when the shorthand names no path, or a directory.
pub const DEFAULT_FILE: &str = ".lima.yaml";

/// Bytes of a `.lima.yaml` inspected for a redirect.
const REDIRECT_PROBE_LIMIT: usize = 1024;

/// API and raw-content base URLs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GithubEndpoints {
    pub api: String,
    pub raw: String,
}

impl Default for GithubEndpoints {
    fn default() -> Self {
        Self {
            api: "https://api.github.com".to_string(),
            raw: "https://raw.githubusercontent.com".to_string(),
        }
    }
}

impl GithubEndpoints {
    /// Endpoints rooted at one server (both APIs on the same host).
    pub fn at(base: &str) -> Self {
        let base = base.trim_end_matches('/');
        Self {
            api: base.to_string(),
            raw: base.to_string(),
        }
    }

    fn raw_url(&self, org: &str, repo: &str, branch: &str, path: &str) -> String {
        format!("{}/{org}/{repo}/{branch}/{path}", self.raw.trim_end_matches('/'))
    }
}

/// A parsed shorthand, with defaults for REPO and PATH applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GithubRef {
    pub org: String,
    pub repo: String,
    pub path: String,
    pub branch: Option<String>,
}

impl GithubRef {
    /// Parses the part after `github:`.
    pub fn parse(input: &str) -> Result<Self> {
        let (shorthand, branch) = match input.rsplit_once('@') {
            Some((shorthand, branch)) => (shorthand, Some(branch).filter(|b| !b.is_empty())),
            None => (input, None),
        };

        let mut parts = shorthand.split('/');
        let org = parts.next().unwrap_or_default();
        if org.is_empty() {
            return Err(TemplateError::Classification {
                locator: format!("{SCHEME}{input}"),
                message: "github: locator must contain at least an ORG".to_string(),
            });
        }
        let repo = parts.next().filter(|r| !r.is_empty()).unwrap_or(org);
        let mut path = parts.collect::<Vec<_>>().join("/");

        if path.is_empty() {
            path = DEFAULT_FILE.to_string();
        } else {
            if path.ends_with('/') {
                path.push_str(".lima");
            }
            let filename = path.rsplit('/').next().unwrap_or_default();
            let after_first = filename
                .char_indices()
                .nth(1)
                .map_or("", |(i, _)| &filename[i..]);
            if !after_first.contains('.') {
                path.push_str(".yaml");
            }
        }

        Ok(Self {
            org: org.to_string(),
            repo: repo.to_string(),
            path,
            branch: branch.map(str::to_string),
        })
    }

    /// Instance name: the file stem, or the repository for dot-files.
    pub fn name(&self, locator: &str) -> Result<String> {
        let filename = self.path.rsplit('/').next().unwrap_or_default();
        let stem = trim_yaml_ext(filename);
        let name = if stem.starts_with('.') || stem.is_empty() {
            self.repo.to_lowercase()
        } else {
            stem.to_lowercase()
        };
        validate_name(locator, &name)?;
        Ok(name)
    }

    fn is_default_file(&self) -> bool {
        self.path.rsplit('/').next() == Some(DEFAULT_FILE)
    }
}

/// Expands a `github:` locator into a raw-content URL.
pub fn resolve(ctx: &FetchContext, locator: &str) -> Result<String> {
    let shorthand = locator.strip_prefix(SCHEME).unwrap_or(locator);
    resolve_ref(ctx, locator, GithubRef::parse(shorthand)?, true)
}

fn resolve_ref(ctx: &FetchContext, locator: &str, github: GithubRef, follow: bool) -> Result<String> {
    let branch = match &github.branch {
        Some(branch) => branch.clone(),
        None => default_branch(ctx, &github.org, &github.repo)?,
    };
    let mut path = github.path.clone();

    if github.is_default_file() {
        let url = ctx.github().raw_url(&github.org, &github.repo, &branch, &path);
        match probe_redirect(ctx, &url)? {
            Some(Redirect::Github(target)) => {
                return follow_redirect(ctx, locator, &github, &target, follow);
            }
            Some(Redirect::Relative(target)) => {
                if let Some(joined) = join_relative(&path, &target) {
                    debug!(from = %path, to = %joined, "Following GitHub symlink");
                    path = joined;
                }
            }
            None => {}
        }
    }

    Ok(ctx.github().raw_url(&github.org, &github.repo, &branch, &path))
}

fn follow_redirect(
    ctx: &FetchContext,
    locator: &str,
    from: &GithubRef,
    target: &str,
    follow: bool,
) -> Result<String> {
    let invalid = |message: String| TemplateError::RedirectValidation {
        locator: locator.to_string(),
        message,
    };
    if !follow {
        return Err(invalid(format!("redirect target {target:?} is itself a redirect")));
    }
    if from.repo != from.org {
        return Err(invalid(format!(
            "redirects are only allowed in {org}/{org}, not {org}/{repo}",
            org = from.org,
            repo = from.repo
        )));
    }
    let shorthand = target.strip_prefix(SCHEME).unwrap_or(target);
    if shorthand.contains('@') {
        return Err(invalid(format!("redirect {target:?} must not specify a branch")));
    }
    let mut next = GithubRef::parse(shorthand)?;
    if next.org != from.org {
        return Err(invalid(format!(
            "redirect {target:?} must stay within the {} organization",
            from.org
        )));
    }
    next.branch = from.branch.clone();
    debug!(from = locator, to = target, "Following GitHub redirect");
    resolve_ref(ctx, locator, next, false)
}

#[derive(Debug, PartialEq, Eq)]
enum Redirect {
    Github(String),
    Relative(String),
}

/// Looks at the start of a `.lima.yaml` for a `github:` redirect or a
/// symlink-style relative path. Unreachable files are not redirects.
fn probe_redirect(ctx: &FetchContext, url: &str) -> Result<Option<Redirect>> {
    let response = match ctx.http_request(url, &[], ctx.max_size()) {
        Ok(response) => response,
        Err(e @ (TemplateError::Cancelled | TemplateError::DeadlineExceeded { .. })) => return Err(e),
        Err(e) => {
            debug!(url, error = %e, "Cannot probe for GitHub redirect");
            return Ok(None);
        }
    };
    if !response.is_success() {
        return Ok(None);
    }
    let end = response.body.len().min(REDIRECT_PROBE_LIMIT);
    let content = String::from_utf8_lossy(&response.body[..end]);
    Ok(parse_redirect(&content))
}

fn parse_redirect(content: &str) -> Option<Redirect> {
    let line = content.trim_end();
    if line.starts_with(SCHEME) && !line.contains(char::is_whitespace) {
        return Some(Redirect::Github(line.to_string()));
    }
    if content.is_empty() || content.contains(['\n', ' ', ':']) {
        return None;
    }
    Some(Redirect::Relative(content.to_string()))
}

/// Joins `target` to the directory of `path`, cleaning `.` and `..`.
/// Returns `None` when the result would leave the repository root.
fn join_relative(path: &str, target: &str) -> Option<String> {
    let mut segments: Vec<&str> = path.split('/').collect();
    segments.pop();
    for segment in target.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                segments.pop()?;
            }
            other => segments.push(other),
        }
    }
    let joined = segments
        .into_iter()
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join("/");
    (!joined.is_empty()).then_some(joined)
}

#[derive(Deserialize)]
struct RepoInfo {
    #[serde(default)]
    default_branch: String,
}

/// Asks the GitHub API for the default branch of `org/repo`.
pub fn default_branch(ctx: &FetchContext, org: &str, repo: &str) -> Result<String> {
    let failed = |message: String| TemplateError::BranchResolution {
        org: org.to_string(),
        repo: repo.to_string(),
        message,
    };
    let url = format!("{}/repos/{org}/{repo}", ctx.github().api.trim_end_matches('/'));
    let mut headers = vec![("Accept", "application/vnd.github.v3+json".to_string())];
    if let Some(token) = ctx.github_token() {
        headers.push(("Authorization", format!("token {token}")));
    }

    let response = ctx.http_request(&url, &headers, ctx.max_size()).map_err(|e| match e {
        TemplateError::Cancelled | TemplateError::DeadlineExceeded { .. } => e,
        other => failed(format!("failed to query GitHub API: {other}")),
    })?;
    if response.status != 200 {
        return Err(failed(format!(
            "GitHub API returned status {}: {}",
            response.status,
            String::from_utf8_lossy(&response.body)
        )));
    }
    let info: RepoInfo = serde_json::from_slice(&response.body)
        .map_err(|e| failed(format!("failed to parse GitHub API response: {e}")))?;
    if info.default_branch.is_empty() {
        return Err(failed(format!("repository {org}/{repo} has no default branch")));
    }
    debug!(org, repo, branch = %info.default_branch, "Resolved GitHub default branch");
    Ok(info.default_branch)
}
