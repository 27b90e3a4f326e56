//! `github:` locators against a mock GitHub server.

use httpmock::prelude::*;
use serde_json::json;

use limatmpl::config::Settings;
use limatmpl::fetch::FetchContext;
use limatmpl::locator::{github, GithubEndpoints};
use limatmpl::template::Template;
use limatmpl::{EmbedOptions, TemplateError};

fn context(server: &MockServer) -> FetchContext {
    FetchContext::new(&Settings::default())
        .unwrap()
        .with_github(GithubEndpoints::at(&server.base_url()))
        .with_github_token(None)
}

fn mock_default_branch(server: &MockServer, repo: &str, branch: &str) {
    server.mock(|when, then| {
        when.method(GET).path(format!("/repos/{repo}"));
        then.status(200).json_body(json!({ "default_branch": branch }));
    });
}

#[test]
fn default_branch_comes_from_the_api() {
    let server = MockServer::start();
    let api = server.mock(|when, then| {
        when.method(GET)
            .path("/repos/lima-vm/lima")
            .header("Accept", "application/vnd.github.v3+json");
        then.status(200).json_body(json!({ "default_branch": "master" }));
    });

    let ctx = context(&server);
    assert_eq!(github::default_branch(&ctx, "lima-vm", "lima").unwrap(), "master");
    api.assert();
}

#[test]
fn token_is_sent_to_the_api() {
    let server = MockServer::start();
    let api = server.mock(|when, then| {
        when.method(GET)
            .path("/repos/org/repo")
            .header("Authorization", "token secret");
        then.status(200).json_body(json!({ "default_branch": "main" }));
    });

    let ctx = context(&server).with_github_token(Some("secret".to_string()));
    assert_eq!(github::default_branch(&ctx, "org", "repo").unwrap(), "main");
    api.assert();
}

#[test]
fn api_failure_is_a_branch_resolution_error() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(GET).path("/repos/org/missing");
        then.status(404).body("Not Found");
    });

    let ctx = context(&server);
    let err = github::resolve(&ctx, "github:org/missing/file").unwrap_err();
    assert!(matches!(err, TemplateError::BranchResolution { .. }), "{err}");
    assert!(err.to_string().contains("404"));
}

#[test]
fn explicit_branch_skips_the_api() {
    let server = MockServer::start();
    let ctx = context(&server);
    let url = github::resolve(&ctx, "github:org/repo/templates/docker@v1").unwrap();
    assert_eq!(url, format!("{}/org/repo/v1/templates/docker.yaml", server.base_url()));
}

#[test]
fn template_is_read_from_raw_content() {
    let server = MockServer::start();
    mock_default_branch(&server, "org/repo", "main");
    let raw = server.mock(|when, then| {
        when.method(GET).path("/org/repo/main/templates/docker.yaml");
        then.status(200).body("cpus: 4\n");
    });

    let ctx = context(&server);
    let tmpl = Template::read(&ctx, "", "github:org/repo/templates/docker").unwrap();
    raw.assert();
    assert_eq!(tmpl.name, "docker");
    assert_eq!(tmpl.bytes(), b"cpus: 4\n");
    assert_eq!(
        tmpl.locator,
        format!("{}/org/repo/main/templates/docker.yaml", server.base_url())
    );
}

#[test]
fn relative_bases_resolve_against_the_raw_url() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(GET).path("/org/repo/main/a.yaml");
        then.status(200).body("base: b.yaml\ncpus: 4\n");
    });
    server.mock(|when, then| {
        when.method(GET).path("/org/repo/main/b.yaml");
        then.status(200).body("memory: 8GiB\n");
    });

    let ctx = context(&server);
    let mut tmpl = Template::read(&ctx, "", "github:org/repo/a@main").unwrap();
    tmpl.embed(&ctx, &EmbedOptions::default()).unwrap();
    assert_eq!(tmpl.bytes(), b"cpus: 4\nmemory: 8GiB\n");
}

#[test]
fn org_redirect_is_followed_once() {
    let server = MockServer::start();
    mock_default_branch(&server, "org/org", "main");
    mock_default_branch(&server, "org/templates", "main");
    server.mock(|when, then| {
        when.method(GET).path("/org/org/main/.lima.yaml");
        then.status(200).body("github:org/templates/default\n");
    });

    let ctx = context(&server);
    let url = github::resolve(&ctx, "github:org").unwrap();
    assert_eq!(url, format!("{}/org/templates/main/default.yaml", server.base_url()));
}

#[test]
fn redirect_outside_the_org_repo_is_rejected() {
    let server = MockServer::start();
    mock_default_branch(&server, "org/repo", "main");
    server.mock(|when, then| {
        when.method(GET).path("/org/repo/main/.lima.yaml");
        then.status(200).body("github:org/elsewhere\n");
    });

    let ctx = context(&server);
    let err = github::resolve(&ctx, "github:org/repo").unwrap_err();
    assert!(matches!(err, TemplateError::RedirectValidation { .. }), "{err}");
}

#[test]
fn redirect_chains_are_rejected() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(GET).path("/org/org/main/.lima.yaml");
        then.status(200).body("github:org/next\n");
    });
    server.mock(|when, then| {
        when.method(GET).path("/org/next/main/.lima.yaml");
        then.status(200).body("github:org/third\n");
    });

    let ctx = context(&server);
    let err = github::resolve(&ctx, "github:org@main").unwrap_err();
    assert!(matches!(err, TemplateError::RedirectValidation { .. }), "{err}");
}

#[test]
fn symlink_style_file_points_within_the_repo() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(GET).path("/org/repo/main/.lima.yaml");
        then.status(200).body("templates/default.yaml");
    });

    let ctx = context(&server);
    let url = github::resolve(&ctx, "github:org/repo@main").unwrap();
    assert_eq!(url, format!("{}/org/repo/main/templates/default.yaml", server.base_url()));
}

#[test]
fn missing_lima_yaml_is_not_a_redirect() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(GET).path("/org/repo/main/.lima.yaml");
        then.status(404);
    });

    let ctx = context(&server);
    let url = github::resolve(&ctx, "github:org/repo@main").unwrap();
    assert_eq!(url, format!("{}/org/repo/main/.lima.yaml", server.base_url()));
}
