//! Library integration tests.

use limatmpl::cli::{Cli, Commands, CommandDispatcher, MockOutput};
use limatmpl::config::Settings;
use limatmpl::fetch::FetchContext;
use limatmpl::locator::{Locator, LocatorKind};
use limatmpl::store::TemplateStore;
use limatmpl::template::{abs_path, base_path, Stage, Template};
use limatmpl::yaml::{Document, Edit, NodePath, Position};
use limatmpl::{EmbedOptions, TemplateError};

#[test]
fn error_types_are_public() {
    let err = TemplateError::CyclicBase {
        locator: "base.yaml".into(),
    };
    assert!(err.to_string().contains("base.yaml"));
}

#[test]
fn result_type_alias_is_public() {
    fn test_fn() -> limatmpl::Result<()> {
        Ok(())
    }
    assert!(test_fn().is_ok());
}

#[test]
fn cli_types_are_public() {
    use clap::Parser;

    let cli = Cli::parse_from(["limatmpl", "list", "--json"]);
    if let Commands::List(args) = cli.command {
        assert!(args.json);
    } else {
        panic!("Expected List command");
    }
}

#[test]
fn dispatcher_runs_commands_against_mock_output() {
    use clap::Parser;

    let cli = Cli::parse_from(["limatmpl", "copy", "template://ubuntu", "-"]);
    let dispatcher = CommandDispatcher::new(Settings::default());
    let mut out = MockOutput::new();
    let result = dispatcher.dispatch(&cli, &mut out).unwrap();
    assert!(result.success);
    assert!(out.written().contains("template://_images/ubuntu"));
}

#[test]
fn locators_are_classified() {
    let kind = |s: &str| Locator::classify(s).unwrap().kind;
    assert_eq!(kind("template://docker"), LocatorKind::Store("docker".into()));
    assert_eq!(kind("https://example.com/lima.yaml"), LocatorKind::Http);
    assert_eq!(kind("github:lima-vm/lima"), LocatorKind::Github);
    assert_eq!(kind("./lima.yaml"), LocatorKind::Path);
    assert_eq!(kind("-"), LocatorKind::Stdin);
    assert_eq!(kind("default"), LocatorKind::InstanceName);
    assert!(matches!(
        Locator::classify("ftp://example.com/lima.yaml"),
        Err(TemplateError::Classification { .. })
    ));
}

#[test]
fn locator_paths_are_public() {
    assert_eq!(base_path("https://example.com/a/b.yaml?x=1").unwrap(), "https://example.com/a");
    assert_eq!(abs_path("c.yaml", "https://example.com/a").unwrap(), "https://example.com/a/c.yaml");
    assert!(matches!(
        abs_path("../c.yaml", "/srv"),
        Err(TemplateError::Traversal { .. })
    ));
}

#[test]
fn store_reads_embedded_templates() {
    let store = TemplateStore::default();
    let bytes = store.read("_images/ubuntu").unwrap();
    assert!(String::from_utf8(bytes).unwrap().contains("images:"));
    assert!(store.list().unwrap().contains(&"docker".to_string()));
}

#[test]
fn documents_apply_edits() {
    let mut target = Document::parse("a.yaml", b"# cpus\ncpus: 2\nmounts:\n- location: /a\n").unwrap();
    let source = Document::parse("b.yaml", b"mounts:\n- location: /b # shared\n").unwrap();
    let mounts = NodePath::root().key("mounts");
    target
        .apply(
            &[Edit::Extend {
                path: mounts.clone(),
                src: mounts,
                position: Position::Append,
            }],
            &source,
        )
        .unwrap();
    assert_eq!(
        target.to_yaml(),
        "# cpus\ncpus: 2\nmounts:\n- location: /a\n- location: /b # shared\n"
    );
}

#[test]
fn template_pipeline_reaches_resolved() {
    let ctx = FetchContext::new(&Settings::default()).unwrap();
    let mut tmpl = Template::read(&ctx, "", "template://default").unwrap();
    assert_eq!(tmpl.name, "default");
    let options = EmbedOptions {
        embed_all: true,
        default_base: None,
    };
    tmpl.embed(&ctx, &options).unwrap();
    assert_eq!(tmpl.stage(), Stage::Resolved);
    assert_eq!(tmpl.config().unwrap().minimum_lima_version.as_deref(), Some("1.1.0"));
}

#[test]
fn failed_pipeline_clears_the_template() {
    let ctx = FetchContext::new(&Settings::default()).unwrap();
    let mut tmpl = Template::new("x", "/srv/x.yaml", "base: /srv/x.yaml\n");
    assert!(tmpl.embed(&ctx, &EmbedOptions::default()).is_err());
    assert_eq!(tmpl.stage(), Stage::Failed);
    assert!(tmpl.bytes().is_empty());
}
