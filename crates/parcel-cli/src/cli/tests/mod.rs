//! CLI parse tests.

use super::{Cli, CliCommand, ConfigAction};
use clap::Parser;

fn parse(args: &[&str]) -> Cli {
    Cli::try_parse_from(args).unwrap()
}

#[test]
fn cli_parse_get_single() {
    match parse(&["parcel", "get", "https://example.com/file.iso"]).command {
        CliCommand::Get {
            urls,
            output,
            chunks,
            checksum,
            headers,
            json,
        } => {
            assert_eq!(urls, vec!["https://example.com/file.iso"]);
            assert!(output.is_none());
            assert!(chunks.is_none());
            assert!(checksum.is_none());
            assert!(headers.is_empty());
            assert!(!json);
        }
        _ => panic!("expected Get"),
    }
}

#[test]
fn cli_parse_get_all_options() {
    let cli = parse(&[
        "parcel",
        "get",
        "https://example.com/a",
        "https://example.com/b",
        "-o",
        "/tmp/out",
        "--chunks",
        "6",
        "-H",
        "Referer: https://example.com",
        "--header",
        "Cookie: a=b",
        "--json",
    ]);
    match cli.command {
        CliCommand::Get {
            urls,
            output,
            chunks,
            headers,
            json,
            ..
        } => {
            assert_eq!(urls.len(), 2);
            assert_eq!(output.as_deref(), Some(std::path::Path::new("/tmp/out")));
            assert_eq!(chunks, Some(6));
            assert_eq!(headers, vec!["Referer: https://example.com", "Cookie: a=b"]);
            assert!(json);
        }
        _ => panic!("expected Get"),
    }
}

#[test]
fn cli_parse_get_requires_url() {
    assert!(Cli::try_parse_from(["parcel", "get"]).is_err());
}

#[test]
fn cli_parse_get_rejects_bad_chunk_count() {
    assert!(Cli::try_parse_from(["parcel", "get", "https://x/y", "--chunks", "many"]).is_err());
}

#[test]
fn cli_parse_checksum() {
    match parse(&["parcel", "checksum", "/tmp/f", "--md5"]).command {
        CliCommand::Checksum { path, md5 } => {
            assert_eq!(path, std::path::PathBuf::from("/tmp/f"));
            assert!(md5);
        }
        _ => panic!("expected Checksum"),
    }
}

#[test]
fn cli_parse_config_actions() {
    for (arg, want) in [
        ("show", ConfigAction::Show),
        ("path", ConfigAction::Path),
        ("init", ConfigAction::Init { force: false }),
    ] {
        match parse(&["parcel", "config", arg]).command {
            CliCommand::Config { action } => assert_eq!(action, want),
            _ => panic!("expected Config"),
        }
    }
    match parse(&["parcel", "config", "init", "--force"]).command {
        CliCommand::Config { action } => assert_eq!(action, ConfigAction::Init { force: true }),
        _ => panic!("expected Config"),
    }
}

#[test]
fn cli_parse_global_config_flag() {
    let cli = parse(&["parcel", "checksum", "f", "--config", "/etc/parcel.toml"]);
    assert_eq!(cli.config.as_deref(), Some(std::path::Path::new("/etc/parcel.toml")));
}

#[test]
fn cli_rejects_unknown_subcommand() {
    assert!(Cli::try_parse_from(["parcel", "frobnicate"]).is_err());
}
