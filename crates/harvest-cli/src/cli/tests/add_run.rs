//! Tests for add, recurring and run subcommands.

use super::parse;
use crate::cli::{parse_every, Cli, CliCommand};
use clap::Parser;

#[test]
fn cli_parse_add() {
    match parse(&["harvest", "add", "https://example.com/file.iso"]) {
        CliCommand::Add {
            urls,
            downloader,
            sub_downloader,
            destination,
            reset_attempts,
        } => {
            assert_eq!(urls, vec!["https://example.com/file.iso"]);
            assert!(downloader.is_none());
            assert!(sub_downloader.is_none());
            assert!(destination.is_none());
            assert!(!reset_attempts);
        }
        _ => panic!("expected Add"),
    }
}

#[test]
fn cli_parse_add_many_with_options() {
    match parse(&[
        "harvest",
        "add",
        "https://example.com/a",
        "https://example.com/b",
        "--downloader",
        "file",
        "--sub-downloader",
        "video",
        "--destination",
        "/tmp",
        "--reset-attempts",
    ]) {
        CliCommand::Add {
            urls,
            downloader,
            sub_downloader,
            destination,
            reset_attempts,
        } => {
            assert_eq!(urls.len(), 2);
            assert_eq!(downloader.as_deref(), Some("file"));
            assert_eq!(sub_downloader.as_deref(), Some("video"));
            assert_eq!(destination.as_deref(), Some(std::path::Path::new("/tmp")));
            assert!(reset_attempts);
        }
        _ => panic!("expected Add with options"),
    }
}

#[test]
fn cli_parse_add_requires_url() {
    assert!(Cli::try_parse_from(["harvest", "add"]).is_err());
}

#[test]
fn cli_parse_recurring() {
    match parse(&["harvest", "recurring", "https://example.com/feed", "--every", "7d"]) {
        CliCommand::Recurring { url, every, .. } => {
            assert_eq!(url, "https://example.com/feed");
            assert_eq!(every, 7 * 24 * 3600);
        }
        _ => panic!("expected Recurring"),
    }
}

#[test]
fn cli_parse_recurring_rejects_bad_duration() {
    assert!(Cli::try_parse_from(["harvest", "recurring", "https://x", "--every", "0h"]).is_err());
    assert!(Cli::try_parse_from(["harvest", "recurring", "https://x", "--every", "3y"]).is_err());
    assert!(Cli::try_parse_from(["harvest", "recurring", "https://x"]).is_err());
}

#[test]
fn every_units() {
    assert_eq!(parse_every("90s"), Ok(90));
    assert_eq!(parse_every("90"), Ok(90));
    assert_eq!(parse_every("30m"), Ok(1800));
    assert_eq!(parse_every("12h"), Ok(43_200));
    assert_eq!(parse_every("1w"), Ok(604_800));
    assert!(parse_every("h").is_err());
    assert!(parse_every("").is_err());
}

#[test]
fn cli_parse_run() {
    assert!(matches!(parse(&["harvest", "run"]), CliCommand::Run));
}
