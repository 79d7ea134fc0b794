// crates/invoice-signer-cli/src/main_tests.rs
// ============================================================================
// Module: CLI Main Helpers Tests
// Description: Unit tests for argument parsing and selector building.
// Purpose: Ensure CLI inputs map onto selectors and triggers correctly.
// Dependencies: invoice-signer-cli main helpers
// ============================================================================

//! ## Overview
//! Validates selector construction, trigger line parsing, and clap wiring.

#![allow(
    clippy::panic,
    clippy::print_stdout,
    clippy::print_stderr,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::use_debug,
    clippy::dbg_macro,
    clippy::panic_in_result_fn,
    clippy::unwrap_in_result,
    reason = "Test-only output and panic-based assertions are permitted."
)]

// ============================================================================
// SECTION: Imports
// ============================================================================

use clap::CommandFactory;
use clap::Parser;
use invoice_signer_core::RecordId;
use invoice_signer_core::RecordSelector;

use super::Cli;
use super::Commands;
use super::MAX_TRIGGER_LINE_BYTES;
use super::build_selector;
use super::parse_trigger;

// ============================================================================
// SECTION: Tests
// ============================================================================

#[test]
fn cli_definition_is_consistent() {
    Cli::command().debug_assert();
}

#[test]
fn ids_become_an_id_selector() {
    let selector = build_selector(Some(vec!["a".to_string(), " ".to_string(), " b ".to_string()]), None, None).unwrap();
    assert_eq!(selector, RecordSelector::Ids(vec![RecordId::new("a"), RecordId::new("b")]));
}

#[test]
fn no_filters_is_unrestricted() {
    assert_eq!(build_selector(None, None, None).unwrap(), RecordSelector::Unrestricted);
}

#[test]
fn date_range_must_be_ordered_and_paired() {
    let range = build_selector(None, Some("2026-01-01T00:00:00Z"), Some("2026-01-31T00:00:00Z")).unwrap();
    assert!(matches!(range, RecordSelector::DateRange(_)));

    assert!(build_selector(None, Some("2026-02-01T00:00:00Z"), Some("2026-01-01T00:00:00Z")).is_err());
    assert!(build_selector(None, Some("2026-02-01T00:00:00Z"), None).is_err());
    assert!(build_selector(None, Some("yesterday"), Some("2026-01-01T00:00:00Z")).is_err());
}

#[test]
fn sign_arguments_parse() {
    let cli = Cli::try_parse_from(["invoice-signer", "sign", "--ids", "r1,r2", "--quantity", "1"]).unwrap();
    let Commands::Sign(command) = cli.command else {
        panic!("expected sign command");
    };
    assert_eq!(command.ids, Some(vec!["r1".to_string(), "r2".to_string()]));
    assert_eq!(command.quantity, Some(1));

    assert!(Cli::try_parse_from(["invoice-signer", "sign", "--ids", "r1", "--from", "x", "--till", "y"]).is_err());
}

#[test]
fn trigger_lines_parse_or_fail_closed() {
    assert!(parse_trigger("   ").unwrap().is_none());
    let trigger = parse_trigger(r#"{"actor_id":"A1","selector":{"kind":"unrestricted"}}"#).unwrap().unwrap();
    assert_eq!(trigger.actor_id.as_str(), "A1");
    assert_eq!(trigger.quantity, None);

    assert!(parse_trigger("{not json").is_err());
    assert!(parse_trigger(&"x".repeat(MAX_TRIGGER_LINE_BYTES + 1)).is_err());
}
