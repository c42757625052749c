// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};
use test_generator::test_resources;
use unified_policy::unstable::*;

fn get_tokens(source: &Source) -> Result<Vec<Token>> {
    let mut tokens = vec![];
    let mut lex = Lexer::new(source);
    loop {
        let tok = lex.next_token()?;
        let eof = tok.kind == TokenKind::Eof;
        tokens.push(tok);
        if eof {
            break;
        }
    }

    Ok(tokens)
}

// The caret of a diagnostic must point at the start of the token's text.
fn check_loc(tok: &Token) -> Result<()> {
    let msg = tok.span.message("", "");
    let lines: Vec<&str> = msg.split('\n').collect();
    let source_line = lines[3];
    let caret_line = lines[4];
    let mut idx = 0usize;
    let mut source_idx = idx;
    loop {
        match source_idx < source_line.len() && idx < caret_line.len() {
            true => (),
            false if tok.kind == TokenKind::Eof && source_idx >= source_line.len() => return Ok(()),
            // A raw string may begin with a newline.
            false if tok.kind == TokenKind::RawString && tok.span.text().starts_with('\n') => {
                return Ok(())
            }
            _ => bail!("could not find caret for {tok:#?} {msg}"),
        }
        match &caret_line[idx..idx + 1] {
            "^" => {
                let span_str = tok.span.text().split('\n').next().unwrap_or_default();
                let source_str = &source_line[source_idx..];
                assert!(
                    source_str.starts_with(span_str) || span_str.starts_with(source_str),
                    "location mismatch for {tok:#?} {msg}\n{span_str}\n{source_str}"
                );
                return Ok(());
            }
            _ if &source_line[source_idx..source_idx + 1] == "\t" => idx += 4,
            _ => idx += 1,
        }
        source_idx += 1;
    }
}

#[derive(Serialize, Deserialize, PartialEq, Debug)]
struct Case {
    pub rego: String,
    pub note: String,
    #[serde(default)]
    pub tokens: Vec<String>,
    pub kinds: Option<Vec<String>>,
    pub error: Option<String>,
}

#[derive(Serialize, Deserialize, PartialEq, Debug)]
struct Test {
    cases: Vec<Case>,
}

fn yaml_test_impl(file: &str) -> Result<()> {
    println!("\nrunning {file}");

    let yaml = std::fs::read_to_string(file)?;
    let test: Test = serde_yaml::from_str(&yaml)?;

    for case in &test.cases {
        print!("case {} ", &case.note);
        let source = Source::new("case.rego", case.rego.as_str())?;

        match get_tokens(&source) {
            Ok(tokens) => {
                if let Some(expected) = &case.error {
                    bail!("expected error `{expected}` but lexing succeeded: {tokens:?}");
                }
                for (idx, tok) in tokens.iter().enumerate().take(case.tokens.len()) {
                    assert_eq!(
                        tok.span.text(),
                        case.tokens[idx],
                        "{} Expected token `{}` not found",
                        tok.span.message("mismatch-error", &case.tokens[idx]),
                        &case.tokens[idx]
                    );

                    if let Some(k) = &case.kinds {
                        if idx < k.len() {
                            assert_eq!(
                                format!("{:?}", tok.kind),
                                k[idx],
                                "{}",
                                tok.span.message("mismatch-error", "token kind mismatch")
                            );
                        }
                    }

                    check_loc(tok)?;
                }
                assert_eq!(
                    tokens.len(),
                    case.tokens.len(),
                    "\n. Token count mismatch.\nLexed tokens:{tokens:?}"
                );
                if let Some(k) = &case.kinds {
                    assert_eq!(
                        tokens.len(),
                        k.len(),
                        "\n. Kind count mismatch.\nLexed tokens:{tokens:?}"
                    );
                }
            }
            Err(actual) => match &case.error {
                Some(expected) => {
                    let actual = actual.to_string();
                    if !actual.contains(expected) {
                        bail!("Error message\n`{actual}\n`\ndoes not contain `{expected}`");
                    }
                }
                _ => return Err(actual),
            },
        }

        println!("passed");
    }
    println!("{} cases passed.", test.cases.len());
    Ok(())
}

fn yaml_test(file: &str) -> Result<()> {
    match yaml_test_impl(file) {
        Ok(_) => Ok(()),
        Err(e) => {
            // If Err is returned, it doesn't always get printed by cargo test.
            // Therefore, panic with the error.
            panic!("{}", e);
        }
    }
}

#[test_resources("tests/lexer/cases/*.yaml")]
fn run(path: &str) {
    yaml_test(path).unwrap()
}

#[test]
fn diagnostic_points_at_line_and_column() -> Result<()> {
    let source = Source::new("policy.rego", "package test\nallow := true\n")?;
    let msg = source.message(2, 7, "error", "something is off");
    assert_eq!(
        msg,
        "\n--> policy.rego:2:7\n  |\n2 | allow := true\n  |       ^\nerror: something is off"
    );
    Ok(())
}

#[test]
fn diagnostic_for_invalid_line() -> Result<()> {
    let source = Source::new("policy.rego", "package test")?;
    assert!(source.message(0, 1, "error", "").contains("invalid line 0"));
    assert!(source.message(5, 1, "error", "").contains("invalid line 5"));
    Ok(())
}
