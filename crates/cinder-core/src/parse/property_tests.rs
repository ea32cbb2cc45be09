// Copyright 2026 James Casey
// SPDX-License-Identifier: Apache-2.0

//! Property-based tests for the Cinder lexer and parser.
//!
//! These use `proptest` to verify front-end invariants over generated
//! inputs:
//!
//! 1. **Lexer totality**: arbitrary input always terminates in EOF
//! 2. **Token spans stay within the input**
//! 3. **Lexer determinism**: same input, same tokens
//! 4. **Valid fragments lex without error tokens**
//! 5. **Parser totality**: arbitrary input parses without panicking
//! 6. **Parser determinism**: same tokens, structurally equal trees
//! 7. **Validation soundness**: error-free parses validate

use proptest::prelude::*;

use crate::ast::trees_equal;
use crate::parse::{Lexer, TokenKind, lex, parse_source};

/// Known-valid single-token fragments that should lex without errors.
const VALID_SINGLE_TOKENS: &[&str] = &[
    "42",
    "3.14",
    "\"hello\"",
    "'x'",
    "true",
    "false",
    "null",
    "ident",
    "_under",
    "i32",
    "u64",
    "f32",
    "bool",
    "void",
    "struct",
    "sizeof",
    "while",
    "module",
    "+",
    "-",
    "*",
    "->",
    "++",
    "<=",
    "<<",
    "&&",
    "||",
    "(",
    ")",
    "{",
    "}",
    "[",
    "]",
    ";",
    "?",
    ":",
];

/// Multi-token valid fragments that should lex cleanly.
const VALID_FRAGMENTS: &[&str] = &[
    "x + 1",
    "a->b",
    "p[i] = 3",
    "f(1, 2)",
    "x <= y && y >= z",
    "i32* p = null;",
    "for (;;) ;",
    "a += b << 2",
    "// comment\nx",
    "/* block */ 1",
];

/// Well-formed compilation units for parser properties.
const VALID_PROGRAMS: &[&str] = &[
    "i32 main() { return 42; }",
    "i32 f(i32 x) { if (x) return 1; else return 0; }",
    "struct P { i32 x; i32 y; } i32 f(struct P* p) { return p->x; }",
    "i32 f() { for (i32 i = 0; i < 10; i++) g(i); return 0; }",
    "enum E { A, B = 4 } i32 f() { return B; }",
    "module m; import io; export i32 one() { return 1; }",
    "i32 f(i32 n) { while (n) { n--; } return n; }",
];

fn valid_fragment() -> impl Strategy<Value = String> {
    prop_oneof![
        prop::sample::select(VALID_SINGLE_TOKENS).prop_map(str::to_owned),
        prop::sample::select(VALID_FRAGMENTS).prop_map(str::to_owned),
    ]
}

proptest! {
    #[test]
    fn lexer_terminates_on_arbitrary_input(input in ".*") {
        // Totality: a bounded number of steps reaches EOF.
        let mut lexer = Lexer::new(&input);
        let mut steps = 0usize;
        loop {
            let token = lexer.next_token();
            if token.kind().is_eof() {
                break;
            }
            steps += 1;
            prop_assert!(steps <= input.len() + 1, "lexer failed to make progress");
        }
    }

    #[test]
    fn token_spans_stay_within_input(input in ".*") {
        for token in lex(&input) {
            prop_assert!(token.span().end() as usize <= input.len());
            prop_assert!(token.span().start() <= token.span().end());
        }
    }

    #[test]
    fn lexer_is_deterministic(input in ".*") {
        let first = lex(&input);
        let second = lex(&input);
        prop_assert_eq!(first, second);
    }

    #[test]
    fn eof_is_always_last_and_unique(input in ".*") {
        let tokens = lex(&input);
        prop_assert_eq!(tokens.last().map(|t| t.kind()), Some(TokenKind::Eof));
        let eof_count = tokens.iter().filter(|t| t.kind().is_eof()).count();
        prop_assert_eq!(eof_count, 1);
    }

    #[test]
    fn valid_fragments_lex_without_error_tokens(fragment in valid_fragment()) {
        for token in lex(&fragment) {
            prop_assert!(
                token.kind() != TokenKind::Invalid,
                "unexpected invalid token in {:?}",
                fragment
            );
        }
    }

    #[test]
    fn parser_never_panics(input in ".*") {
        let result = parse_source(&input);
        // A root always exists, even for garbage.
        prop_assert!(result.ast.used() >= 1);
    }

    #[test]
    fn parser_is_deterministic(index in 0..VALID_PROGRAMS.len()) {
        let source = VALID_PROGRAMS[index];
        let a = parse_source(source);
        let b = parse_source(source);
        prop_assert_eq!(a.error_count(), 0);
        prop_assert!(trees_equal(&a.ast, a.root, &b.ast, b.root));
    }

    #[test]
    fn successful_parses_validate(index in 0..VALID_PROGRAMS.len()) {
        let source = VALID_PROGRAMS[index];
        let result = parse_source(source);
        prop_assert_eq!(result.error_count(), 0);
        prop_assert!(result.ast.is_valid(result.root));
    }
}
