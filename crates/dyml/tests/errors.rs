//! Tests for the failure surface: every error kind is positional, fatal,
//! and carries enough context for caret rendering.

use dyml::{parse, parse_str, SyntaxError};
use test_case::test_case;

use harness::run_error_test;

mod harness;

#[test_case("#item @k{v} @k{v}", "already defined"; "duplicate_attribute_g1")]
#[test_case("#!{ a @k=\"1\" @k=\"2\" }", "already defined"; "duplicate_attribute_g2")]
#[test_case("@@k{1} #a @k{2}", "already defined"; "forwarded_key_collides_with_a_plain_one")]
fn duplicate_attributes(input: &str, fragment: &str) {
    run_error_test(input, fragment);
}

#[test_case("#!( a )", "curly braces"; "group_region")]
#[test_case("#!<a>", "curly braces"; "generic_region")]
fn root_shape(input: &str, fragment: &str) {
    run_error_test(input, fragment);
}

#[test_case("#!{ a, -> b }", "separator"; "arrow_after_separator")]
#[test_case("#!{ -> b }", "return arrow"; "arrow_without_a_node")]
#[test_case("#! -> b", "preceding node"; "arrow_opening_a_bare_region")]
#[test_case("#!{ a -> (x) -> y }", "only one return arrow"; "second_arrow")]
#[test_case("#!{ a -> , }", "requires a name"; "arrow_without_a_value")]
fn arrow_misuse(input: &str, fragment: &str) {
    run_error_test(input, fragment);
}

#[test_case("#{}", "expected identifier"; "empty_element_name")]
#[test_case("@{v}", "expected identifier"; "empty_attribute_name")]
#[test_case(r"a\qb", "cannot be escaped"; "escaping_an_ordinary_character")]
#[test_case("#!{ a \"open }", "unterminated string"; "unterminated_string")]
#[test_case("#!{ a @k= }", "attribute value is required"; "missing_attribute_value")]
#[test_case("#!{ a ! }", "unexpected char"; "stray_character_in_g2")]
fn lexer_failures(input: &str, fragment: &str) {
    run_error_test(input, fragment);
}

#[test_case("#!{ f(x} }", "')'"; "mismatched_closer")]
#[test_case("#!{ , }", "unexpected ','"; "leading_separator")]
#[test_case("#!{ a,, b }", "unexpected ','"; "doubled_separator")]
#[test_case("#a{x} }", "end of input"; "stray_closer_after_the_document")]
#[test_case("#a{x", "'}'"; "unterminated_block")]
fn unexpected_tokens(input: &str, fragment: &str) {
    run_error_test(input, fragment);
}

#[test]
fn invalid_utf8_is_reported_at_the_offending_byte() {
    let err = parse(&[b'a', b'b', 0xFE][..]).expect_err("invalid bytes must fail");
    match err {
        SyntaxError::LexInvalidUtf8 { span } => assert_eq!(span.begin.offset, 2),
        other => panic!("expected an utf-8 error, got {other}"),
    }
}

#[test]
fn duplicate_attributes_point_at_both_sites() {
    let err = parse_str("#item @k{1} @k{2}").expect_err("duplicate must fail");
    let details = err.details();
    assert_eq!(details.len(), 1);
    assert_eq!(details[0].label, "first defined here");
    let primary = err.span().expect("positional error");
    assert!(primary.begin.offset > details[0].span.begin.offset);
}

#[test]
fn errors_render_with_carets() {
    let err = parse_str("#item @k{1} @k{2}").expect_err("duplicate must fail");
    let rendered = err.render();
    assert!(rendered.contains("error:"));
    assert!(rendered.contains("--> <input>:1:"));
    assert!(rendered.contains('^'));
}

#[test]
fn file_names_thread_into_positions() {
    let err = dyml::parse_with_file("#a @k{1} @k{2}".as_bytes(), "doc.dyml")
        .expect_err("duplicate must fail");
    assert!(err.to_string().contains("doc.dyml:1:"));
}
