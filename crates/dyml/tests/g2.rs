//! Tests for the node-first grammar: `#!` regions, bracket kinds,
//! separators, quoted strings, return arrows, comments, and embedded G1
//! lines.

use dyml::{parse_str, BlockKind};
use test_case::test_case;

use harness::{run_equivalence_test, run_tree_test};

mod harness;

#[test_case("#!{ a }", "root{a}"; "braced_region")]
#[test_case("#! a {}", "root{a{}}"; "bare_region_with_block")]
#[test_case("#!{ a, b; c }", "root{a b c}"; "separators_are_equivalent")]
#[test_case("#!{ a, b, }", "root{a b}"; "trailing_separator")]
#[test_case("#!{ list { item1, item2 } }", "root{list{item1 item2}}"; "nested_block")]
#[test_case("#!{ f(x, y) }", "root{f(x y)}"; "group_block")]
#[test_case("#!{ f<x> }", "root{f<x>}"; "generic_block")]
#[test_case("#!{ x y z }", "root{x{y{z}}}"; "juxtaposition_chains")]
#[test_case("#!{ msg \"hello\" }", r#"root{msg{"hello"}}"#; "quoted_text_child")]
#[test_case("#!{ \"loose\" }", r#"root{"loose"}"#; "bare_quoted_text")]
#[test_case("#!{ a @k=\"v\" }", r#"root{a @k="v"}"#; "attribute")]
#[test_case("#!{ a @k=\"v w\" @x=\"1\" }", r#"root{a @k="v w" @x="1"}"#; "two_attributes")]
#[test_case("#! a{} mid #! b{}", r#"root{a{} "mid " b{}}"#; "two_regions_with_text_between")]
fn g2_structure(input: &str, expected: &str) {
    run_tree_test(input, expected);
}

#[test_case("#!{ fn x<y> -> <z> }", "root{fn{x<y ret<z>>}}"; "arrow_with_generic_block")]
#[test_case("#!{ f -> { x } }", "root{f{ret{x}}}"; "arrow_with_curly_block")]
#[test_case("#!{ f -> (x) }", "root{f{ret(x)}}"; "arrow_with_group_block")]
#[test_case("#!{ f -> x }", "root{f{ret{x}}}"; "arrow_without_block")]
#[test_case("#!{ f -> out { x } }", "root{f{out{x}}}"; "arrow_with_renamed_group")]
#[test_case("#!{ f -> \"value\" }", r#"root{f{ret{"value"}}}"#; "arrow_with_quoted_value")]
#[test_case("#!{ f(a) -> b, g }", "root{f(a ret{b}) g}"; "arrow_then_sibling")]
fn g2_return_arrows(input: &str, expected: &str) {
    run_tree_test(input, expected);
}

#[test_case("#!{ a { // note\n b } }", r#"root{a{#?"note" b}}"#; "comment_between_children")]
#[test_case("#!{ // top\n a }", r#"root{#?"top" a}"#; "comment_before_first_node")]
#[test_case("#!{ a // tail\n }", r#"root{a{#?"tail"}}"#; "comment_attaches_to_open_node")]
fn g2_comments(input: &str, expected: &str) {
    run_tree_test(input, expected);
}

#[test_case("#!{ d # hello\n }", r#"root{d{"hello"}}"#; "plain_text_line")]
#[test_case("#!{ d # hello #b{x}\n }", r#"root{d{"hello " b{"x"}}}"#; "line_with_nested_element")]
#[test_case("#!{ d # text }", r#"root{d{"text "}}"#; "line_closed_by_block_end")]
#[test_case("#!{ ## intro\n target }", r#"root{target{"intro"}}"#; "forwarded_line")]
#[test_case("#!{ ## one\n ## two\n target }", r#"root{target{"one" "two"}}"#; "two_forwarded_lines")]
fn g2_g1_lines(input: &str, expected: &str) {
    run_tree_test(input, expected);
}

#[test_case("#!{ f -> out <x> }", "root{f{out<x>}}"; "renamed_generic_return_group")]
#[test_case("#!{ a { b { c { d } } } }", "root{a{b{c{d}}}}"; "deep_nesting")]
#[test_case("#! a, tail", r#"root{a "tail"}"#; "separator_ends_a_bare_region")]
#[test_case("#! \"done\" tail", r#"root{"done" "tail"}"#; "quoted_text_ends_a_bare_region")]
#[test_case("#!{ a @k=\"ü ß\" }", r#"root{a @k="ü ß"}"#; "multibyte_attribute_value")]
fn g2_edges(input: &str, expected: &str) {
    run_tree_test(input, expected);
}

#[test]
fn block_kinds_survive_into_the_tree() {
    let tree = parse_str("#!{ f<x> g(y) h{z} i }").unwrap();
    let kinds: Vec<_> = tree.children().iter().map(|child| child.block()).collect();
    assert_eq!(
        kinds,
        vec![
            BlockKind::Generic,
            BlockKind::Group,
            BlockKind::Normal,
            BlockKind::None,
        ]
    );
}

#[test]
fn spec_list_example() {
    run_tree_test(
        "#!{ list { item1 key \"value\", @@id=\"1\" item2, item3 @key=\"value\" } }",
        r#"root{list{item1{key{"value"}} item2 @id="1" item3 @key="value"}}"#,
    );
}

#[test]
fn g1_and_g2_spellings_build_equal_trees() {
    run_equivalence_test(
        "#list{#item1{#key{value}} #item2 @id{1}}",
        "#! list { item1 key \"value\", @@id=\"1\" item2 }",
    );
    run_equivalence_test("#a{#b #c}", "#!{ a { b, c } }");
    run_equivalence_test("#a{x y}", "#!{ a \"x y\" }");
}
