//! Tests for the streaming XML encoder: lazy opening tags, escaping,
//! `_groupType` shape markers, comments, and forwarded-node splicing.

use dyml::{encode_str, parse_str, Visitable, XmlEncoder};
use test_case::test_case;

use harness::run_xml_test;

mod harness;

#[test_case("", "<root></root>"; "empty_document")]
#[test_case("hello", "<root>hello</root>"; "plain_text")]
#[test_case("hello #item{world}", "<root>hello <item>world</item></root>"; "text_and_element")]
#[test_case("#a", "<root><a></a></root>"; "empty_element")]
#[test_case("#item @id{1} @name{x} value", "<root><item id=\"1\" name=\"x\">value</item></root>"; "attributes_in_the_opening_tag")]
#[test_case("#? note\n", "<root><!--note--></root>"; "comment")]
#[test_case("##a #b", "<root><b><a></a></b></root>"; "forwarded_node_spliced")]
#[test_case("@@k{v} #b", "<root><b k=\"v\"></b></root>"; "forwarded_attribute")]
#[test_case("#!{ f(x) }", "<root><f _groupType=\"()\"><x></x></f></root>"; "group_shape_marker")]
#[test_case("#!{ f<x> }", "<root><f _groupType=\"&lt;&gt;\"><x></x></f></root>"; "generic_shape_marker")]
#[test_case("#!{ f{x} }", "<root><f><x></x></f></root>"; "normal_blocks_have_no_marker")]
fn xml_output(input: &str, expected: &str) {
    run_xml_test(input, expected);
}

#[test]
fn markup_characters_in_text_are_escaped() {
    run_xml_test(
        "<tag></tag>&\"hi\"",
        "<root>&lt;tag&gt;&lt;/tag&gt;&amp;&quot;hi&quot;</root>",
    );
}

#[test]
fn markup_characters_in_attribute_values_are_escaped() {
    run_xml_test("#a @k{v<&\"w}", "<root><a k=\"v&lt;&amp;&quot;w\"></a></root>");
}

#[test]
fn group_type_markers_can_be_disabled() {
    let mut out = Vec::new();
    let mut encoder = XmlEncoder::new(&mut out).with_group_types(false);
    dyml::visit("#!{ f(x) }".as_bytes(), &mut encoder).unwrap();
    drop(encoder);
    assert_eq!(String::from_utf8(out).unwrap(), "<root><f><x></x></f></root>");
}

#[test]
fn forwarded_subtrees_keep_their_attributes_and_shape() {
    run_xml_test(
        "#!{ ## #a @k{v}\n b }",
        "<root><b><a k=\"v\"></a></b></root>",
    );
}

#[test]
fn replaying_a_parsed_tree_matches_direct_encoding() {
    for input in [
        "hello #item{world}",
        "#!{ list { item1 key \"value\", @@id=\"1\" item2 } }",
        "#!{ fn x<y> -> <z> }",
        "##a #b @@k{v} #c",
        "#? note\nplain",
    ] {
        let direct = encode_str(input).unwrap();

        let tree = parse_str(input).unwrap();
        let mut out = Vec::new();
        let mut encoder = XmlEncoder::new(&mut out);
        tree.replay(&mut encoder).unwrap();
        encoder.finalize().unwrap();
        drop(encoder);
        let replayed = String::from_utf8(out).unwrap();

        assert_eq!(direct, replayed, "divergence for {input:?}");
    }
}
