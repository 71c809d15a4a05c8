//! Shared helpers for the integration tests.

use dyml::{encode_str, parse_str, TreeNode};

#[allow(unused)]
pub fn parse(input: &str) -> TreeNode {
    parse_str(input).expect("input parses cleanly")
}

/// Test that the input parses into the given canonical tree form.
#[allow(unused)]
pub fn run_tree_test(input: &str, expected: &str) {
    let tree = parse(input);
    assert_eq!(expected, tree.to_string(), "tree mismatch for {input:?}");
}

/// Test that the input transcodes into exactly the given XML.
#[allow(unused)]
pub fn run_xml_test(input: &str, expected: &str) {
    let xml = encode_str(input).expect("input transcodes cleanly");
    assert_eq!(expected, xml, "xml mismatch for {input:?}");
}

/// Test that parsing fails and that the message mentions `fragment`.
#[allow(unused)]
pub fn run_error_test(input: &str, fragment: &str) {
    let err = parse_str(input).expect_err("input must be rejected");
    let message = err.to_string();
    assert!(
        message.contains(fragment),
        "error {message:?} for {input:?} does not mention {fragment:?}"
    );
}

/// Test that a G1 and a G2 spelling produce equal trees and equal XML.
#[allow(unused)]
pub fn run_equivalence_test(g1: &str, g2: &str) {
    assert_eq!(
        parse(g1).to_string(),
        parse(g2).to_string(),
        "trees differ between {g1:?} and {g2:?}"
    );
    assert_eq!(
        encode_str(g1).expect("g1 transcodes cleanly"),
        encode_str(g2).expect("g2 transcodes cleanly"),
        "xml differs between {g1:?} and {g2:?}"
    );
}

/// A just-big-enough XML reader for the subset the encoder emits: nested
/// elements with attributes, text with the four canonical entities, and
/// comments. Used to prove the output survives a structural round trip.
#[allow(unused)]
pub mod minidom {
    #[derive(Clone, Debug, PartialEq, Eq)]
    pub enum Node {
        Text(String),
        Comment(String),
        Element {
            name: String,
            attributes: Vec<(String, String)>,
            children: Vec<Node>,
        },
    }

    struct Cursor<'a> {
        text: &'a str,
        pos: usize,
    }

    impl<'a> Cursor<'a> {
        fn rest(&self) -> &'a str {
            &self.text[self.pos..]
        }

        fn eat(&mut self, prefix: &str) -> bool {
            if self.rest().starts_with(prefix) {
                self.pos += prefix.len();
                true
            } else {
                false
            }
        }

        fn take_name(&mut self) -> &'a str {
            let rest = self.rest();
            let end = rest
                .find(|ch: char| !ch.is_ascii_alphanumeric() && ch != '_')
                .unwrap_or(rest.len());
            self.pos += end;
            &rest[..end]
        }

        /// Everything up to `stop`, consuming the terminator as well.
        fn take_until(&mut self, stop: &str) -> &'a str {
            let rest = self.rest();
            let end = rest.find(stop).expect("terminator present");
            self.pos += end + stop.len();
            &rest[..end]
        }

        fn skip_spaces(&mut self) {
            while self.rest().starts_with(' ') {
                self.pos += 1;
            }
        }
    }

    pub fn parse(input: &str) -> Node {
        let mut cursor = Cursor {
            text: input,
            pos: 0,
        };
        let node = parse_element(&mut cursor);
        assert!(
            cursor.rest().is_empty(),
            "trailing content after the document element: {:?}",
            cursor.rest()
        );
        node
    }

    fn parse_element(cursor: &mut Cursor) -> Node {
        assert!(cursor.eat("<"), "expected a start tag at {:?}", cursor.rest());
        let name = cursor.take_name().to_string();
        let mut attributes = vec![];
        loop {
            cursor.skip_spaces();
            if cursor.eat(">") {
                break;
            }
            let key = cursor.take_name().to_string();
            assert!(cursor.eat("=\""), "malformed attribute after {key:?}");
            let value = unescape(cursor.take_until("\""));
            attributes.push((key, value));
        }

        let mut children = vec![];
        loop {
            if cursor.rest().starts_with("</") {
                break;
            }
            if cursor.eat("<!--") {
                children.push(Node::Comment(unescape(cursor.take_until("-->"))));
            } else if cursor.rest().starts_with('<') {
                children.push(parse_element(cursor));
            } else {
                let rest = cursor.rest();
                let end = rest.find('<').expect("an end tag follows text");
                cursor.pos += end;
                children.push(Node::Text(unescape(&rest[..end])));
            }
        }
        assert!(cursor.eat("</"));
        let close_name = cursor.take_name();
        assert_eq!(name, close_name, "mismatched end tag");
        assert!(cursor.eat(">"));

        Node::Element {
            name,
            attributes,
            children,
        }
    }

    pub fn serialize(node: &Node) -> String {
        let mut out = String::new();
        write_node(node, &mut out);
        out
    }

    fn write_node(node: &Node, out: &mut String) {
        match node {
            Node::Text(text) => out.push_str(&escape(text)),
            Node::Comment(text) => {
                out.push_str("<!--");
                out.push_str(&escape(text));
                out.push_str("-->");
            }
            Node::Element {
                name,
                attributes,
                children,
            } => {
                out.push('<');
                out.push_str(name);
                for (key, value) in attributes {
                    out.push(' ');
                    out.push_str(key);
                    out.push_str("=\"");
                    out.push_str(&escape(value));
                    out.push('"');
                }
                out.push('>');
                for child in children {
                    write_node(child, out);
                }
                out.push_str("</");
                out.push_str(name);
                out.push('>');
            }
        }
    }

    fn unescape(text: &str) -> String {
        text.replace("&lt;", "<")
            .replace("&gt;", ">")
            .replace("&quot;", "\"")
            .replace("&amp;", "&")
    }

    fn escape(text: &str) -> String {
        text.replace('&', "&amp;")
            .replace('<', "&lt;")
            .replace('>', "&gt;")
            .replace('"', "&quot;")
    }
}
