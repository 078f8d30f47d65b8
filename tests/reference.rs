//! Compares the streaming splitter against a straightforward tree walk over
//! randomly generated documents, and re-parses every emitted fragment.

use std::io::Cursor;

use rand::{rngs::StdRng, Rng, SeedableRng};
use regex::Regex;
use xmlchunk::{Mode, Selector, SelectorSplitter, XmlName};

const NAMES: &[&str] = &["item", "entry", "data", "rec", "leaf"];

struct Node {
    name: XmlName,
    id: usize,
    children: Vec<Node>,
}

/// Generate a random element tree and its serialized form in one pass
fn gen_node(rng: &mut StdRng, next_id: &mut usize, depth: usize, xml: &mut String) -> Node {
    let local = NAMES[rng.gen_range(0..NAMES.len())];
    let id = *next_id;
    *next_id += 1;

    let n_children = if depth >= 4 { 0 } else { rng.gen_range(0..=3) };
    let mut children = Vec::new();

    xml.push_str(&format!("<{local} id=\"{id}\""));
    if rng.gen_bool(0.2) {
        xml.push_str(" kind=\"x\"");
    }
    if n_children == 0 && rng.gen_bool(0.5) {
        xml.push_str("/>");
    } else {
        xml.push('>');
        for _ in 0..n_children {
            if rng.gen_bool(0.3) {
                xml.push_str("pad ");
            }
            children.push(gen_node(rng, next_id, depth + 1, xml));
        }
        if rng.gen_bool(0.3) {
            xml.push_str("tail");
        }
        xml.push_str(&format!("</{local}>"));
    }

    Node {
        name: XmlName {
            namespace: String::new(),
            local: local.to_string(),
            prefix: None,
        },
        id,
        children,
    }
}

/// Reference implementation of the selector semantics: a recursive walk
/// that never descends into a matched subtree
fn collect_matches(selector: &Selector, node: &Node, index: usize, out: &mut Vec<usize>) {
    let descendant = selector.is_descendant_axis(index);
    let effective = index + usize::from(descendant);
    let matched = selector
        .entry(effective)
        .map_or(false, |m| m.matches(&node.name));

    if matched && effective + 1 == selector.len() {
        out.push(node.id);
        return;
    }
    if matched {
        for child in &node.children {
            collect_matches(selector, child, effective + 1, out);
        }
    } else if descendant {
        for child in &node.children {
            collect_matches(selector, child, index, out);
        }
    }
}

/// Parse a fragment standalone and assert it contains exactly one
/// root-level element
fn assert_reparses(fragment: &str) {
    let mut reader = quick_xml::Reader::from_str(fragment);
    let mut buf = Vec::new();
    let mut depth = 0usize;
    let mut roots = 0usize;
    loop {
        match reader.read_event_into(&mut buf).unwrap_or_else(|e| {
            panic!("fragment does not re-parse: {e}\nfragment: {fragment}")
        }) {
            quick_xml::events::Event::Start(_) => {
                if depth == 0 {
                    roots += 1;
                }
                depth += 1;
            }
            quick_xml::events::Event::Empty(_) => {
                if depth == 0 {
                    roots += 1;
                }
            }
            quick_xml::events::Event::End(_) => depth -= 1,
            quick_xml::events::Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }
    assert_eq!(depth, 0, "unbalanced fragment: {fragment}");
    assert_eq!(roots, 1, "fragment must have exactly one root: {fragment}");
}

#[test]
fn matches_reference_walk() {
    let id_re = Regex::new(r#"id="(\d+)""#).unwrap();

    for seed in 0..30u64 {
        let mut rng = StdRng::seed_from_u64(seed);
        let mut xml = String::new();
        let mut next_id = 0;
        let root = gen_node(&mut rng, &mut next_id, 0, &mut xml);

        let mut paths = Vec::new();
        for name in NAMES {
            paths.push(format!("/{name}"));
            paths.push(format!("//{name}"));
            paths.push(format!("/{}/{name}", root.name.local));
            paths.push(format!("/{}//{name}", root.name.local));
        }
        paths.push("/*".to_string());
        paths.push("//*".to_string());
        paths.push("//it?m".to_string());
        paths.push("//e*".to_string());

        for path in &paths {
            let selector = Selector::parse(path, None).unwrap();

            let mut expected = Vec::new();
            collect_matches(&selector, &root, 0, &mut expected);

            let splitter = SelectorSplitter::new(
                selector.clone(),
                Mode::Inject,
                Cursor::new(xml.clone()),
            )
            .unwrap();
            let fragments = splitter
                .collect::<Result<Vec<_>, _>>()
                .unwrap_or_else(|e| panic!("seed {seed}, path {path}: {e}"));

            // every fragment is standalone, and the matched ids come out in
            // document order, exactly as the tree walk finds them
            let mut actual = Vec::new();
            for fragment in &fragments {
                assert_reparses(fragment);
                let id = id_re
                    .captures(fragment)
                    .unwrap_or_else(|| panic!("no id in fragment: {fragment}"))[1]
                    .parse::<usize>()
                    .unwrap();
                actual.push(id);
            }
            assert_eq!(
                actual, expected,
                "seed {seed}, path {path}, document: {xml}"
            );

            // wrap mode yields the same matches, wrapped
            let splitter =
                SelectorSplitter::new(selector, Mode::Wrap, Cursor::new(xml.clone())).unwrap();
            let wrapped = splitter.collect::<Result<Vec<_>, _>>().unwrap();
            assert_eq!(wrapped.len(), fragments.len());
            for fragment in &wrapped {
                assert_reparses(fragment);
            }
        }
    }
}
