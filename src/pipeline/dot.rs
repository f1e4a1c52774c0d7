//! Graphviz dot export of filter graphs.

use crate::pipeline::graph::FilterGraph;
use crate::pipeline::node::FilterNode;
use std::fmt::Write;

const HEADER: &str = "digraph G {\n\
bgcolor=\"transparent\"\n  \
rankdir=LR\n  \
graph [fontname=Helvetica, fontsize=12];\n  \
node [shape=record, fontname=Helvetica, fontsize=10, style=\"filled,rounded\"];\n  \
edge [fontname=Helvetica, fontsize=10];\n\
\n";

const CONVERSION_TABLE: &str = "  conversion [shape=plaintext, label=<\n\
<table border=\"0\" cellborder=\"1\" cellspacing=\"0\">\n  \
<tr><td>Conversion</td></tr>\n  \
<tr><td>\n     \
<table border=\"0\" cellborder=\"0\" align=\"left\">\n       \
<tr><td align=\"left\">...</td></tr>\n       \
<tr><td align=\"left\" port=\"in\">+input</td></tr>\n       \
<tr><td align=\"left\" port=\"out\">+output</td></tr>\n       \
<tr><td align=\"left\">...</td></tr>\n     \
</table>\n     \
</td></tr>\n  \
<tr><td> </td></tr>\n\
</table>>,\n                    \
style=\"\", color=black];\n";

/// Escape text for a double quoted record label.
fn escape_label(text: &str) -> String {
    text.trim_end_matches('\n')
        .replace('\\', "\\\\")
        .replace('"', "\\\"")
        .replace('\n', "\\n")
}

/// Record column of indexed ports, each labelled with its edge count.
fn port_column(prefix: &str, edges: impl Iterator<Item = usize>) -> String {
    let fields: Vec<String> = edges
        .enumerate()
        .map(|(index, count)| format!("<{prefix}{index}> {count}"))
        .collect();
    if fields.is_empty() {
        " ".to_string()
    } else {
        format!("{{{}}}", fields.join("|"))
    }
}

fn node_record(node: &FilterNode) -> String {
    let registration = node.registration();
    let cmm = registration.rsplit('/').next().unwrap_or(registration);
    let context = node.context();
    let (kind, size) = context
        .as_ref()
        .map_or((node.core().context_type(), 0), |c| (c.kind(), c.size()));

    format!(
        "  {id} [ label=\"{{{plugs}| Filter Node {id}\\n Category: \\\"{category}\\\"\\n CMM: \\\"{cmm}\\\"\\n Type: \\\"{registration}\\\"\\n ResourceType: \\\"{kind}\\\" {size}\\n Options: \\\"{options}\\\"|{sockets}}}\"];\n",
        id = node.id(),
        plugs = port_column(
            "plug",
            node.plugs().iter().map(|p| usize::from(p.remote().is_some()))
        ),
        sockets = port_column(
            "socket",
            node.sockets().iter().map(|s| s.requesting_plugs().len())
        ),
        category = escape_label(node.core().category()),
        cmm = escape_label(cmm),
        registration = escape_label(registration),
        kind = escape_label(kind),
        size = size,
        options = escape_label(&node.options().to_text()),
    )
}

/// Render `graph` as dot text.
///
/// The `conversion` table node and its `in`/`out` edges are only emitted
/// when both `input` and `output` are given.
pub fn to_text(
    graph: &FilterGraph,
    input: Option<&FilterNode>,
    output: Option<&FilterNode>,
    head_line: &str,
) -> String {
    let ends = input.zip(output);
    let mut text = String::from(HEADER);

    if ends.is_some() {
        text.push_str(CONVERSION_TABLE);
    }
    text.push('\n');

    for node in graph.nodes() {
        text.push_str(&node_record(node));
    }

    text.push_str("\n  subgraph cluster_0 {\n");
    let _ = writeln!(text, "    label=\"{}\"", escape_label(head_line));
    text.push_str("    color=gray;\n\n");

    for edge in graph.edges() {
        let _ = writeln!(
            text,
            "    {}:socket{} -> {}:plug{} [arrowhead=crow, arrowtail=box];",
            edge.producer().id(),
            edge.socket.index(),
            edge.consumer().id(),
            edge.plug.index()
        );
    }
    text.push('\n');

    if let Some((input, output)) = ends {
        let _ = writeln!(
            text,
            "    conversion:in -> {} [arrowhead=none, arrowtail=normal];",
            input.id()
        );
        let _ = writeln!(text, "    conversion:out -> {};", output.id());
    }
    text.push_str("  }\n\n");

    if ends.is_some() {
        text.push_str("  conversion\n");
    }
    text.push_str("}\n\n");
    text
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::graph::Traversal;
    use crate::connector::Connector;
    use crate::pipeline::core::FilterCore;
    use crate::pipeline::test_util::{chain, node};
    use crate::registry::{BackendTag, ModuleDescriptor};
    use std::rc::Rc;

    #[test]
    fn test_header_and_edges() {
        let nodes = chain(&["root", "copy", "output"]);
        let graph = FilterGraph::from_node(&nodes[2], Traversal::Both);
        let text = to_text(&graph, None, None, "Graph");

        assert!(text.starts_with("digraph G {\nbgcolor=\"transparent\"\n  rankdir=LR\n"));
        assert!(text.contains("  subgraph cluster_0 {\n    label=\"Graph\"\n    color=gray;\n"));
        assert!(text.contains(&format!(
            "    {}:socket0 -> {}:plug0 [arrowhead=crow, arrowtail=box];\n",
            nodes[0].id(),
            nodes[1].id()
        )));
        assert!(!text.contains("conversion"));
        assert!(text.ends_with("  }\n\n}\n\n"));
    }

    #[test]
    fn test_node_record_fields() {
        let nodes = chain(&["root", "copy"]);
        let graph = FilterGraph::from_node(&nodes[1], Traversal::Both);
        let text = to_text(&graph, None, None, "");
        let id = nodes[1].id();

        let line = text
            .lines()
            .find(|l| l.starts_with(&format!("  {} [ label=", id)))
            .unwrap();
        assert!(line.contains("{{<plug0> 1}| Filter Node"));
        assert!(line.contains(r#"CMM: \"copy\""#));
        assert!(line.contains(r#"Type: \"org/colorpipe/imaging/copy\""#));
        assert!(line.ends_with("|{<socket0> 0}}\"];"));

        let root_line = text
            .lines()
            .find(|l| l.starts_with(&format!("  {} [ label=", nodes[0].id())))
            .unwrap();
        assert!(root_line.contains("{ | Filter Node"));
        assert!(root_line.ends_with("|{<socket0> 1}}\"];"));
    }

    #[test]
    fn test_conversion_table_needs_both_ends() {
        let nodes = chain(&["root", "output"]);
        let graph = FilterGraph::from_node(&nodes[1], Traversal::Both);

        let text = to_text(&graph, Some(&nodes[0]), Some(&nodes[1]), "Conversion");
        assert!(text.contains("port=\"in\">+input"));
        assert!(text.contains(&format!(
            "    conversion:in -> {} [arrowhead=none, arrowtail=normal];\n",
            nodes[0].id()
        )));
        assert!(text.contains(&format!("    conversion:out -> {};\n", nodes[1].id())));
        assert!(text.ends_with("  conversion\n}\n\n"));

        let half = to_text(&graph, Some(&nodes[0]), None, "Conversion");
        assert!(!half.contains("conversion"));
    }

    #[test]
    fn test_edges_name_their_ports() {
        let root = node("root");
        let descriptor = ModuleDescriptor::new(BackendTag::CORE, "org/colorpipe/imaging/blend")
            .with_plug(Connector::plug("data"))
            .with_plug(Connector::plug("data"));
        let blend = FilterNode::new(FilterCore::new(Rc::new(descriptor), None));
        let socket = root.socket(0).unwrap();
        for plug in blend.plugs() {
            plug.connect_into_socket(&socket).unwrap();
        }

        let graph = FilterGraph::from_node(&blend, Traversal::Both);
        let text = to_text(&graph, None, None, "");
        for index in 0..2 {
            let edge = format!("    {}:socket0 -> {}:plug{} ", root.id(), blend.id(), index);
            assert_eq!(text.matches(&edge).count(), 1);
        }
        assert!(text.contains("{{<plug0> 1|<plug1> 1}| Filter Node"));
        assert!(text.contains("|{<socket0> 2}}\"];"));
    }

    #[test]
    fn test_escape_label() {
        assert_eq!(escape_label("a: \"b\"\nc: 1\n"), "a: \\\"b\\\"\\nc: 1");
    }
}
