//! Tree rendering for decoded structures

use anyhow::Result;
use colored::{ColoredString, Colorize};
use ptree::TreeBuilder;

#[derive(Debug, Clone, Copy)]
pub struct ColorScheme {
    pub enabled: bool,
}

impl Default for ColorScheme {
    fn default() -> Self {
        ColorScheme { enabled: true }
    }
}

impl ColorScheme {
    pub fn no_color() -> Self {
        ColorScheme { enabled: false }
    }

    fn paint(&self, text: &str, color: fn(&str) -> ColoredString) -> String {
        if self.enabled {
            color(text).to_string()
        } else {
            text.to_string()
        }
    }

    pub fn label(&self, text: &str) -> String {
        self.paint(text, |s| s.bold())
    }

    pub fn value(&self, text: &str) -> String {
        self.paint(text, |s| s.green())
    }

    pub fn warn(&self, text: &str) -> String {
        self.paint(text, |s| s.yellow())
    }
}

/// A labelled node with an optional value and children
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Node {
    pub label: String,
    pub value: Option<String>,
    pub children: Vec<Node>,
}

impl Node {
    pub fn new(label: impl Into<String>) -> Self {
        Node {
            label: label.into(),
            value: None,
            children: Vec::new(),
        }
    }

    pub fn leaf(label: impl Into<String>, value: impl Into<String>) -> Self {
        Node {
            label: label.into(),
            value: Some(value.into()),
            children: Vec::new(),
        }
    }

    pub fn with_child(mut self, child: Node) -> Self {
        self.children.push(child);
        self
    }

    pub fn add_child(&mut self, child: Node) {
        self.children.push(child);
    }

    fn text(&self, scheme: &ColorScheme) -> String {
        match &self.value {
            Some(value) => format!("{}: {}", scheme.label(&self.label), scheme.value(value)),
            None => scheme.label(&self.label),
        }
    }
}

fn build(builder: &mut TreeBuilder, node: &Node, scheme: &ColorScheme) {
    for child in &node.children {
        if child.children.is_empty() {
            builder.add_empty_child(child.text(scheme));
        } else {
            builder.begin_child(child.text(scheme));
            build(builder, child, scheme);
            builder.end_child();
        }
    }
}

pub fn render_tree_with_scheme(node: &Node, scheme: &ColorScheme) -> Result<()> {
    let mut builder = TreeBuilder::new(node.text(scheme));
    build(&mut builder, node, scheme);
    ptree::print_tree(&builder.build())?;
    Ok(())
}
