use ansi_term::Colour;
use std::fmt::Write;
use std::path::Path;

use crate::resolver::Classification;

const BRANCH: &str = "├── ";
const LAST_BRANCH: &str = "└── ";
const PIPE: &str = "│   ";
const SPACE: &str = "    ";

/// Renders the classification as a directory tree rooted at `root`, with
/// labels and file names in lexical order.
pub fn render_tree(root: &Path, classification: &Classification, color: bool) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{}", root.display());

    let labels = classification.to_name_map();
    let label_count = labels.len();
    for (i, (label, names)) in labels.into_iter().enumerate() {
        let last_label = i + 1 == label_count;
        let label = if color {
            Colour::Blue.bold().paint(label).to_string()
        } else {
            label
        };
        let _ = writeln!(
            out,
            "{}{}",
            if last_label { LAST_BRANCH } else { BRANCH },
            label
        );

        let indent = if last_label { SPACE } else { PIPE };
        let name_count = names.len();
        for (j, name) in names.into_iter().enumerate() {
            let connector = if j + 1 == name_count {
                LAST_BRANCH
            } else {
                BRANCH
            };
            let _ = writeln!(out, "{}{}{}", indent, connector, name);
        }
    }
    out
}
