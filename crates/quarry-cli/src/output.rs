//! Output formatting utilities

use quarry_core::{HierarchyChild, HierarchyNode};
use serde::Serialize;

/// Output format for inspection commands
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Table,
    Json,
}

impl From<&str> for OutputFormat {
    fn from(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "json" => Self::Json,
            _ => Self::Table,
        }
    }
}

/// Pretty JSON for machine-readable output
pub fn json<T: Serialize>(data: &T) -> anyhow::Result<String> {
    Ok(serde_json::to_string_pretty(data)?)
}

/// Left-aligned columns separated by two spaces
pub fn table(headers: &[&str], rows: &[Vec<String>]) -> String {
    let mut widths: Vec<usize> = headers.iter().map(|h| h.len()).collect();
    for row in rows {
        for (i, cell) in row.iter().enumerate() {
            if let Some(width) = widths.get_mut(i) {
                *width = (*width).max(cell.len());
            }
        }
    }

    let render = |cells: Vec<&str>| -> String {
        cells
            .iter()
            .zip(&widths)
            .map(|(cell, width)| format!("{:<width$}", cell, width = *width))
            .collect::<Vec<_>>()
            .join("  ")
            .trim_end()
            .to_string()
    };

    let mut lines = vec![render(headers.to_vec())];
    lines.extend(
        rows.iter()
            .map(|row| render(row.iter().map(String::as_str).collect())),
    );
    lines.join("\n")
}

/// Indented text rendering of a hierarchy
pub fn tree(node: &HierarchyNode) -> String {
    let mut out = node.model.to_string();
    write_children(node, 1, &mut out);
    out
}

fn write_children(node: &HierarchyNode, indent: usize, out: &mut String) {
    let pad = "  ".repeat(indent);
    for (attr, child) in &node.children {
        match child {
            HierarchyChild::Node(child) => {
                out.push_str(&format!("\n{}{} -> {}", pad, attr, child.model));
                write_children(child, indent + 1, out);
            }
            HierarchyChild::Zone(kinds) => {
                out.push_str(&format!("\n{}{} (dynamic zone)", pad, attr));
                for (kind, child) in kinds {
                    out.push_str(&format!("\n{}  {} -> {}", pad, kind, child.model));
                    write_children(child, indent + 2, out);
                }
            }
        }
    }
}
