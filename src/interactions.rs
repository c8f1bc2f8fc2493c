//! Condenses a PLIP text report into the contact tables fed to the prompt.
//!
//! Only hydrophobic contacts, hydrogen bonds and pi-stacking are kept, each
//! reduced to a fixed column subset. Rows from every binding site are merged
//! per interaction type.

use regex::Regex;
use std::sync::OnceLock;

struct Section {
    key: &'static str,
    heading: &'static str,
    columns: &'static [&'static str],
}

const SECTIONS: [Section; 3] = [
    Section {
        key: "hydrophobic",
        heading: "Hydrophobic Interactions",
        columns: &["RESTYPE", "RESCHAIN", "RESCHAIN_LIG", "DIST", "LIGCOO", "PROTCOO"],
    },
    Section {
        key: "hbond",
        heading: "Hydrogen Bonds",
        columns: &[
            "RESTYPE",
            "RESCHAIN",
            "RESTYPE_LIG",
            "PROTCOO",
            "LIGCOO",
            "DIST_H-A",
            "DIST_D-A",
            "DON_ANGLE",
            "DONORTYPE",
            "ACCEPTORTYPE",
        ],
    },
    Section {
        key: "pistacking",
        heading: "pi-Stacking",
        columns: &[
            "RESTYPE",
            "RESCHAIN",
            "RESTYPE_LIG",
            "CENTDIST",
            "ANGLE",
            "OFFSET",
            "PROTCOO",
            "LIGCOO",
        ],
    },
];

fn spaces() -> &'static Regex {
    static SPACES: OnceLock<Regex> = OnceLock::new();
    SPACES.get_or_init(|| Regex::new(r" +").expect("static regex"))
}

fn table_cells(line: &str) -> Vec<String> {
    let trimmed = line.trim();
    let inner = trimmed
        .strip_prefix('|')
        .and_then(|s| s.strip_suffix('|'))
        .unwrap_or(trimmed);
    inner.split('|').map(|cell| cell.trim().to_string()).collect()
}

pub fn summarize_report(report: &str) -> String {
    let mut rows: Vec<Vec<Vec<String>>> = vec![Vec::new(); SECTIONS.len()];
    let mut current: Option<usize> = None;
    let mut header: Option<Vec<String>> = None;

    for line in report.lines() {
        let trimmed = line.trim();
        if let Some(title) = trimmed.strip_prefix("**").and_then(|s| s.strip_suffix("**")) {
            current = SECTIONS.iter().position(|s| s.heading == title);
            header = None;
            continue;
        }
        let Some(idx) = current else {
            continue;
        };
        if !trimmed.starts_with('|') {
            continue;
        }
        let cells = table_cells(trimmed);
        let Some(names) = header.as_ref() else {
            header = Some(cells);
            continue;
        };
        let selected = SECTIONS[idx]
            .columns
            .iter()
            .map(|col| {
                names
                    .iter()
                    .position(|n| n == col)
                    .and_then(|i| cells.get(i).cloned())
                    .unwrap_or_default()
            })
            .collect();
        rows[idx].push(selected);
    }

    let mut out = String::new();
    for (section, section_rows) in SECTIONS.iter().zip(rows) {
        if section_rows.is_empty() {
            continue;
        }
        out.push_str(&format!("\"\"\"{}\"\"\":\n", section.key));
        out.push_str(&section.columns.join(" "));
        out.push('\n');
        for row in section_rows {
            out.push_str(&spaces().replace_all(&row.join(" "), " "));
            out.push('\n');
        }
    }
    out
}
