#![forbid(unsafe_code)]

use crate::CompletionResultSet;

/// Render the result set for the selector: header line first, then one line
/// per candidate, columns left-aligned. Empty cells become `-` so every row
/// splits into the same number of whitespace-separated fields up to the last
/// free-text column.
pub fn format_output(set: &CompletionResultSet) -> String {
    let cell = |s: &str| if s.is_empty() { "-".to_string() } else { s.replace(char::is_whitespace, " ") };
    let header: Vec<String> = set.header.iter().map(|h| cell(h)).collect();
    let rows: Vec<Vec<String>> = set.candidates.iter().map(|c| c.cells.iter().map(|s| cell(s)).collect()).collect();

    let ncols = header.len().max(rows.iter().map(|r| r.len()).max().unwrap_or(0));
    let mut widths = vec![0usize; ncols];
    for row in std::iter::once(&header).chain(rows.iter()) {
        for (i, c) in row.iter().enumerate() {
            widths[i] = widths[i].max(c.chars().count());
        }
    }

    let mut out = String::new();
    for row in std::iter::once(&header).chain(rows.iter()) {
        let mut line = String::new();
        for (i, c) in row.iter().enumerate() {
            line.push_str(c);
            if i + 1 < row.len() {
                let pad = widths[i].saturating_sub(c.chars().count()) + 2;
                line.extend(std::iter::repeat(' ').take(pad));
            }
        }
        out.push_str(line.trim_end());
        out.push('\n');
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Candidate, Target};

    fn cand(cells: &[&str]) -> Candidate {
        Candidate { value: cells[1].to_string(), namespace: Some(cells[0].to_string()), cells: cells.iter().map(|s| s.to_string()).collect() }
    }

    #[test]
    fn aligned_with_header() {
        let set = CompletionResultSet {
            target: Target::Resource,
            kind: Some("pods".into()),
            header: vec!["Namespace".into(), "Name".into(), "Age".into()],
            candidates: vec![cand(&["default", "pod-a", "3m"]), cand(&["kube-system", "coredns-1", ""])],
            query: String::new(),
        };
        let out = format_output(&set);
        let lines: Vec<&str> = out.lines().collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0], "Namespace    Name       Age");
        assert_eq!(lines[1], "default      pod-a      3m");
        assert_eq!(lines[2], "kube-system  coredns-1  -");
    }

    #[test]
    fn spaces_inside_cells_do_not_shift_columns() {
        let set = CompletionResultSet {
            target: Target::Resource,
            kind: Some("cronjobs".into()),
            header: vec!["Namespace".into(), "Name".into(), "Schedule".into()],
            candidates: vec![cand(&["ops", "backup", "*/5\t* * * *"])],
            query: String::new(),
        };
        let out = format_output(&set);
        let row = out.lines().nth(1).unwrap();
        let fields: Vec<&str> = row.split_whitespace().collect();
        assert_eq!(&fields[..2], &["ops", "backup"]);
    }
}
