#![forbid(unsafe_code)]

use kubefzf_complete::render_age;
use kubefzf_persist::KindStats;

/// One line per cached kind, for the `stats` command.
pub fn render_stats(stats: &[KindStats], now: i64) -> String {
    if stats.is_empty() {
        return "no cached kinds\n".to_string();
    }
    let mut out = format!(
        "{:<24} {:>8} {:>6} {:>10} {:>8} {:>8} {:>6}\n",
        "KIND", "OBJECTS", "NS", "BYTES", "FETCHED", "USED", "HITS"
    );
    for s in stats {
        let ns = if s.namespaced { s.namespaces.to_string() } else { "-".to_string() };
        let used = if s.last_access > 0 { render_age(s.last_access, now) } else { "never".to_string() };
        out.push_str(&format!(
            "{:<24} {:>8} {:>6} {:>10} {:>8} {:>8} {:>6}\n",
            s.kind,
            s.objects,
            ns,
            s.payload_bytes,
            render_age(s.fetched_at, now),
            used,
            s.completions
        ));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_rows() {
        let stats = vec![KindStats {
            kind: "pods".into(),
            namespaced: true,
            objects: 3,
            namespaces: 2,
            payload_bytes: 512,
            resource_version: Some("42".into()),
            fetched_at: 940,
            last_access: 0,
            completions: 0,
        }];
        let out = render_stats(&stats, 1000);
        let lines: Vec<&str> = out.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].starts_with("KIND"));
        let fields: Vec<&str> = lines[1].split_whitespace().collect();
        assert_eq!(fields, vec!["pods", "3", "2", "512", "1m", "never", "0"]);
        assert_eq!(render_stats(&[], 0), "no cached kinds\n");
    }
}
