use crate::report::Report;

/// Comma-joined cells, newline-joined lines.
pub fn serialize_report(report: &Report) -> String {
    report
        .lines
        .iter()
        .map(|line| line.cells().join(","))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Split report text back into cell rows, the shape written to the sheet.
pub fn parse_rows(text: &str) -> Vec<Vec<String>> {
    text.trim()
        .split('\n')
        .map(|line| line.split(',').map(str::to_string).collect())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_rows_trims_surrounding_whitespace() {
        let rows = parse_rows("a,b\nc,\n");
        assert_eq!(
            rows,
            vec![
                vec!["a".to_string(), "b".to_string()],
                vec!["c".to_string(), String::new()]
            ]
        );
    }
}
