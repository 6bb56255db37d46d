use anyhow::{bail, ensure};

/// Parses a CSV recording laid out one sample per row, one channel per
/// column, into `data[channel][sample]`. A non-numeric first row is taken
/// as a header and skipped.
pub fn parse_csv(text: &str) -> anyhow::Result<Vec<Vec<f64>>> {
    let mut columns: Vec<Vec<f64>> = Vec::new();
    for (line_number, line) in text.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let parsed: Result<Vec<f64>, _> = line
            .split(',')
            .map(|cell| cell.trim().parse::<f64>())
            .collect();
        let values = match parsed {
            Ok(values) => values,
            Err(_) if columns.is_empty() && line_number == 0 => continue,
            Err(err) => bail!("line {}: {}", line_number + 1, err),
        };
        if columns.is_empty() {
            columns = vec![Vec::new(); values.len()];
        }
        ensure!(
            values.len() == columns.len(),
            "line {}: expected {} columns, found {}",
            line_number + 1,
            columns.len(),
            values.len()
        );
        for (column, value) in columns.iter_mut().zip(values) {
            column.push(value);
        }
    }
    ensure!(!columns.is_empty(), "CSV contains no samples");
    Ok(columns)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn columns_become_channels() {
        let data = parse_csv("fp1,fp2\n0.1,0.2\n0.3,0.4\n\n0.5,0.6\n").unwrap();
        assert_eq!(data, vec![vec![0.1, 0.3, 0.5], vec![0.2, 0.4, 0.6]]);
    }

    #[test]
    fn ragged_rows_are_rejected() {
        assert!(parse_csv("1,2\n3\n").is_err());
        assert!(parse_csv("a,b\n").is_err());
    }
}
