// core/src/gpu/parser.rs
use crate::error::ParseError;
use crate::utils::models::{GpuRecord, ThresholdConfig};
use std::str::FromStr;

const FIELD_NAMES: [&str; 4] = ["index", "utilization.gpu", "memory.used", "memory.total"];

fn number<T: FromStr>(line_no: usize, field: usize, value: &str) -> Result<T, ParseError> {
    value.parse::<T>().map_err(|_| ParseError::InvalidNumber {
        line_no,
        field: FIELD_NAMES[field],
        value: value.to_string(),
    })
}

fn parse_line(line_no: usize, line: &str, thresholds: &ThresholdConfig) -> Result<GpuRecord, ParseError> {
    let fields: Vec<&str> = line.split(',').map(str::trim).collect();
    if fields.len() != FIELD_NAMES.len() {
        return Err(ParseError::FieldCount {
            line_no,
            line: line.to_string(),
            found: fields.len(),
        });
    }

    let index: u32 = number(line_no, 0, fields[0])?;
    let utilization_pct: u32 = number(line_no, 1, fields[1])?;
    let memory_used_mb: u64 = number(line_no, 2, fields[2])?;
    let memory_total_mb: u64 = number(line_no, 3, fields[3])?;

    if utilization_pct > 100 {
        return Err(ParseError::UtilizationOutOfRange {
            line_no,
            value: utilization_pct,
        });
    }

    Ok(GpuRecord {
        index,
        utilization_pct,
        memory_used_mb,
        memory_total_mb,
        is_idle: thresholds.is_idle(utilization_pct, memory_used_mb),
    })
}

/// Turns `index, util, used, total` rows into classified records.
///
/// Blank lines are skipped. Any malformed line fails the whole batch: a
/// partial list could report a busy GPU as idle (or hide an idle one).
pub fn parse_and_classify(raw: &str, thresholds: &ThresholdConfig) -> Result<Vec<GpuRecord>, ParseError> {
    raw.lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(i, line)| parse_line(i + 1, line, thresholds))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn th() -> ThresholdConfig {
        ThresholdConfig::new(5, 500).unwrap()
    }

    #[test]
    fn classifies_reference_lines() {
        let gpus = parse_and_classify("0, 3, 120, 8192\n1, 10, 50, 8192\n", &th()).unwrap();
        assert_eq!(
            gpus,
            vec![
                GpuRecord {
                    index: 0,
                    utilization_pct: 3,
                    memory_used_mb: 120,
                    memory_total_mb: 8192,
                    is_idle: true,
                },
                GpuRecord {
                    index: 1,
                    utilization_pct: 10,
                    memory_used_mb: 50,
                    memory_total_mb: 8192,
                    is_idle: false,
                },
            ]
        );
    }

    #[test]
    fn parsing_twice_gives_identical_records() {
        let raw = "0, 0, 0, 24576\n1, 97, 20480, 24576\n2, 5, 500, 24576\n";
        assert_eq!(parse_and_classify(raw, &th()), parse_and_classify(raw, &th()));
    }

    #[test]
    fn empty_and_blank_output_yields_no_gpus() {
        assert!(parse_and_classify("", &th()).unwrap().is_empty());
        assert!(parse_and_classify("\n  \n", &th()).unwrap().is_empty());
    }

    #[test]
    fn tolerates_missing_spaces_and_crlf() {
        let gpus = parse_and_classify("0,3,120,8192\r\n", &th()).unwrap();
        assert_eq!(gpus.len(), 1);
        assert!(gpus[0].is_idle);
    }

    #[test]
    fn two_fields_fail_the_whole_parse() {
        let err = parse_and_classify("0, 3, 120, 8192\n1, 10\n", &th()).unwrap_err();
        assert_eq!(
            err,
            ParseError::FieldCount {
                line_no: 2,
                line: "1, 10".to_string(),
                found: 2,
            }
        );
    }

    #[test]
    fn not_supported_value_is_invalid_number() {
        let err = parse_and_classify("0, [N/A], 120, 8192\n", &th()).unwrap_err();
        assert_eq!(
            err,
            ParseError::InvalidNumber {
                line_no: 1,
                field: "utilization.gpu",
                value: "[N/A]".to_string(),
            }
        );
    }

    #[test]
    fn negative_memory_is_invalid_number() {
        let err = parse_and_classify("0, 3, -1, 8192", &th()).unwrap_err();
        assert!(matches!(err, ParseError::InvalidNumber { field: "memory.used", .. }));
    }

    #[test]
    fn utilization_over_100_is_rejected() {
        let err = parse_and_classify("3, 101, 0, 8192", &th()).unwrap_err();
        assert_eq!(err, ParseError::UtilizationOutOfRange { line_no: 1, value: 101 });
    }

    #[test]
    fn line_numbers_count_skipped_blank_lines() {
        let err = parse_and_classify("0, 3, 120, 8192\n\nbogus\n", &th()).unwrap_err();
        assert!(matches!(err, ParseError::FieldCount { line_no: 3, found: 1, .. }));
    }
}
