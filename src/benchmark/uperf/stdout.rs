//! Section-aware decoder for uperf's console output
//!
//! uperf has no machine-readable output mode, so the decoder walks the
//! transcript line by line and recognises sections by their titles:
//!
//! ```text
//! Group Details                          <- title
//! ------------------------------------   <- divider
//! Group0     6.61GB /  31.23(s) = ...    <- rows
//!                                        <- blank line ends the section
//! ```
//!
//! Single transaction lines (`Txn2 ...`, `Total ...`, `timestamp_ms:...`) may
//! appear outside any section. Everything else is kept verbatim as extra output.

use super::classify::{
    is_raw_details, is_run_diff, parse_averages_stat, parse_details_stat,
    parse_details_stat_computed, parse_details_stat_raw, parse_netstat_stat, parse_run_stat,
    parse_run_stat_diff,
};
use super::document::ResultDocument;
use super::error::StdoutError;
use super::stats::SectionKind;
use std::borrow::Cow;
use tracing::{debug, trace};

const DIVIDER_PREFIX: &str = "---";
const NETSTAT_COLUMNS: &str = "Nicopkts/s";
const RUN_COLUMNS: &str = "HostnameTime";

/// Replace `\r\n` and lone `\r` line endings with `\n`
pub fn normalize_line_endings(text: &str) -> Cow<'_, str> {
    if !text.contains('\r') {
        return Cow::Borrowed(text);
    }
    Cow::Owned(text.replace("\r\n", "\n").replace('\r', "\n"))
}

/// Consume one section and hand each data row to `on_line`
///
/// `lines` must start at the section title. The title and the line after it
/// are skipped, divider rows are skipped, and the section ends at the first
/// blank line or at the end of input. Rows are passed right-trimmed.
///
/// Returns the lines following the terminating blank line.
pub fn scan_section<'a, 'b, F>(lines: &'b [&'a str], mut on_line: F) -> Result<&'b [&'a str], StdoutError>
where
    F: FnMut(&'a str) -> Result<(), StdoutError>,
{
    let mut rest = lines.get(2..).unwrap_or(&[]);

    while let Some((&line, tail)) = rest.split_first() {
        rest = tail;
        let line = line.trim_end();

        if line.is_empty() {
            break;
        }
        if line.starts_with(DIVIDER_PREFIX) {
            continue;
        }
        on_line(line)?;
    }

    Ok(rest)
}

/// Whitespace-free copy of `line`, for titles uperf pads inconsistently
fn collapse_whitespace(line: &str) -> String {
    line.split_whitespace().collect()
}

/// Multi-row sections the dispatcher knows how to scan
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Section {
    Details(SectionKind),
    Averages(SectionKind),
    Netstat,
    Run,
}

impl Section {
    fn scan<'a, 'b>(
        self,
        lines: &'b [&'a str],
        document: &mut ResultDocument,
    ) -> Result<&'b [&'a str], StdoutError> {
        match self {
            Section::Details(kind) => scan_section(lines, |line| {
                document.push(parse_details_stat(line, kind)?);
                Ok(())
            }),
            Section::Averages(kind) => scan_section(lines, |line| {
                document.push(parse_averages_stat(line, kind)?);
                Ok(())
            }),
            Section::Netstat => scan_section(lines, |line| {
                if collapse_whitespace(line).starts_with(NETSTAT_COLUMNS) {
                    return Ok(());
                }
                document.push(parse_netstat_stat(line, SectionKind::Netstat)?);
                Ok(())
            }),
            Section::Run => scan_section(lines, |line| {
                if collapse_whitespace(line).starts_with(RUN_COLUMNS) {
                    return Ok(());
                }
                if is_run_diff(line) {
                    document.push(parse_run_stat_diff(line, SectionKind::RunDiff)?);
                } else {
                    document.push(parse_run_stat(line, SectionKind::Run)?);
                }
                Ok(())
            }),
        }
    }
}

/// What the dispatcher does with the line at the cursor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Route {
    Blank,
    Section(Section),
    ComputedTransaction,
    RawTransaction,
    Extra,
}

fn route(line: &str) -> Route {
    if line.is_empty() {
        Route::Blank
    } else if line.starts_with("Group Details") {
        Route::Section(Section::Details(SectionKind::GroupDetails))
    } else if line.starts_with("Strand Details") {
        Route::Section(Section::Details(SectionKind::StrandDetails))
    } else if collapse_whitespace(line).starts_with("TxnCount") {
        Route::Section(Section::Averages(SectionKind::TransactionAverage))
    } else if line.starts_with("Flowop") {
        Route::Section(Section::Averages(SectionKind::FlowopAverage))
    } else if line.starts_with("Netstat statistics") {
        Route::Section(Section::Netstat)
    } else if line.starts_with("Run Statistics") {
        Route::Section(Section::Run)
    } else if line.starts_with("Txn") || line.starts_with("Total") {
        Route::ComputedTransaction
    } else if is_raw_details(line) {
        Route::RawTransaction
    } else {
        Route::Extra
    }
}

/// Decode a complete uperf transcript
///
/// Any statistics line that does not parse aborts decoding. Lines that are
/// not statistics never fail; they are collected verbatim as extra output,
/// blank lines included. Blank lines that close a section are consumed by it.
pub fn parse_stdout(text: &str) -> Result<ResultDocument, StdoutError> {
    let text = normalize_line_endings(text);
    let lines: Vec<&str> = text.split('\n').collect();

    let mut document = ResultDocument::new();
    let mut rest: &[&str] = &lines;

    while let Some((&current, tail)) = rest.split_first() {
        let line = current.trim_end();

        rest = match route(line) {
            // Only the empty string after the final newline is dropped
            Route::Blank if tail.is_empty() => tail,
            Route::Section(section) => {
                debug!(?section, title = line, "Parsing section");
                section.scan(rest, &mut document)?
            }
            Route::ComputedTransaction => {
                debug!(line, "Parsing transaction details (computed)");
                document.push(parse_details_stat_computed(line, SectionKind::Transaction)?);
                tail
            }
            Route::RawTransaction => {
                debug!(line, "Parsing transaction details (raw)");
                document.push(parse_details_stat_raw(line, SectionKind::Transaction)?);
                tail
            }
            Route::Blank | Route::Extra => {
                trace!(line, "Keeping line as extra output");
                document.push_extra(current);
                tail
            }
        };
    }

    debug!(
        records = document.records().len(),
        extra_bytes = document.extra_output().len(),
        "Parsed uperf stdout"
    );
    Ok(document)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::benchmark::uperf::error::LineShape;
    use crate::benchmark::uperf::stats::{DetailsFormat, DetailsValues, StatRecord};

    const ALL_ARGS: &str = include_str!("testdata/all_args.txt");
    const ALL_ARGS_RAW: &str = include_str!("testdata/all_args_raw.txt");
    const MINIMAL_ARGS: &str = include_str!("testdata/minimal_args.txt");

    fn count(doc: &ResultDocument, kind: SectionKind) -> usize {
        doc.section(kind).count()
    }

    #[test]
    fn test_normalize_line_endings() {
        assert!(matches!(normalize_line_endings("a\nb"), Cow::Borrowed(_)));
        assert_eq!(normalize_line_endings("a\r\nb\rc\n"), "a\nb\nc\n");
    }

    #[test]
    fn test_scan_section_skips_header_and_dividers() {
        let lines = [
            "Netstat statistics for this run",
            "-------------",
            "lo 1 1 1Gb/s 1Gb/s   ",
            "-------------",
            "",
            "after",
        ];
        let mut rows = Vec::new();
        let rest = scan_section(&lines, |line| {
            rows.push(line);
            Ok(())
        })
        .unwrap();

        assert_eq!(rows, vec!["lo 1 1 1Gb/s 1Gb/s"]);
        assert_eq!(rest, &["after"]);
    }

    #[test]
    fn test_scan_section_accepts_empty_sections() {
        let lines = ["Group Details", "-------", "", "next"];
        let rest = scan_section(&lines, |_| panic!("no rows expected")).unwrap();
        assert_eq!(rest, &["next"]);

        let lines = ["Group Details", "-------"];
        let rest = scan_section(&lines, |_| panic!("no rows expected")).unwrap();
        assert!(rest.is_empty());

        let lines = ["Group Details"];
        let rest = scan_section(&lines, |_| panic!("no rows expected")).unwrap();
        assert!(rest.is_empty());
    }

    #[test]
    fn test_scan_section_treats_whitespace_rows_as_blank() {
        let lines = ["Strand Details", "----", "Thr0 1 / 1(s) = 1 1op/s", "   ", "tail"];
        let mut rows = 0;
        let rest = scan_section(&lines, |_| {
            rows += 1;
            Ok(())
        })
        .unwrap();
        assert_eq!(rows, 1);
        assert_eq!(rest, &["tail"]);
    }

    #[test]
    fn test_scan_section_propagates_row_errors() {
        let lines = ["Flowop Count", "----", "connect 1 1us"];
        let err = scan_section(&lines, |line| {
            parse_averages_stat(line, SectionKind::FlowopAverage).map(|_| ())
        })
        .unwrap_err();
        assert!(matches!(
            err,
            StdoutError::MalformedLine { shape: LineShape::TooFewFields { expected: 6, actual: 3 }, .. }
        ));
    }

    #[test]
    fn test_parse_all_args() {
        let doc = parse_stdout(ALL_ARGS).unwrap();

        assert_eq!(doc.records().len(), 18);
        assert_eq!(count(&doc, SectionKind::Transaction), 5);
        assert_eq!(count(&doc, SectionKind::GroupDetails), 1);
        assert_eq!(count(&doc, SectionKind::StrandDetails), 1);
        assert_eq!(count(&doc, SectionKind::TransactionAverage), 3);
        assert_eq!(count(&doc, SectionKind::FlowopAverage), 3);
        assert_eq!(count(&doc, SectionKind::Netstat), 2);
        assert_eq!(count(&doc, SectionKind::Run), 2);
        assert_eq!(count(&doc, SectionKind::RunDiff), 1);

        let names: Vec<&str> = doc
            .details(SectionKind::Transaction)
            .map(|s| s.name.as_str())
            .collect();
        assert_eq!(names, vec!["Txn1", "Txn2", "Txn2", "Txn3", "Total"]);

        let flowops = doc.averages_by_name(SectionKind::FlowopAverage);
        assert_eq!(flowops["write"].count, 8664520);
        assert!((flowops["disconnect"].avg_seconds - 701e-9).abs() < 1e-15);

        let nics: Vec<(&str, i64)> = doc
            .netstat()
            .map(|s| (s.name.as_str(), s.in_pkts_per_second))
            .collect();
        assert_eq!(nics, vec![("lo", 267977), ("tap0", 0)]);

        let hosts: Vec<&str> = doc.run_stats().map(|s| s.hostname.as_str()).collect();
        assert_eq!(hosts, vec!["127.0.0.1", "master"]);

        let diff = doc.run_diff().unwrap();
        assert_eq!(diff.data_delta_percentage, 11.66);
        assert_eq!(diff.errors_delta_percentage, 0.0);
    }

    #[test]
    fn test_parse_all_args_extra_output() {
        let doc = parse_stdout(ALL_ARGS).unwrap();
        let extra: Vec<&str> = doc.extra_output().lines().collect();

        let expected = vec![
            "Error getting SSL CTX:1",
            "Allocating shared memory of size 156624 bytes",
            "Completed handshake phase 1",
            "Starting handshake phase 2",
            "Handshake phase 2 with 127.0.0.1",
            "  Done preprocessing accepts",
            "  Sent handshake header",
            "  Sending workorder",
            "    Sent workorder",
            "    Sent transaction",
            "    Sent flowop",
            "    Sent transaction",
            "    Sent flowop",
            "    Sent transaction",
            "    Sent flowop",
            "TX worklist success  Sent workorder",
            "Handshake phase 2 with 127.0.0.1 done",
            "Completed handshake phase 2",
            "Starting 1 threads running profile:iperf ...   0.00 seconds",
            "TX command [UPERF_CMD_NEXT_TXN, 0] to 127.0.0.1",
            "TX command [UPERF_CMD_NEXT_TXN, 1] to 127.0.0.1",
            "called out",
            "TX command [UPERF_CMD_NEXT_TXN, 2] to 127.0.0.1",
            "-------------------------------------------------------------------------------------------------------------------------------",
            "TX command [UPERF_CMD_SEND_STATS, 0] to 127.0.0.1",
            "** Warning: Send buffer: 100.00KB (Requested:50.00KB)  ",
            "** Warning: Recv buffer: 100.00KB (Requested:50.00KB)  ",
            "",
            "",
            "",
            "",
            "",
            "** Warning: Send buffer: 100.00KB (Requested:50.00KB)  ",
            "** Warning: Recv buffer: 100.00KB (Requested:50.00KB)  ",
            "** [127.0.0.1] Warning: Send buffer: 100.00KB (Requested:50.00KB)  ",
            "Warning: Recv buffer: 100.00KB (Requested:50.00KB)  ",
            "  ",
            "",
        ];
        assert_eq!(extra, expected);
    }

    #[test]
    fn test_blank_lines_between_noise_are_kept() {
        let doc = parse_stdout("banner one\n\nbanner two\n").unwrap();
        assert_eq!(doc.extra_output(), "banner one\n\nbanner two\n");

        let doc = parse_stdout("banner one\n\nbanner two").unwrap();
        assert_eq!(doc.extra_output(), "banner one\n\nbanner two\n");

        let doc = parse_stdout("Group Details\n----\nGroup0 1.00KB / 1.00(s) = 8.19Kb/s 1op/s\n\nbanner\n").unwrap();
        assert_eq!(doc.extra_output(), "banner\n");
    }

    #[test]
    fn test_parse_all_args_raw() {
        let doc = parse_stdout(ALL_ARGS_RAW).unwrap();

        assert_eq!(doc.records().len(), 47);
        assert_eq!(count(&doc, SectionKind::Transaction), 35);
        assert_eq!(count(&doc, SectionKind::Netstat), 1);
        assert_eq!(doc.extra_output().lines().count(), 42);

        let timeline: Vec<&str> = doc.raw_timeline().map(|s| s.name.as_str()).collect();
        assert_eq!(timeline.len(), 35);
        assert_eq!(timeline.first(), Some(&"Txn1"));
        assert_eq!(timeline.last(), Some(&"Total"));

        let group = doc.details(SectionKind::GroupDetails).next().unwrap();
        assert_eq!(group.format(), DetailsFormat::Raw);
        assert_eq!(
            group.values,
            DetailsValues::Raw {
                timestamp_ms: 1644254626628.9016,
                bytes: 7995523072,
                ops: 9760162,
            }
        );

        let txn_avg = doc.averages_by_name(SectionKind::TransactionAverage);
        assert!((txn_avg["Txn1"].max_seconds - 184467.44).abs() < 1e-6);
    }

    #[test]
    fn test_parse_minimal_args() {
        let doc = parse_stdout(MINIMAL_ARGS).unwrap();

        assert_eq!(doc.records().len(), 8);
        assert_eq!(count(&doc, SectionKind::GroupDetails), 0);
        assert_eq!(count(&doc, SectionKind::FlowopAverage), 0);
        assert_eq!(doc.extra_output().lines().count(), 12);

        let total = doc
            .details(SectionKind::Transaction)
            .find(|s| s.name == "Total")
            .unwrap();
        assert_eq!(total.format(), DetailsFormat::Computed);
        match total.values {
            DetailsValues::Computed { ops_per_second, total_seconds, .. } => {
                assert_eq!(ops_per_second, 272158);
                assert!((total_seconds - 32.34).abs() < 1e-9);
            }
            ref other => panic!("unexpected values {:?}", other),
        }
    }

    #[test]
    fn test_parse_crlf_transcript() {
        let doc = parse_stdout(&MINIMAL_ARGS.replace('\n', "\r\n")).unwrap();
        assert_eq!(doc.records().len(), 8);
        assert!(!doc.extra_output().contains('\r'));
    }

    #[test]
    fn test_section_tags_come_from_the_section() {
        let text = "Group Details\n----\nTxn9 1.00KB / 1.00(s) = 8.19Kb/s 1op/s\n\nTxn9 1.00KB / 1.00(s) = 8.19Kb/s 1op/s\n";
        let doc = parse_stdout(text).unwrap();

        let sections: Vec<SectionKind> = doc.records().iter().map(StatRecord::section).collect();
        assert_eq!(sections, vec![SectionKind::GroupDetails, SectionKind::Transaction]);
    }

    #[test]
    fn test_malformed_statistics_line_aborts() {
        let text = "banner\nTotal     66.11GB /  32.33(s)\nmore\n";
        let err = parse_stdout(text).unwrap_err();
        match err {
            StdoutError::MalformedLine { line, .. } => assert_eq!(line, "Total     66.11GB /  32.33(s)"),
            other => panic!("unexpected error {:?}", other),
        }

        let text = "Run Statistics\nHostname Time\n----\nmaster 32.33s 66.11GB 17.56Gb/s many 0.00\n";
        assert!(matches!(
            parse_stdout(text),
            Err(StdoutError::UnitParse { field: "operations", .. })
        ));
    }

    #[test]
    fn test_noise_only_transcript() {
        let doc = parse_stdout("hello\n\nworld  \n").unwrap();
        assert!(doc.records().is_empty());
        assert_eq!(doc.extra_output(), "hello\n\nworld  \n");
        assert!(parse_stdout("").unwrap().is_empty());
    }
}
