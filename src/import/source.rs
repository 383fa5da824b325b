//! Upload decoding: turns an uploaded CSV byte stream into rows of typed
//! cells without buffering the file.
//!
//! The async side pushes body chunks into a bounded channel; a blocking task
//! reads them through [`SyncIoBridge`] with the `csv` reader and hands parsed
//! rows back over a second bounded channel.

use std::io::{self, Read};

use bytes::Bytes;
use indexmap::IndexMap;
use serde_json::{Number, Value};
use thiserror::Error;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tokio_util::io::{StreamReader, SyncIoBridge};

/// Blocking reader over the chunks pushed into an upload pipe
pub type UploadReader = SyncIoBridge<StreamReader<ReceiverStream<io::Result<Bytes>>, Bytes>>;

/// One data row, keyed by trimmed header name
#[derive(Debug, Clone, PartialEq)]
pub struct RawRow {
    /// 1-based line in the file; the header is line 1
    pub line: u64,
    pub cells: IndexMap<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Error)]
#[error("line {line}: {reason}")]
pub struct RowParseError {
    pub line: u64,
    pub reason: String,
}

pub type RowResult = Result<RawRow, RowParseError>;

/// Creates a bounded pipe for upload chunks. Must be called from within the
/// tokio runtime; the reader is meant for a blocking thread.
pub fn upload_pipe(capacity: usize) -> (mpsc::Sender<io::Result<Bytes>>, UploadReader) {
    let (tx, rx) = mpsc::channel(capacity.max(1));
    let reader = SyncIoBridge::new(StreamReader::new(ReceiverStream::new(rx)));
    (tx, reader)
}

/// Parses CSV from `reader` on a blocking thread and streams the rows.
///
/// Malformed rows come out as [`RowParseError`]s and parsing continues. An
/// I/O error on the underlying reader ends the stream.
pub fn csv_rows<R>(reader: R, capacity: usize) -> ReceiverStream<RowResult>
where
    R: Read + Send + 'static,
{
    let (tx, rx) = mpsc::channel(capacity.max(1));
    tokio::task::spawn_blocking(move || read_rows(reader, &tx));
    ReceiverStream::new(rx)
}

fn read_rows<R: Read>(reader: R, tx: &mpsc::Sender<RowResult>) {
    let mut csv = csv::ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::Headers)
        .from_reader(reader);

    let headers = match csv.headers() {
        Ok(headers) => headers.clone(),
        Err(e) => {
            tracing::warn!(error = %e, "Unreadable header row");
            let _ = tx.blocking_send(Err(RowParseError {
                line: 1,
                reason: format!("Unreadable header row: {}", e),
            }));
            return;
        }
    };

    for (index, record) in csv.records().enumerate() {
        let fallback_line = index as u64 + 2;
        let row = match record {
            Ok(record) => Ok(RawRow {
                line: record.position().map(|p| p.line()).unwrap_or(fallback_line),
                cells: headers
                    .iter()
                    .zip(record.iter())
                    .map(|(header, cell)| (header.to_string(), infer_cell(cell)))
                    .collect(),
            }),
            Err(e) if matches!(e.kind(), csv::ErrorKind::Io(_)) => {
                tracing::warn!(error = %e, "Upload stream failed, ending import");
                break;
            }
            Err(e) => Err(RowParseError {
                line: e.position().map(|p| p.line()).unwrap_or(fallback_line),
                reason: e.to_string(),
            }),
        };
        if tx.blocking_send(row).is_err() {
            // receiver dropped, nobody is waiting for the rest
            break;
        }
    }
}

/// Best-effort cell typing: integers, decimals and booleans become JSON
/// scalars, blank cells become null. Numbers written with leading zeros
/// (phone numbers, codes) stay text, as does any number whose JSON form
/// would not print back as the original cell.
pub fn infer_cell(raw: &str) -> Value {
    let cell = raw.trim();
    if cell.is_empty() {
        return Value::Null;
    }
    if cell.eq_ignore_ascii_case("true") {
        return Value::Bool(true);
    }
    if cell.eq_ignore_ascii_case("false") {
        return Value::Bool(false);
    }

    let digits = cell.strip_prefix('-').unwrap_or(cell);
    let leading_zero = digits.len() > 1 && digits.starts_with('0') && !digits.starts_with("0.");
    let numeric = digits.chars().all(|c| c.is_ascii_digit() || c == '.');
    if leading_zero || !numeric {
        return Value::String(cell.to_string());
    }

    // a number is kept only when it prints back as the cell did, so text
    // columns never see a reformatted value ("2.10", "-0", long digit runs)
    let number = match cell.parse::<i64>() {
        Ok(n) => Some(Number::from(n)),
        Err(_) => cell.parse::<f64>().ok().and_then(Number::from_f64),
    };
    match number {
        Some(n) if n.to_string() == cell => Value::Number(n),
        _ => Value::String(cell.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;
    use serde_json::json;

    #[test]
    fn test_infer_cell() {
        assert_eq!(infer_cell("  "), Value::Null);
        assert_eq!(infer_cell("42"), json!(42));
        assert_eq!(infer_cell("-7"), json!(-7));
        assert_eq!(infer_cell("350.5"), json!(350.5));
        assert_eq!(infer_cell("TRUE"), json!(true));
        assert_eq!(infer_cell("0123456"), json!("0123456"));
        assert_eq!(infer_cell("0"), json!(0));
        assert_eq!(infer_cell("0.5"), json!(0.5));
        assert_eq!(infer_cell("1.2.3"), json!("1.2.3"));
        assert_eq!(infer_cell(" Jane Doe "), json!("Jane Doe"));
    }

    #[test]
    fn test_infer_cell_keeps_text_that_would_reformat() {
        assert_eq!(infer_cell("2.10"), json!("2.10"));
        assert_eq!(infer_cell("1.50"), json!("1.50"));
        assert_eq!(infer_cell("-0"), json!("-0"));
        assert_eq!(infer_cell("12345678901234567890123"), json!("12345678901234567890123"));
        assert_eq!(infer_cell("9780441013593"), json!(9780441013593_i64));
    }

    #[tokio::test]
    async fn test_csv_rows_key_cells_by_trimmed_header() {
        let data = " Acc. No. ,Author\n1,Jane Doe/John Roe\n2,\n";
        let rows: Vec<RowResult> = csv_rows(io::Cursor::new(data), 4).collect().await;
        assert_eq!(rows.len(), 2);

        let first = rows[0].as_ref().unwrap();
        assert_eq!(first.line, 2);
        assert_eq!(first.cells["Acc. No."], json!(1));
        assert_eq!(first.cells["Author"], json!("Jane Doe/John Roe"));

        let second = rows[1].as_ref().unwrap();
        assert_eq!(second.line, 3);
        assert_eq!(second.cells["Author"], Value::Null);
    }

    #[tokio::test]
    async fn test_malformed_row_does_not_stop_parsing() {
        let data = "a,b\n1,2\n3\n4,5\n";
        let rows: Vec<RowResult> = csv_rows(io::Cursor::new(data), 1).collect().await;
        assert_eq!(rows.len(), 3);
        assert!(rows[0].is_ok());
        assert_eq!(rows[1].as_ref().unwrap_err().line, 3);
        assert!(rows[2].is_ok());
    }

    #[tokio::test]
    async fn test_upload_pipe_feeds_parser() {
        let (tx, reader) = upload_pipe(2);
        let rows = csv_rows(reader, 2);

        tx.send(Ok(Bytes::from_static(b"Name,Email address\nAda,"))).await.unwrap();
        tx.send(Ok(Bytes::from_static(b"ada@example.org\n"))).await.unwrap();
        drop(tx);

        let rows: Vec<RowResult> = rows.collect().await;
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].as_ref().unwrap().cells["Email address"], json!("ada@example.org"));
    }
}
