//! Delimiter-based tokenization of the raw input stream.

use csv::{ErrorKind, ReaderBuilder, StringRecord};
use log::{error, warn};
use std::io::Read;

/// Split `input` into records on `delimiter`.
///
/// No semantic validation happens here: records of any length are passed
/// through. Quoting is lenient, so a stray `"` never fails a line. Lines
/// that are not valid UTF-8 are logged and skipped. An I/O failure on the
/// underlying stream ends the sequence.
pub fn read_records<R: Read>(input: R, delimiter: u8) -> impl Iterator<Item = StringRecord> {
    let reader = ReaderBuilder::new()
        .delimiter(delimiter)
        .has_headers(false)
        .flexible(true)
        .from_reader(input);

    let mut records = reader.into_records();
    let mut failed = false;

    std::iter::from_fn(move || {
        while !failed {
            match records.next()? {
                Ok(record) => return Some(record),
                Err(e) if matches!(e.kind(), ErrorKind::Io(_)) => {
                    error!("[Reader] Input stream failed, stopping: {}", e);
                    failed = true;
                }
                Err(e) => warn!("{}", crate::Error::from(e)),
            }
        }
        None
    })
}
