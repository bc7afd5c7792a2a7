//! Local workbook store.
//!
//! Every mutation reads the whole workbook, rebuilds it in memory and
//! replaces the file through a temp file + rename in the same directory, so
//! readers only ever see a complete workbook.

use std::borrow::Cow;
use std::io::{Cursor, Write};
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use calamine::{open_workbook_from_rs, Reader, Xlsx};
use chrono::{DateTime, Utc};
use rust_xlsxwriter::{Format, Workbook};
use tracing::{debug, info};

use crate::store::{Result, SpreadsheetStore, StoreDescription, StoreError};
use crate::{Report, HEADERS, SHEET_NAME};

pub const XLSX_CONTENT_TYPE: &str =
    "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet";

#[derive(Clone, Debug)]
pub struct XlsxStore {
    dir: PathBuf,
    file_name: String,
}

impl XlsxStore {
    pub fn new(dir: impl Into<PathBuf>, file_name: impl Into<String>) -> Self {
        Self {
            dir: dir.into(),
            file_name: file_name.into(),
        }
    }

    pub fn path(&self) -> PathBuf {
        self.dir.join(&self.file_name)
    }

    async fn blocking<R, F>(&self, f: F) -> Result<R>
    where
        R: Send + 'static,
        F: FnOnce(&Path, &Path) -> Result<R> + Send + 'static,
    {
        let dir = self.dir.clone();
        let path = self.path();
        tokio::task::spawn_blocking(move || f(&dir, &path))
            .await
            .map_err(|e| StoreError::Io(std::io::Error::other(e)))?
    }
}

#[async_trait]
impl SpreadsheetStore for XlsxStore {
    async fn ensure_exists(&self) -> Result<()> {
        self.blocking(|dir, path| {
            if path.exists() {
                return Ok(());
            }
            let buf = build_workbook(&[])?;
            write_atomic(dir, path, &buf)?;
            info!(path = %path.display(), "created workbook");
            Ok(())
        })
        .await
    }

    async fn append_rows(&self, rows: &[Report]) -> Result<()> {
        let new_rows: Vec<Vec<String>> = rows
            .iter()
            .map(|r| r.to_row().iter().map(|v| v.to_string()).collect())
            .collect();

        self.blocking(move |dir, path| {
            let mut all = if path.exists() {
                read_rows(path)?
            } else {
                Vec::new()
            };
            if all.is_empty() {
                all.push(HEADERS.iter().map(|h| h.to_string()).collect());
            }
            let count = new_rows.len();
            all.extend(new_rows);

            let buf = build_workbook(&all)?;
            write_atomic(dir, path, &buf)?;
            debug!(path = %path.display(), appended = count, total = all.len() - 1, "workbook rewritten");
            Ok(())
        })
        .await
    }

    async fn describe(&self) -> Result<StoreDescription> {
        let path = self.path();
        match tokio::fs::metadata(&path).await {
            Ok(meta) => Ok(StoreDescription {
                exists: true,
                path: path.display().to_string(),
                last_modified: meta.modified().ok().map(DateTime::<Utc>::from),
                size_bytes: meta.len(),
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(StoreDescription {
                exists: false,
                path: path.display().to_string(),
                last_modified: None,
                size_bytes: 0,
            }),
            Err(e) => Err(e.into()),
        }
    }

    async fn reset(&self) -> Result<()> {
        match tokio::fs::remove_file(self.path()).await {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }
        info!(path = %self.path().display(), "workbook removed");
        self.ensure_exists().await
    }

    async fn read_artifact(&self) -> Result<Option<Vec<u8>>> {
        match tokio::fs::read(self.path()).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn artifact_name(&self) -> &str {
        &self.file_name
    }

    fn backend(&self) -> &'static str {
        "xlsx"
    }
}

/// All rows of the `Reportes` sheet as text, header included.
///
/// Cell text comes back exactly as it was handed to `build_workbook`, so a
/// rewrite never alters rows stored earlier.
pub fn read_rows(path: &Path) -> Result<Vec<Vec<String>>> {
    let bytes = std::fs::read(path)?;
    let mut workbook: Xlsx<Cursor<Vec<u8>>> = open_workbook_from_rs(Cursor::new(bytes))
        .map_err(|e: calamine::XlsxError| StoreError::Corrupt(e.to_string()))?;
    let range = workbook
        .worksheet_range(SHEET_NAME)
        .map_err(|e| StoreError::Corrupt(format!("sheet {SHEET_NAME}: {e}")))?;

    Ok(range
        .rows()
        .map(|row| {
            row.iter()
                .map(|cell| unescape_cell(&cell.to_string()).into_owned())
                .collect()
        })
        .collect())
}

/// Undo the `_xHHHH_` escaping rust_xlsxwriter applies to shared strings.
///
/// The writer turns control characters `\x00`..`\x1F` (except tab and
/// newline) into `_xHHHH_`, and protects literal `_xHHHH_` text by prefixing
/// `_x005F`. calamine hands both forms back verbatim.
fn unescape_cell(text: &str) -> Cow<'_, str> {
    if !text.contains("_x") {
        return Cow::Borrowed(text);
    }

    let bytes = text.as_bytes();
    let mut out = String::with_capacity(text.len());
    let mut i = 0;
    while let Some(ch) = text[i..].chars().next() {
        if ch == '_' {
            if let Some(code) = escape_at(bytes, i) {
                // `_x005F` guarding a literal escape
                if code == 0x5F && escape_at(bytes, i + 6).is_some() {
                    out.push_str(&text[i + 6..i + 13]);
                    i += 13;
                    continue;
                }
                if let Some(ch) = char::from_u32(code).filter(|_| code < 0x20) {
                    out.push(ch);
                    i += 7;
                    continue;
                }
            }
        }
        out.push(ch);
        i += ch.len_utf8();
    }
    Cow::Owned(out)
}

// Code point of a `_xHHHH_` token starting at `i`.
fn escape_at(bytes: &[u8], i: usize) -> Option<u32> {
    let token = bytes.get(i..i + 7)?;
    if token[0] != b'_' || token[1] != b'x' || token[6] != b'_' {
        return None;
    }
    if !token[2..6].iter().all(u8::is_ascii_hexdigit) {
        return None;
    }
    let hex = std::str::from_utf8(&token[2..6]).ok()?;
    u32::from_str_radix(hex, 16).ok()
}

/// Workbook bytes for `rows`; an empty slice yields the header row only.
fn build_workbook(rows: &[Vec<String>]) -> Result<Vec<u8>> {
    let header_format = Format::new().set_bold();
    let mut workbook = Workbook::new();
    let sheet = workbook.add_worksheet();
    sheet.set_name(SHEET_NAME).map_err(workbook_err)?;

    if rows.is_empty() {
        for (c, h) in HEADERS.iter().enumerate() {
            sheet
                .write_string_with_format(0, c as u16, *h, &header_format)
                .map_err(workbook_err)?;
        }
    }

    for (r, row) in rows.iter().enumerate() {
        for (c, value) in row.iter().enumerate() {
            if value.is_empty() {
                continue;
            }
            if r == 0 {
                sheet
                    .write_string_with_format(0, c as u16, value.as_str(), &header_format)
                    .map_err(workbook_err)?;
            } else {
                sheet
                    .write_string(r as u32, c as u16, value.as_str())
                    .map_err(workbook_err)?;
            }
        }
    }

    workbook.save_to_buffer().map_err(workbook_err)
}

fn write_atomic(dir: &Path, path: &Path, bytes: &[u8]) -> Result<()> {
    std::fs::create_dir_all(dir)?;
    let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
    tmp.write_all(bytes)?;
    tmp.as_file().sync_all()?;
    tmp.persist(path).map_err(|e| StoreError::Io(e.error))?;
    Ok(())
}

fn workbook_err(e: rust_xlsxwriter::XlsxError) -> StoreError {
    StoreError::Workbook(e.to_string())
}
