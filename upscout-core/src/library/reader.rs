//! Incremental, defensive library CSV reader.
//!
//! Library exports are occasionally corrupted (embedded NUL bytes, invalid
//! UTF-8, ragged rows). Each row decodes to its own `Result` so a bad row is
//! skipped without losing the rest of the file.
//!
//! Besides media server exports the reader accepts folder-scan listings, which
//! carry `title_guess`, `folder_path` and `path` instead of a title and a
//! resolution. Their current quality is read off resolution tokens in the path.

use std::io::{self, Read};

use super::{DecodeError, ENRICHMENT_COLUMNS, Enrichment, MovieRecord};
use crate::{Result, UpscoutError};

const TITLE_COLUMNS: &[&str] = &["title", "name", "title_guess"];
const FOLDER_COLUMNS: &[&str] = &["folder_path"];
const PATH_COLUMNS: &[&str] = &["path"];
const YEAR_COLUMNS: &[&str] = &["year"];
const HEIGHT_COLUMNS: &[&str] = &["max_height", "height"];
const PRIMARY_ID_COLUMNS: &[&str] = &["imdb_id"];
const SECONDARY_ID_COLUMNS: &[&str] = &["tmdb_id"];

/// Resolution tokens found in scanned file names, best first.
const PATH_QUALITY_TOKENS: &[(&str, u32)] = &[
    ("2160p", 2160),
    ("4k", 2160),
    ("uhd", 2160),
    ("1440p", 1440),
    ("1080p", 1080),
    ("720p", 720),
];

/// Read adapter that drops NUL bytes from the underlying stream.
#[derive(Debug)]
pub struct SanitizedRead<R> {
    inner: R,
    stripped: u64,
}

impl<R: Read> SanitizedRead<R> {
    pub fn new(inner: R) -> Self {
        Self { inner, stripped: 0 }
    }

    /// Number of NUL bytes removed so far.
    pub fn stripped(&self) -> u64 {
        self.stripped
    }
}

impl<R: Read> Read for SanitizedRead<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        loop {
            let read = self.inner.read(buf)?;
            if read == 0 {
                return Ok(0);
            }

            let mut kept = 0;
            for index in 0..read {
                if buf[index] != 0 {
                    buf[kept] = buf[index];
                    kept += 1;
                }
            }
            self.stripped += (read - kept) as u64;

            // A chunk of nothing but NULs is not end of input
            if kept > 0 {
                return Ok(kept);
            }
        }
    }
}

/// Positions of the columns the reader understands.
#[derive(Debug, Clone)]
struct ColumnMap {
    /// Title columns present, in order of preference
    titles: Vec<usize>,
    folder_path: Option<usize>,
    path: Option<usize>,
    year: Option<usize>,
    height: Option<usize>,
    primary_id: Option<usize>,
    secondary_id: Option<usize>,
    enrichment: [Option<usize>; 6],
}

impl ColumnMap {
    fn from_header(header: &[String]) -> std::result::Result<Self, DecodeError> {
        let position = |name: &str| -> Option<usize> {
            header
                .iter()
                .position(|column| column.trim().eq_ignore_ascii_case(name))
        };
        let find = |names: &[&str]| names.iter().find_map(|&name| position(name));

        let titles: Vec<usize> = TITLE_COLUMNS.iter().filter_map(|&name| position(name)).collect();
        let folder_path = find(FOLDER_COLUMNS);
        if titles.is_empty() && folder_path.is_none() {
            return Err(DecodeError::MissingColumn {
                column: [TITLE_COLUMNS, FOLDER_COLUMNS].concat().join("|"),
            });
        }

        let mut enrichment = [None; 6];
        for (slot, name) in enrichment.iter_mut().zip(ENRICHMENT_COLUMNS) {
            *slot = position(name);
        }

        Ok(Self {
            titles,
            folder_path,
            path: find(PATH_COLUMNS),
            year: find(YEAR_COLUMNS),
            height: find(HEIGHT_COLUMNS),
            primary_id: find(PRIMARY_ID_COLUMNS),
            secondary_id: find(SECONDARY_ID_COLUMNS),
            enrichment,
        })
    }
}

/// One decoded input row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LibraryRow {
    /// Line of the row in the input, for diagnostics
    pub line: u64,
    pub movie: MovieRecord,
    /// Original cell values, aligned with the input header
    pub cells: Vec<String>,
    /// Enrichment already present in the input
    pub prior: Enrichment,
}

/// Streaming reader over a library export.
pub struct LibraryReader<R: Read> {
    reader: csv::Reader<SanitizedRead<R>>,
    header: Vec<String>,
    columns: Option<ColumnMap>,
    record: csv::ByteRecord,
    finished: bool,
}

impl<R: Read> LibraryReader<R> {
    /// Reads the header and prepares for row iteration.
    ///
    /// An input without any header is accepted and yields no rows.
    ///
    /// # Errors
    ///
    /// - `UpscoutError::Csv` - If the header cannot be read
    /// - `UpscoutError::Decode` - If no title column is present
    pub fn new(inner: R) -> Result<Self> {
        let mut reader = csv::ReaderBuilder::new()
            .flexible(true)
            .has_headers(true)
            .from_reader(SanitizedRead::new(inner));

        let header: Vec<String> = reader
            .byte_headers()?
            .iter()
            .map(|field| String::from_utf8_lossy(field).trim().to_string())
            .collect();

        let columns = if header.iter().all(|column| column.is_empty()) {
            None
        } else {
            Some(ColumnMap::from_header(&header).map_err(UpscoutError::Decode)?)
        };

        let header = if columns.is_some() { header } else { Vec::new() };

        Ok(Self {
            reader,
            header,
            columns,
            record: csv::ByteRecord::new(),
            finished: false,
        })
    }

    /// Input header, as read.
    pub fn header(&self) -> &[String] {
        &self.header
    }

    /// Number of NUL bytes stripped from the input so far.
    pub fn stripped_bytes(&self) -> u64 {
        self.reader.get_ref().stripped()
    }

    /// Decodes the next row, or returns `None` at end of input.
    pub fn next_row(&mut self) -> Option<std::result::Result<LibraryRow, DecodeError>> {
        if self.finished {
            return None;
        }
        let Some(columns) = self.columns.as_ref() else {
            self.finished = true;
            return None;
        };

        match self.reader.read_byte_record(&mut self.record) {
            Ok(false) => {
                self.finished = true;
                None
            }
            Ok(true) => {
                let line = self
                    .record
                    .position()
                    .map(|position| position.line())
                    .unwrap_or_default();
                Some(decode_row(&self.record, line, &self.header, columns))
            }
            Err(error) => {
                let line = error
                    .position()
                    .map(|position| position.line())
                    .unwrap_or_default();
                if matches!(error.kind(), csv::ErrorKind::Io(_)) {
                    self.finished = true;
                    return Some(Err(DecodeError::Read {
                        line,
                        reason: error.to_string(),
                    }));
                }
                Some(Err(DecodeError::Malformed {
                    line,
                    reason: error.to_string(),
                }))
            }
        }
    }
}

impl<R: Read> Iterator for LibraryReader<R> {
    type Item = std::result::Result<LibraryRow, DecodeError>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_row()
    }
}

fn decode_row(
    record: &csv::ByteRecord,
    line: u64,
    header: &[String],
    columns: &ColumnMap,
) -> std::result::Result<LibraryRow, DecodeError> {
    if record.len() > header.len() {
        return Err(DecodeError::Malformed {
            line,
            reason: format!(
                "row has {} fields but the header has {}",
                record.len(),
                header.len()
            ),
        });
    }

    let mut cells: Vec<String> = record
        .iter()
        .map(|field| String::from_utf8_lossy(field).into_owned())
        .collect();
    cells.resize(header.len(), String::new());

    let cell = |index: Option<usize>| index.map(|i| cells[i].trim()).unwrap_or_default();

    // A row without any title still decodes; it is written through unsearched
    let title = columns
        .titles
        .iter()
        .map(|index| cell(Some(*index)))
        .find(|value| !value.is_empty())
        .unwrap_or_else(|| folder_name(cell(columns.folder_path)))
        .to_string();

    let current_max_height = match columns.height {
        Some(_) => parse_height(cell(columns.height)),
        None => [cell(columns.path), cell(columns.folder_path)]
            .into_iter()
            .find(|value| !value.is_empty())
            .map(height_from_path)
            .unwrap_or(0),
    };

    let movie = MovieRecord {
        title,
        year: parse_year(cell(columns.year)),
        current_max_height,
        external_id_primary: non_empty(cell(columns.primary_id)),
        external_id_secondary: non_empty(cell(columns.secondary_id)),
    };

    let mut prior = Enrichment::default();
    for (index, column) in columns.enrichment.iter().enumerate() {
        if let Some(column) = column {
            prior.set_at(index, cells[*column].clone());
        }
    }

    Ok(LibraryRow {
        line,
        movie,
        cells,
        prior,
    })
}

fn parse_year(raw: &str) -> Option<u16> {
    raw.parse::<u16>().ok().filter(|year| *year > 0)
}

fn parse_height(raw: &str) -> u32 {
    raw.parse::<u32>()
        .ok()
        .or_else(|| raw.parse::<f64>().ok().map(|height| height.max(0.0) as u32))
        .unwrap_or(0)
}

/// Last component of a scanned folder path.
fn folder_name(path: &str) -> &str {
    path.trim_end_matches(['/', '\\'])
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or_default()
        .trim()
}

/// Height implied by the first resolution token in a file or folder name.
fn height_from_path(path: &str) -> u32 {
    let lowered = path.to_lowercase();
    PATH_QUALITY_TOKENS
        .iter()
        .find(|(token, _)| lowered.contains(token))
        .map(|(_, height)| *height)
        .unwrap_or(0)
}

fn non_empty(raw: &str) -> Option<String> {
    (!raw.is_empty()).then(|| raw.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn read_all(input: &[u8]) -> Vec<std::result::Result<LibraryRow, DecodeError>> {
        LibraryReader::new(input).unwrap().collect()
    }

    #[test]
    fn test_sanitized_read_strips_nul_bytes() {
        let mut reader = SanitizedRead::new(&b"ab\0\0c\0"[..]);
        let mut out = String::new();
        reader.read_to_string(&mut out).unwrap();
        assert_eq!(out, "abc");
        assert_eq!(reader.stripped(), 3);
    }

    #[test]
    fn test_reads_jellyfin_style_rows() {
        let input = b"name,year,max_height,imdb_id,tmdb_id,critic_rating\n\
                      The Matrix,1999,480,tt0133093,603,88\n\
                      Heat,,576,,,\n";
        let rows = read_all(input);
        assert_eq!(rows.len(), 2);

        let matrix = rows[0].as_ref().unwrap();
        assert_eq!(matrix.movie.title, "The Matrix");
        assert_eq!(matrix.movie.year, Some(1999));
        assert_eq!(matrix.movie.current_max_height, 480);
        assert_eq!(matrix.movie.external_id_primary.as_deref(), Some("tt0133093"));
        assert_eq!(matrix.movie.external_id_secondary.as_deref(), Some("603"));
        assert_eq!(matrix.cells[5], "88");
        assert!(matrix.prior.is_empty());

        let heat = rows[1].as_ref().unwrap();
        assert_eq!(heat.movie.year, None);
        assert_eq!(heat.movie.external_id_primary, None);
    }

    #[test]
    fn test_nul_bytes_inside_rows_are_removed() {
        let input = b"title,year\nAli\0en,1979\n";
        let rows = read_all(input);
        assert_eq!(rows[0].as_ref().unwrap().movie.title, "Alien");
    }

    #[test]
    fn test_invalid_utf8_is_replaced_not_fatal() {
        let input = b"title,year\nAm\xffelie,2001\nHeat,1995\n";
        let rows = read_all(input);
        assert_eq!(rows.len(), 2);
        assert!(rows[0].as_ref().unwrap().movie.title.contains('\u{FFFD}'));
        assert_eq!(rows[1].as_ref().unwrap().movie.title, "Heat");
    }

    #[test]
    fn test_malformed_row_is_reported_and_reading_continues() {
        let input = b"title,year\nHeat,1995,extra,cells\nAlien,1979\n";
        let rows = read_all(input);
        assert_eq!(rows.len(), 2);
        assert!(matches!(rows[0], Err(DecodeError::Malformed { .. })));
        assert_eq!(rows[1].as_ref().unwrap().movie.title, "Alien");
    }

    #[test]
    fn test_row_without_title_still_decodes() {
        let input = b"title,year,max_height,notes\n,2001,480,user note\nAlien,1979,480,c\n";
        let rows = read_all(input);
        assert_eq!(rows.len(), 2);

        let untitled = rows[0].as_ref().unwrap();
        assert!(!untitled.movie.has_title());
        assert_eq!(untitled.movie.year, Some(2001));
        assert_eq!(untitled.cells, vec!["", "2001", "480", "user note"]);
    }

    #[test]
    fn test_folder_scan_rows() {
        let input = b"folder_path,title_guess,year,path\n\
                      /media/movies/Heat (1995),Heat,1995,/media/movies/Heat (1995)/Heat.1995.1080p.mkv\n\
                      /media/movies/Alien (1979)/,,1979,/media/movies/Alien (1979)/alien.avi\n\
                      /media/movies/Dune 4K,,2021,\n";
        let rows = read_all(input);
        assert_eq!(rows.len(), 3);

        let heat = rows[0].as_ref().unwrap();
        assert_eq!(heat.movie.title, "Heat");
        assert_eq!(heat.movie.current_max_height, 1080);

        let alien = rows[1].as_ref().unwrap();
        assert_eq!(alien.movie.title, "Alien (1979)");
        assert_eq!(alien.movie.current_max_height, 0);

        let dune = rows[2].as_ref().unwrap();
        assert_eq!(dune.movie.title, "Dune 4K");
        assert_eq!(dune.movie.current_max_height, 2160);
    }

    #[test]
    fn test_height_column_wins_over_path_tokens() {
        let rows = read_all(b"title,max_height,path\nHeat,480,/m/Heat.1080p.mkv\n");
        assert_eq!(rows[0].as_ref().unwrap().movie.current_max_height, 480);
    }

    #[test]
    fn test_path_tokens() {
        assert_eq!(height_from_path("Movie.2160p.HDR.mkv"), 2160);
        assert_eq!(height_from_path("Movie UHD Remux"), 2160);
        assert_eq!(height_from_path("movie.1440P.mkv"), 1440);
        assert_eq!(height_from_path("movie.720p.x264"), 720);
        assert_eq!(height_from_path("movie.dvdrip.avi"), 0);
        assert_eq!(folder_name("C:\\films\\Heat\\"), "Heat");
        assert_eq!(folder_name(""), "");
    }

    #[test]
    fn test_short_rows_are_padded() {
        let rows = read_all(b"title,year,max_height\nHeat\n");
        let heat = rows[0].as_ref().unwrap();
        assert_eq!(heat.cells, vec!["Heat", "", ""]);
        assert_eq!(heat.movie.current_max_height, 0);
    }

    #[test]
    fn test_prior_enrichment_is_picked_up() {
        let input = b"title,matched_title,next_quality,magnet\nHeat,Heat,1080p,magnet:?x\n";
        let rows = read_all(input);
        let heat = rows[0].as_ref().unwrap();
        assert_eq!(heat.prior.matched_title, "Heat");
        assert_eq!(heat.prior.next_quality, "1080p");
        assert!(heat.prior.is_resolved());
    }

    #[test]
    fn test_missing_title_column_is_an_error() {
        let result = LibraryReader::new(&b"year,max_height\n1999,480\n"[..]);
        assert!(matches!(
            result,
            Err(UpscoutError::Decode(DecodeError::MissingColumn { .. }))
        ));
    }

    #[test]
    fn test_empty_input_yields_nothing() {
        let mut reader = LibraryReader::new(&b""[..]).unwrap();
        assert!(reader.header().is_empty());
        assert!(reader.next_row().is_none());
    }

    #[test]
    fn test_height_accepts_float_notation() {
        assert_eq!(parse_height("1080"), 1080);
        assert_eq!(parse_height("719.0"), 719);
        assert_eq!(parse_height("unknown"), 0);
        assert_eq!(parse_year("0"), None);
    }
}
