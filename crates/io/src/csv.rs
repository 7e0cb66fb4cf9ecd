// Delimited text loading and result export

use std::io::Read;
use std::path::Path;

use tallyguard_recon::Dataset;

use crate::error::LoadError;
use crate::parse_cell;

pub fn import(path: &Path) -> Result<Dataset, LoadError> {
    let content = read_file_as_utf8(path)?;
    let delimiter = sniff_delimiter(&content);
    import_from_string(&content, delimiter).map_err(|e| with_path(e, path))
}

pub fn import_with_delimiter(path: &Path, delimiter: u8) -> Result<Dataset, LoadError> {
    let content = read_file_as_utf8(path)?;
    import_from_string(&content, delimiter).map_err(|e| with_path(e, path))
}

const DELIMITERS: [u8; 4] = [b'\t', b';', b',', b'|'];
const SNIFF_ROWS: usize = 9;

/// Pick the delimiter the header row splits on, preferring the candidate
/// whose header width is repeated by the most of the next few non-blank
/// rows (then the wider header). Single-column input falls back to comma.
pub fn sniff_delimiter(content: &str) -> u8 {
    let mut lines = content.lines().filter(|l| !l.trim().is_empty());
    let Some(header) = lines.next() else {
        return b',';
    };
    let sample: Vec<&str> = lines.take(SNIFF_ROWS).collect();

    let mut best: Option<(u8, (usize, usize))> = None;
    for delimiter in DELIMITERS {
        let width = field_count(header, delimiter);
        if width < 2 {
            continue;
        }
        let agreeing = sample
            .iter()
            .filter(|line| field_count(line, delimiter) == width)
            .count();
        let score = (agreeing, width);
        if best.map_or(true, |(_, top)| score > top) {
            best = Some((delimiter, score));
        }
    }

    best.map_or(b',', |(delimiter, _)| delimiter)
}

/// Fields in one line, honouring quotes.
fn field_count(line: &str, delimiter: u8) -> usize {
    csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .has_headers(false)
        .flexible(true)
        .from_reader(line.as_bytes())
        .records()
        .next()
        .and_then(Result::ok)
        .map_or(1, |record| record.len())
}

/// Read file and convert to UTF-8 if needed (Excel-exported CSVs are often Windows-1252).
pub fn read_file_as_utf8(path: &Path) -> Result<String, LoadError> {
    let io_err = |e: std::io::Error| LoadError::Io {
        path: path.display().to_string(),
        message: e.to_string(),
    };

    let mut file = std::fs::File::open(path).map_err(io_err)?;
    let mut bytes = Vec::new();
    file.read_to_end(&mut bytes).map_err(io_err)?;

    match String::from_utf8(bytes) {
        Ok(s) => Ok(s.strip_prefix('\u{feff}').map(str::to_string).unwrap_or(s)),
        Err(e) => {
            log::debug!("{} is not UTF-8, decoding as Windows-1252", path.display());
            let bytes = e.into_bytes();
            let (decoded, _, _) = encoding_rs::WINDOWS_1252.decode(&bytes);
            Ok(decoded.into_owned())
        }
    }
}

/// First record is the header row. Blank lines are skipped.
fn import_from_string(content: &str, delimiter: u8) -> Result<Dataset, LoadError> {
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .has_headers(true)
        .flexible(true)
        .from_reader(content.as_bytes());

    let headers: Vec<String> = reader
        .headers()
        .map_err(|e| LoadError::Csv(e.to_string()))?
        .iter()
        .map(str::to_string)
        .collect();
    if headers.is_empty() || headers.iter().all(|h| h.trim().is_empty()) {
        return Err(LoadError::NoHeader(String::new()));
    }

    let mut rows = Vec::new();
    for result in reader.records() {
        let record = result.map_err(|e| LoadError::Csv(e.to_string()))?;
        if record.iter().all(|f| f.trim().is_empty()) {
            continue;
        }
        rows.push(record.iter().map(parse_cell).collect());
    }

    Ok(Dataset::from_rows(headers, rows))
}

fn with_path(err: LoadError, path: &Path) -> LoadError {
    match err {
        LoadError::NoHeader(_) => LoadError::NoHeader(path.display().to_string()),
        LoadError::Csv(message) => LoadError::Csv(format!("{}: {message}", path.display())),
        other => other,
    }
}

/// Write every column of `dataset`, header first. Missing cells are blank.
pub fn export(dataset: &Dataset, path: &Path) -> Result<(), LoadError> {
    let write_err = |message: String| LoadError::Write {
        path: path.display().to_string(),
        message,
    };

    let mut writer = csv::WriterBuilder::new()
        .from_path(path)
        .map_err(|e| write_err(e.to_string()))?;

    writer
        .write_record(dataset.column_names())
        .map_err(|e| write_err(e.to_string()))?;

    for row in 0..dataset.row_count() {
        let record: Vec<String> = dataset
            .columns()
            .iter()
            .map(|c| c.values[row].to_string())
            .collect();
        writer.write_record(&record).map_err(|e| write_err(e.to_string()))?;
    }

    writer.flush().map_err(|e| write_err(e.to_string()))?;
    Ok(())
}
