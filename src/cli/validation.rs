// Argument validation for the command line
//
// Everything here fails with `SeghashError::InvalidArgument` (or a more
// specific variant), which the binary turns into exit code 255.

use std::fs::{self, File};
use std::io::{BufRead, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use regex::Regex;
use tracing::debug;

use crate::common::{HashAlgorithm, MAX_HASHES, MIN_SEGMENT_SIZE, SECTOR_SIZE};
use crate::error::{Result, SeghashError};
use crate::manifest::format::DELIMITER;

/// How much of the hash file is inspected for its structure
const STRUCTURE_SAMPLE_LEN: u64 = 1024;

// =============================================================================
// Sizes
// =============================================================================

/// `<digits>[K|M|G|T][B]`, case-insensitive
fn size_regex() -> &'static Regex {
    static SIZE_REGEX: OnceLock<Regex> = OnceLock::new();
    SIZE_REGEX.get_or_init(|| Regex::new(r"(?i)^\s*(\d+)\s*([KMGT]?)(B?)\s*$").expect("Invalid size regex"))
}

/// Parse a byte count with an optional multiplier suffix.
///
/// `K`, `M`, `G`, `T` are powers of 1024; with a trailing `B` (`KB`, `MB`,
/// ...) they are powers of 1000. A bare `B` means bytes.
pub fn parse_size(value: &str) -> std::result::Result<u64, String> {
    let captures = size_regex()
        .captures(value)
        .ok_or_else(|| format!("'{value}' is not a valid size"))?;

    let number: u64 = captures[1]
        .parse()
        .map_err(|_| format!("'{value}' is too large"))?;
    let unit = captures[2].to_ascii_uppercase();
    let base: u64 = if captures[3].is_empty() { 1024 } else { 1000 };

    let exponent = match unit.as_str() {
        "" => 0,
        "K" => 1,
        "M" => 2,
        "G" => 3,
        "T" => 4,
        _ => return Err(format!("'{value}' has an unknown unit")),
    };

    base.checked_pow(exponent)
        .and_then(|multiplier| number.checked_mul(multiplier))
        .ok_or_else(|| format!("'{value}' is too large"))
}

pub fn check_segment_size(segment_size: u64) -> Result<()> {
    if segment_size < MIN_SEGMENT_SIZE {
        return Err(SeghashError::InvalidSegmentSize("segment size is less than 2M".to_string()));
    }
    if segment_size % SECTOR_SIZE != 0 {
        return Err(SeghashError::InvalidSegmentSize(format!(
            "segment size is not a multiple of {SECTOR_SIZE}"
        )));
    }
    Ok(())
}

// =============================================================================
// Hash types
// =============================================================================

/// Resolve hash type names, collapsing duplicates in first-seen order
pub fn hash_algorithms(names: &[String]) -> Result<Vec<HashAlgorithm>> {
    if names.len() > MAX_HASHES {
        return Err(SeghashError::InvalidAlgorithms(
            "cannot calculate more than two hashes at once".to_string(),
        ));
    }

    let mut algorithms = Vec::with_capacity(names.len());
    for name in names {
        let algorithm = HashAlgorithm::from_name(name)?;
        if !algorithms.contains(&algorithm) {
            algorithms.push(algorithm);
        }
    }
    if algorithms.is_empty() {
        return Err(SeghashError::InvalidAlgorithms("no hash type given".to_string()));
    }
    Ok(algorithms)
}

// =============================================================================
// Paths
// =============================================================================

fn base_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().to_string())
        .unwrap_or_else(|| path.to_string_lossy().to_string())
}

/// `Hashes-<input basename>`, or the explicit prefix once its directory is
/// known to exist
pub fn output_prefix(input: &Path, explicit: Option<&str>) -> Result<String> {
    match explicit.filter(|prefix| !prefix.is_empty()) {
        None => Ok(format!("Hashes-{}", base_name(input))),
        Some(prefix) => {
            let dir = match Path::new(prefix).parent() {
                Some(parent) if !parent.as_os_str().is_empty() => parent,
                _ => Path::new("."),
            };
            fs::metadata(dir).map_err(|e| {
                SeghashError::InvalidArgument(format!("output directory {}: {e}", dir.display()))
            })?;
            Ok(prefix.to_string())
        }
    }
}

/// Diff report path: `Diffs-<hashfile stem>` by default, always ending in
/// `.csv`. An explicit name is checked by creating and removing the file.
pub fn diff_report_path(hash_file: &Path, explicit: Option<&str>) -> Result<PathBuf> {
    let name = match explicit.filter(|name| !name.is_empty()) {
        None => {
            let stem = hash_file
                .file_stem()
                .map(|stem| stem.to_string_lossy().to_string())
                .unwrap_or_default();
            format!("Diffs-{stem}")
        }
        Some(name) => {
            File::create(name)
                .and_then(|_| fs::remove_file(name))
                .map_err(|e| SeghashError::InvalidArgument(format!("cannot create {name}: {e}")))?;
            name.to_string()
        }
    };

    let has_csv_extension = Path::new(&name)
        .extension()
        .map_or(false, |ext| ext.eq_ignore_ascii_case("csv"));
    if has_csv_extension {
        Ok(PathBuf::from(name))
    } else {
        Ok(PathBuf::from(format!("{name}.csv")))
    }
}

// =============================================================================
// Input files
// =============================================================================

/// Open `path`, requiring a non-empty regular file
pub fn open_non_empty(path: &Path, arg_name: &str, action: &str) -> Result<File> {
    let file = File::open(path)
        .map_err(|e| SeghashError::InvalidArgument(format!("{arg_name} {}: {e}", path.display())))?;
    let metadata = file.metadata()?;
    if metadata.is_dir() {
        return Err(SeghashError::InvalidArgument(format!(
            "{arg_name} is a directory, cannot {action} directories."
        )));
    }
    if metadata.len() == 0 {
        return Err(SeghashError::InvalidArgument(format!(
            "{arg_name} is empty, cannot {action} empty files."
        )));
    }
    Ok(file)
}

/// The hash file needs at least two delimiters near its start
pub fn check_manifest_structure<R: Read + Seek>(manifest: &mut R) -> Result<()> {
    let mut sample = Vec::new();
    manifest.by_ref().take(STRUCTURE_SAMPLE_LEN).read_to_end(&mut sample)?;
    manifest.seek(SeekFrom::Start(0))?;

    let delimiters = sample.iter().filter(|&&b| b == DELIMITER as u8).count();
    if delimiters < 2 {
        return Err(SeghashError::InvalidManifest(
            "too few delimiters in the first 1024 bytes".to_string(),
        ));
    }
    Ok(())
}

/// Extensions of forensic containers that would be hashed as raw bytes:
/// `E01..E99`, `Ex01..Ex99`, `L01..L99`, `Lx01..Lx99`, `S01..S99`, plus
/// `AFF`, `AFM`, `AFD`, `AD1`, `MFS01`, `AFF4`.
pub fn has_forensic_container_extension(path: &Path) -> bool {
    let extension = match path.extension() {
        Some(ext) => ext.to_string_lossy().to_ascii_uppercase(),
        None => return false,
    };
    if extension.len() < 2 {
        return false;
    }

    let numbered = |digits: &str| matches!(digits.parse::<u32>(), Ok(n) if (1..100).contains(&n));

    if let Some(rest) = extension.strip_prefix("EX").or_else(|| extension.strip_prefix("LX")) {
        numbered(rest)
    } else if let Some(rest) = extension
        .strip_prefix('E')
        .or_else(|| extension.strip_prefix('S'))
        .or_else(|| extension.strip_prefix('L'))
    {
        numbered(rest)
    } else {
        matches!(extension.as_str(), "AFF" | "AFM" | "AFD" | "AD1" | "MFS01" | "AFF4")
    }
}

/// Ask a y/n question until it gets an answer. End of input is an error.
pub fn ask_for_confirmation<R: BufRead, W: Write>(question: &str, input: &mut R, output: &mut W) -> Result<bool> {
    loop {
        write!(output, "{question} (y/n): ")?;
        output.flush()?;

        let mut response = String::new();
        if input.read_line(&mut response)? == 0 {
            return Err(SeghashError::InvalidArgument("expected confirmation".to_string()));
        }
        match response.trim().to_lowercase().as_str() {
            "y" | "yes" => return Ok(true),
            "n" | "no" => return Ok(false),
            other => {
                debug!(response = other, "Unrecognised confirmation");
                writeln!(output, "Please type y/n")?;
            }
        }
    }
}

/// Confirm that a forensic container should be read as raw bytes
pub fn confirm_raw_input<R: BufRead, W: Write>(
    path: &Path,
    assume_yes: bool,
    input: &mut R,
    output: &mut W,
) -> Result<bool> {
    if assume_yes || !has_forensic_container_extension(path) {
        return Ok(true);
    }
    let question = format!(
        "File {} will be interpreted as a raw file. Do you want to continue?",
        base_name(path)
    );
    ask_for_confirmation(&question, input, output)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{self, Cursor};
    use tempfile::TempDir;

    #[test]
    fn test_parse_size() {
        assert_eq!(parse_size("4194304"), Ok(4 * 1024 * 1024));
        assert_eq!(parse_size("2M"), Ok(2 * 1024 * 1024));
        assert_eq!(parse_size("2m"), Ok(2 * 1024 * 1024));
        assert_eq!(parse_size("4G"), Ok(4 * 1024 * 1024 * 1024));
        assert_eq!(parse_size("1T"), Ok(1024u64.pow(4)));
        assert_eq!(parse_size("3K"), Ok(3072));
        assert_eq!(parse_size("5MB"), Ok(5_000_000));
        assert_eq!(parse_size("2gb"), Ok(2_000_000_000));
        assert_eq!(parse_size("512B"), Ok(512));

        assert!(parse_size("").is_err());
        assert!(parse_size("M").is_err());
        assert!(parse_size("2X").is_err());
        assert!(parse_size("-2M").is_err());
        assert!(parse_size("99999999999T").is_err());
    }

    #[test]
    fn test_check_segment_size() {
        assert!(check_segment_size(MIN_SEGMENT_SIZE).is_ok());
        assert!(check_segment_size(3 * 1024 * 1024).is_ok());
        assert!(matches!(
            check_segment_size(MIN_SEGMENT_SIZE - 512),
            Err(SeghashError::InvalidSegmentSize(_))
        ));
        assert!(matches!(
            check_segment_size(5_000_000),
            Err(SeghashError::InvalidSegmentSize(_))
        ));
    }

    #[test]
    fn test_hash_algorithms() {
        let names = |list: &[&str]| list.iter().map(|s| s.to_string()).collect::<Vec<_>>();

        assert_eq!(
            hash_algorithms(&names(&["SHA256", "md5"])).unwrap(),
            vec![HashAlgorithm::Sha256, HashAlgorithm::Md5]
        );
        assert_eq!(hash_algorithms(&names(&["md5", "MD5"])).unwrap(), vec![HashAlgorithm::Md5]);
        assert!(matches!(
            hash_algorithms(&names(&["md5", "sha1", "sha256"])),
            Err(SeghashError::InvalidAlgorithms(_))
        ));
        assert!(matches!(
            hash_algorithms(&names(&["crc32"])),
            Err(SeghashError::UnknownAlgorithm(_))
        ));
        assert!(hash_algorithms(&[]).is_err());
    }

    #[test]
    fn test_forensic_extensions() {
        for name in [
            "a.E01", "a.e99", "a.Ex01", "a.L05", "a.Lx10", "a.S01", "a.aff", "a.AFM", "a.afd", "a.ad1",
            "a.MFS01", "a.aff4",
        ] {
            assert!(has_forensic_container_extension(Path::new(name)), "{name}");
        }
        for name in ["a.dd", "a.img", "a.E00", "a.E100", "a.Ex", "a.S", "a.raw", "noext", "a.L0x"] {
            assert!(!has_forensic_container_extension(Path::new(name)), "{name}");
        }
    }

    #[test]
    fn test_ask_for_confirmation_repeats() {
        let mut input = Cursor::new("maybe\n\nYes\n");
        let mut output = Vec::new();
        assert!(ask_for_confirmation("Continue?", &mut input, &mut output).unwrap());

        let prompt = String::from_utf8(output).unwrap();
        assert_eq!(prompt.matches("Continue? (y/n): ").count(), 3);
        assert_eq!(prompt.matches("Please type y/n").count(), 2);

        let mut input = Cursor::new("N\n");
        assert!(!ask_for_confirmation("Continue?", &mut input, &mut io::sink()).unwrap());
    }

    #[test]
    fn test_ask_for_confirmation_eof() {
        let mut input = Cursor::new("what\n");
        let result = ask_for_confirmation("Continue?", &mut input, &mut io::sink());
        assert!(matches!(result, Err(SeghashError::InvalidArgument(_))));
    }

    #[test]
    fn test_confirm_raw_input() {
        let mut no_input = Cursor::new("");
        assert!(confirm_raw_input(Path::new("image.dd"), false, &mut no_input, &mut io::sink()).unwrap());
        assert!(confirm_raw_input(Path::new("image.E01"), true, &mut no_input, &mut io::sink()).unwrap());

        let mut output = Vec::new();
        let declined = confirm_raw_input(Path::new("/cases/image.E01"), false, &mut Cursor::new("n\n"), &mut output);
        assert!(!declined.unwrap());
        assert!(String::from_utf8(output).unwrap().starts_with("File image.E01 will be interpreted as a raw file."));
    }

    #[test]
    fn test_output_prefix() {
        let temp_dir = TempDir::new().unwrap();
        let input = Path::new("/evidence/disk.img");

        assert_eq!(output_prefix(input, None).unwrap(), "Hashes-disk.img");
        assert_eq!(output_prefix(input, Some("")).unwrap(), "Hashes-disk.img");
        assert_eq!(output_prefix(input, Some("case7")).unwrap(), "case7");

        let explicit = temp_dir.path().join("case7").to_string_lossy().to_string();
        assert_eq!(output_prefix(input, Some(&explicit)).unwrap(), explicit);

        let missing = temp_dir.path().join("nope").join("case7").to_string_lossy().to_string();
        assert!(matches!(
            output_prefix(input, Some(&missing)),
            Err(SeghashError::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_diff_report_path() {
        let temp_dir = TempDir::new().unwrap();
        let hashes = Path::new("/cases/Hashes-disk.img-md5.csv");

        assert_eq!(
            diff_report_path(hashes, None).unwrap(),
            PathBuf::from("Diffs-Hashes-disk.img-md5.csv")
        );

        let explicit = temp_dir.path().join("report");
        let path = diff_report_path(hashes, Some(&explicit.to_string_lossy())).unwrap();
        assert_eq!(path, temp_dir.path().join("report.csv"));
        assert!(!explicit.exists());

        let upper = temp_dir.path().join("report.CSV");
        assert_eq!(diff_report_path(hashes, Some(&upper.to_string_lossy())).unwrap(), upper);

        let unwritable = temp_dir.path().join("missing").join("report.csv");
        assert!(diff_report_path(hashes, Some(&unwritable.to_string_lossy())).is_err());
    }

    #[test]
    fn test_open_non_empty() {
        let temp_dir = TempDir::new().unwrap();
        let empty = temp_dir.path().join("empty.dd");
        fs::write(&empty, b"").unwrap();
        let full = temp_dir.path().join("full.dd");
        fs::write(&full, b"data").unwrap();

        assert!(open_non_empty(&full, "<inputfile>", "hash").is_ok());

        let err = open_non_empty(&empty, "<inputfile>", "calculate segment hashes over").unwrap_err();
        assert_eq!(err.to_string(), "<inputfile> is empty, cannot calculate segment hashes over empty files.");

        let err = open_non_empty(temp_dir.path(), "<inputfile>", "calculate segment hashes over").unwrap_err();
        assert!(err.to_string().contains("is a directory"));

        assert!(open_non_empty(&temp_dir.path().join("missing"), "<inputfile>", "hash").is_err());
    }

    #[test]
    fn test_check_manifest_structure() {
        let mut good = Cursor::new(b"abcd,0,1\n".to_vec());
        check_manifest_structure(&mut good).unwrap();
        assert_eq!(good.position(), 0);

        let mut bad = Cursor::new(b"abcd;0;1\n".to_vec());
        assert!(matches!(
            check_manifest_structure(&mut bad),
            Err(SeghashError::InvalidManifest(_))
        ));

        let mut late = vec![b'x'; 1024];
        late.extend_from_slice(b",,");
        assert!(check_manifest_structure(&mut Cursor::new(late)).is_err());
    }
}
