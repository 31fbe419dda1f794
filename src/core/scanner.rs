//! Parsing of the block-device listing (`lsblk -n -b -o NAME,SIZE,TYPE`).
//!
//! Grammar, one device per line:
//!
//! ```text
//! line   := prefix? name WS size WS type
//! prefix := ( '└' | '├' | '│' | '─' | '`' | '|' | '-' | ' ' )*
//! name   := [A-Za-z0-9_.:+@-]+
//! size   := <anything accepted by size::parse_size>
//! type   := [a-z0-9]+          ("disk", "part", anything else is Other)
//! ```
//!
//! Blank lines are ignored. Any other deviation is a [`ParseError`] and
//! ends the scan; there is no per-line recovery.

use std::str::Lines;
use std::sync::LazyLock;

use regex::Regex;

use super::error::ParseError;
use super::hardware::{BlockDevice, DeviceKind};
use super::size::parse_size;

static NAME_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9_.:+@-]+$").expect("valid name regex"));
static TYPE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-z0-9]+$").expect("valid type regex"));

fn is_tree_glyph(c: char) -> bool {
    matches!(c, '└' | '├' | '│' | '─' | '`' | '|' | '-' | ' ' | '\t')
}

/// Lazily parse a listing. Each item is one device or the error that ends the scan.
pub fn parse_listing(output: &str) -> DeviceListing<'_> {
    DeviceListing {
        lines: output.lines(),
        line_no: 0,
        failed: false,
    }
}

pub struct DeviceListing<'a> {
    lines: Lines<'a>,
    line_no: usize,
    failed: bool,
}

impl Iterator for DeviceListing<'_> {
    type Item = Result<BlockDevice, ParseError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }

        loop {
            let raw = self.lines.next()?;
            self.line_no += 1;

            if raw.trim().is_empty() {
                continue;
            }

            let parsed = parse_line(raw, self.line_no);
            self.failed = parsed.is_err();
            return Some(parsed);
        }
    }
}

/// Parse a single non-empty listing line.
pub fn parse_line(raw: &str, line_no: usize) -> Result<BlockDevice, ParseError> {
    let malformed = |reason: String| ParseError::MalformedListing {
        line: line_no,
        content: raw.to_string(),
        reason,
    };

    let stripped = raw.trim_start_matches(is_tree_glyph);
    let fields: Vec<&str> = stripped.split_whitespace().collect();

    let [name, size, kind] = fields.as_slice() else {
        return Err(malformed(format!("expected 3 fields, found {}", fields.len())));
    };

    if !NAME_RE.is_match(name) {
        return Err(malformed(format!("invalid device name '{}'", name)));
    }

    let size_bytes = parse_size(size).map_err(|e| malformed(e.to_string()))?;

    if !TYPE_RE.is_match(kind) {
        return Err(malformed(format!("invalid device type '{}'", kind)));
    }

    Ok(BlockDevice {
        name: name.to_string(),
        size_bytes,
        kind: DeviceKind::from_token(kind),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const TREE_LISTING: &str = "\
mmcblk0      31914983424 disk
├─mmcblk0p1    268435456 part
└─mmcblk0p2  31642877952 part
sda          64023257088 disk
└─sda1       64022208512 part
";

    #[test]
    fn test_parses_tree_listing() {
        let devices: Vec<_> = parse_listing(TREE_LISTING)
            .collect::<Result<_, _>>()
            .unwrap();

        assert_eq!(devices.len(), 5);
        assert_eq!(devices[1].name, "mmcblk0p1");
        assert_eq!(devices[1].kind, DeviceKind::Part);
        assert_eq!(devices[3].name, "sda");
        assert_eq!(devices[3].kind, DeviceKind::Disk);
        assert_eq!(devices[4].name, "sda1");
        assert_eq!(devices[4].size_bytes, 64022208512);
    }

    #[test]
    fn test_strips_nested_and_ascii_glyphs() {
        let dev = parse_line("│ └─vg-root 1000 lvm", 1).unwrap();
        assert_eq!(dev.name, "vg-root");
        assert_eq!(dev.kind, DeviceKind::Other);

        let dev = parse_line("`-sdb1 2000 part", 1).unwrap();
        assert_eq!(dev.name, "sdb1");

        let dev = parse_line("|-sdb2 2000 part", 1).unwrap();
        assert_eq!(dev.name, "sdb2");
    }

    #[test]
    fn test_accepts_human_readable_sizes() {
        let dev = parse_line("sdb1 1.8T part", 1).unwrap();
        assert_eq!(dev.size_bytes, (1.8 * 1024f64.powi(4)) as u64);
    }

    #[test]
    fn test_wrong_field_count_is_an_error() {
        let err = parse_line("sda1 1000", 3).unwrap_err();
        match err {
            ParseError::MalformedListing { line, reason, .. } => {
                assert_eq!(line, 3);
                assert!(reason.contains("expected 3 fields, found 2"));
            }
            other => panic!("unexpected error: {other:?}"),
        }

        assert!(parse_line("sda1 1000 part extra", 1).is_err());
    }

    #[test]
    fn test_bad_size_is_an_error() {
        assert!(parse_line("sda1 lots part", 1).is_err());
    }

    #[test]
    fn test_scan_stops_at_first_malformed_line() {
        let listing = "sda1 100 part\nbroken\nsdb1 200 part\n";
        let items: Vec<_> = parse_listing(listing).collect();

        assert_eq!(items.len(), 2);
        assert!(items[0].is_ok());
        assert!(items[1].is_err());
    }

    #[test]
    fn test_blank_lines_are_skipped_but_counted() {
        let listing = "\nsda1 100 part\n\n   \nbad line here now\n";
        let items: Vec<_> = parse_listing(listing).collect();

        assert_eq!(items.len(), 2);
        match &items[1] {
            Err(ParseError::MalformedListing { line, .. }) => assert_eq!(*line, 5),
            other => panic!("unexpected item: {other:?}"),
        }
    }

    #[test]
    fn test_empty_listing_yields_nothing() {
        assert_eq!(parse_listing("").count(), 0);
    }
}
