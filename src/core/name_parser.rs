use crate::domain::model::normalize_name;
use regex::Regex;
use std::sync::LazyLock;

/// 標題格式: "이름1, 이름2 - 사유"
pub const NAME_DELIMITER: char = '-';

static EXTRA_HEADCOUNT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(?P<name>.*?)\s*외\s*(?P<extra>\d+)\s*명$").unwrap());

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedAttendance {
    pub names: Vec<String>,
    /// People counted only by number ("홍길동 외 2명").
    pub extra: u32,
}

/// Extracts absentee names from an event title.
///
/// Only the part before the first `-` is read; titles without the delimiter
/// are not absence notices and yield nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct NameListParser {
    extra_headcount: bool,
}

impl NameListParser {
    pub fn new(extra_headcount: bool) -> Self {
        Self { extra_headcount }
    }

    pub fn parse(&self, title: &str) -> Vec<String> {
        self.parse_with_extras(title).names
    }

    pub fn parse_with_extras(&self, title: &str) -> ParsedAttendance {
        let Some((segment, _)) = title.split_once(NAME_DELIMITER) else {
            return ParsedAttendance::default();
        };

        let mut parsed = ParsedAttendance::default();
        for piece in segment.split(',') {
            let piece = normalize_name(piece);
            if piece.is_empty() {
                continue;
            }

            if self.extra_headcount {
                if let Some(caps) = EXTRA_HEADCOUNT.captures(&piece) {
                    let extra = caps["extra"].parse::<u32>().unwrap_or(0);
                    parsed.extra = parsed.extra.saturating_add(extra);
                    let name = normalize_name(&caps["name"]);
                    if !name.is_empty() {
                        parsed.names.push(name);
                    }
                    continue;
                }
            }

            parsed.names.push(piece);
        }
        parsed
    }
}
