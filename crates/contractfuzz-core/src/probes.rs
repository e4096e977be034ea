//! Static probe catalog
//!
//! Fixed, ordered character sequences mutation strategies draw from. Every
//! category is non-empty and lookups cannot fail.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Probe category
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum ProbeCategory {
    /// ASCII and Unicode control characters
    ControlChars,
    /// Zero-width and format characters that render as nothing
    InvisibleChars,
    /// Space variants, including the ones valid inside HTTP header values
    Whitespace,
    /// Emojis made of several code points (ZWJ sequences, modifiers, flags)
    MultiCodePointEmojis,
    /// Emojis made of a single code point
    SingleCodePointEmojis,
}

const CONTROL_CHARS: &[&str] = &[
    "\r\n", "\u{0000}", "\u{0007}", "\u{0008}", "\u{0009}", "\n", "\u{000B}", "\u{000C}", "\r",
    "\u{001B}", "\u{007F}", "\u{0080}", "\u{009F}", "\u{00AD}", "\u{061C}", "\u{180E}",
    "\u{200B}", "\u{200C}", "\u{200D}", "\u{200E}", "\u{200F}", "\u{202A}", "\u{202B}",
    "\u{202C}", "\u{202D}", "\u{202E}", "\u{2060}", "\u{2066}", "\u{2067}", "\u{2068}",
    "\u{2069}", "\u{FEFF}",
];

const INVISIBLE_CHARS: &[&str] = &[
    "\u{00AD}", "\u{180E}", "\u{200B}", "\u{200C}", "\u{200D}", "\u{200E}", "\u{200F}",
    "\u{2060}", "\u{2061}", "\u{2062}", "\u{2063}", "\u{2064}", "\u{FEFF}",
];

const WHITESPACE: &[&str] = &[
    " ", "\u{0009}", "\u{00A0}", "\u{1680}", "\u{2000}", "\u{2001}", "\u{2002}", "\u{2003}",
    "\u{2004}", "\u{2005}", "\u{2006}", "\u{2007}", "\u{2008}", "\u{2009}", "\u{200A}",
    "\u{2028}", "\u{2029}", "\u{202F}", "\u{205F}", "\u{3000}",
];

const MULTI_CODE_POINT_EMOJIS: &[&str] = &[
    "\u{1F469}\u{1F3FE}",
    "\u{1F468}\u{200D}\u{1F469}\u{200D}\u{1F467}\u{200D}\u{1F466}",
    "\u{1F3F3}\u{FE0F}\u{200D}\u{1F308}",
    "\u{1F1F7}\u{1F1F4}",
    "\u{1F469}\u{200D}\u{2764}\u{FE0F}\u{200D}\u{1F48B}\u{200D}\u{1F469}",
    "\u{1F44D}\u{1F3FD}",
    "\u{0031}\u{FE0F}\u{20E3}",
];

const SINGLE_CODE_POINT_EMOJIS: &[&str] = &[
    "\u{1F923}", "\u{1F976}", "\u{1F47B}", "\u{1F525}", "\u{2615}", "\u{1F680}",
];

impl ProbeCategory {
    pub const ALL: [Self; 5] = [
        Self::ControlChars,
        Self::InvisibleChars,
        Self::Whitespace,
        Self::MultiCodePointEmojis,
        Self::SingleCodePointEmojis,
    ];

    /// Probe values of this category, in catalog order.
    #[must_use]
    pub const fn values(self) -> &'static [&'static str] {
        match self {
            Self::ControlChars => CONTROL_CHARS,
            Self::InvisibleChars => INVISIBLE_CHARS,
            Self::Whitespace => WHITESPACE,
            Self::MultiCodePointEmojis => MULTI_CODE_POINT_EMOJIS,
            Self::SingleCodePointEmojis => SINGLE_CODE_POINT_EMOJIS,
        }
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::ControlChars => "control chars",
            Self::InvisibleChars => "invisible chars",
            Self::Whitespace => "spaces",
            Self::MultiCodePointEmojis => "multi code point emojis",
            Self::SingleCodePointEmojis => "single code point emojis",
        }
    }

    /// Remove probe sequences of this category from both ends of `value`.
    ///
    /// Longest probes are tried first so a multi code point sequence is never
    /// split into an orphaned tail.
    #[must_use]
    pub fn trim(self, value: &str) -> String {
        let mut probes: Vec<&str> = self.values().to_vec();
        probes.sort_by_key(|p| std::cmp::Reverse(p.len()));

        let mut rest = value;
        loop {
            let before = rest.len();
            for p in &probes {
                while let Some(stripped) = rest.strip_prefix(p) {
                    rest = stripped;
                }
                while let Some(stripped) = rest.strip_suffix(p) {
                    rest = stripped;
                }
            }
            if rest.len() == before {
                break;
            }
        }
        rest.to_string()
    }
}

impl std::fmt::Display for ProbeCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_category_is_non_empty() {
        for cat in ProbeCategory::ALL {
            assert!(!cat.values().is_empty(), "{cat} is empty");
            assert!(cat.values().iter().all(|p| !p.is_empty()));
        }
    }

    #[test]
    fn catalog_order_is_stable() {
        assert_eq!(ProbeCategory::ControlChars.values()[0], "\r\n");
        assert_eq!(ProbeCategory::Whitespace.values()[0], " ");
        assert_eq!(
            ProbeCategory::ControlChars.values(),
            ProbeCategory::ControlChars.values()
        );
    }

    #[test]
    fn multi_code_point_emojis_have_several_chars() {
        for e in ProbeCategory::MultiCodePointEmojis.values() {
            assert!(e.chars().count() > 1, "{e:?} is a single code point");
        }
        for e in ProbeCategory::SingleCodePointEmojis.values() {
            assert_eq!(e.chars().count(), 1);
        }
    }

    #[test]
    fn trim_strips_probe_only_value_to_empty() {
        for cat in ProbeCategory::ALL {
            let all: String = cat.values().concat();
            assert_eq!(cat.trim(&all), "", "{cat}");
        }
    }

    #[test]
    fn trim_keeps_inner_content() {
        let cat = ProbeCategory::MultiCodePointEmojis;
        let value = format!("abc{}", cat.values()[1]);
        assert_eq!(cat.trim(&value), "abc");

        let ws = ProbeCategory::Whitespace;
        assert_eq!(ws.trim(" \u{3000}a b\u{00A0} "), "a b");
    }

    #[test]
    fn trim_leaves_other_categories_alone() {
        assert_eq!(ProbeCategory::Whitespace.trim("\u{200B}x"), "\u{200B}x");
    }
}
