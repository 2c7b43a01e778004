//! Character-reference codec for web_dict storage.
//!
//! Dictionary tables store text with every non-ASCII character written as a
//! decimal numeric reference, and with the two characters that would make
//! those references visible to the store rewritten as markers:
//!
//! | stored     | meaning      |
//! |------------|--------------|
//! | `#8#38#9#` | `&amp;amp;`  |
//! | `#9#`      | `;`          |
//! | `#8#`      | `&#`         |
//!
//! Text that already holds a literal `&#` reference does not survive
//! `decode(encode(text))`: the reference comes back expanded.

use regex::{Captures, Regex};
use std::sync::LazyLock;

/// Escaped ampersand as stored, and its display form.
const AMPERSAND_MARKER: (&str, &str) = ("#8#38#9#", "&amp;amp;");
const SEMICOLON_MARKER: (&str, &str) = ("#9#", ";");
const CHARREF_MARKER: (&str, &str) = ("#8#", "&#");

static NUMERIC_CHARREF: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"&#(?:[xX]([0-9A-Fa-f]+)|([0-9]+));").unwrap());

/// Decode a stored value into UTF-8 display text.
///
/// The result may still contain markup that needs escaping before it is
/// embedded in XML (`&amp;amp;` stays as is).
pub fn decode(stored: &str) -> String {
    let unmarked = [AMPERSAND_MARKER, SEMICOLON_MARKER, CHARREF_MARKER]
        .iter()
        .fold(stored.to_string(), |acc, (marker, display)| {
            acc.replace(marker, display)
        });
    expand_numeric_charrefs(&unmarked)
}

/// Encode UTF-8 text the way it is stored in the dictionary tables.
///
/// Encoding is idempotent: encoded output contains neither `;`, `&#` nor
/// non-ASCII characters, so encoding it again changes nothing.
pub fn encode(text: &str) -> String {
    let mut numeric = String::with_capacity(text.len());
    for c in text.chars() {
        if c.is_ascii() {
            numeric.push(c);
        } else {
            numeric.push_str(&format!("&#{};", c as u32));
        }
    }
    // ";" before "&#": the semicolons closing the new references go first.
    [SEMICOLON_MARKER, CHARREF_MARKER]
        .iter()
        .fold(numeric, |acc, (marker, raw)| acc.replace(raw, marker))
}

/// Encode an optional value, propagating absence.
pub fn encode_opt(text: Option<&str>) -> Option<String> {
    text.map(encode)
}

/// Replace `&#NNN;` and `&#xHH;` with the characters they denote.
///
/// References that do not name a valid scalar value are left untouched.
fn expand_numeric_charrefs(text: &str) -> String {
    NUMERIC_CHARREF
        .replace_all(text, |caps: &Captures| {
            let code = match (caps.get(1), caps.get(2)) {
                (Some(hex), _) => u32::from_str_radix(hex.as_str(), 16).ok(),
                (None, Some(dec)) => dec.as_str().parse::<u32>().ok(),
                _ => None,
            };
            match code.and_then(char::from_u32) {
                Some(c) => c.to_string(),
                None => caps[0].to_string(),
            }
        })
        .into_owned()
}
