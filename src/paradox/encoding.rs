//! Codepage recoding: legacy single-byte text → UTF-8.
//!
//! The label is derived as `"CP" + header codepage` unless the caller
//! supplied an override. `encoding_rs` handles the labels it knows (CP866,
//! the windows-125x family); the DOS codepages it lacks (CP437, CP850,
//! CP852) are recoded through prebuilt 128-entry tables. The recoder never
//! fails: invalid sequences become U+FFFD, unknown labels pass the input
//! through as (lossy) UTF-8.

use std::borrow::Cow;

use encoding_rs::Encoding;
use log::trace;

/// Resolve the effective codepage label for a document.
///
/// An explicit override wins; otherwise a non-zero header codepage yields a
/// `"CP<n>"` label; otherwise the label is empty and text passes through.
pub fn resolve_label(header_codepage: u16, override_label: Option<&str>) -> String {
    match override_label {
        Some(label) => label.to_string(),
        None if header_codepage > 0 => format!("CP{}", header_codepage),
        None => String::new(),
    }
}

/// Recode `bytes` under `label` into UTF-8.
///
/// Input that is already valid UTF-8 is returned unchanged, as is input under
/// an empty or unknown label (lossily, replacing invalid sequences).
pub fn recode<'a>(bytes: &'a [u8], label: &str) -> Cow<'a, str> {
    if let Ok(text) = std::str::from_utf8(bytes) {
        return Cow::Borrowed(text);
    }
    if !label.is_empty() {
        if let Some(encoding) = Encoding::for_label(label.as_bytes()) {
            let (text, _, _) = encoding.decode(bytes);
            return Cow::Owned(text.into_owned());
        }
        if let Some(table) = dos_table(label) {
            return Cow::Owned(decode_with_table(bytes, table));
        }
        trace!("Unknown codepage label '{}', passing text through", label);
    }
    String::from_utf8_lossy(bytes)
}

/// Look up the static table for a DOS codepage `encoding_rs` has no coverage
/// for. Accepts `CP437`, `cp437`, `ibm437` and bare `437` style labels.
fn dos_table(label: &str) -> Option<&'static [char; 128]> {
    let digits = label
        .trim_start_matches(|c: char| c.is_ascii_alphabetic() || c == '-' || c == '_')
        .trim();
    match digits {
        "437" => Some(&CP437_HIGH),
        "850" => Some(&CP850_HIGH),
        "852" => Some(&CP852_HIGH),
        _ => None,
    }
}

fn decode_with_table(bytes: &[u8], table: &[char; 128]) -> String {
    bytes
        .iter()
        .map(|&b| {
            if b < 0x80 {
                b as char
            } else {
                table[(b - 0x80) as usize]
            }
        })
        .collect()
}

/// CP437 (original IBM PC), bytes 0x80–0xFF.
static CP437_HIGH: [char; 128] = [
    'Ç', 'ü', 'é', 'â', 'ä', 'à', 'å', 'ç', 'ê', 'ë', 'è', 'ï', 'î', 'ì', 'Ä', 'Å', //
    'É', 'æ', 'Æ', 'ô', 'ö', 'ò', 'û', 'ù', 'ÿ', 'Ö', 'Ü', '¢', '£', '¥', '₧', 'ƒ', //
    'á', 'í', 'ó', 'ú', 'ñ', 'Ñ', 'ª', 'º', '¿', '⌐', '¬', '½', '¼', '¡', '«', '»', //
    '░', '▒', '▓', '│', '┤', '╡', '╢', '╖', '╕', '╣', '║', '╗', '╝', '╜', '╛', '┐', //
    '└', '┴', '┬', '├', '─', '┼', '╞', '╟', '╚', '╔', '╩', '╦', '╠', '═', '╬', '╧', //
    '╨', '╤', '╥', '╙', '╘', '╒', '╓', '╫', '╪', '┘', '┌', '█', '▄', '▌', '▐', '▀', //
    'α', 'ß', 'Γ', 'π', 'Σ', 'σ', 'µ', 'τ', 'Φ', 'Θ', 'Ω', 'δ', '∞', 'φ', 'ε', '∩', //
    '≡', '±', '≥', '≤', '⌠', '⌡', '÷', '≈', '°', '∙', '·', '√', 'ⁿ', '²', '■', '\u{a0}',
];

/// CP850 (Western European DOS), bytes 0x80–0xFF.
static CP850_HIGH: [char; 128] = [
    'Ç', 'ü', 'é', 'â', 'ä', 'à', 'å', 'ç', 'ê', 'ë', 'è', 'ï', 'î', 'ì', 'Ä', 'Å', //
    'É', 'æ', 'Æ', 'ô', 'ö', 'ò', 'û', 'ù', 'ÿ', 'Ö', 'Ü', 'ø', '£', 'Ø', '×', 'ƒ', //
    'á', 'í', 'ó', 'ú', 'ñ', 'Ñ', 'ª', 'º', '¿', '®', '¬', '½', '¼', '¡', '«', '»', //
    '░', '▒', '▓', '│', '┤', 'Á', 'Â', 'À', '©', '╣', '║', '╗', '╝', '¢', '¥', '┐', //
    '└', '┴', '┬', '├', '─', '┼', 'ã', 'Ã', '╚', '╔', '╩', '╦', '╠', '═', '╬', '¤', //
    'ð', 'Ð', 'Ê', 'Ë', 'È', 'ı', 'Í', 'Î', 'Ï', '┘', '┌', '█', '▄', '¦', 'Ì', '▀', //
    'Ó', 'ß', 'Ô', 'Ò', 'õ', 'Õ', 'µ', 'þ', 'Þ', 'Ú', 'Û', 'Ù', 'ý', 'Ý', '¯', '´', //
    '\u{ad}', '±', '‗', '¾', '¶', '§', '÷', '¸', '°', '¨', '·', '¹', '³', '²', '■',
    '\u{a0}',
];

/// CP852 (Central European DOS), bytes 0x80–0xFF.
static CP852_HIGH: [char; 128] = [
    'Ç', 'ü', 'é', 'â', 'ä', 'ů', 'ć', 'ç', 'ł', 'ë', 'Ő', 'ő', 'î', 'Ź', 'Ä', 'Ć', //
    'É', 'Ĺ', 'ĺ', 'ô', 'ö', 'Ľ', 'ľ', 'Ś', 'ś', 'Ö', 'Ü', 'Ť', 'ť', 'Ł', '×', 'č', //
    'á', 'í', 'ó', 'ú', 'Ą', 'ą', 'Ž', 'ž', 'Ę', 'ę', '¬', 'ź', 'Č', 'ş', '«', '»', //
    '░', '▒', '▓', '│', '┤', 'Á', 'Â', 'Ě', 'Ş', '╣', '║', '╗', '╝', 'Ż', 'ż', '┐', //
    '└', '┴', '┬', '├', '─', '┼', 'Ă', 'ă', '╚', '╔', '╩', '╦', '╠', '═', '╬', '¤', //
    'đ', 'Đ', 'Ď', 'Ë', 'ď', 'Ň', 'Í', 'Î', 'ě', '┘', '┌', '█', '▄', 'Ţ', 'Ů', '▀', //
    'Ó', 'ß', 'Ô', 'Ń', 'ń', 'ň', 'Š', 'š', 'Ŕ', 'Ú', 'ŕ', 'Ű', 'ý', 'Ý', 'ţ', '´', //
    '\u{ad}', '˝', '˛', 'ˇ', '˘', '§', '÷', '¸', '°', '¨', '˙', 'ű', 'Ř', 'ř', '■',
    '\u{a0}',
];
