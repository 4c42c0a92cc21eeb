//! Salary glyph decoding.
//!
//! The listing renders salary digits through a custom web font in which each
//! digit is a private-use code point (`U+E030`..`U+E039`). The text read from
//! the DOM therefore looks like `"\u{E031}\u{E035}-\u{E032}\u{E035}K"`.

const GLYPH_TABLE: [(char, char); 10] = [
    ('\u{E030}', '0'),
    ('\u{E031}', '1'),
    ('\u{E032}', '2'),
    ('\u{E033}', '3'),
    ('\u{E034}', '4'),
    ('\u{E035}', '5'),
    ('\u{E036}', '6'),
    ('\u{E037}', '7'),
    ('\u{E038}', '8'),
    ('\u{E039}', '9'),
];

fn decode_char(c: char) -> char {
    GLYPH_TABLE
        .iter()
        .find(|(glyph, _)| *glyph == c)
        .map(|(_, digit)| *digit)
        .unwrap_or(c)
}

/// Replace every font glyph with its ASCII digit; other characters pass through.
pub fn decode_salary(text: &str) -> String {
    text.chars().map(decode_char).collect()
}
