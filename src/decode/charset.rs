//! Repair of a specific, detectable mis-decoding: multi-byte UTF-8 that was
//! read one byte at a time as a Latin-family single-byte charset.
//!
//! The damage has a clear signature. Either the text contains C1 control
//! code points (U+0080–U+009F), which never legitimately appear in header
//! text, or it contains runs of byte pairs matching the UTF-8
//! lead-byte/continuation-byte pattern (`Ã©` for `é`, `â€œ` for a curly
//! quote). The repair reinterprets the code points as raw bytes and decodes
//! them as UTF-8 — but is only accepted when the measured state strictly
//! improves, so legitimately extended-Latin text is left alone.

/// Cheap objective quality measure for a piece of decoded text.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TextScore {
    /// C1 control code points (U+0080–U+009F).
    pub c1_controls: usize,
    /// UTF-8 lead-byte/continuation-byte pairs read as code points.
    pub mojibake_pairs: usize,
    /// Literal U+FFFD replacement characters.
    pub replacements: usize,
}

impl TextScore {
    /// Score a string.
    pub fn of(text: &str) -> Self {
        let mut score = Self::default();
        let mut prev: Option<u32> = None;
        for ch in text.chars() {
            let cp = ch as u32;
            if (0x80..=0x9F).contains(&cp) {
                score.c1_controls += 1;
            }
            if ch == '\u{FFFD}' {
                score.replacements += 1;
            }
            if let Some(lead) = prev
                && (0xC2..=0xF4).contains(&lead)
                && (0x80..=0xBF).contains(&cp)
            {
                score.mojibake_pairs += 1;
            }
            prev = Some(cp);
        }
        score
    }

    /// Combined badness, used to rank decode strategies.
    pub fn badness(&self) -> usize {
        self.c1_controls + self.mojibake_pairs + self.replacements
    }

    /// Whether this score is a strict improvement over `before`:
    /// control codes eliminated, or the pair count strictly decreased,
    /// without introducing replacement characters.
    fn improves_on(&self, before: &TextScore) -> bool {
        if self.replacements > before.replacements {
            return false;
        }
        let controls_eliminated = before.c1_controls > 0 && self.c1_controls == 0;
        let pairs_reduced = self.mojibake_pairs < before.mojibake_pairs;
        controls_eliminated || pairs_reduced
    }
}

/// Repair mojibake in header text. Returns the input unchanged when no
/// damage signature is present, when the text cannot be reinterpreted as
/// bytes, or when the repair would not strictly improve matters.
///
/// Idempotent: repaired text carries no signature, so a second application
/// is a no-op.
pub fn normalize_header(text: &str) -> String {
    let before = TextScore::of(text);
    if before.c1_controls == 0 && before.mojibake_pairs == 0 {
        return text.to_string();
    }

    // Reinterpretation only makes sense if every code point fits in a byte.
    let mut bytes = Vec::with_capacity(text.len());
    for ch in text.chars() {
        let cp = ch as u32;
        if cp > 0xFF {
            return text.to_string();
        }
        bytes.push(cp as u8);
    }

    let Ok(repaired) = String::from_utf8(bytes) else {
        return text.to_string();
    };

    let after = TextScore::of(&repaired);
    if after.improves_on(&before) {
        repaired
    } else {
        text.to_string()
    }
}
