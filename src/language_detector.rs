//! Script-based language guess for a text sample.

/// Unicode-block frequency detector. No ML, no external dictionaries —
/// counts characters in known language-specific blocks and falls back to
/// `"en"` when nothing dominant is found.
#[derive(Debug, Default, Clone, Copy)]
pub struct LanguageDetector;

impl LanguageDetector {
    pub fn new() -> Self {
        Self
    }

    /// Returns `(lang_code, confidence)`.
    pub fn detect(&self, text: &str) -> (String, f32) {
        let total = text.chars().filter(|c| !c.is_whitespace()).count();
        if total == 0 {
            return ("en".to_string(), 0.0);
        }

        let mut counts: Vec<(&str, usize)> = vec![
            ("ko", 0),
            ("zh", 0),
            ("ja", 0),
            ("ru", 0),
            ("ar", 0),
            ("hi", 0),
        ];

        for c in text.chars() {
            let cp = c as u32;
            if (0xAC00..=0xD7A3).contains(&cp) {
                counts[0].1 += 1; // Hangul -> Korean
            } else if (0x3040..=0x30FF).contains(&cp) {
                counts[2].1 += 1; // Hiragana/Katakana -> Japanese
            } else if (0x4E00..=0x9FFF).contains(&cp) {
                counts[1].1 += 1; // CJK ideographs -> Chinese (unless already scored as Japanese)
            } else if (0x0400..=0x04FF).contains(&cp) {
                counts[3].1 += 1; // Cyrillic -> Russian
            } else if (0x0600..=0x06FF).contains(&cp) {
                counts[4].1 += 1; // Arabic
            } else if (0x0900..=0x097F).contains(&cp) {
                counts[5].1 += 1; // Devanagari -> Hindi
            }
        }

        // Japanese kana implies Japanese even when kanji (CJK ideograph)
        // characters are also present; don't let the larger kanji count
        // shadow it.
        if counts[2].1 > 0 {
            let confidence = (counts[2].1 as f32 / total as f32).min(1.0);
            if confidence > 0.05 {
                return ("ja".to_string(), confidence);
            }
        }

        if let Some((lang, count)) = counts.into_iter().max_by_key(|(_, c)| *c) {
            let confidence = count as f32 / total as f32;
            if confidence > 0.05 {
                return (lang.to_string(), confidence.min(1.0));
            }
        }

        ("en".to_string(), 1.0 - (0.0_f32))
    }
}
