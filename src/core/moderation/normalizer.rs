// Text normalization against obfuscation.
//
// Folds the Latin/leetspeak look-alikes people use to dodge word filters
// onto the Cyrillic letters they stand in for, so the lexicon only ever has
// to match one canonical spelling.

/// Fold a message body to its canonical lowercase form.
///
/// Single left-to-right pass: each character is folded at most once, later
/// substitutions never re-trigger earlier ones. Combining diacritics
/// (U+0300..U+036F) are stripped, `ё` collapses to `е`, everything else is
/// lowercased. Pure and idempotent: every fold target is outside the source
/// set, so `normalize(normalize(x)) == normalize(x)`.
pub fn normalize(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        let folded = match ch {
            '@' | 'a' | 'A' => 'а',
            'b' | 'B' | '6' => 'б',
            'e' | 'E' | '3' => 'е',
            'o' | 'O' | '0' => 'о',
            'p' | 'P' => 'р',
            'c' | 'C' => 'с',
            'y' | 'Y' => 'у',
            'x' | 'X' => 'х',
            'k' | 'K' => 'к',
            'm' | 'M' => 'м',
            'h' | 'H' => 'н',
            't' | 'T' => 'т',
            'd' | 'D' => 'д',
            'l' | 'L' => 'л',
            '9' => 'я',
            'ё' | 'Ё' => 'е',
            // Combining diacritical marks - dropped outright
            '\u{0300}'..='\u{036F}' => continue,
            other => {
                for lower in other.to_lowercase() {
                    out.push(lower);
                }
                continue;
            }
        };
        out.push(folded);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn folds_leetspeak_to_cyrillic() {
        assert_eq!(normalize("bl9dь"), "блядь");
        assert_eq!(normalize("xyй"), "хуй");
        assert_eq!(normalize("cyk@"), "сука");
    }

    #[test]
    fn is_idempotent() {
        for input in ["bl9dь", "ПрИвЕт, МИР!", "H3LLO", "já jsem étudiant"] {
            let once = normalize(input);
            assert_eq!(normalize(&once), once, "not idempotent for {input:?}");
        }
    }

    #[test]
    fn lowercases_plain_cyrillic() {
        assert_eq!(normalize("ПрИвЕт"), "привет");
    }

    #[test]
    fn collapses_yo_and_combining_marks() {
        assert_eq!(normalize("Ёлка"), "елка");
        // е + combining acute accent
        assert_eq!(normalize("е\u{0301}"), "е");
    }

    #[test]
    fn leaves_unmapped_characters_alone() {
        assert_eq!(normalize("привет 12 !?"), "привет 12 !?");
    }
}
