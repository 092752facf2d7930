//! RFC 4013 SASLprep, used to normalize AES-256 revision 6 passwords.

use crate::error::{PdfError, Result};
use unicode_normalization::UnicodeNormalization;

/// RFC 3454 Table B.1: characters mapped to nothing.
fn mapped_to_nothing(c: char) -> bool {
    matches!(
        c,
        '\u{00AD}'
            | '\u{034F}'
            | '\u{1806}'
            | '\u{180B}'..='\u{180D}'
            | '\u{200B}'..='\u{200D}'
            | '\u{2060}'
            | '\u{FE00}'..='\u{FE0F}'
            | '\u{FEFF}'
    )
}

/// RFC 3454 Table C.1.2: non-ASCII space characters, mapped to SP.
fn non_ascii_space(c: char) -> bool {
    matches!(
        c,
        '\u{00A0}'
            | '\u{1680}'
            | '\u{2000}'..='\u{200A}'
            | '\u{2028}'
            | '\u{2029}'
            | '\u{202F}'
            | '\u{205F}'
            | '\u{3000}'
    )
}

/// Prohibited output: control characters, private use, non-characters,
/// surrogates (unrepresentable in `char`), inappropriate and tagging
/// characters (RFC 4013 section 2.3).
fn prohibited(c: char) -> bool {
    let cp = c as u32;
    matches!(c, '\u{0000}'..='\u{001F}' | '\u{007F}'..='\u{009F}')
        || matches!(
            c,
            '\u{06DD}'
                | '\u{070F}'
                | '\u{180E}'
                | '\u{200C}'
                | '\u{200D}'
                | '\u{2028}'
                | '\u{2029}'
                | '\u{2060}'..='\u{2063}'
                | '\u{206A}'..='\u{206F}'
                | '\u{FEFF}'
                | '\u{FFF9}'..='\u{FFFC}'
        )
        || matches!(c, '\u{E000}'..='\u{F8FF}' | '\u{F0000}'..='\u{FFFFD}' | '\u{100000}'..='\u{10FFFD}')
        || (cp & 0xFFFE) == 0xFFFE
        || matches!(c, '\u{FDD0}'..='\u{FDEF}')
        || matches!(c, '\u{FFF9}'..='\u{FFFD}')
        || matches!(c, '\u{2FF0}'..='\u{2FFB}')
        || matches!(c, '\u{E0001}' | '\u{E0020}'..='\u{E007F}')
}

fn is_randalcat(c: char) -> bool {
    // Coarse R/AL coverage: Hebrew, Arabic, Syriac, Thaana and the
    // Arabic presentation forms.
    matches!(
        c,
        '\u{05BE}' | '\u{05C0}' | '\u{05C3}'
            | '\u{05D0}'..='\u{05F4}'
            | '\u{0600}'..='\u{06FF}'
            | '\u{0700}'..='\u{074F}'
            | '\u{0780}'..='\u{07B1}'
            | '\u{FB1D}'..='\u{FDFD}'
            | '\u{FE70}'..='\u{FEFC}'
    )
}

fn is_lcat(c: char) -> bool {
    c.is_ascii_alphabetic()
        || matches!(c, '\u{00C0}'..='\u{02B8}' | '\u{0388}'..='\u{058F}')
}

/// Apply the SASLprep profile: map, NFKC-normalize, reject prohibited
/// output and mixed-direction strings.
pub fn saslprep(input: &str) -> Result<String> {
    // Mapping step.
    let mapped: String = input
        .chars()
        .filter(|&c| !mapped_to_nothing(c))
        .map(|c| if non_ascii_space(c) { ' ' } else { c })
        .collect();

    // NFKC normalization.
    let normalized: String = mapped.nfkc().collect();

    // Prohibited output.
    if let Some(c) = normalized.chars().find(|&c| prohibited(c)) {
        return Err(PdfError::Crypt {
            msg: format!("prohibited character U+{:04X} in password", c as u32),
        });
    }

    // Bidi check: a string containing RandALCat characters must start
    // and end with one and contain no LCat characters.
    let has_ral = normalized.chars().any(is_randalcat);
    if has_ral {
        let has_l = normalized.chars().any(is_lcat);
        let first_ral = normalized.chars().next().map(is_randalcat).unwrap_or(false);
        let last_ral = normalized.chars().last().map(is_randalcat).unwrap_or(false);
        if has_l || !first_ral || !last_ral {
            return Err(PdfError::Crypt {
                msg: "bidirectional check failed for password".into(),
            });
        }
    }

    Ok(normalized)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_saslprep_basic() {
        assert_eq!(saslprep("user").unwrap(), "user");
        // Non-ASCII space maps to SP, soft hyphen to nothing.
        assert_eq!(saslprep("I\u{00AD}X").unwrap(), "IX");
        assert_eq!(saslprep("a\u{00A0}b").unwrap(), "a b");
        // NFKC: U+2168 ROMAN NUMERAL NINE becomes IX.
        assert_eq!(saslprep("\u{2168}").unwrap(), "IX");
    }

    #[test]
    fn test_saslprep_prohibited() {
        assert!(saslprep("bad\u{0007}char").is_err());
    }
}
