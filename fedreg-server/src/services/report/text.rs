//! Line wrapping for report text
//!
//! Widths are counted in half-width cells: East Asian wide characters take
//! two cells, everything else one. Runs without whitespace (CJK text, long
//! identifiers) are broken between characters.

/// Width of one character in half-width cells
pub fn char_width(c: char) -> usize {
    if is_wide(c) {
        2
    } else {
        1
    }
}

/// Width of a string in half-width cells
pub fn display_width(text: &str) -> usize {
    text.chars().map(char_width).sum()
}

fn is_wide(c: char) -> bool {
    matches!(c as u32,
        0x1100..=0x115F
        | 0x2E80..=0xA4CF
        | 0xAC00..=0xD7A3
        | 0xF900..=0xFAFF
        | 0xFE30..=0xFE4F
        | 0xFF00..=0xFF60
        | 0xFFE0..=0xFFE6
        | 0x20000..=0x3FFFD)
}

/// Replace characters the built-in PDF fonts cannot encode with `?`
pub fn latin1_only(text: &str) -> String {
    text.chars()
        .map(|c| match c {
            '\t' => ' ',
            c if (c as u32) < 0x20 => ' ',
            c if (c as u32) <= 0xFF => c,
            _ => '?',
        })
        .collect()
}

/// Wrap `text` into lines no wider than `max_width` cells
///
/// Every `\n` starts a new line; blank input lines are kept as empty strings.
pub fn wrap(text: &str, max_width: usize) -> Vec<String> {
    let max_width = max_width.max(1);
    let mut lines = Vec::new();

    for paragraph in text.split('\n') {
        let paragraph = paragraph.trim_end_matches('\r');
        if paragraph.trim().is_empty() {
            lines.push(String::new());
            continue;
        }

        let mut current = String::new();
        let mut width = 0;

        for word in paragraph.split_whitespace() {
            let word_width = display_width(word);
            let sep = usize::from(!current.is_empty());

            if width + sep + word_width <= max_width {
                if sep == 1 {
                    current.push(' ');
                }
                current.push_str(word);
                width += sep + word_width;
                continue;
            }

            if word_width <= max_width {
                lines.push(current.trim_end().to_string());
                current = word.to_string();
                width = word_width;
                continue;
            }

            if sep == 1 {
                current.push(' ');
                width += 1;
            }
            for c in word.chars() {
                let cw = char_width(c);
                if width + cw > max_width && !current.trim().is_empty() {
                    lines.push(current.trim_end().to_string());
                    current.clear();
                    width = 0;
                }
                current.push(c);
                width += cw;
            }
        }

        if !current.is_empty() {
            lines.push(current.trim_end().to_string());
        }
    }

    lines
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_widths() {
        assert_eq!(display_width("abc"), 3);
        assert_eq!(display_width("肺结核"), 6);
        assert_eq!(display_width("TB 肺"), 5);
    }

    #[test]
    fn test_wrap_on_whitespace() {
        assert_eq!(wrap("hello world", 5), vec!["hello", "world"]);
        assert_eq!(wrap("a b c d", 3), vec!["a b", "c d"]);
    }

    #[test]
    fn test_wrap_breaks_cjk_runs() {
        assert_eq!(wrap("肺结核影像诊断", 6), vec!["肺结核", "影像诊", "断"]);
    }

    #[test]
    fn test_wrap_breaks_long_words() {
        assert_eq!(wrap("abcdefghij", 4), vec!["abcd", "efgh", "ij"]);
        assert_eq!(wrap("ok abcdefgh", 5), vec!["ok ab", "cdefg", "h"]);
    }

    #[test]
    fn test_wrap_keeps_line_breaks() {
        assert_eq!(
            wrap("Findings:\n\nNo cavity.\r\nImpression", 40),
            vec!["Findings:", "", "No cavity.", "Impression"]
        );
    }

    #[test]
    fn test_no_line_exceeds_width() {
        let text = "Patchy opacity in the right upper lobe 右上肺斑片状阴影 \
                    with possible cavitation and pleural thickening";
        for line in wrap(text, 20) {
            assert!(display_width(&line) <= 20, "line too wide: {:?}", line);
        }
    }

    #[test]
    fn test_latin1_only() {
        assert_eq!(latin1_only("Café\tTB"), "Café TB");
        assert_eq!(latin1_only("肺 ok"), "? ok");
    }
}
