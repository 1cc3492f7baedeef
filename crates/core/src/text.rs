//! Text formatting for the caption field on result images.

/// Maximum characters per caption line.
pub const CAPTION_LINE_LENGTH: usize = 13;

/// Number of lines the caption field holds.
pub const CAPTION_LINES: usize = 3;

/// Wrap `text` into a fixed number of lines for the caption field.
///
/// Greedy word wrap at `line_length` characters; words longer than a
/// line are hard-broken. The output always contains exactly `lines`
/// newline-separated lines, padded with empty lines and truncated when
/// the text overflows.
pub fn format_text_for_field(text: &str, line_length: usize, lines: usize) -> String {
    let mut wrapped: Vec<String> = Vec::new();
    let mut current = String::new();

    for word in text.split_whitespace() {
        let mut word = word;
        // Hard-break words that can never fit on one line.
        while word.chars().count() > line_length {
            if !current.is_empty() {
                wrapped.push(std::mem::take(&mut current));
            }
            let split = word
                .char_indices()
                .nth(line_length)
                .map(|(i, _)| i)
                .unwrap_or(word.len());
            wrapped.push(word[..split].to_string());
            word = &word[split..];
        }
        if word.is_empty() {
            continue;
        }
        let needed = if current.is_empty() {
            word.chars().count()
        } else {
            current.chars().count() + 1 + word.chars().count()
        };
        if needed > line_length && !current.is_empty() {
            wrapped.push(std::mem::take(&mut current));
        }
        if !current.is_empty() {
            current.push(' ');
        }
        current.push_str(word);
    }
    if !current.is_empty() {
        wrapped.push(current);
    }

    wrapped.truncate(lines);
    while wrapped.len() < lines {
        wrapped.push(String::new());
    }
    wrapped.join("\n")
}

/// [`format_text_for_field`] with the caption-field defaults.
pub fn format_caption(text: &str) -> String {
    format_text_for_field(text, CAPTION_LINE_LENGTH, CAPTION_LINES)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_text_pads_to_three_lines() {
        assert_eq!(format_caption("Max M Teddy"), "Max M Teddy\n\n");
    }

    #[test]
    fn wraps_at_line_length() {
        let out = format_text_for_field("one two three four", 9, 3);
        assert_eq!(out, "one two\nthree\nfour");
    }

    #[test]
    fn every_line_fits() {
        let out = format_caption("Maximiliane Mustermann Langohrhase");
        for line in out.split('\n') {
            assert!(line.chars().count() <= CAPTION_LINE_LENGTH);
        }
    }

    #[test]
    fn long_word_is_hard_broken() {
        let out = format_text_for_field("Donaudampfschiff", 8, 3);
        assert_eq!(out, "Donaudam\npfschiff\n");
    }

    #[test]
    fn overflow_is_truncated() {
        let out = format_text_for_field("a b c d e f g h i j k l", 1, 3);
        assert_eq!(out, "a\nb\nc");
    }

    #[test]
    fn empty_input_is_all_padding() {
        assert_eq!(format_caption(""), "\n\n");
    }
}
