use unicode_width::UnicodeWidthChar;

pub fn char_display_width(ch: char) -> usize {
    UnicodeWidthChar::width(ch).unwrap_or(0)
}

pub fn display_width(text: &str) -> usize {
    text.chars().map(char_display_width).sum()
}

pub fn clamp_to_char_boundary_left(input: &str, cursor: usize) -> usize {
    let mut cursor = cursor.min(input.len());
    while cursor > 0 && !input.is_char_boundary(cursor) {
        cursor -= 1;
    }
    cursor
}

pub fn truncate_to_display_width(text: &str, max_width: usize) -> String {
    let mut out = String::new();
    let mut used = 0usize;
    for ch in text.chars() {
        let ch_width = char_display_width(ch);
        if used + ch_width > max_width {
            break;
        }
        out.push(ch);
        used += ch_width;
    }
    out
}

/// Slice of `text` that fits in `avail` columns with the cursor on screen,
/// plus the cursor column inside that slice.
pub fn visible_window(text: &str, cursor: usize, avail: usize) -> (&str, usize) {
    let avail = avail.max(1);
    let cursor = clamp_to_char_boundary_left(text, cursor);
    if display_width(text) < avail {
        return (text, display_width(&text[..cursor]));
    }

    let mut start = cursor;
    let mut cursor_col = 0usize;
    for (idx, ch) in text[..cursor].char_indices().rev() {
        let ch_width = char_display_width(ch);
        if cursor_col + ch_width > avail - 1 {
            break;
        }
        cursor_col += ch_width;
        start = idx;
    }

    let mut end = start;
    let mut used = 0usize;
    for (offset, ch) in text[start..].char_indices() {
        let ch_width = char_display_width(ch);
        if used + ch_width > avail {
            break;
        }
        used += ch_width;
        end = start + offset + ch.len_utf8();
    }
    (&text[start..end], cursor_col)
}
