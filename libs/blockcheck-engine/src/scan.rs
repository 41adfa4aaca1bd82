/// Lexical Scanner - String and Comment Aware Byte Walking
///
/// Generated source is never parsed into a tree. Every structural question
/// (where does this block end, is this identifier code or text) is answered by
/// walking bytes in one of six modes. All syntax the scanner cares about is
/// ASCII, so walking UTF-8 bytes is safe: continuation bytes never collide.
///
/// Known limits: regex literals are treated as code, and a backtick nested
/// inside a `${...}` template expression ends the outer template early.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    Code,
    SingleQuote,
    DoubleQuote,
    Template,
    LineComment,
    BlockComment,
}

/// Iterator over the code bytes of a source, starting in code mode at `pos`
pub struct CodeBytes<'a> {
    bytes: &'a [u8],
    pos: usize,
    mode: Mode,
}

impl<'a> Iterator for CodeBytes<'a> {
    type Item = (usize, u8);

    fn next(&mut self) -> Option<Self::Item> {
        while self.pos < self.bytes.len() {
            let i = self.pos;
            let b = self.bytes[i];
            let next = self.bytes.get(i + 1).copied();
            match self.mode {
                Mode::Code => match (b, next) {
                    (b'/', Some(b'/')) => {
                        self.mode = Mode::LineComment;
                        self.pos += 2;
                    }
                    (b'/', Some(b'*')) => {
                        self.mode = Mode::BlockComment;
                        self.pos += 2;
                    }
                    (b'\'', _) => {
                        self.mode = Mode::SingleQuote;
                        self.pos += 1;
                    }
                    (b'"', _) => {
                        self.mode = Mode::DoubleQuote;
                        self.pos += 1;
                    }
                    (b'`', _) => {
                        self.mode = Mode::Template;
                        self.pos += 1;
                    }
                    _ => {
                        self.pos += 1;
                        return Some((i, b));
                    }
                },
                Mode::SingleQuote | Mode::DoubleQuote | Mode::Template => {
                    let quote = match self.mode {
                        Mode::SingleQuote => b'\'',
                        Mode::DoubleQuote => b'"',
                        _ => b'`',
                    };
                    if b == b'\\' {
                        self.pos += 2;
                        continue;
                    }
                    // An unterminated plain string ends at the line break
                    if b == b'\n' && self.mode != Mode::Template {
                        self.mode = Mode::Code;
                        continue;
                    }
                    if b == quote {
                        self.mode = Mode::Code;
                    }
                    self.pos += 1;
                }
                Mode::LineComment => {
                    if b == b'\n' {
                        self.mode = Mode::Code;
                        continue;
                    }
                    self.pos += 1;
                }
                Mode::BlockComment => {
                    if b == b'*' && next == Some(b'/') {
                        self.mode = Mode::Code;
                        self.pos += 2;
                    } else {
                        self.pos += 1;
                    }
                }
            }
        }
        None
    }
}

pub fn code_bytes(source: &str, from: usize) -> CodeBytes<'_> {
    CodeBytes {
        bytes: source.as_bytes(),
        pos: from,
        mode: Mode::Code,
    }
}

/// Copy of `source` with string and comment bytes blanked to spaces.
///
/// Byte offsets are preserved, so regex matches on the masked text index
/// straight into the original. Newlines are kept.
pub fn mask_non_code(source: &str) -> String {
    let mut masked: Vec<u8> = source
        .bytes()
        .map(|b| if b == b'\n' { b'\n' } else { b' ' })
        .collect();
    for (i, b) in code_bytes(source, 0) {
        masked[i] = b;
    }
    // Only ASCII bytes were written into an all-ASCII buffer
    String::from_utf8(masked).unwrap_or_default()
}

/// Index of the delimiter closing the one at `open`, counting only code bytes
pub fn find_matching(source: &str, open: usize, open_ch: u8, close_ch: u8) -> Option<usize> {
    if source.as_bytes().get(open) != Some(&open_ch) {
        return None;
    }
    let mut depth = 0usize;
    for (i, b) in code_bytes(source, open) {
        if b == open_ch {
            depth += 1;
        } else if b == close_ch {
            depth -= 1;
            if depth == 0 {
                return Some(i);
            }
        }
    }
    None
}

/// Index of the first code byte at or after `from` that is not whitespace
pub fn next_code_byte(source: &str, from: usize) -> Option<(usize, u8)> {
    code_bytes(source, from).find(|(_, b)| !b.is_ascii_whitespace())
}

/// Brace depth at every byte offset of the masked source (depth *before* the byte)
pub fn brace_depths(masked: &str) -> Vec<usize> {
    let mut depths = Vec::with_capacity(masked.len());
    let mut depth = 0usize;
    for b in masked.bytes() {
        depths.push(depth);
        match b {
            b'{' => depth += 1,
            b'}' => depth = depth.saturating_sub(1),
            _ => {}
        }
    }
    depths
}

/// Index of the `{` opening the innermost block that contains `pos`
pub fn enclosing_block_open(masked: &str, pos: usize) -> Option<usize> {
    let bytes = masked.as_bytes();
    let mut depth = 0usize;
    for i in (0..pos.min(bytes.len())).rev() {
        match bytes[i] {
            b'}' => depth += 1,
            b'{' if depth == 0 => return Some(i),
            b'{' => depth -= 1,
            _ => {}
        }
    }
    None
}

/// Split a parenthesised argument list on top-level commas
pub fn split_top_level_args(args: &str) -> Vec<String> {
    let masked = mask_non_code(args);
    let mut parts = Vec::new();
    let mut depth = 0i32;
    let mut start = 0usize;
    for (i, b) in masked.bytes().enumerate() {
        match b {
            b'(' | b'[' | b'{' => depth += 1,
            b')' | b']' | b'}' => depth -= 1,
            b',' if depth == 0 => {
                parts.push(args[start..i].trim().to_string());
                start = i + 1;
            }
            _ => {}
        }
    }
    let tail = args[start..].trim();
    if !tail.is_empty() || !parts.is_empty() {
        parts.push(tail.to_string());
    }
    parts
}

pub fn is_identifier(candidate: &str) -> bool {
    let mut chars = candidate.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' || c == '$' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '$')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mask_preserves_offsets() {
        let src = "let a = \"{\"; // }\nlet b = 1;";
        let masked = mask_non_code(src);
        assert_eq!(masked.len(), src.len());
        assert!(!masked.contains('{'));
        assert!(!masked.contains('}'));
        assert!(masked.contains("let b = 1;"));
    }

    #[test]
    fn test_find_matching_skips_strings_and_comments() {
        let src = "{ var s = '}'; /* } */ var t = `}`; // }\n }";
        let end = find_matching(src, 0, b'{', b'}').unwrap();
        assert_eq!(end, src.len() - 1);
    }

    #[test]
    fn test_escaped_quote_does_not_end_string() {
        let src = r#"{ var s = "a\"}"; }"#;
        assert_eq!(find_matching(src, 0, b'{', b'}'), Some(src.len() - 1));
    }

    #[test]
    fn test_unbalanced_is_none() {
        assert_eq!(find_matching("{ { }", 0, b'{', b'}'), None);
        assert_eq!(find_matching("x { }", 0, b'{', b'}'), None);
    }

    #[test]
    fn test_split_top_level_args() {
        assert_eq!(split_top_level_args("row, col"), vec!["row", "col"]);
        assert_eq!(split_top_level_args("f(a, b), [1, 2]"), vec!["f(a, b)", "[1, 2]"]);
        assert_eq!(split_top_level_args("'a,b', c"), vec!["'a,b'", "c"]);
        assert!(split_top_level_args("  ").is_empty());
    }

    #[test]
    fn test_enclosing_block_open() {
        let src = "if (x) { a(); } else { b(); }";
        let pos = src.find("b()").unwrap();
        let open = enclosing_block_open(src, pos).unwrap();
        assert_eq!(&src[open - 5..open].trim(), &"else");
    }

    #[test]
    fn test_is_identifier() {
        assert!(is_identifier("solve2"));
        assert!(is_identifier("$tmp"));
        assert!(!is_identifier("2x"));
        assert!(!is_identifier("a.b"));
    }
}
