//! Leading directive flags on an instruction line
//!
//! BuildKit echoes instructions as written, including flags such as
//! `--mount=type=cache,target=/root/.cache` or `--network=host`. Flag values
//! may contain quotes, `=`, `,` and even runs of spaces inside quotes, so
//! they are located with a small quote-aware tokenizer rather than by string
//! replacement.

/// An instruction split into verb, leading flags, and the remaining body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectiveFlags<'a> {
    pub verb: &'a str,
    pub flags: Vec<&'a str>,
    /// Everything after the last leading flag, untouched
    pub body: &'a str,
}

/// Scan `text` (e.g. `RUN --mount=type=cache,target=/x pip install`) for
/// flags that directly follow the instruction verb.
pub fn scan_directive(text: &str) -> DirectiveFlags<'_> {
    let mut pos = skip_whitespace(text, 0);
    let verb_end = token_end(text, pos);
    let verb = &text[pos..verb_end];
    pos = verb_end;

    let mut flags = Vec::new();
    loop {
        let start = skip_whitespace(text, pos);
        if !text[start..].starts_with("--") {
            pos = start;
            break;
        }
        let end = token_end(text, start);
        flags.push(&text[start..end]);
        pos = end;
    }

    DirectiveFlags {
        verb,
        flags,
        body: &text[pos..],
    }
}

fn skip_whitespace(text: &str, from: usize) -> usize {
    text[from..]
        .char_indices()
        .find(|(_, c)| !c.is_whitespace())
        .map(|(i, _)| from + i)
        .unwrap_or(text.len())
}

/// End of the token starting at `from`: the first unquoted whitespace.
fn token_end(text: &str, from: usize) -> usize {
    let mut quote: Option<char> = None;
    let mut escaped = false;

    for (i, c) in text[from..].char_indices() {
        if escaped {
            escaped = false;
            continue;
        }
        match (c, quote) {
            ('\\', Some('\'')) => {}
            ('\\', _) => escaped = true,
            ('"' | '\'', None) => quote = Some(c),
            (c, Some(q)) if c == q => quote = None,
            (c, None) if c.is_whitespace() => return from + i,
            _ => {}
        }
    }
    text.len()
}
