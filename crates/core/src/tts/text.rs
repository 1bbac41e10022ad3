/// Longest unit handed to the model in one inference call.
pub const MAX_UNIT_CHARS: usize = 140;

/// Splits text into sentence-like units, each at most [`MAX_UNIT_CHARS`] characters.
///
/// Sentences end after `.`, `!`, `?` or `…` (runs of them stay together).
/// Overlong sentences are broken at the last whitespace that fits, or hard
/// at the limit when a single word is longer than that.
pub fn split_units(text: &str) -> Vec<String> {
    split_sentences(text)
        .into_iter()
        .flat_map(|s| wrap(&s, MAX_UNIT_CHARS))
        .collect()
}

fn is_terminator(c: char) -> bool {
    matches!(c, '.' | '!' | '?' | '…')
}

fn split_sentences(text: &str) -> Vec<String> {
    let mut sentences = Vec::new();
    let mut current = String::new();
    let mut chars = text.chars().peekable();

    while let Some(c) = chars.next() {
        current.push(c);
        if is_terminator(c) && !chars.peek().copied().is_some_and(is_terminator) {
            push_trimmed(&mut sentences, &current);
            current.clear();
        }
    }
    push_trimmed(&mut sentences, &current);
    sentences
}

fn push_trimmed(out: &mut Vec<String>, s: &str) {
    let collapsed = s.split_whitespace().collect::<Vec<_>>().join(" ");
    // a lone terminator ("...") carries nothing to say
    if collapsed.chars().any(|c| !is_terminator(c)) {
        out.push(collapsed);
    }
}

fn wrap(sentence: &str, limit: usize) -> Vec<String> {
    let mut units = Vec::new();
    let mut rest: Vec<char> = sentence.chars().collect();

    while rest.len() > limit {
        let cut = rest[..=limit]
            .iter()
            .rposition(|c| c.is_whitespace())
            .filter(|&i| i > 0)
            .unwrap_or(limit);
        let head: String = rest[..cut].iter().collect();
        units.push(head.trim().to_owned());
        rest = rest[cut..].iter().copied().skip_while(|c| c.is_whitespace()).collect();
    }
    if !rest.is_empty() {
        units.push(rest.into_iter().collect());
    }
    units
}
