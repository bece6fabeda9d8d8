/// Average reading speed used for the "N min read" label.
pub const WORDS_PER_MINUTE: usize = 200;

/// Minutes needed to read `html`, rounded up. Markup is ignored.
pub fn reading_time(html: &str) -> u32 {
    let words = strip_tags(html).split_whitespace().count();
    words.div_ceil(WORDS_PER_MINUTE) as u32
}

/// Drop everything between `<` and `>`, leaving a space so adjacent blocks don't merge.
pub fn strip_tags(html: &str) -> String {
    let mut text = String::with_capacity(html.len());
    let mut in_tag = false;
    for c in html.chars() {
        match c {
            '<' => in_tag = true,
            '>' if in_tag => {
                in_tag = false;
                text.push(' ');
            }
            _ if !in_tag => text.push(c),
            _ => {}
        }
    }
    text
}
