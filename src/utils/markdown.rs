// src/utils/markdown.rs

//! Escaping for Telegram's MarkdownV2 dialect.

/// Characters MarkdownV2 treats as formatting.
pub const RESERVED: &[char] = &[
    '_', '*', '[', ']', '(', ')', '~', '>', '#', '+', '-', '=', '|', '{', '}', '.', '!',
];

/// Prefix every reserved character with a backslash.
///
/// Not idempotent: apply once per raw field, never to a composed message.
pub fn escape(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len() + text.len() / 8);
    for c in text.chars() {
        if RESERVED.contains(&c) {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}
