//! Lightweight ANSI styling parser
//!
//! Splits a short string (a status line, a log snippet) into styled spans
//! by interpreting SGR sequences only. Cursor movement, OSC, and any other
//! escape sequences are stripped. This is not the terminal emulator - it
//! keeps no grid and no state between calls.

use crate::core::term::color::{palette_rgb, Rgb};
use crate::core::term::state::AttrFlags;

/// A run of text with uniform styling. `fg`/`bg` are `None` for the
/// caller's default colors.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct StyledSpan {
    pub text: String,
    pub fg: Option<Rgb>,
    pub bg: Option<Rgb>,
    pub flags: AttrFlags,
}

#[derive(Clone, Copy, Default, PartialEq, Eq)]
struct SpanStyle {
    fg: Option<Rgb>,
    bg: Option<Rgb>,
    flags: AttrFlags,
}

/// Parse `input` into styled spans. Empty spans are never emitted; input
/// without escapes yields a single default-styled span.
pub fn parse_spans(input: &str) -> Vec<StyledSpan> {
    let mut spans = Vec::new();
    let mut style = SpanStyle::default();
    let mut text = String::new();

    let mut chars = input.chars().peekable();
    while let Some(ch) = chars.next() {
        if ch != '\x1b' {
            // Other C0 controls carry no styling and are dropped
            if !ch.is_control() || ch == '\t' {
                text.push(ch);
            }
            continue;
        }

        match chars.peek() {
            Some('[') => {
                chars.next();
                let mut params = String::new();
                let mut final_byte = None;
                for c in chars.by_ref() {
                    if ('\u{40}'..='\u{7e}').contains(&c) {
                        final_byte = Some(c);
                        break;
                    }
                    params.push(c);
                }
                if final_byte == Some('m') {
                    flush(&mut spans, &mut text, style);
                    apply_sgr(&params, &mut style);
                }
                // Any other CSI is stripped
            }
            Some(']') => {
                chars.next();
                // OSC: consume until BEL or ST
                while let Some(c) = chars.next() {
                    if c == '\x07' {
                        break;
                    }
                    if c == '\x1b' {
                        if chars.peek() == Some(&'\\') {
                            chars.next();
                        }
                        break;
                    }
                }
            }
            _ => {
                // Two-character escape, drop the follow byte
                chars.next();
            }
        }
    }

    flush(&mut spans, &mut text, style);
    spans
}

fn flush(spans: &mut Vec<StyledSpan>, text: &mut String, style: SpanStyle) {
    if !text.is_empty() {
        spans.push(StyledSpan {
            text: std::mem::take(text),
            fg: style.fg,
            bg: style.bg,
            flags: style.flags,
        });
    }
}

fn apply_sgr(params: &str, style: &mut SpanStyle) {
    let values: Vec<u16> = params
        .split(';')
        .map(|p| p.parse().unwrap_or(0))
        .collect();
    let values = if values.is_empty() { vec![0] } else { values };

    let mut iter = values.iter().peekable();
    while let Some(&param) = iter.next() {
        match param {
            0 => *style = SpanStyle::default(),
            1 => style.flags |= AttrFlags::BOLD,
            2 => style.flags |= AttrFlags::DIM,
            3 => style.flags |= AttrFlags::ITALIC,
            4 => style.flags |= AttrFlags::UNDERLINE,
            7 => style.flags |= AttrFlags::INVERSE,
            9 => style.flags |= AttrFlags::STRIKETHROUGH,
            22 => style.flags &= !(AttrFlags::BOLD | AttrFlags::DIM),
            23 => style.flags &= !AttrFlags::ITALIC,
            24 => style.flags &= !AttrFlags::UNDERLINE,
            27 => style.flags &= !AttrFlags::INVERSE,
            29 => style.flags &= !AttrFlags::STRIKETHROUGH,
            30..=37 => style.fg = Some(palette_rgb((param - 30) as u8)),
            38 => extended_color(&mut iter, &mut style.fg),
            39 => style.fg = None,
            40..=47 => style.bg = Some(palette_rgb((param - 40) as u8)),
            48 => extended_color(&mut iter, &mut style.bg),
            49 => style.bg = None,
            90..=97 => style.fg = Some(palette_rgb((param - 90 + 8) as u8)),
            100..=107 => style.bg = Some(palette_rgb((param - 100 + 8) as u8)),
            _ => {}
        }
    }
}

fn extended_color<'a, I>(iter: &mut std::iter::Peekable<I>, slot: &mut Option<Rgb>)
where
    I: Iterator<Item = &'a u16>,
{
    match iter.next() {
        Some(&5) => {
            if let Some(&n) = iter.next() {
                *slot = Some(palette_rgb(n.min(255) as u8));
            }
        }
        Some(&2) => {
            let r = iter.next().copied().unwrap_or(0) as u8;
            let g = iter.next().copied().unwrap_or(0) as u8;
            let b = iter.next().copied().unwrap_or(0) as u8;
            *slot = Some(Rgb::new(r, g, b));
        }
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_text_single_span() {
        let spans = parse_spans("no escapes here");
        assert_eq!(spans.len(), 1);
        assert_eq!(spans[0].text, "no escapes here");
        assert_eq!(spans[0].fg, None);
    }

    #[test]
    fn test_red_then_reset() {
        let spans = parse_spans("\x1b[31mred\x1b[0mplain");
        assert_eq!(spans.len(), 2);
        assert_eq!(spans[0].text, "red");
        assert_eq!(spans[0].fg, Some(palette_rgb(1)));
        assert_eq!(spans[1].text, "plain");
        assert_eq!(spans[1].fg, None);
    }

    #[test]
    fn test_bold_accumulates_with_color() {
        let spans = parse_spans("\x1b[1m\x1b[32mok\x1b[0m");
        assert_eq!(spans.len(), 1);
        assert!(spans[0].flags.contains(AttrFlags::BOLD));
        assert_eq!(spans[0].fg, Some(palette_rgb(2)));
    }

    #[test]
    fn test_non_sgr_sequences_stripped() {
        let spans = parse_spans("a\x1b[2Jb\x1b]0;title\x07c");
        assert_eq!(spans.len(), 1);
        assert_eq!(spans[0].text, "abc");
    }

    #[test]
    fn test_truecolor_span() {
        let spans = parse_spans("\x1b[38;2;10;20;30mx");
        assert_eq!(spans[0].fg, Some(Rgb::new(10, 20, 30)));
    }

    #[test]
    fn test_empty_input() {
        assert!(parse_spans("").is_empty());
    }
}
