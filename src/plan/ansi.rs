//! Terminal color codes to HTML spans.
//!
//! Only SGR sequences (`ESC [ ... m`) affect the output; every other escape
//! sequence is dropped. Text is HTML-escaped.

use super::html_escape;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Rgb(u8, u8, u8);

const PALETTE: [Rgb; 16] = [
    Rgb(0, 0, 0),
    Rgb(187, 0, 0),
    Rgb(0, 187, 0),
    Rgb(187, 187, 0),
    Rgb(0, 0, 187),
    Rgb(187, 0, 187),
    Rgb(0, 187, 187),
    Rgb(255, 255, 255),
    Rgb(85, 85, 85),
    Rgb(255, 85, 85),
    Rgb(0, 255, 0),
    Rgb(255, 255, 85),
    Rgb(85, 85, 255),
    Rgb(255, 85, 255),
    Rgb(85, 255, 255),
    Rgb(255, 255, 255),
];

/// 256-color index to RGB
fn indexed(index: u32) -> Option<Rgb> {
    const LEVELS: [u8; 6] = [0, 95, 135, 175, 215, 255];
    match index {
        0..=15 => Some(PALETTE[index as usize]),
        16..=231 => {
            let i = index - 16;
            Some(Rgb(
                LEVELS[(i / 36) as usize],
                LEVELS[((i / 6) % 6) as usize],
                LEVELS[(i % 6) as usize],
            ))
        }
        232..=255 => {
            let level = (8 + (index - 232) * 10) as u8;
            Some(Rgb(level, level, level))
        }
        _ => None,
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct Style {
    fg: Option<Rgb>,
    bg: Option<Rgb>,
    bold: bool,
    faint: bool,
    italic: bool,
    underline: bool,
}

impl Style {
    fn apply(&mut self, params: &str) {
        let codes: Vec<u32> = params
            .split(';')
            .map(|p| p.parse().unwrap_or(0))
            .collect();

        let mut i = 0;
        while i < codes.len() {
            match codes[i] {
                0 => *self = Style::default(),
                1 => self.bold = true,
                2 => self.faint = true,
                3 => self.italic = true,
                4 => self.underline = true,
                22 => {
                    self.bold = false;
                    self.faint = false;
                }
                23 => self.italic = false,
                24 => self.underline = false,
                c @ 30..=37 => self.fg = Some(PALETTE[(c - 30) as usize]),
                39 => self.fg = None,
                c @ 40..=47 => self.bg = Some(PALETTE[(c - 40) as usize]),
                49 => self.bg = None,
                c @ 90..=97 => self.fg = Some(PALETTE[(c - 90 + 8) as usize]),
                c @ 100..=107 => self.bg = Some(PALETTE[(c - 100 + 8) as usize]),
                c @ (38 | 48) => {
                    let (color, consumed) = extended_color(&codes[i + 1..]);
                    if c == 38 {
                        self.fg = color.or(self.fg);
                    } else {
                        self.bg = color.or(self.bg);
                    }
                    i += consumed;
                }
                _ => {}
            }
            i += 1;
        }
    }

    fn css(&self) -> String {
        let mut rules = Vec::new();
        if self.bold {
            rules.push("font-weight:bold".to_string());
        }
        if self.faint {
            rules.push("opacity:0.7".to_string());
        }
        if self.italic {
            rules.push("font-style:italic".to_string());
        }
        if self.underline {
            rules.push("text-decoration:underline".to_string());
        }
        if let Some(Rgb(r, g, b)) = self.fg {
            rules.push(format!("color:rgb({},{},{})", r, g, b));
        }
        if let Some(Rgb(r, g, b)) = self.bg {
            rules.push(format!("background-color:rgb({},{},{})", r, g, b));
        }
        rules.join(";")
    }
}

/// `5;n` or `2;r;g;b` after a 38/48 code; returns the color and how many
/// parameters were consumed
fn extended_color(rest: &[u32]) -> (Option<Rgb>, usize) {
    match rest {
        [5, index, ..] => (indexed(*index), 2),
        [2, r, g, b, ..] => (
            Some(Rgb(
                (*r).min(255) as u8,
                (*g).min(255) as u8,
                (*b).min(255) as u8,
            )),
            4,
        ),
        _ => (None, rest.len()),
    }
}

fn flush(out: &mut String, chunk: &mut String, style: &Style) {
    if chunk.is_empty() {
        return;
    }

    let text = html_escape(chunk);
    if *style == Style::default() {
        out.push_str(&text);
    } else {
        out.push_str(&format!("<span style=\"{}\">{}</span>", style.css(), text));
    }
    chunk.clear();
}

pub fn ansi_to_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut chunk = String::new();
    let mut style = Style::default();
    let mut chars = text.chars().peekable();

    while let Some(c) = chars.next() {
        if c != '\x1b' {
            chunk.push(c);
            continue;
        }

        match chars.peek() {
            Some('[') => {
                chars.next();
                let mut params = String::new();
                let mut terminator = None;
                for n in chars.by_ref() {
                    if ('\x40'..='\x7e').contains(&n) {
                        terminator = Some(n);
                        break;
                    }
                    params.push(n);
                }

                if terminator == Some('m') {
                    flush(&mut out, &mut chunk, &style);
                    style.apply(&params);
                }
            }
            Some(']') => {
                // OSC, terminated by BEL or ST
                chars.next();
                while let Some(n) = chars.next() {
                    if n == '\x07' {
                        break;
                    }
                    if n == '\x1b' {
                        if chars.peek() == Some(&'\\') {
                            chars.next();
                        }
                        break;
                    }
                }
            }
            Some(_) => {
                chars.next();
            }
            None => {}
        }
    }

    flush(&mut out, &mut chunk, &style);
    out
}
