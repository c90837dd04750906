//! Color resolution
//!
//! Cells store fully resolved RGB values. Indexed SGR colors are converted
//! through the xterm 256-color palette at write time, so the only sentinel
//! that survives into the grid is `Color::Default`.

/// A resolved RGB color.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }
}

/// Cell color: either the terminal's default (resolved at read time against
/// the configured default colors) or a concrete RGB value.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum Color {
    #[default]
    Default,
    Rgb(Rgb),
}

impl Color {
    /// Resolve against a default color.
    pub fn resolve(self, default: Rgb) -> Rgb {
        match self {
            Color::Default => default,
            Color::Rgb(rgb) => rgb,
        }
    }

    pub fn is_default(self) -> bool {
        matches!(self, Color::Default)
    }
}

/// The 16 base ANSI colors (xterm defaults).
const BASE_COLORS: [Rgb; 16] = [
    Rgb::new(0, 0, 0),       // black
    Rgb::new(205, 0, 0),     // red
    Rgb::new(0, 205, 0),     // green
    Rgb::new(205, 205, 0),   // yellow
    Rgb::new(0, 0, 238),     // blue
    Rgb::new(205, 0, 205),   // magenta
    Rgb::new(0, 205, 205),   // cyan
    Rgb::new(229, 229, 229), // white
    Rgb::new(127, 127, 127), // bright black
    Rgb::new(255, 0, 0),     // bright red
    Rgb::new(0, 255, 0),     // bright green
    Rgb::new(255, 255, 0),   // bright yellow
    Rgb::new(92, 92, 255),   // bright blue
    Rgb::new(255, 0, 255),   // bright magenta
    Rgb::new(0, 255, 255),   // bright cyan
    Rgb::new(255, 255, 255), // bright white
];

/// Resolve an xterm palette index to RGB.
///
/// 0-15: base colors, 16-231: 6x6x6 color cube, 232-255: grayscale ramp.
pub fn palette_rgb(index: u8) -> Rgb {
    match index {
        0..=15 => BASE_COLORS[index as usize],
        16..=231 => {
            let i = index - 16;
            let r = i / 36;
            let g = (i % 36) / 6;
            let b = i % 6;
            let level = |c: u8| if c == 0 { 0 } else { 55 + c * 40 };
            Rgb::new(level(r), level(g), level(b))
        }
        232..=255 => {
            let level = 8 + (index - 232) * 10;
            Rgb::new(level, level, level)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base_palette() {
        assert_eq!(palette_rgb(1), Rgb::new(205, 0, 0));
        assert_eq!(palette_rgb(15), Rgb::new(255, 255, 255));
    }

    #[test]
    fn test_color_cube() {
        // 16 is cube origin (0,0,0)
        assert_eq!(palette_rgb(16), Rgb::new(0, 0, 0));
        // 231 is cube max (5,5,5) = 255,255,255
        assert_eq!(palette_rgb(231), Rgb::new(255, 255, 255));
        // 196 = 16 + 5*36 -> pure red
        assert_eq!(palette_rgb(196), Rgb::new(255, 0, 0));
    }

    #[test]
    fn test_grayscale_ramp() {
        assert_eq!(palette_rgb(232), Rgb::new(8, 8, 8));
        assert_eq!(palette_rgb(255), Rgb::new(238, 238, 238));
    }

    #[test]
    fn test_default_resolution() {
        let default = Rgb::new(10, 20, 30);
        assert_eq!(Color::Default.resolve(default), default);
        assert_eq!(
            Color::Rgb(Rgb::new(1, 2, 3)).resolve(default),
            Rgb::new(1, 2, 3)
        );
    }
}
