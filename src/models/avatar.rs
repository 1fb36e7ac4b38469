use std::collections::HashMap;

use ratatui::style::Color;

const AVATAR_COLORS: [Color; 10] = [
    Color::Rgb(0xFF, 0x6B, 0x6B),
    Color::Rgb(0x4E, 0xCD, 0xC4),
    Color::Rgb(0xFF, 0xD1, 0x66),
    Color::Rgb(0xFF, 0x8C, 0x42),
    Color::Rgb(0x6A, 0x05, 0x72),
    Color::Rgb(0x1A, 0x93, 0x6F),
    Color::Rgb(0x3D, 0x5A, 0x80),
    Color::Rgb(0xFF, 0x70, 0xA6),
    Color::Rgb(0xE7, 0x6F, 0x51),
    Color::Rgb(0x9B, 0x5D, 0xE5),
];

const AVATAR_GLYPHS: [&str; 20] = [
    "🦄", "🐙", "🦊", "🐸", "🦜", "🦖", "🐳", "🦁", "🐯", "🐵",
    "🐹", "🐰", "🦝", "🐨", "🐼", "🐻", "🐶", "🐱", "🐮", "🐷",
];

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Avatar {
    pub color: Color,
    pub glyph: &'static str,
}

impl Avatar {
    pub fn for_handle(handle: &str) -> Self {
        let seed: u64 = handle.chars().map(|c| c as u64).sum();
        Self {
            color: AVATAR_COLORS[(seed % AVATAR_COLORS.len() as u64) as usize],
            glyph: AVATAR_GLYPHS[(seed % AVATAR_GLYPHS.len() as u64) as usize],
        }
    }
}

/// Session-lifetime memo of derived avatars.
#[derive(Default)]
pub struct AvatarCache {
    avatars: HashMap<String, Avatar>,
}

impl AvatarCache {
    pub fn get(&mut self, handle: &str) -> Avatar {
        *self
            .avatars
            .entry(handle.to_string())
            .or_insert_with(|| Avatar::for_handle(handle))
    }
}
