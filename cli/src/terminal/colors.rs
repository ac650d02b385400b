use colored::Color;

pub const PRIMARY: Color = Color::Green;
pub const ACCENT: Color = Color::Cyan;
pub const SEPARATOR: Color = Color::BrightBlack;
pub const TEXT_DEFAULT: Color = Color::White;
pub const SUCCESS: Color = Color::BrightGreen;
pub const FAILURE: Color = Color::Red;
