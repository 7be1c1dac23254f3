pub mod render;

pub use render::{find_system_font, render_text_pixmap, ClockRenderer};
