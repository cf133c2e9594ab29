//! Markup pipeline: gtk-doc → structured markup → display markdown.

pub mod display;
pub mod legacy;

pub use display::rst_to_markdown;
pub use legacy::gtkdoc_to_rst;

// Markers left in display text for the page renderer.
pub const EXAMPLE_START: &str = "<!-- EXAMPLE_START:";
pub const EXAMPLE_END: &str = "<!-- EXAMPLE_END -->";
pub const APPENDIX_START: &str = "<!-- APPENDIX_START -->";
pub const APPENDIX_END: &str = "<!-- APPENDIX_END -->";
pub const HOWTO_START: &str = "<!-- HOWTO_START -->";
pub const HOWTO_END: &str = "<!-- HOWTO_END -->";
pub const NOTES_START: &str = "<!-- NOTES_START -->";
pub const NOTES_END: &str = "<!-- NOTES_END -->";
pub const APPENDIX_RENDER_START: &str = "<!-- APPENDIX_RENDER_START -->";
pub const APPENDIX_RENDER_END: &str = "<!-- APPENDIX_RENDER_END -->";
