pub mod record;
pub mod theme;
