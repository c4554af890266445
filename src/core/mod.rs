pub mod images;
pub mod mask;
pub mod matcher;
pub mod video;
