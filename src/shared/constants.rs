pub const ERROR_LOG_FILE: &str = "error.log";
pub const DEBUG_LOG_FILE: &str = "debug.log";

/// Prefix used for sequentially indexed working images unless overridden.
pub const DEFAULT_IMAGE_PREFIX: &str = "frame_";

/// Zero-padded width of the 1-based frame index in working filenames.
pub const FRAME_INDEX_WIDTH: usize = 5;

pub const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "tif", "tiff"];

/// Lowercase suffixes to treat as raw sensor images.
pub const RAW_EXTENSIONS: &[&str] = &["cr2"];

/// Suffix written for images converted from raw.
pub const RAW_CONVERTED_EXTENSION: &str = "jpg";

pub const MASK_DIR_NAME: &str = "masks";
pub const MASK_FILE_NAME: &str = "mask.png";

/// Depth maps are upscaled by 2^DEPTH_UPSCALING_TIMES before pyramiding.
pub const DEPTH_UPSCALING_TIMES: u32 = 2;
