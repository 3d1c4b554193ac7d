pub mod decode_engine;
pub mod image_source;
