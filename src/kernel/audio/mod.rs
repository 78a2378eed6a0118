pub mod convert;
pub mod segment;
pub mod segmenter;
pub mod windower;
