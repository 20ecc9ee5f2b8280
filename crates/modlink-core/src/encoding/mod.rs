pub mod reader;
pub mod word;
pub mod writer;

pub use reader::Reader;
pub use word::WordOrder;
pub use writer::Writer;
