pub mod bits;
pub mod small_float;

pub use bits::DeletedDocs;
