pub mod collect;

pub use collect::collect;
