pub(crate) mod limits;
pub(crate) mod shared;
pub(crate) mod sync;
