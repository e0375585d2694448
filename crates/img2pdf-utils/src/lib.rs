pub mod load;
pub mod mime;
