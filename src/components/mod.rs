pub mod colors;
pub mod picker;
pub mod pointer;
