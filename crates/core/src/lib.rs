pub mod audio;
pub mod phonetics;
pub mod pipeline;
pub mod shared;
