pub mod anim;
pub mod config;
pub mod io;
