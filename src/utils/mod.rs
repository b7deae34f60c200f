pub mod io;
pub mod keys;
