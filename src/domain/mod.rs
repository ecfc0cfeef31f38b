pub mod facility;
pub mod pass;
pub mod pool;
