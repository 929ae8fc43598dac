pub mod hashing;
pub mod rate_limiter;
pub mod retry;
