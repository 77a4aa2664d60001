pub mod store;

pub use store::{IdempotencyStore, PostgresIdempotencyStore, RedisIdempotencyCache};
