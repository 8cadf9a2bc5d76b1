mod alert;
mod alert_store;
mod kv_store;
mod price_client;
mod resolver;

pub use alert::{Alert, AlertKind, Credentials};
pub use alert_store::{AlertError, AlertStore, CredentialStore};
pub use kv_store::{KeyValueStore, MemoryStore, RedisStore};
pub use price_client::{FmpSource, PriceSource, TwelveDataSource, http_client};
pub use resolver::{DEFAULT_PRICE, PriceResolver};
