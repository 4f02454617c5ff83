pub mod app_config;
pub mod bootpay;
pub mod database;
pub mod events;
pub mod redis_repo;
pub mod reservation_repo;
pub mod schedule_repo;

pub use bootpay::BootPayVerifier;
pub use database::DbClient;
pub use events::EventBus;
pub use redis_repo::RedisSeatLedger;
pub use reservation_repo::StoreReservationRepository;
pub use schedule_repo::StoreCatalogRepository;
