//! Infrastructure implementations for the Waypool session engine.
//!
//! Provides in-memory, concurrency-hardened implementations of the domain
//! trait seams: the session store, the role provider, and the ride catalog.

pub mod memory_ride_directory;
pub mod memory_session_repository;
pub mod static_role_provider;

pub use memory_ride_directory::MemoryRideDirectory;
pub use memory_session_repository::MemorySessionRepository;
pub use static_role_provider::StaticRoleProvider;
