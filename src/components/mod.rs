// Export components
pub mod assistant;
pub mod calendar_store;

// Re-export the handles used by the bot
pub use assistant::Dispatcher;
pub use calendar_store::EventStoreHandle;
