mod model_mock;
mod smoke_tests;

// Integration tests, grouped by the part of the bot they exercise:
// - smoke_tests: configuration and actor lifecycle
// - store_tests: the event store actor over the in-memory backend
// - model_mock: a scripted language model driving the full message pipeline
