pub mod node;
pub mod registry;
pub mod snapshot;
pub mod source;
pub mod watch;
pub mod watcher;

#[cfg(test)]
pub(crate) mod testing;
