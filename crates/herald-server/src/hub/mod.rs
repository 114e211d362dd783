//! The broadcast hub: subscriber registry, fan-out, heartbeats and shutdown.
//!
//! | Module | Role |
//! |--------|------|
//! | `sink` | Output sink trait and the channel-backed implementation |
//! | `subscriber` | One connected consumer and its lifecycle state |
//! | `registry` | Concurrent set of active subscribers |
//! | `heartbeat` | Periodic keep-alive comments |
//! | `broadcast` | Encode once, write to every subscriber |
//! | `lifecycle` | Subscribe, publish and shutdown entry points |

pub mod broadcast;
pub mod heartbeat;
pub mod lifecycle;
pub mod registry;
pub mod sink;
pub mod subscriber;

#[cfg(test)]
pub(crate) mod test_support;
