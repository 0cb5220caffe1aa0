//! Message bus integration tests over the in-memory transport.

mod support;

mod dispatch;
mod interrogation;
mod publish;
mod shutdown;
