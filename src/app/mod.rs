// Application layer: command-line use cases on top of the adapter.

pub mod commands;
