//! Integration tests: full scan cycles against in-memory collaborators.

mod mocks;
mod scenarios;
