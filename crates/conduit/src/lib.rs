//! `conduit`: serves a directory of YAML workflows as MCP tools over stdio
//! or a Unix socket.

pub mod config;
pub mod serve;
pub mod validate;
