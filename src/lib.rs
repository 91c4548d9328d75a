//! MCP tool-orchestration host.
//!
//! A client that lets a tool-using language model control any number of
//! independently hosted capability providers through one conversational
//! loop: remote MCP servers reached over rmcp transports and in-process
//! objects reached over a synchronous paired channel, registered behind one
//! interface, routed by name, and driven to convergence by a bounded
//! tool-call resolution loop.
//!
//! # Modules
//!
//! - [`mcp`]: paired channel, embedded servers, registry and capability router
//! - [`llm`]: model driver seam and the tool-call resolution loop
//! - [`session`]: conversation transcript and session identity
//! - [`config`]: application configuration

// Allow pedantic clippy warnings that don't add value for this codebase
#![allow(clippy::missing_fields_in_debug)]
#![allow(clippy::default_trait_access)]

pub mod config;
pub mod llm;
pub mod mcp;
pub mod session;
