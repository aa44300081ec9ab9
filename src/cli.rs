//! The launcher's `clap`-derived command surface (§9.1).
//!
//! `local` wires an in-memory broker, KV store, and a small demo pipeline in
//! a single process; `server` exposes the control plane and broker over
//! HTTP so services can register and run out-of-process. Both share the
//! same [`crate::config::RuntimeConfig`] layering.

// Layer 2: Third-party crate imports
use clap::{Parser, Subcommand};

/// Distributed multi-agent task execution runtime.
#[derive(Debug, Parser)]
#[command(name = "agentmesh", version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Path to a TOML configuration file, layered under `AGENTMESH_*` env vars.
    #[arg(long, global = true)]
    pub config: Option<String>,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run a single in-process demo: in-memory broker, in-memory KV store,
    /// a scripted pipeline, submit one task and print its result.
    Local {
        /// Task input text to submit to the demo pipeline.
        #[arg(long, default_value = "ellohay orldway")]
        task: String,
    },
    /// Run the control plane and broker as an HTTP server; services
    /// register and exchange messages over the network.
    Server {
        /// Ordered service names the pipeline orchestrator dispatches
        /// through, e.g. `--pipeline decode_agent,shout_agent`.
        #[arg(long, value_delimiter = ',')]
        pipeline: Vec<String>,
    },
}
