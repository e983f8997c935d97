//! stratagem — canonical strategy core for an AI trading copilot.
//!
//! Freeform rule fragments extracted by a language model are classified,
//! normalized, and validated into a strict pattern-discriminated strategy
//! representation, compiled into pure decision functions, and mutated only by
//! replaying an append-only event log. Domain logic lives in [`domain`]; the
//! file-in/file-out developer CLI lives in [`cli`].

pub mod cli;
pub mod domain;
