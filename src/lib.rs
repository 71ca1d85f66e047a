//! # Intake Harness
//!
//! A local-first content intake pipeline for AI note vaults.
//!
//! Intake Harness carries raw incoming content — messages, uploaded files,
//! vault notes — through a fixed stage sequence, tracking each submission's
//! lifecycle and notifying registered hooks as stages complete.
//!
//! ## Architecture
//!
//! ```text
//! ┌────────────┐   ┌─────────────────────────────────────┐   ┌──────────┐
//! │ Submission │──▶│              Pipeline               │──▶│  SQLite  │
//! │ CLI / HTTP │   │ store → extract → normalize → anchor │   │  + notes │
//! └────────────┘   └────────┬───────────────┬────────────┘   └──────────┘
//!                          │              │
//!                          ▼              ▼
//!                   ┌────────────┐  ┌────────────┐
//!                   │ Extractors │  │   Hooks    │
//!                   │ (registry) │  │ (registry) │
//!                   └────────────┘  └────────────┘
//! ```
//!
//! Every submission becomes an ingestion record whose status moves along
//! `queued → running → {complete, failed}` and never regresses. Hook
//! dispatch after each stage is observational: hook failures are logged and
//! isolated, never affecting the record.
//!
//! ## Quick Start
//!
//! ```bash
//! intake init                        # create database
//! intake submit ./inbox/report.pdf   # run one file through the pipeline
//! intake status <id>                 # inspect an ingestion
//! intake extractors                  # list registered extractors
//! intake serve                       # start the HTTP API
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`models`] | Core data types and the status machine |
//! | [`db`] | Database connection and migrations |
//! | [`store`] | Content-addressed raw object store |
//! | [`extractor`] | Extractor plugins and registry |
//! | [`hooks`] | Stage-completion hook registry |
//! | [`normalize`] | Text artifact normalization |
//! | [`anchor`] | Note store writes (terminal stage) |
//! | [`pipeline`] | Stage pipeline orchestration |
//! | [`status`] | Status query surface |
//! | [`server`] | Intake HTTP API |

pub mod anchor;
pub mod config;
pub mod db;
pub mod extractor;
pub mod hooks;
pub mod models;
pub mod normalize;
pub mod pipeline;
pub mod server;
pub mod status;
pub mod store;
