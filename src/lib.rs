//! # paperchunk
//!
//! Turns PDF and plain-text documents into overlapping word-window chunks
//! and writes them as Parquet, one row per chunk.
//!
//! The core (`normalize`, `chunk`, `records`) is synchronous and pure: text
//! in, chunks and rows out. Around it, an application layer extracts text,
//! moves each file through stage folders, tracks progress in SQLite, and
//! exposes everything via a CLI and a small REST API.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────┐   ┌───────────────────┐   ┌───────────┐
//! │ Extract  │──▶│ Normalize + Chunk │──▶│  Parquet  │
//! │ PDF/Text │   │   word windows    │   │   sink    │
//! └──────────┘   └───────────────────┘   └───────────┘
//!       ▲                                      │
//!       │      upload → staging → processing   │
//!  ┌────┴─────┐        → processed       ┌─────▼─────┐
//!  │ Pipeline │─────────────────────────▶│  Tracker  │
//!  └────┬─────┘                          │  (SQLite) │
//!       │                                └───────────┘
//!  ┌────┴────┬──────────┐
//!  ▼         ▼          ▼
//! CLI    REST API   Blob store
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! paperchunk init                          # create database and stage folders
//! paperchunk process paper.pdf             # run one file through the pipeline
//! paperchunk chunk paper.pdf --chunk-size 200 --overlap 20
//! paperchunk inspect paper.parquet
//! paperchunk serve                         # start the REST API
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`normalize`] | Whitespace and character normalization |
//! | [`chunk`] | Word-window chunking |
//! | [`records`] | Chunk rows with document metadata columns |
//! | [`extract`] | PDF and plain-text extraction |
//! | [`process`] | Extract, normalize, chunk in one step |
//! | [`sink`] | Parquet writer and reader |
//! | [`stage`] | Pipeline stage state machine |
//! | [`storage`] | Blob store with stage folders |
//! | [`tracker`] | Document records in SQLite |
//! | [`pipeline`] | End-to-end orchestration |
//! | [`server`] | REST API |
//! | [`commands`] | CLI command implementations |
//! | [`config`] | TOML configuration parsing |
//! | [`db`] | Database connection |
//! | [`migrate`] | Schema migrations |

pub mod chunk;
pub mod commands;
pub mod config;
pub mod db;
pub mod extract;
pub mod migrate;
pub mod models;
pub mod normalize;
pub mod pipeline;
pub mod process;
pub mod records;
pub mod server;
pub mod sink;
pub mod stage;
pub mod storage;
pub mod tracker;
