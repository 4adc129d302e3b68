// Library root
// -----------
// The binary (`main.rs`) parses flags and hands off to `ui::run`; everything
// else lives here so it can be tested without a terminal.
//
// Module responsibilities:
// - `config`: command-line surface and the resolved `Config`.
// - `api`: blocking HTTP client for the Reeltube control plane.
// - `inspect`: validates and classifies the file to upload.
// - `upload`: the multipart engine (session, worker pool, finalize).
// - `progress`: progress bar fed by worker events.
// - `ui`: command handlers and user-facing output.
pub mod api;
pub mod config;
pub mod error;
pub mod inspect;
pub mod progress;
pub mod ui;
pub mod upload;
