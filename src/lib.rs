/*!
# FPM Server

Web back end for the FPM results dashboard. All data lives in Google
Sheets; this crate proxies reads and writes to it, enforces who may
change what, and computes win/draw/loss statistics.

## Architecture

### Frontend Layer
- Static HTML/JS served from the configured static directory
- Header widget (user name, role, active timer), sidebar, login form,
  results editor and statistics dashboard, all talking to the JSON API

### Backend Layer
- **Technologies**: Rust, axum
- **Core Components**:
  - Column Resolver - header names to spreadsheet column letters
  - Change-Set Compiler - sparse row/column edits to single-cell writes
  - Permission Gate - what each role may write
  - Update Orchestrator - gate, header fetch, compile, one batched write
  - Statistics Aggregator - W/D/L totals and monthly buckets

### Data Layer
- Google Sheets v4 REST API (or an in-memory stand-in)
- Users live on their own sheet; new accounts are appended rows

## Modules

- **column**: column letters and A1 cell references
- **changeset**: change sets and their compilation to cell writes
- **permission**: roles and the permission gate
- **stats**: statistics aggregation and date normalization
- **downloader**: statistics export (CSV, XLSX)
- **sheets**: spreadsheet service trait and its implementations
- **update**: the update orchestrator
- **login**: accounts, sessions and their handlers
- **chart**: statistics chart rendering
- **config**: runtime configuration
- **app**: routing and handlers

## REST API Endpoints

- `GET /api/sheets` - Tab names of a spreadsheet
- `POST /api/load-sheet` - Rows of a tab as header-keyed objects
- `POST /api/update-cells` - Apply a change set with the caller's role
- `POST /api/create-account` - Append a new user
- `POST /api/login`, `POST /api/logout`, `GET /api/session` - Sessions
- `GET /api/stats`, `/api/stats/chart.svg`, `/api/stats/export` - Dashboard
*/

// Modules needing the network stack carry `#![cfg(feature = "web")]`
pub mod app;
pub mod changeset;
pub mod chart;
pub mod column;
pub mod config;
pub mod downloader;
pub mod error;
pub mod login;
pub mod permission;
pub mod sheets;
pub mod stats;
pub mod update;

/// Re-export the core types to make them easier to use
pub use changeset::{CellWrite, ChangeSet, HeaderRow, compile};
pub use column::{col_to_letter, letter_to_col};
pub use error::{AccountError, SheetError, StatsError};
pub use permission::{Authorization, Role, authorize};
pub use stats::{Counts, Stats, aggregate, normalize_date};
