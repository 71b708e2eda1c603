/// API route handlers, one module per resource
///
/// - `health`: Health check endpoint
/// - `functions`: stateless process/download endpoints
/// - `auth`: register, login, refresh
/// - `profile`: profile read/update and password change
/// - `dashboard`: overview
/// - `license_keys`: license key management
/// - `scripts`: protection workflow and script records
/// - `analysis`: Lua static analysis
/// - `activity`: activity history
/// - `billing`: plan, balance and ledger

pub mod activity;
pub mod analysis;
pub mod auth;
pub mod billing;
pub mod dashboard;
pub mod functions;
pub mod health;
pub mod license_keys;
pub mod profile;
pub mod scripts;
