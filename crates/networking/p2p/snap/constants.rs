//! Snap Sync Protocol Constants
//!
//! This module centralizes the constants used by the healing engine.

use std::time::Duration;

// =============================================================================
// RESPONSE LIMITS
// =============================================================================

/// Maximum response size in bytes for snap protocol requests (512 KB).
///
/// This limits the amount of data a peer can return in a single response,
/// preventing memory exhaustion and ensuring reasonable response times.
pub const MAX_RESPONSE_BYTES: u64 = 512 * 1024;

/// Maximum number of trie nodes to request from a peer in a single batch.
pub const MAX_TRIE_NODE_FETCH: usize = 1024;

// =============================================================================
// HEALING POLICY
// =============================================================================

/// Coverage fraction of the account key space the range-fetch path must reach
/// before healing starts. Healing is kept late on purpose: below this level
/// the cheaper range requests do most of the work and healing would waste
/// bandwidth re-downloading nodes ranges will fill in anyway.
pub const HEAL_ACCOUNTS_TRIGGER: f64 = 0.99;

/// Upper bound on nodes expanded by a single trie inspection pass, so one
/// buddy tick cannot monopolize the scheduler.
pub const INSPECT_FRONTIER_LIMIT: usize = 10_000;

// =============================================================================
// REQUEST CONFIGURATION
// =============================================================================

/// Timeout for peer responses in snap sync operations.
pub const PEER_REPLY_TIMEOUT: Duration = Duration::from_secs(15);

/// Consecutive request timeouts after which a peer is considered unusable
/// and its buddy marked zombie.
pub const MAX_CONSECUTIVE_TIMEOUTS: u32 = 3;

/// Serious protocol faults (wrong hash, protocol violation, closed
/// connection) after which a buddy is marked zombie.
pub const MAX_SERIOUS_FAULTS: u32 = 2;

// =============================================================================
// PROGRESS REPORTING
// =============================================================================

/// Interval between ticker statistics readouts.
pub const TICKER_INTERVAL: Duration = Duration::from_secs(1);

/// How many identical consecutive readouts the ticker swallows before
/// logging the line again.
pub const TICKER_LOG_SUPPRESS_MAX: u32 = 100;
