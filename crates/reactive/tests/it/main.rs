/*! Integration tests for Trellis Reactive.
 *
 * A single integration test binary. Every test drives live queries through
 * an in-memory model store that notifies a `Monitor`, the way a real record
 * store would.
 *
 * - helpers: The model store and the task record/domain types
 * - reconcile: Membership transitions driven by change events
 * - lifetime: Provider teardown, weak observers and query reuse
 * - compose: Merged, filtered and ancestor-closure results over live queries
 * - properties: proptest properties over random event sequences
 */

use tracing_subscriber::EnvFilter;

#[ctor::ctor]
fn init_test_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env().add_directive("trellis_reactive=info".parse().unwrap()),
        )
        .with_test_writer()
        .try_init();
}

mod compose;
mod helpers;
mod lifetime;
mod properties;
mod reconcile;
