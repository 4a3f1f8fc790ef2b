//! Placeholder entry point.
//!
//! HTTP routing, auth, and spectator rendering are delegated outside this
//! workspace (see SPEC_FULL.md §1). This binary exists so the workspace has
//! a runnable target; it does not implement a server.

#[tokio::main]
async fn main() {
    println!("town-arena-core {}", town_arena_core::VERSION);
}
