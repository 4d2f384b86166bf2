//! End-to-end scenarios against `mldht-core`'s public surface, kept in
//! their own workspace member so they exercise the library the way a
//! downstream crate would: through `KrpcEngine`, `DhtNode` and the
//! `DhtApi` port, never `mldht_core`'s private internals.

#[cfg(test)]
mod e2e_scenarios;
