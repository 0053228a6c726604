//! Property-based tests for data-access and audit pipeline invariants

mod domain_invariants;
mod pipeline_invariants;
mod retry_invariants;
